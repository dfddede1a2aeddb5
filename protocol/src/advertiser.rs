//! Issues and revokes SHIP/SLAP advertisements.

use async_trait::async_trait;
use overlay_types::{Advertisement, AdvertisementData, TaggedTransaction};

use crate::ProtocolError;

#[async_trait]
pub trait Advertiser: Send + Sync {
    /// Hex-encoded identity key advertisements are issued under.
    fn identity_key(&self) -> &str;

    /// Hosting URL advertised for this node.
    fn hosting_url(&self) -> &str;

    /// Build a transaction carrying one advertisement output per entry,
    /// tagged for the matching SHIP/SLAP topics.
    async fn create_advertisements(
        &self,
        data: &[AdvertisementData],
    ) -> Result<TaggedTransaction, ProtocolError>;

    /// Build a transaction spending the given advertisement outputs.
    async fn revoke_advertisements(
        &self,
        advertisements: &[Advertisement],
    ) -> Result<TaggedTransaction, ProtocolError>;

    /// Decode an advertisement from an output's locking script.
    fn parse_advertisement(&self, locking_script: &[u8]) -> Result<Advertisement, ProtocolError>;
}
