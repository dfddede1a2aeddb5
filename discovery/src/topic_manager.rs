//! `tm_ship` / `tm_slap`: admit outputs carrying a valid advertisement of
//! the manager's protocol.

use async_trait::async_trait;
use overlay_codec::Beef;
use overlay_protocol::{ProtocolError, TopicManager};
use overlay_types::{AdmittanceInstructions, AdvertisementProtocol, ServiceMetaData};
use tracing::debug;

use crate::token::decode_for;

/// Topic manager for one advertisement protocol.
///
/// Spending an advertisement revokes it, so no previous coin is ever
/// retained.
pub struct AdvertisementTopicManager {
    protocol: AdvertisementProtocol,
}

impl AdvertisementTopicManager {
    pub fn new(protocol: AdvertisementProtocol) -> Self {
        Self { protocol }
    }

    pub fn ship() -> Self {
        Self::new(AdvertisementProtocol::Ship)
    }

    pub fn slap() -> Self {
        Self::new(AdvertisementProtocol::Slap)
    }

    pub fn protocol(&self) -> AdvertisementProtocol {
        self.protocol
    }
}

#[async_trait]
impl TopicManager for AdvertisementTopicManager {
    async fn identify_admissible_outputs(
        &self,
        beef: &[u8],
        _previous_coins: &[u32],
    ) -> Result<AdmittanceInstructions, ProtocolError> {
        let beef = Beef::from_bytes(beef)?;
        let tx = beef.subject()?;

        let outputs_to_admit = tx
            .outputs
            .iter()
            .enumerate()
            .filter_map(|(index, output)| {
                match decode_for(self.protocol, output.locking_script.as_bytes()) {
                    Ok(_) => Some(index as u32),
                    Err(e) => {
                        debug!(protocol = %self.protocol, output_index = index, error = %e, "skipping output");
                        None
                    }
                }
            })
            .collect();

        Ok(AdmittanceInstructions {
            outputs_to_admit,
            coins_to_retain: Vec::new(),
        })
    }

    async fn get_documentation(&self) -> Result<String, ProtocolError> {
        Ok(match self.protocol {
            AdvertisementProtocol::Ship => include_str!("../docs/ship.md"),
            AdvertisementProtocol::Slap => include_str!("../docs/slap.md"),
        }
        .to_string())
    }

    async fn get_meta_data(&self) -> Result<ServiceMetaData, ProtocolError> {
        let meta = match self.protocol {
            AdvertisementProtocol::Ship => {
                ServiceMetaData::new("SHIP Topic Manager", "Host-interconnect advertisements")
            }
            AdvertisementProtocol::Slap => {
                ServiceMetaData::new("SLAP Topic Manager", "Lookup-availability advertisements")
            }
        };
        Ok(meta.with_version(env!("CARGO_PKG_VERSION")))
    }
}
