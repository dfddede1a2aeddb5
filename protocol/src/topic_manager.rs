//! Topic managers decide which outputs of a transaction belong to a topic.

use async_trait::async_trait;
use overlay_types::{AdmittanceInstructions, ServiceMetaData};

use crate::ProtocolError;

#[async_trait]
pub trait TopicManager: Send + Sync {
    /// Decide admission for every output of the container's subject
    /// transaction.
    ///
    /// `previous_coins` lists the input indices that spend coins this topic
    /// already tracks. Outputs are judged independently: one that fails to
    /// decode is skipped, never fatal. Only an unparsable container fails
    /// the whole call.
    async fn identify_admissible_outputs(
        &self,
        beef: &[u8],
        previous_coins: &[u32],
    ) -> Result<AdmittanceInstructions, ProtocolError>;

    /// Markdown describing the topic's admission rules.
    async fn get_documentation(&self) -> Result<String, ProtocolError>;

    async fn get_meta_data(&self) -> Result<ServiceMetaData, ProtocolError>;
}
