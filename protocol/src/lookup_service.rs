//! Lookup services project admitted outputs into a queryable index.

use async_trait::async_trait;
use overlay_types::{LookupQuestion, LookupResult, OutputRef, ServiceMetaData, TxId};

use crate::ProtocolError;

/// Receives output lifecycle notifications for the topics it indexes and
/// answers structured queries.
///
/// Notifications for foreign topics are ignored. A script that fails to
/// decode in [`LookupService::output_added`] is logged and skipped, not
/// raised.
#[async_trait]
pub trait LookupService: Send + Sync {
    async fn output_added(
        &self,
        txid: &TxId,
        output_index: u32,
        locking_script: &[u8],
        topic: &str,
    ) -> Result<(), ProtocolError>;

    async fn output_spent(&self, outpoint: &OutputRef, topic: &str) -> Result<(), ProtocolError>;

    async fn output_deleted(&self, outpoint: &OutputRef, topic: &str)
        -> Result<(), ProtocolError>;

    /// Answer a question. A missing query is [`ProtocolError::InvalidQuery`];
    /// no matches is an empty formula.
    async fn lookup(&self, question: &LookupQuestion) -> Result<LookupResult, ProtocolError>;

    async fn get_documentation(&self) -> Result<String, ProtocolError>;

    async fn get_meta_data(&self) -> Result<ServiceMetaData, ProtocolError>;
}
