//! Transaction relay to the wider network.

use async_trait::async_trait;
use overlay_types::TxId;
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// What the relay reported for an accepted transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResponse {
    pub txid: TxId,
    /// Relay-specific status, e.g. `SEEN_ON_NETWORK`.
    pub status: String,
    #[serde(default)]
    pub message: String,
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Relay a raw transaction. A relay may later deliver a merkle proof
    /// for it through the node's callback endpoint.
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<BroadcastResponse, ProtocolError>;
}
