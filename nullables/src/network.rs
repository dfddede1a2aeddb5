//! Nullable broadcaster: record transactions without relaying them.

use async_trait::async_trait;
use overlay_codec::sha256d;
use overlay_protocol::{BroadcastResponse, Broadcaster, ProtocolError};
use overlay_types::TxId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// A broadcaster that records transactions instead of sending them.
pub struct NullBroadcaster {
    /// All raw transactions "sent".
    sent: Mutex<Vec<Vec<u8>>>,
    failing: AtomicBool,
}

impl NullBroadcaster {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every broadcast fail as if the relay rejected it.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Get all sent transactions (for assertions).
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// Clear all state.
    pub fn reset(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Default for NullBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broadcaster for NullBroadcaster {
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<BroadcastResponse, ProtocolError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProtocolError::ExternalService("relay rejected transaction".into()));
        }
        self.sent.lock().unwrap().push(raw_tx.to_vec());
        Ok(BroadcastResponse {
            txid: TxId::new(sha256d(raw_tx)),
            status: "SEEN_ON_NETWORK".into(),
            message: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_fails_on_demand() {
        let broadcaster = NullBroadcaster::new();
        broadcaster.broadcast(b"tx").await.unwrap();
        assert_eq!(broadcaster.sent(), vec![b"tx".to_vec()]);

        broadcaster.set_failing(true);
        assert!(broadcaster.broadcast(b"tx2").await.is_err());
        assert_eq!(broadcaster.sent().len(), 1);
    }
}
