//! Nullable chain tracker: a programmable block-header oracle.

use async_trait::async_trait;
use overlay_protocol::{ChainTracker, ProtocolError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A chain tracker that knows only the roots it was told about.
pub struct NullChainTracker {
    roots: Mutex<HashMap<u32, [u8; 32]>>,
    accept_all: AtomicBool,
    unreachable: AtomicBool,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl NullChainTracker {
    /// A tracker that rejects every root until one is added.
    pub fn new() -> Self {
        Self {
            roots: Mutex::new(HashMap::new()),
            accept_all: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// A tracker that accepts any root at any height.
    pub fn accepting_all() -> Self {
        let tracker = Self::new();
        tracker.accept_all.store(true, Ordering::SeqCst);
        tracker
    }

    /// Record `root` (internal byte order) as the merkle root at `height`.
    pub fn add_root(&self, height: u32, root: [u8; 32]) {
        self.roots.lock().unwrap().insert(height, root);
    }

    /// Make every call fail as if the service could not be reached.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delay every answer, for exercising timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Number of root checks performed.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for NullChainTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainTracker for NullChainTracker {
    async fn is_valid_root_for_height(
        &self,
        root: &[u8; 32],
        height: u32,
    ) -> Result<bool, ProtocolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ProtocolError::ExternalService(
                "chain tracker unreachable".into(),
            ));
        }
        if self.accept_all.load(Ordering::SeqCst) {
            return Ok(true);
        }
        Ok(self.roots.lock().unwrap().get(&height) == Some(root))
    }
}
