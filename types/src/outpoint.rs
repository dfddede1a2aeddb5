//! Output references.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::TxId;

/// Identity of a single transaction output: `(txid, output index)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputRef {
    pub txid: TxId,
    pub output_index: u32,
}

impl OutputRef {
    /// Length of the binary key produced by [`OutputRef::to_key`].
    pub const KEY_LEN: usize = 36;

    pub fn new(txid: TxId, output_index: u32) -> Self {
        Self { txid, output_index }
    }

    /// Binary key `txid(32) ++ output_index_be(4)`.
    ///
    /// Big-endian index keeps the outputs of one transaction contiguous and
    /// ordered under a txid prefix scan.
    pub fn to_key(&self) -> [u8; Self::KEY_LEN] {
        let mut key = [0u8; Self::KEY_LEN];
        key[..32].copy_from_slice(self.txid.as_bytes());
        key[32..].copy_from_slice(&self.output_index.to_be_bytes());
        key
    }

    /// Inverse of [`OutputRef::to_key`]. Returns `None` on a short key.
    pub fn from_key(key: &[u8]) -> Option<Self> {
        if key.len() != Self::KEY_LEN {
            return None;
        }
        let mut txid = [0u8; 32];
        txid.copy_from_slice(&key[..32]);
        let mut index = [0u8; 4];
        index.copy_from_slice(&key[32..]);
        Some(Self::new(TxId::new(txid), u32::from_be_bytes(index)))
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.txid, self.output_index)
    }
}
