//! Block-inclusion oracle.

use async_trait::async_trait;
use overlay_codec::MerklePath;
use overlay_types::TxId;

use crate::ProtocolError;

#[async_trait]
pub trait ChainTracker: Send + Sync {
    /// Whether `root` (internal byte order) is the merkle root of the block
    /// at `height`.
    async fn is_valid_root_for_height(
        &self,
        root: &[u8; 32],
        height: u32,
    ) -> Result<bool, ProtocolError>;

    /// Check that `path` proves `txid` into a real block and return the
    /// block height.
    async fn verify(&self, txid: &TxId, path: &MerklePath) -> Result<u32, ProtocolError> {
        let root = path.compute_root(txid)?;
        if self.is_valid_root_for_height(&root, path.block_height).await? {
            Ok(path.block_height)
        } else {
            Err(ProtocolError::Verification(format!(
                "merkle root for {txid} does not match block {}",
                path.block_height
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_codec::merkle_path::PathLeaf;

    struct FixedRoot([u8; 32]);

    #[async_trait]
    impl ChainTracker for FixedRoot {
        async fn is_valid_root_for_height(
            &self,
            root: &[u8; 32],
            _height: u32,
        ) -> Result<bool, ProtocolError> {
            Ok(*root == self.0)
        }
    }

    #[tokio::test]
    async fn verify_returns_height_for_matching_root() {
        let txid = TxId::new([9; 32]);
        let path = MerklePath::new(812, vec![vec![PathLeaf::client_txid(0, txid)]]);
        let tracker = FixedRoot(*txid.as_bytes());
        assert_eq!(tracker.verify(&txid, &path).await.unwrap(), 812);
    }

    #[tokio::test]
    async fn verify_rejects_wrong_root_and_foreign_txid() {
        let txid = TxId::new([9; 32]);
        let path = MerklePath::new(812, vec![vec![PathLeaf::client_txid(0, txid)]]);
        let tracker = FixedRoot([0; 32]);
        assert!(matches!(
            tracker.verify(&txid, &path).await,
            Err(ProtocolError::Verification(_))
        ));
        assert!(matches!(
            tracker.verify(&TxId::ZERO, &path).await,
            Err(ProtocolError::Codec(_))
        ));
    }
}
