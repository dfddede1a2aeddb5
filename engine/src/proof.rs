//! Merkle proof ingestion.

use overlay_codec::{Beef, MerklePath};
use overlay_types::TxId;
use tracing::{debug, info, warn, Instrument};

use crate::tracing_spans::merkle_proof_span;
use crate::{Engine, EngineError};

impl Engine {
    /// Verify `path` for `txid` with the chain tracker and mark every coin of
    /// that transaction confirmed. Returns the number of coins whose status
    /// changed.
    ///
    /// A proof that fails verification leaves coin state untouched. Applying
    /// the same proof again changes nothing.
    pub async fn handle_new_merkle_proof(
        &self,
        txid: TxId,
        path: MerklePath,
    ) -> Result<usize, EngineError> {
        let span = merkle_proof_span(&txid.to_hex(), path.block_height);
        self.ingest_proof(txid, path).instrument(span).await
    }

    async fn ingest_proof(&self, txid: TxId, path: MerklePath) -> Result<usize, EngineError> {
        let verified = tokio::time::timeout(
            self.chain_tracker_timeout,
            self.chain_tracker.verify(&txid, &path),
        )
        .await;
        let height = match verified {
            Ok(Ok(height)) => height,
            Ok(Err(e)) => {
                self.metrics.merkle_proofs_rejected.inc();
                warn!(error = %e, "merkle proof rejected");
                return Err(e.into());
            }
            Err(_) => {
                warn!("chain tracker timed out");
                return Err(EngineError::Timeout {
                    service: "chain tracker",
                    timeout: self.chain_tracker_timeout,
                });
            }
        };

        let confirmed = self.storage.confirm(&txid, height, &path.to_bytes())?;
        if confirmed > 0 {
            self.attach_to_archive(&txid, path);
        }
        self.metrics.merkle_proofs_ingested.inc();
        info!(height, confirmed, "merkle proof applied");
        Ok(confirmed)
    }

    /// Store the proof alongside the archived transaction so later lookups
    /// hand out a proven container.
    fn attach_to_archive(&self, txid: &TxId, path: MerklePath) {
        let updated = self.storage.get_transaction(txid).and_then(|archived| {
            let Some(bytes) = archived else {
                return Ok(false);
            };
            let mut beef = match Beef::from_bytes(&bytes) {
                Ok(beef) => beef,
                Err(e) => {
                    warn!(error = %e, "archived container does not decode");
                    return Ok(false);
                }
            };
            if beef.subject_proof().is_some() {
                return Ok(false);
            }
            if let Err(e) = beef.attach_proof(txid, path) {
                warn!(error = %e, "cannot attach proof to archived container");
                return Ok(false);
            }
            self.storage.put_transaction(txid, &beef.to_bytes())?;
            Ok(true)
        });
        match updated {
            Ok(true) => debug!("archived container now carries the proof"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "failed to update archived container"),
        }
    }
}
