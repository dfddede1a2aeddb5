//! Transaction submission: per-topic admission, coin lifecycle updates,
//! lookup-service notification, then broadcast.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use futures_util::future::join_all;
use overlay_codec::{Beef, Transaction};
use overlay_store::CoinRecord;
use overlay_types::{ErrorReport, OutputRef, Steak, TaggedTransaction, TopicSteak, TxId};
use serde::Serialize;
use tracing::{debug, info, warn, Instrument};

use crate::tracing_spans::{submit_span, topic_admit_span};
use crate::{Engine, EngineError};

/// What happened when the transaction was handed to the broadcast client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BroadcastStatus {
    /// No broadcaster configured, or nothing was admitted.
    NotAttempted,
    Accepted { relay_status: String },
    /// Local admission stands; the relay may be retried.
    Failed { error: ErrorReport },
}

/// Outcome of [`Engine::submit`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResult {
    pub txid: TxId,
    /// One entry per topic that was processed.
    pub steak: Steak,
    /// Topics that failed, each with its own report.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failed_topics: BTreeMap<String, ErrorReport>,
    pub broadcast: BroadcastStatus,
}

impl SubmitResult {
    /// Whether any topic admitted, retained or dropped anything.
    pub fn changed_state(&self) -> bool {
        self.steak.values().any(|s| {
            !s.outputs_to_admit.is_empty()
                || !s.coins_to_retain.is_empty()
                || !s.coins_removed.is_empty()
        })
    }
}

/// Keep the indices of `requested` that are in `allowed`, in order, once.
fn filter_indices(requested: &[u32], allowed: impl Fn(u32) -> bool) -> Vec<u32> {
    let mut seen = BTreeSet::new();
    requested
        .iter()
        .copied()
        .filter(|i| allowed(*i) && seen.insert(*i))
        .collect()
}

impl Engine {
    /// Admit a tagged transaction into each of its topics.
    ///
    /// Topics are processed concurrently and fail independently. Only an
    /// empty topic list or an undecodable container fails the whole call.
    pub async fn submit(&self, tagged: TaggedTransaction) -> Result<SubmitResult, EngineError> {
        tagged.validate()?;
        let beef = Beef::from_bytes(&tagged.beef)?;
        let tx = beef.subject()?;
        let txid = tx.txid();
        let started = Instant::now();
        self.metrics.submissions.inc();

        let topics: BTreeSet<&str> = tagged.topics.iter().map(String::as_str).collect();
        let span = submit_span(&txid.to_hex(), topics.len());

        // Topic spans are created inside the submit span so they nest under it.
        let outcomes = async {
            join_all(topics.iter().map(|topic| {
                self.admit_to_topic(topic, &tagged.beef, tx, txid)
                    .instrument(topic_admit_span(topic))
            }))
            .await
        }
        .instrument(span.clone())
        .await;

        let mut steak = Steak::new();
        let mut failed_topics = BTreeMap::new();
        for (topic, outcome) in topics.iter().zip(outcomes) {
            match outcome {
                Ok(entry) => {
                    steak.insert(topic.to_string(), entry);
                }
                Err(e) => {
                    self.metrics.topic_failures.inc();
                    warn!(parent: &span, topic = %topic, error = %e, "topic admission failed");
                    failed_topics.insert(topic.to_string(), e.report());
                }
            }
        }

        let mut result = SubmitResult {
            txid,
            steak,
            failed_topics,
            broadcast: BroadcastStatus::NotAttempted,
        };

        if result.changed_state() {
            if let Some(proof) = beef.subject_proof() {
                if let Err(e) = self.handle_new_merkle_proof(txid, proof.clone()).await {
                    warn!(parent: &span, error = %e, "proof carried in container was not applied");
                }
            }
            result.broadcast = self.broadcast(tx).instrument(span.clone()).await;
        }

        self.metrics
            .submit_time_ms
            .observe(started.elapsed().as_secs_f64() * 1000.0);
        info!(
            parent: &span,
            admitted = result.steak.values().map(|s| s.outputs_to_admit.len()).sum::<usize>(),
            failed = result.failed_topics.len(),
            "submission processed"
        );
        Ok(result)
    }

    async fn broadcast(&self, tx: &Transaction) -> BroadcastStatus {
        let Some(broadcaster) = &self.broadcaster else {
            return BroadcastStatus::NotAttempted;
        };
        let outcome = tokio::time::timeout(self.broadcast_timeout, broadcaster.broadcast(&tx.to_bytes()))
            .await
            .map_err(|_| EngineError::Timeout {
                service: "broadcast client",
                timeout: self.broadcast_timeout,
            })
            .and_then(|r| r.map_err(EngineError::from));
        match outcome {
            Ok(response) => {
                debug!(status = %response.status, "transaction relayed");
                BroadcastStatus::Accepted {
                    relay_status: response.status,
                }
            }
            Err(e) => {
                self.metrics.broadcast_failures.inc();
                warn!(error = %e, "broadcast failed; local admission stands");
                BroadcastStatus::Failed { error: e.report() }
            }
        }
    }

    /// Apply `tx` to one topic and return its STEAK entry.
    async fn admit_to_topic(
        &self,
        topic: &str,
        beef: &[u8],
        tx: &Transaction,
        txid: TxId,
    ) -> Result<TopicSteak, EngineError> {
        let manager = self
            .managers
            .get(topic)
            .ok_or_else(|| EngineError::UnknownTopic(topic.to_string()))?;

        if self.storage.has_applied(&txid, topic)? {
            debug!("transaction already applied to topic");
            return Ok(TopicSteak::default());
        }

        // Inputs spending coins this topic tracks. A spent coin already
        // linked to this transaction's outputs is left over from an earlier
        // attempt that failed before the applied marker was written.
        let mut previous: BTreeMap<u32, CoinRecord> = BTreeMap::new();
        for (index, input) in tx.inputs.iter().enumerate() {
            if let Some(coin) = self.storage.get_coin(topic, &input.previous_output)? {
                if !coin.spent || coin.consumed_by.iter().any(|o| o.txid == txid) {
                    previous.insert(index as u32, coin);
                }
            }
        }
        let previous_indices: Vec<u32> = previous.keys().copied().collect();

        let instructions = manager
            .identify_admissible_outputs(beef, &previous_indices)
            .await?;
        let output_count = tx.outputs.len() as u32;
        let outputs_to_admit =
            filter_indices(&instructions.outputs_to_admit, |i| i < output_count);
        let coins_to_retain =
            filter_indices(&instructions.coins_to_retain, |i| previous.contains_key(&i));
        if outputs_to_admit.len() != instructions.outputs_to_admit.len()
            || coins_to_retain.len() != instructions.coins_to_retain.len()
        {
            warn!("topic manager returned out-of-range or duplicate indices; ignoring them");
        }

        let retained: Vec<OutputRef> = coins_to_retain
            .iter()
            .filter_map(|i| previous.get(i).map(|coin| coin.outpoint))
            .collect();

        // No previous coin is spent or dropped until every addition and
        // ancestry link is written.
        if !outputs_to_admit.is_empty() {
            // Archive first so an admitted coin can always be hydrated.
            self.storage.put_transaction(&txid, beef)?;
        }
        let mut admitted = Vec::with_capacity(outputs_to_admit.len());
        for &index in &outputs_to_admit {
            let output = &tx.outputs[index as usize];
            let outpoint = OutputRef::new(txid, index);
            let mut coin = CoinRecord::new(
                topic,
                outpoint,
                output.satoshis,
                output.locking_script.as_bytes().to_vec(),
            );
            coin.outputs_consumed = retained.clone();
            if self.storage.insert_coin(&coin)? {
                self.notify_added(&txid, index, &coin.locking_script, topic).await;
                self.metrics.outputs_admitted.inc();
            } else {
                debug!(%outpoint, "output already admitted");
            }
            admitted.push(outpoint);
        }

        if !admitted.is_empty() {
            for outpoint in &retained {
                self.storage.add_consumed_by(topic, outpoint, &admitted)?;
            }
        }

        // Coins the topic no longer tracks.
        let mut coins_removed = Vec::new();
        for (index, coin) in &previous {
            if coins_to_retain.contains(index) {
                continue;
            }
            self.notify_spent(&coin.outpoint, topic).await;
            if self.storage.delete_coin(topic, &coin.outpoint)? {
                self.notify_deleted(&coin.outpoint, topic).await;
            }
            coins_removed.push(*index);
        }

        // Retained coins stay in the topic as spent history.
        for (index, coin) in &previous {
            if !coins_to_retain.contains(index) || coin.spent {
                continue;
            }
            self.storage.mark_spent(topic, &coin.outpoint)?;
            self.notify_spent(&coin.outpoint, topic).await;
            debug!(input_index = index, outpoint = %coin.outpoint, "coin spent");
        }

        self.storage.insert_applied(&txid, topic)?;
        self.metrics.coins_removed.inc_by(coins_removed.len() as u64);
        info!(
            admitted = outputs_to_admit.len(),
            retained = coins_to_retain.len(),
            removed = coins_removed.len(),
            "transaction applied"
        );

        Ok(TopicSteak {
            outputs_to_admit,
            coins_to_retain,
            coins_removed,
        })
    }

    async fn notify_added(&self, txid: &TxId, output_index: u32, script: &[u8], topic: &str) {
        for (name, service) in &self.lookup_services {
            if let Err(e) = service.output_added(txid, output_index, script, topic).await {
                warn!(service = %name, %txid, output_index, error = %e, "output_added failed");
            }
        }
    }

    async fn notify_spent(&self, outpoint: &OutputRef, topic: &str) {
        for (name, service) in &self.lookup_services {
            if let Err(e) = service.output_spent(outpoint, topic).await {
                warn!(service = %name, %outpoint, error = %e, "output_spent failed");
            }
        }
    }

    async fn notify_deleted(&self, outpoint: &OutputRef, topic: &str) {
        for (name, service) in &self.lookup_services {
            if let Err(e) = service.output_deleted(outpoint, topic).await {
                warn!(service = %name, %outpoint, error = %e, "output_deleted failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_indices_drops_duplicates_and_disallowed() {
        assert_eq!(filter_indices(&[2, 0, 2, 9, 1], |i| i < 3), vec![2, 0, 1]);
        assert!(filter_indices(&[], |_| true).is_empty());
    }

    #[test]
    fn changed_state_ignores_empty_entries() {
        let mut result = SubmitResult {
            txid: TxId::ZERO,
            steak: Steak::new(),
            failed_topics: BTreeMap::new(),
            broadcast: BroadcastStatus::NotAttempted,
        };
        result.steak.insert("tm_a".into(), TopicSteak::default());
        assert!(!result.changed_state());
        result.steak.insert(
            "tm_b".into(),
            TopicSteak {
                outputs_to_admit: vec![0],
                ..TopicSteak::default()
            },
        );
        assert!(result.changed_state());
    }
}
