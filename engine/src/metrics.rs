//! Prometheus metrics for the overlay engine.
//!
//! [`EngineMetrics`] owns a dedicated [`Registry`] that the RPC `/metrics`
//! endpoint encodes into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

pub struct EngineMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub submissions: IntCounter,
    /// Per-topic failures inside otherwise processed submissions.
    pub topic_failures: IntCounter,
    pub outputs_admitted: IntCounter,
    pub coins_removed: IntCounter,
    pub lookups: IntCounter,
    pub merkle_proofs_ingested: IntCounter,
    pub merkle_proofs_rejected: IntCounter,
    pub advertisements_published: IntCounter,
    pub advertisements_revoked: IntCounter,
    pub broadcast_failures: IntCounter,

    // ── Histograms ──────────────────────────────────────────────────────
    pub submit_time_ms: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    register_int_counter_with_registry!(Opts::new(name, help), registry)
        .unwrap_or_else(|e| panic!("failed to register {name}: {e}"))
}

impl EngineMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let submissions = counter(
            &registry,
            "overlay_submissions_total",
            "Transactions submitted to the engine",
        );
        let topic_failures = counter(
            &registry,
            "overlay_topic_failures_total",
            "Topics that failed while processing a submission",
        );
        let outputs_admitted = counter(
            &registry,
            "overlay_outputs_admitted_total",
            "Outputs admitted into a topic",
        );
        let coins_removed = counter(
            &registry,
            "overlay_coins_removed_total",
            "Previously admitted coins dropped from a topic",
        );
        let lookups = counter(&registry, "overlay_lookups_total", "Lookup questions answered");
        let merkle_proofs_ingested = counter(
            &registry,
            "overlay_merkle_proofs_ingested_total",
            "Merkle proofs verified and applied",
        );
        let merkle_proofs_rejected = counter(
            &registry,
            "overlay_merkle_proofs_rejected_total",
            "Merkle proofs that failed verification",
        );
        let advertisements_published = counter(
            &registry,
            "overlay_advertisements_published_total",
            "SHIP/SLAP advertisements published",
        );
        let advertisements_revoked = counter(
            &registry,
            "overlay_advertisements_revoked_total",
            "SHIP/SLAP advertisements revoked",
        );
        let broadcast_failures = counter(
            &registry,
            "overlay_broadcast_failures_total",
            "Admitted transactions the relay did not accept",
        );

        // 0.1 ms → ~1.6 s.
        let submit_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "overlay_submit_time_ms",
                "Time spent processing one submission, in milliseconds"
            )
            .buckets(vec![
                0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0,
            ]),
            registry
        )
        .unwrap_or_else(|e| panic!("failed to register overlay_submit_time_ms: {e}"));

        Self {
            registry,
            submissions,
            topic_failures,
            outputs_admitted,
            coins_removed,
            lookups,
            merkle_proofs_ingested,
            merkle_proofs_rejected,
            advertisements_published,
            advertisements_revoked,
            broadcast_failures,
            submit_time_ms,
        }
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_registered_counters() {
        let metrics = EngineMetrics::new();
        metrics.submissions.inc();
        metrics.outputs_admitted.inc_by(3);
        let text = metrics.encode().unwrap();
        assert!(text.contains("overlay_submissions_total 1"));
        assert!(text.contains("overlay_outputs_admitted_total 3"));
    }
}
