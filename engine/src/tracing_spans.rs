//! Span constructors for the engine's operations.
//!
//! Consistent span names and fields make it easy to filter and correlate
//! one submission's work across topics and lookup services.

use tracing::{info_span, Span};

/// Span covering one `submit` call across all of its topics.
pub fn submit_span(txid: &str, topic_count: usize) -> Span {
    info_span!("submit", txid = %txid, topics = topic_count)
}

/// Span covering admission of one transaction into one topic.
pub fn topic_admit_span(topic: &str) -> Span {
    info_span!("topic_admit", topic = %topic)
}

pub fn lookup_span(service: &str) -> Span {
    info_span!("lookup", service = %service)
}

/// Span covering verification and application of one merkle proof.
pub fn merkle_proof_span(txid: &str, height: u32) -> Span {
    info_span!("merkle_proof", txid = %txid, height = height)
}

pub fn sync_advertisements_span() -> Span {
    info_span!("sync_advertisements")
}

/// Span covering a single HTTP request handled by the RPC server.
pub fn rpc_span(route: &str) -> Span {
    info_span!("rpc", route = %route)
}
