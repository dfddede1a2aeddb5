//! Overlay engine: the coordinator of an overlay services node.
//!
//! The engine:
//! - Admits submitted transactions into topics through their topic managers
//! - Tracks admitted coins through spend, deletion and confirmation
//! - Keeps lookup services' indexes in step with the coin lifecycle
//! - Answers lookup questions, hydrating formulas from the archive
//! - Confirms coins from verified merkle proofs
//! - Reconciles the node's SHIP/SLAP advertisements

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod proof;
pub mod shutdown;
pub mod submit;
pub mod sync;
pub mod tracing_spans;

pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder};
pub use error::EngineError;
pub use logging::{init_logging, LogFormat};
pub use metrics::EngineMetrics;
pub use shutdown::ShutdownController;
pub use submit::{BroadcastStatus, SubmitResult};
pub use sync::{SyncAction, SyncFailure, SyncSummary};
