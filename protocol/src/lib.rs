//! Capability traits the engine is assembled from.
//!
//! Topic managers and lookup services are registered by name and dispatched
//! dynamically. The chain tracker, broadcaster and advertiser are external
//! collaborators specified only at their boundary.

pub mod advertiser;
pub mod broadcaster;
pub mod chain_tracker;
pub mod error;
pub mod lookup_service;
pub mod topic_manager;

pub use advertiser::Advertiser;
pub use broadcaster::{BroadcastResponse, Broadcaster};
pub use chain_tracker::ChainTracker;
pub use error::ProtocolError;
pub use lookup_service::LookupService;
pub use topic_manager::TopicManager;
