//! Nullable infrastructure for deterministic testing.
//!
//! Inspired by the "A-frame architecture" pattern from RsNano.
//! All external dependencies (storage, chain tracker, broadcast relay) are
//! abstracted behind traits. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod chain_tracker;
pub mod network;
pub mod store;

pub use chain_tracker::NullChainTracker;
pub use network::NullBroadcaster;
pub use store::{NullAdvertisementStorage, NullKvStoreStorage, NullStore};
