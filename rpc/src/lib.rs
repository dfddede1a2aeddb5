//! HTTP transport for the overlay node.
//!
//! Provides endpoints for:
//! - Transaction submission (`/submit`, BEEF body + `x-topics` header)
//! - Lookup questions (`/lookup`)
//! - Topic manager and lookup service listings and documentation
//! - Merkle proof callbacks from the broadcast relay (`/arc-ingest`)
//! - SHIP/SLAP advertisement sync and Prometheus metrics

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use server::{router, RpcServer};
