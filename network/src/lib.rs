//! HTTP clients for the node's external collaborators.
//!
//! - [`WhatsOnChainTracker`]: chain tracker checking merkle roots against
//!   block headers.
//! - [`ArcBroadcaster`]: broadcast client relaying transactions to ARC.

pub mod arc;
pub mod error;
pub mod whatsonchain;

pub use arc::{ArcBroadcaster, ArcConfig};
pub use error::NetworkError;
pub use whatsonchain::WhatsOnChainTracker;
