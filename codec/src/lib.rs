//! Byte-level codecs for the overlay node.
//!
//! Everything here is pure and stateless:
//! - [`transaction`]: the Bitcoin transaction serialization and txid.
//! - [`beef`]: the self-contained transaction container submitted to the node.
//! - [`merkle_path`]: compact merkle paths and root computation.
//! - [`script`]: script chunking and minimal data pushes.
//! - [`pushdrop`]: the tagged, revocable data-carrier token format.
//!
//! Decoders never panic on hostile input; every structural problem is a
//! [`CodecError`].

pub mod beef;
pub mod error;
pub mod hash;
pub mod merkle_path;
pub mod pushdrop;
pub mod reader;
pub mod script;
pub mod transaction;

pub use beef::{Beef, BeefTx};
pub use error::CodecError;
pub use hash::sha256d;
pub use merkle_path::{MerklePath, PathLeaf};
pub use pushdrop::{LockPosition, PushDropToken};
pub use script::{Script, ScriptChunk};
pub use transaction::{Transaction, TxInput, TxOutput};

/// Maximum container size accepted by any decoder.
pub const MAX_CONTAINER_SIZE: usize = 1024 * 1024 * 1024; // 1 GiB
