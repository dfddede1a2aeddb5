//! Abstract storage traits for the overlay services node.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.

pub mod advertisement;
pub mod coin;
pub mod error;
pub mod kvstore;

pub use advertisement::{AdvertisementFilter, AdvertisementRecord, AdvertisementStorage};
pub use coin::{
    AppliedTransactionStore, CoinRecord, CoinStore, Confirmation, OverlayStorage,
    TransactionArchive,
};
pub use error::StoreError;
pub use kvstore::{KvStoreRecord, KvStoreStorage};
