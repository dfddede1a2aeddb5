//! LMDB storage backend for the overlay services node.
//!
//! Implements all storage traits from `overlay-store` using the `heed` LMDB
//! bindings. Each logical store maps to one or more LMDB databases within a
//! single environment.

pub mod advertisement;
pub mod coin;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod kvstore;

pub use advertisement::LmdbAdvertisementStorage;
pub use coin::LmdbCoinStore;
pub use environment::{LmdbEnvironment, DEFAULT_MAP_SIZE};
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
