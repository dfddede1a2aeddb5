//! KVStore overlay protocol.
//!
//! A KVStore token is a PushDrop output whose two fields are a 32-byte
//! protected key and a value. [`KvStoreTopicManager`] admits such outputs
//! to `tm_kvstore`; [`KvStoreLookupService`] indexes them under `ls_kvstore`
//! so the current value for a key can be found.

pub mod lookup_service;
pub mod token;
pub mod topic_manager;

pub use lookup_service::{KvStoreLookupService, KvStoreQuery};
pub use token::{KvStoreToken, TokenError};
pub use topic_manager::KvStoreTopicManager;

/// Topic name the manager is registered under.
pub const TOPIC: &str = "tm_kvstore";
/// Lookup service name.
pub const LOOKUP_SERVICE: &str = "ls_kvstore";
