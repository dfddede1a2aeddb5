//! KVStore lookup storage trait.

use crate::StoreError;
use overlay_types::{OutputRef, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvStoreRecord {
    pub outpoint: OutputRef,
    /// Base64 of the 32-byte protected key.
    pub protected_key: String,
    pub value: String,
    pub created_at: Timestamp,
}

/// Index of live KVStore tokens, keyed by outpoint with a secondary index
/// on the protected key.
pub trait KvStoreStorage: Send + Sync {
    /// Store a record. Storing the same outpoint again replaces it.
    fn store_record(&self, record: &KvStoreRecord) -> Result<(), StoreError>;

    /// Remove the record for `outpoint`, if any.
    fn delete_record(&self, outpoint: &OutputRef) -> Result<(), StoreError>;

    fn find_by_protected_key(&self, protected_key: &str) -> Result<Vec<OutputRef>, StoreError>;

    fn find_all(&self) -> Result<Vec<OutputRef>, StoreError>;
}
