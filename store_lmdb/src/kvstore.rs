//! LMDB implementation of KvStoreStorage.
//!
//! Key formats:
//! - `kvstore_records`: `outpoint_key(36)` → bincode [`KvStoreRecord`]
//! - `kvstore_by_key`: `protected_key ++ 0x00 ++ outpoint_key(36)` → empty
//!
//! Protected keys are base64 text and never contain a NUL byte.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use overlay_store::{KvStoreRecord, KvStoreStorage, StoreError};
use overlay_types::OutputRef;

use crate::environment::scan_prefix;
use crate::LmdbError;

pub struct LmdbKvStoreStorage {
    pub(crate) env: Arc<Env>,
    pub(crate) records_db: Database<Bytes, Bytes>,
    pub(crate) by_key_db: Database<Bytes, Bytes>,
}

fn key_prefix(protected_key: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(protected_key.len() + 1 + OutputRef::KEY_LEN);
    key.extend_from_slice(protected_key.as_bytes());
    key.push(0);
    key
}

fn by_key_entry(protected_key: &str, outpoint: &OutputRef) -> Vec<u8> {
    let mut key = key_prefix(protected_key);
    key.extend_from_slice(&outpoint.to_key());
    key
}

impl KvStoreStorage for LmdbKvStoreStorage {
    fn store_record(&self, record: &KvStoreRecord) -> Result<(), StoreError> {
        let outpoint_key = record.outpoint.to_key();
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        // Replacing a record must not leave its old secondary entry behind.
        let previous = self
            .records_db
            .get(&wtxn, &outpoint_key)
            .map_err(LmdbError::from)?
            .map(|bytes| bincode::deserialize::<KvStoreRecord>(bytes))
            .transpose()
            .map_err(LmdbError::from)?;
        if let Some(old) = previous {
            self.by_key_db
                .delete(&mut wtxn, &by_key_entry(&old.protected_key, &old.outpoint))
                .map_err(LmdbError::from)?;
        }

        self.records_db
            .put(&mut wtxn, &outpoint_key, &bytes)
            .map_err(LmdbError::from)?;
        self.by_key_db
            .put(
                &mut wtxn,
                &by_key_entry(&record.protected_key, &record.outpoint),
                &[],
            )
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn delete_record(&self, outpoint: &OutputRef) -> Result<(), StoreError> {
        let outpoint_key = outpoint.to_key();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let existing = self
            .records_db
            .get(&wtxn, &outpoint_key)
            .map_err(LmdbError::from)?
            .map(|bytes| bincode::deserialize::<KvStoreRecord>(bytes))
            .transpose()
            .map_err(LmdbError::from)?;
        let Some(record) = existing else {
            return Ok(());
        };
        self.records_db
            .delete(&mut wtxn, &outpoint_key)
            .map_err(LmdbError::from)?;
        self.by_key_db
            .delete(&mut wtxn, &by_key_entry(&record.protected_key, outpoint))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn find_by_protected_key(&self, protected_key: &str) -> Result<Vec<OutputRef>, StoreError> {
        if protected_key.is_empty() {
            return Ok(Vec::new());
        }
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let prefix = key_prefix(protected_key);
        let entries = scan_prefix(&self.by_key_db, &rtxn, &prefix)?;
        Ok(entries
            .iter()
            .filter_map(|(key, _)| OutputRef::from_key(&key[prefix.len()..]))
            .collect())
    }

    fn find_all(&self) -> Result<Vec<OutputRef>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.records_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(LmdbError::from)?;
            match OutputRef::from_key(key) {
                Some(outpoint) => results.push(outpoint),
                None => {
                    return Err(StoreError::Corruption(format!(
                        "kvstore record key of {} bytes",
                        key.len()
                    )))
                }
            }
        }
        Ok(results)
    }
}
