//! LMDB environment setup.

use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn};

use crate::advertisement::LmdbAdvertisementStorage;
use crate::coin::LmdbCoinStore;
use crate::kvstore::LmdbKvStoreStorage;
use crate::LmdbError;

/// Named databases inside the environment.
pub(crate) const DB_COINS: &str = "coins";
pub(crate) const DB_COINS_BY_TXID: &str = "coins_by_txid";
pub(crate) const DB_APPLIED: &str = "applied_transactions";
pub(crate) const DB_TRANSACTIONS: &str = "transactions";
pub(crate) const DB_KV_RECORDS: &str = "kvstore_records";
pub(crate) const DB_KV_BY_KEY: &str = "kvstore_by_key";
pub(crate) const DB_SHIP: &str = "ship_records";
pub(crate) const DB_SLAP: &str = "slap_records";

pub(crate) const ALL_DATABASES: &[&str] = &[
    DB_COINS,
    DB_COINS_BY_TXID,
    DB_APPLIED,
    DB_TRANSACTIONS,
    DB_KV_RECORDS,
    DB_KV_BY_KEY,
    DB_SHIP,
    DB_SLAP,
];

/// Default map size: 16 GiB of address space.
pub const DEFAULT_MAP_SIZE: usize = 16 * 1024 * 1024 * 1024;

/// Wraps the LMDB environment and all database handles.
#[derive(Clone)]
pub struct LmdbEnvironment {
    env: Arc<Env>,
    coins_db: Database<Bytes, Bytes>,
    coins_by_txid_db: Database<Bytes, Bytes>,
    applied_db: Database<Bytes, Bytes>,
    transactions_db: Database<Bytes, Bytes>,
    kv_records_db: Database<Bytes, Bytes>,
    kv_by_key_db: Database<Bytes, Bytes>,
    ship_db: Database<Bytes, Bytes>,
    slap_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process and the
        // directory is not shared with another LMDB user.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(ALL_DATABASES.len() as u32)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let coins_db = env.create_database(&mut wtxn, Some(DB_COINS))?;
        let coins_by_txid_db = env.create_database(&mut wtxn, Some(DB_COINS_BY_TXID))?;
        let applied_db = env.create_database(&mut wtxn, Some(DB_APPLIED))?;
        let transactions_db = env.create_database(&mut wtxn, Some(DB_TRANSACTIONS))?;
        let kv_records_db = env.create_database(&mut wtxn, Some(DB_KV_RECORDS))?;
        let kv_by_key_db = env.create_database(&mut wtxn, Some(DB_KV_BY_KEY))?;
        let ship_db = env.create_database(&mut wtxn, Some(DB_SHIP))?;
        let slap_db = env.create_database(&mut wtxn, Some(DB_SLAP))?;
        wtxn.commit()?;

        tracing::info!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            coins_db,
            coins_by_txid_db,
            applied_db,
            transactions_db,
            kv_records_db,
            kv_by_key_db,
            ship_db,
            slap_db,
        })
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn coin_store(&self) -> LmdbCoinStore {
        LmdbCoinStore {
            env: self.env.clone(),
            coins_db: self.coins_db,
            coins_by_txid_db: self.coins_by_txid_db,
            applied_db: self.applied_db,
            transactions_db: self.transactions_db,
        }
    }

    pub fn kvstore_storage(&self) -> LmdbKvStoreStorage {
        LmdbKvStoreStorage {
            env: self.env.clone(),
            records_db: self.kv_records_db,
            by_key_db: self.kv_by_key_db,
        }
    }

    pub fn advertisement_storage(&self) -> LmdbAdvertisementStorage {
        LmdbAdvertisementStorage {
            env: self.env.clone(),
            ship_db: self.ship_db,
            slap_db: self.slap_db,
        }
    }

    /// Flush the memory map to disk.
    pub fn sync(&self) -> Result<(), LmdbError> {
        self.env.force_sync()?;
        Ok(())
    }
}

/// Smallest key strictly greater than every key starting with `prefix`.
///
/// Used as the exclusive upper bound of prefix range scans. A prefix of all
/// `0xff` bytes has no such key and is left empty, meaning "unbounded".
pub(crate) fn increment_prefix(prefix: &mut Vec<u8>) {
    while let Some(last) = prefix.pop() {
        if last < 0xff {
            prefix.push(last + 1);
            return;
        }
    }
}

/// Every `(key, value)` pair whose key starts with `prefix`, in key order.
pub(crate) fn scan_prefix(
    db: &Database<Bytes, Bytes>,
    txn: &RoTxn,
    prefix: &[u8],
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, LmdbError> {
    let mut upper = prefix.to_vec();
    increment_prefix(&mut upper);
    let bounds: (Bound<&[u8]>, Bound<&[u8]>) = if upper.is_empty() {
        (Bound::Included(prefix), Bound::Unbounded)
    } else {
        (Bound::Included(prefix), Bound::Excluded(upper.as_slice()))
    };

    let mut out = Vec::new();
    for item in db.range(txn, &bounds)? {
        let (key, value) = item?;
        out.push((key.to_vec(), value.to_vec()));
    }
    Ok(out)
}
