//! Startup checks for the overlay LMDB environment.
//!
//! `check_data_dir` runs before the environment is opened; `check_integrity`
//! runs after, and reads every named database once so a damaged file is
//! reported before the engine admits anything.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::Env;

use crate::environment::{ALL_DATABASES, DB_COINS, DB_COINS_BY_TXID, DB_KV_BY_KEY, DB_KV_RECORDS};
use crate::LmdbError;

/// Primary tables and the index holding exactly one row per primary row.
const INDEXED_PAIRS: &[(&str, &str)] = &[
    (DB_COINS, DB_COINS_BY_TXID),
    (DB_KV_RECORDS, DB_KV_BY_KEY),
];

/// Row counts per database, plus anything that looked wrong.
#[derive(Debug, Default)]
pub struct IntegrityReport {
    pub entries: BTreeMap<&'static str, u64>,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn databases_checked(&self) -> usize {
        self.entries.len()
    }

    pub fn total_entries(&self) -> u64 {
        self.entries.values().sum()
    }

    /// Rows in `db`, or 0 when it was unreadable.
    pub fn count(&self, db: &str) -> u64 {
        self.entries.get(db).copied().unwrap_or(0)
    }
}

/// Read every overlay database and cross-check the secondary indexes.
///
/// `LmdbEnvironment::open` creates all databases, so a missing one means
/// the directory belongs to something else. Read failures go into the
/// report; only failing to start a read transaction is a hard error.
pub fn check_integrity(env: &Arc<Env>) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport::default();
    let rtxn = env.read_txn()?;

    for &name in ALL_DATABASES {
        match env.open_database::<Bytes, Bytes>(&rtxn, Some(name)) {
            Ok(Some(db)) => match db.len(&rtxn) {
                Ok(count) => {
                    report.entries.insert(name, count);
                }
                Err(e) => report.errors.push(format!("cannot read {name}: {e}")),
            },
            Ok(None) => report.errors.push(format!("database {name} is missing")),
            Err(e) => report.errors.push(format!("cannot open {name}: {e}")),
        }
    }

    for &(primary, index) in INDEXED_PAIRS {
        let (Some(rows), Some(indexed)) = (report.entries.get(primary), report.entries.get(index))
        else {
            continue;
        };
        if rows != indexed {
            report
                .errors
                .push(format!("{primary} has {rows} rows but {index} has {indexed}"));
        }
    }

    Ok(report)
}

/// A data directory is either absent (fresh node) or holds `data.mdb`.
pub fn check_data_dir(path: &Path) -> Result<(), LmdbError> {
    if path.exists() && !path.join("data.mdb").exists() {
        return Err(LmdbError::Io(format!(
            "{} exists but holds no data.mdb",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;
    use overlay_store::{CoinRecord, CoinStore, KvStoreRecord, KvStoreStorage};
    use overlay_types::{OutputRef, Timestamp, TxId};

    fn open(dir: &tempfile::TempDir) -> LmdbEnvironment {
        LmdbEnvironment::open(dir.path(), 10 * 1024 * 1024).unwrap()
    }

    #[test]
    fn fresh_directory_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_data_dir(&dir.path().join("not-yet")).is_ok());
    }

    #[test]
    fn directory_without_data_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(check_data_dir(dir.path()), Err(LmdbError::Io(_))));
    }

    #[test]
    fn empty_environment_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let env = open(&dir);
        let report = check_integrity(env.env()).unwrap();
        assert!(report.is_healthy(), "{:?}", report.errors);
        assert_eq!(report.databases_checked(), ALL_DATABASES.len());
        assert_eq!(report.total_entries(), 0);
        assert!(check_data_dir(dir.path()).is_ok());
    }

    #[test]
    fn counts_rows_per_database() {
        let dir = tempfile::tempdir().unwrap();
        let env = open(&dir);
        let outpoint = OutputRef::new(TxId::ZERO, 0);
        env.coin_store()
            .insert_coin(&CoinRecord::new("tm_kvstore", outpoint, 1, vec![]))
            .unwrap();
        env.kvstore_storage()
            .store_record(&KvStoreRecord {
                outpoint,
                protected_key: "k".into(),
                value: "v".into(),
                created_at: Timestamp::new(0),
            })
            .unwrap();

        let report = check_integrity(env.env()).unwrap();
        assert!(report.is_healthy(), "{:?}", report.errors);
        assert_eq!(report.count(DB_COINS), 1);
        assert_eq!(report.count(DB_COINS_BY_TXID), 1);
        assert_eq!(report.count(DB_KV_RECORDS), 1);
        assert_eq!(report.total_entries(), 4);
    }

    #[test]
    fn index_out_of_step_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let env = open(&dir);
        {
            let raw = env.env();
            let mut wtxn = raw.write_txn().unwrap();
            let index = raw
                .open_database::<Bytes, Bytes>(&wtxn, Some(DB_COINS_BY_TXID))
                .unwrap()
                .unwrap();
            index.put(&mut wtxn, b"orphan".as_slice(), &[]).unwrap();
            wtxn.commit().unwrap();
        }

        let report = check_integrity(env.env()).unwrap();
        assert!(!report.is_healthy());
        assert!(report.errors[0].contains(DB_COINS_BY_TXID));
    }
}
