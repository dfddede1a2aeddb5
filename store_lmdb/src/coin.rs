//! LMDB implementation of the coin stores.
//!
//! Key formats:
//! - `coins`: `topic ++ 0x00 ++ outpoint_key(36)` → bincode [`CoinRecord`]
//! - `coins_by_txid`: `outpoint_key(36) ++ topic` → empty
//! - `applied_transactions`: `txid(32) ++ topic` → empty
//! - `transactions`: `txid(32)` → container bytes
//!
//! Every check-then-write happens inside a single LMDB write transaction,
//! and LMDB admits one writer at a time, so inserts are atomic.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RwTxn};

use overlay_store::{
    AppliedTransactionStore, CoinRecord, CoinStore, Confirmation, StoreError, TransactionArchive,
};
use overlay_types::{OutputRef, TxId};

use crate::environment::scan_prefix;
use crate::LmdbError;

pub struct LmdbCoinStore {
    pub(crate) env: Arc<Env>,
    pub(crate) coins_db: Database<Bytes, Bytes>,
    pub(crate) coins_by_txid_db: Database<Bytes, Bytes>,
    pub(crate) applied_db: Database<Bytes, Bytes>,
    pub(crate) transactions_db: Database<Bytes, Bytes>,
}

fn topic_prefix(topic: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(topic.len() + 1);
    key.extend_from_slice(topic.as_bytes());
    key.push(0);
    key
}

fn coin_key(topic: &str, outpoint: &OutputRef) -> Vec<u8> {
    let mut key = topic_prefix(topic);
    key.extend_from_slice(&outpoint.to_key());
    key
}

fn txid_index_key(outpoint: &OutputRef, topic: &str) -> Vec<u8> {
    let mut key = outpoint.to_key().to_vec();
    key.extend_from_slice(topic.as_bytes());
    key
}

fn applied_key(txid: &TxId, topic: &str) -> Vec<u8> {
    let mut key = txid.as_bytes().to_vec();
    key.extend_from_slice(topic.as_bytes());
    key
}

impl LmdbCoinStore {
    fn read_coin(&self, txn: &heed::RoTxn, key: &[u8]) -> Result<Option<CoinRecord>, LmdbError> {
        match self.coins_db.get(txn, key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn write_coin(&self, wtxn: &mut RwTxn, coin: &CoinRecord) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(coin)?;
        self.coins_db
            .put(wtxn, &coin_key(&coin.topic, &coin.outpoint), &bytes)?;
        Ok(())
    }

    /// Load, modify and store one coin inside a single write transaction.
    fn update_coin<F>(&self, topic: &str, outpoint: &OutputRef, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut CoinRecord),
    {
        let key = coin_key(topic, outpoint);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut coin = self
            .read_coin(&wtxn, &key)?
            .ok_or_else(|| LmdbError::NotFound(format!("coin {outpoint} in {topic}")))?;
        f(&mut coin);
        self.write_coin(&mut wtxn, &coin)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

impl CoinStore for LmdbCoinStore {
    fn insert_coin(&self, coin: &CoinRecord) -> Result<bool, StoreError> {
        let key = coin_key(&coin.topic, &coin.outpoint);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .coins_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Ok(false);
        }
        self.write_coin(&mut wtxn, coin)?;
        self.coins_by_txid_db
            .put(&mut wtxn, &txid_index_key(&coin.outpoint, &coin.topic), &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn get_coin(
        &self,
        topic: &str,
        outpoint: &OutputRef,
    ) -> Result<Option<CoinRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_coin(&rtxn, &coin_key(topic, outpoint))?)
    }

    fn find_coins_for_transaction(&self, txid: &TxId) -> Result<Vec<CoinRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut coins = Vec::new();
        for (index_key, _) in scan_prefix(&self.coins_by_txid_db, &rtxn, txid.as_bytes())? {
            let (outpoint_key, topic) = index_key.split_at(OutputRef::KEY_LEN);
            let mut key = topic.to_vec();
            key.push(0);
            key.extend_from_slice(outpoint_key);
            match self.read_coin(&rtxn, &key)? {
                Some(coin) => coins.push(coin),
                None => tracing::warn!(
                    txid = %txid,
                    "coins_by_txid entry without a coin record"
                ),
            }
        }
        Ok(coins)
    }

    fn mark_spent(&self, topic: &str, outpoint: &OutputRef) -> Result<(), StoreError> {
        self.update_coin(topic, outpoint, |coin| coin.spent = true)
    }

    fn delete_coin(&self, topic: &str, outpoint: &OutputRef) -> Result<bool, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let existed = self
            .coins_db
            .delete(&mut wtxn, &coin_key(topic, outpoint))
            .map_err(LmdbError::from)?;
        self.coins_by_txid_db
            .delete(&mut wtxn, &txid_index_key(outpoint, topic))
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(existed)
    }

    fn confirm(
        &self,
        txid: &TxId,
        block_height: u32,
        merkle_path: &[u8],
    ) -> Result<usize, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let index = scan_prefix(&self.coins_by_txid_db, &wtxn, txid.as_bytes())?;

        let mut changed = 0;
        for (index_key, _) in index {
            let (outpoint_key, topic) = index_key.split_at(OutputRef::KEY_LEN);
            let mut key = topic.to_vec();
            key.push(0);
            key.extend_from_slice(outpoint_key);
            let Some(mut coin) = self.read_coin(&wtxn, &key)? else {
                continue;
            };
            if coin.confirmation.is_confirmed() {
                continue;
            }
            coin.confirmation = Confirmation::Confirmed {
                block_height,
                merkle_path: merkle_path.to_vec(),
            };
            self.write_coin(&mut wtxn, &coin)?;
            changed += 1;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(changed)
    }

    fn list_retained(&self, topic: &str) -> Result<Vec<CoinRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut coins = Vec::new();
        for (_, bytes) in scan_prefix(&self.coins_db, &rtxn, &topic_prefix(topic))? {
            let coin: CoinRecord = bincode::deserialize(&bytes).map_err(LmdbError::from)?;
            if !coin.spent {
                coins.push(coin);
            }
        }
        Ok(coins)
    }

    fn add_consumed_by(
        &self,
        topic: &str,
        outpoint: &OutputRef,
        consumed_by: &[OutputRef],
    ) -> Result<(), StoreError> {
        self.update_coin(topic, outpoint, |coin| {
            for spender in consumed_by {
                if !coin.consumed_by.contains(spender) {
                    coin.consumed_by.push(*spender);
                }
            }
        })
    }
}

impl AppliedTransactionStore for LmdbCoinStore {
    fn insert_applied(&self, txid: &TxId, topic: &str) -> Result<bool, StoreError> {
        let key = applied_key(txid, topic);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        if self
            .applied_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Ok(false);
        }
        self.applied_db
            .put(&mut wtxn, &key, &[])
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }

    fn has_applied(&self, txid: &TxId, topic: &str) -> Result<bool, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let found = self
            .applied_db
            .get(&rtxn, &applied_key(txid, topic))
            .map_err(LmdbError::from)?;
        Ok(found.is_some())
    }
}

impl TransactionArchive for LmdbCoinStore {
    fn put_transaction(&self, txid: &TxId, beef: &[u8]) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.transactions_db
            .put(&mut wtxn, txid.as_bytes(), beef)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_transaction(&self, txid: &TxId) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let found = self
            .transactions_db
            .get(&rtxn, txid.as_bytes())
            .map_err(LmdbError::from)?;
        Ok(found.map(|bytes| bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    fn store() -> (tempfile::TempDir, LmdbCoinStore) {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 10 * 1024 * 1024).unwrap();
        (dir, env.coin_store())
    }

    fn outpoint(n: u8, index: u32) -> OutputRef {
        OutputRef::new(TxId::new([n; 32]), index)
    }

    #[test]
    fn insert_is_if_absent() {
        let (_dir, store) = store();
        let coin = CoinRecord::new("tm_kvstore", outpoint(1, 0), 1, vec![0x51]);
        assert!(store.insert_coin(&coin).unwrap());
        assert!(!store.insert_coin(&coin).unwrap());
        assert_eq!(store.list_retained("tm_kvstore").unwrap().len(), 1);
    }

    #[test]
    fn topics_are_separate_keyspaces() {
        let (_dir, store) = store();
        let op = outpoint(1, 0);
        store
            .insert_coin(&CoinRecord::new("tm_a", op, 1, vec![]))
            .unwrap();
        store
            .insert_coin(&CoinRecord::new("tm_ab", op, 1, vec![]))
            .unwrap();
        assert_eq!(store.list_retained("tm_a").unwrap().len(), 1);
        assert_eq!(store.find_coins_for_transaction(&op.txid).unwrap().len(), 2);
    }

    #[test]
    fn mark_spent_unknown_is_not_found() {
        let (_dir, store) = store();
        assert!(matches!(
            store.mark_spent("tm_a", &outpoint(9, 9)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn spent_coins_leave_retained_set() {
        let (_dir, store) = store();
        let op = outpoint(2, 1);
        store
            .insert_coin(&CoinRecord::new("tm_a", op, 1, vec![]))
            .unwrap();
        store.mark_spent("tm_a", &op).unwrap();
        assert!(store.list_retained("tm_a").unwrap().is_empty());
        assert!(store.get_coin("tm_a", &op).unwrap().unwrap().spent);
    }

    #[test]
    fn confirm_is_idempotent_and_keeps_first_height() {
        let (_dir, store) = store();
        let op = outpoint(3, 0);
        store
            .insert_coin(&CoinRecord::new("tm_a", op, 1, vec![]))
            .unwrap();
        store
            .insert_coin(&CoinRecord::new("tm_b", op, 1, vec![]))
            .unwrap();

        assert_eq!(store.confirm(&op.txid, 100, &[1, 2]).unwrap(), 2);
        assert_eq!(store.confirm(&op.txid, 200, &[3]).unwrap(), 0);
        let coin = store.get_coin("tm_a", &op).unwrap().unwrap();
        assert_eq!(coin.confirmation.block_height(), Some(100));
    }

    #[test]
    fn delete_removes_index_entry() {
        let (_dir, store) = store();
        let op = outpoint(4, 0);
        store
            .insert_coin(&CoinRecord::new("tm_a", op, 1, vec![]))
            .unwrap();
        assert!(store.delete_coin("tm_a", &op).unwrap());
        assert!(!store.delete_coin("tm_a", &op).unwrap());
        assert!(store.find_coins_for_transaction(&op.txid).unwrap().is_empty());
    }

    #[test]
    fn consumed_by_is_deduplicated() {
        let (_dir, store) = store();
        let op = outpoint(5, 0);
        let spender = outpoint(6, 0);
        store
            .insert_coin(&CoinRecord::new("tm_a", op, 1, vec![]))
            .unwrap();
        store.add_consumed_by("tm_a", &op, &[spender]).unwrap();
        store.add_consumed_by("tm_a", &op, &[spender]).unwrap();
        let coin = store.get_coin("tm_a", &op).unwrap().unwrap();
        assert_eq!(coin.consumed_by, vec![spender]);
    }

    #[test]
    fn applied_ledger_and_archive() {
        let (_dir, store) = store();
        let txid = TxId::new([7; 32]);
        assert!(!store.has_applied(&txid, "tm_a").unwrap());
        assert!(store.insert_applied(&txid, "tm_a").unwrap());
        assert!(!store.insert_applied(&txid, "tm_a").unwrap());
        assert!(store.has_applied(&txid, "tm_a").unwrap());
        assert!(!store.has_applied(&txid, "tm_b").unwrap());

        store.put_transaction(&txid, &[1, 2, 3]).unwrap();
        assert_eq!(store.get_transaction(&txid).unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.get_transaction(&TxId::ZERO).unwrap(), None);
    }
}
