//! Nullable stores: thread-safe in-memory storage for testing.

use overlay_store::{
    AdvertisementFilter, AdvertisementRecord, AdvertisementStorage, AppliedTransactionStore,
    CoinRecord, CoinStore, Confirmation, KvStoreRecord, KvStoreStorage, StoreError,
    TransactionArchive,
};
use overlay_types::{AdvertisementProtocol, OutputRef, TxId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

/// An in-memory coin store, applied-transaction ledger and transaction
/// archive. Thread-safe for use with tokio's multi-threaded runtime.
///
/// Coins live in one map behind one lock, so insert-if-absent is atomic
/// just as in the LMDB backend.
pub struct NullStore {
    coins: Mutex<BTreeMap<(String, OutputRef), CoinRecord>>,
    applied: Mutex<BTreeSet<(TxId, String)>>,
    transactions: Mutex<HashMap<TxId, Vec<u8>>>,
    fail_next: Mutex<BTreeSet<&'static str>>,
}

impl NullStore {
    pub fn new() -> Self {
        Self {
            coins: Mutex::new(BTreeMap::new()),
            applied: Mutex::new(BTreeSet::new()),
            transactions: Mutex::new(HashMap::new()),
            fail_next: Mutex::new(BTreeSet::new()),
        }
    }

    /// Make the next call of `operation` ("put_transaction", "mark_spent",
    /// "delete_coin" or "insert_applied") fail with a backend error.
    pub fn fail_next(&self, operation: &'static str) {
        self.fail_next.lock().unwrap().insert(operation);
    }

    fn injected_failure(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.fail_next.lock().unwrap().remove(operation) {
            return Err(StoreError::Backend(format!("{operation} failed")));
        }
        Ok(())
    }

    /// Every coin in every topic, spent or not (for assertions).
    pub fn all_coins(&self) -> Vec<CoinRecord> {
        self.coins.lock().unwrap().values().cloned().collect()
    }
}

impl Default for NullStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CoinStore for NullStore {
    fn insert_coin(&self, coin: &CoinRecord) -> Result<bool, StoreError> {
        let mut coins = self.coins.lock().unwrap();
        let key = (coin.topic.clone(), coin.outpoint);
        if coins.contains_key(&key) {
            return Ok(false);
        }
        coins.insert(key, coin.clone());
        Ok(true)
    }

    fn get_coin(
        &self,
        topic: &str,
        outpoint: &OutputRef,
    ) -> Result<Option<CoinRecord>, StoreError> {
        Ok(self
            .coins
            .lock()
            .unwrap()
            .get(&(topic.to_string(), *outpoint))
            .cloned())
    }

    fn find_coins_for_transaction(&self, txid: &TxId) -> Result<Vec<CoinRecord>, StoreError> {
        Ok(self
            .coins
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.outpoint.txid == *txid)
            .cloned()
            .collect())
    }

    fn mark_spent(&self, topic: &str, outpoint: &OutputRef) -> Result<(), StoreError> {
        self.injected_failure("mark_spent")?;
        let mut coins = self.coins.lock().unwrap();
        match coins.get_mut(&(topic.to_string(), *outpoint)) {
            Some(coin) => {
                coin.spent = true;
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("coin {outpoint} in {topic}"))),
        }
    }

    fn delete_coin(&self, topic: &str, outpoint: &OutputRef) -> Result<bool, StoreError> {
        self.injected_failure("delete_coin")?;
        Ok(self
            .coins
            .lock()
            .unwrap()
            .remove(&(topic.to_string(), *outpoint))
            .is_some())
    }

    fn confirm(
        &self,
        txid: &TxId,
        block_height: u32,
        merkle_path: &[u8],
    ) -> Result<usize, StoreError> {
        let mut coins = self.coins.lock().unwrap();
        let mut changed = 0;
        for coin in coins.values_mut() {
            if coin.outpoint.txid == *txid && !coin.confirmation.is_confirmed() {
                coin.confirmation = Confirmation::Confirmed {
                    block_height,
                    merkle_path: merkle_path.to_vec(),
                };
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn list_retained(&self, topic: &str) -> Result<Vec<CoinRecord>, StoreError> {
        Ok(self
            .coins
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.topic == topic && !c.spent)
            .cloned()
            .collect())
    }

    fn add_consumed_by(
        &self,
        topic: &str,
        outpoint: &OutputRef,
        consumed_by: &[OutputRef],
    ) -> Result<(), StoreError> {
        let mut coins = self.coins.lock().unwrap();
        let coin = coins
            .get_mut(&(topic.to_string(), *outpoint))
            .ok_or_else(|| StoreError::NotFound(format!("coin {outpoint} in {topic}")))?;
        for spender in consumed_by {
            if !coin.consumed_by.contains(spender) {
                coin.consumed_by.push(*spender);
            }
        }
        Ok(())
    }
}

impl AppliedTransactionStore for NullStore {
    fn insert_applied(&self, txid: &TxId, topic: &str) -> Result<bool, StoreError> {
        self.injected_failure("insert_applied")?;
        Ok(self
            .applied
            .lock()
            .unwrap()
            .insert((*txid, topic.to_string())))
    }

    fn has_applied(&self, txid: &TxId, topic: &str) -> Result<bool, StoreError> {
        Ok(self
            .applied
            .lock()
            .unwrap()
            .contains(&(*txid, topic.to_string())))
    }
}

impl TransactionArchive for NullStore {
    fn put_transaction(&self, txid: &TxId, beef: &[u8]) -> Result<(), StoreError> {
        self.injected_failure("put_transaction")?;
        self.transactions
            .lock()
            .unwrap()
            .insert(*txid, beef.to_vec());
        Ok(())
    }

    fn get_transaction(&self, txid: &TxId) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.transactions.lock().unwrap().get(txid).cloned())
    }
}

/// An in-memory KVStore lookup storage for testing.
pub struct NullKvStoreStorage {
    records: Mutex<BTreeMap<OutputRef, KvStoreRecord>>,
}

impl NullKvStoreStorage {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, outpoint: &OutputRef) -> Option<KvStoreRecord> {
        self.records.lock().unwrap().get(outpoint).cloned()
    }
}

impl Default for NullKvStoreStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStoreStorage for NullKvStoreStorage {
    fn store_record(&self, record: &KvStoreRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .insert(record.outpoint, record.clone());
        Ok(())
    }

    fn delete_record(&self, outpoint: &OutputRef) -> Result<(), StoreError> {
        self.records.lock().unwrap().remove(outpoint);
        Ok(())
    }

    fn find_by_protected_key(&self, protected_key: &str) -> Result<Vec<OutputRef>, StoreError> {
        if protected_key.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.protected_key == protected_key)
            .map(|r| r.outpoint)
            .collect())
    }

    fn find_all(&self) -> Result<Vec<OutputRef>, StoreError> {
        Ok(self.records.lock().unwrap().keys().copied().collect())
    }
}

/// An in-memory SHIP/SLAP lookup storage for testing.
pub struct NullAdvertisementStorage {
    records: Mutex<BTreeMap<(AdvertisementProtocol, OutputRef), AdvertisementRecord>>,
}

impl NullAdvertisementStorage {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NullAdvertisementStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl AdvertisementStorage for NullAdvertisementStorage {
    fn store_record(&self, record: &AdvertisementRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap()
            .insert((record.protocol, record.outpoint), record.clone());
        Ok(())
    }

    fn delete_record(
        &self,
        protocol: AdvertisementProtocol,
        outpoint: &OutputRef,
    ) -> Result<(), StoreError> {
        self.records.lock().unwrap().remove(&(protocol, *outpoint));
        Ok(())
    }

    fn find_records(
        &self,
        protocol: AdvertisementProtocol,
        filter: &AdvertisementFilter,
    ) -> Result<Vec<AdvertisementRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.protocol == protocol && filter.matches(r))
            .cloned()
            .collect())
    }
}
