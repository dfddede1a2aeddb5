//! Coin storage trait.

use crate::StoreError;
use overlay_types::{OutputRef, Timestamp, TxId};
use serde::{Deserialize, Serialize};

/// Whether the transaction that created a coin is known to be mined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confirmation {
    Unconfirmed,
    Confirmed {
        block_height: u32,
        /// Serialized merkle path proving inclusion.
        merkle_path: Vec<u8>,
    },
}

impl Confirmation {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Confirmation::Confirmed { .. })
    }

    pub fn block_height(&self) -> Option<u32> {
        match self {
            Confirmation::Confirmed { block_height, .. } => Some(*block_height),
            Confirmation::Unconfirmed => None,
        }
    }
}

/// An output admitted to a topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinRecord {
    pub topic: String,
    pub outpoint: OutputRef,
    pub satoshis: u64,
    pub locking_script: Vec<u8>,
    pub spent: bool,
    pub confirmation: Confirmation,
    /// Previous coins of the same topic this coin's transaction retained.
    #[serde(default)]
    pub outputs_consumed: Vec<OutputRef>,
    /// Coins of the same topic admitted by the transaction spending this one.
    #[serde(default)]
    pub consumed_by: Vec<OutputRef>,
    pub admitted_at: Timestamp,
}

impl CoinRecord {
    pub fn new(topic: &str, outpoint: OutputRef, satoshis: u64, locking_script: Vec<u8>) -> Self {
        Self {
            topic: topic.to_string(),
            outpoint,
            satoshis,
            locking_script,
            spent: false,
            confirmation: Confirmation::Unconfirmed,
            outputs_consumed: Vec::new(),
            consumed_by: Vec::new(),
            admitted_at: Timestamp::now(),
        }
    }
}

/// Durable record of every admitted output, keyed by `(topic, outpoint)`.
///
/// Implementations must make [`CoinStore::insert_coin`] an atomic
/// insert-if-absent so concurrent admissions of the same coin settle on one
/// winner.
pub trait CoinStore: Send + Sync {
    /// Insert a coin unless `(topic, outpoint)` is already present.
    /// Returns `true` when this call created the record.
    fn insert_coin(&self, coin: &CoinRecord) -> Result<bool, StoreError>;

    fn get_coin(&self, topic: &str, outpoint: &OutputRef)
        -> Result<Option<CoinRecord>, StoreError>;

    /// Every coin, in any topic, created by `txid`.
    fn find_coins_for_transaction(&self, txid: &TxId) -> Result<Vec<CoinRecord>, StoreError>;

    /// Flag a coin as spent. Spending an unknown coin is
    /// [`StoreError::NotFound`]; spending twice is a no-op.
    fn mark_spent(&self, topic: &str, outpoint: &OutputRef) -> Result<(), StoreError>;

    /// Remove a coin. Returns whether it existed.
    fn delete_coin(&self, topic: &str, outpoint: &OutputRef) -> Result<bool, StoreError>;

    /// Confirm every unconfirmed coin of `txid`. Coins already confirmed keep
    /// their height. Returns the number of coins that changed.
    fn confirm(
        &self,
        txid: &TxId,
        block_height: u32,
        merkle_path: &[u8],
    ) -> Result<usize, StoreError>;

    /// Unspent coins currently tracked by `topic`.
    fn list_retained(&self, topic: &str) -> Result<Vec<CoinRecord>, StoreError>;

    /// Append to a coin's `consumed_by` list, skipping entries already there.
    fn add_consumed_by(
        &self,
        topic: &str,
        outpoint: &OutputRef,
        consumed_by: &[OutputRef],
    ) -> Result<(), StoreError>;
}

/// Which `(txid, topic)` pairs have already been applied.
pub trait AppliedTransactionStore: Send + Sync {
    /// Record the pair. Returns `false` if it was already recorded.
    fn insert_applied(&self, txid: &TxId, topic: &str) -> Result<bool, StoreError>;

    fn has_applied(&self, txid: &TxId, topic: &str) -> Result<bool, StoreError>;
}

/// Containers of admitted transactions, used to answer lookups with the
/// full transaction rather than a bare outpoint.
pub trait TransactionArchive: Send + Sync {
    fn put_transaction(&self, txid: &TxId, beef: &[u8]) -> Result<(), StoreError>;

    fn get_transaction(&self, txid: &TxId) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Everything the engine persists about coins.
pub trait OverlayStorage: CoinStore + AppliedTransactionStore + TransactionArchive {}

impl<T: CoinStore + AppliedTransactionStore + TransactionArchive> OverlayStorage for T {}
