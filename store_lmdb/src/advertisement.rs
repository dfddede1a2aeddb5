//! LMDB implementation of AdvertisementStorage.
//!
//! One database per protocol (`ship_records`, `slap_records`), keyed by
//! `outpoint_key(36)` with bincode [`AdvertisementRecord`] values. The
//! collections stay small (one row per peer capability), so filtered
//! queries scan the whole database.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use overlay_store::{AdvertisementFilter, AdvertisementRecord, AdvertisementStorage, StoreError};
use overlay_types::{AdvertisementProtocol, OutputRef};

use crate::LmdbError;

pub struct LmdbAdvertisementStorage {
    pub(crate) env: Arc<Env>,
    pub(crate) ship_db: Database<Bytes, Bytes>,
    pub(crate) slap_db: Database<Bytes, Bytes>,
}

impl LmdbAdvertisementStorage {
    fn db(&self, protocol: AdvertisementProtocol) -> Database<Bytes, Bytes> {
        match protocol {
            AdvertisementProtocol::Ship => self.ship_db,
            AdvertisementProtocol::Slap => self.slap_db,
        }
    }
}

impl AdvertisementStorage for LmdbAdvertisementStorage {
    fn store_record(&self, record: &AdvertisementRecord) -> Result<(), StoreError> {
        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.db(record.protocol)
            .put(&mut wtxn, &record.outpoint.to_key(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn delete_record(
        &self,
        protocol: AdvertisementProtocol,
        outpoint: &OutputRef,
    ) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.db(protocol)
            .delete(&mut wtxn, &outpoint.to_key())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn find_records(
        &self,
        protocol: AdvertisementProtocol,
        filter: &AdvertisementFilter,
    ) -> Result<Vec<AdvertisementRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.db(protocol).iter(&rtxn).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for item in iter {
            let (_key, val) = item.map_err(LmdbError::from)?;
            let record: AdvertisementRecord =
                bincode::deserialize(val).map_err(LmdbError::from)?;
            if filter.matches(&record) {
                results.push(record);
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;
    use overlay_types::{Timestamp, TxId};

    fn record(protocol: AdvertisementProtocol, n: u8, name: &str) -> AdvertisementRecord {
        AdvertisementRecord {
            protocol,
            outpoint: OutputRef::new(TxId::new([n; 32]), 0),
            identity_key: "02ab".into(),
            domain: "https://node.example".into(),
            topic_or_service: name.into(),
            created_at: Timestamp::new(1),
        }
    }

    #[test]
    fn protocols_are_separate_collections() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 10 * 1024 * 1024).unwrap();
        let storage = env.advertisement_storage();

        storage
            .store_record(&record(AdvertisementProtocol::Ship, 1, "tm_kvstore"))
            .unwrap();
        storage
            .store_record(&record(AdvertisementProtocol::Slap, 2, "ls_kvstore"))
            .unwrap();

        let all = AdvertisementFilter::default();
        let ship = storage
            .find_records(AdvertisementProtocol::Ship, &all)
            .unwrap();
        assert_eq!(ship.len(), 1);
        assert_eq!(ship[0].topic_or_service, "tm_kvstore");

        storage
            .delete_record(AdvertisementProtocol::Slap, &ship[0].outpoint)
            .unwrap();
        assert_eq!(
            storage
                .find_records(AdvertisementProtocol::Ship, &all)
                .unwrap()
                .len(),
            1
        );
    }
}
