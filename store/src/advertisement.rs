//! SHIP/SLAP lookup storage trait.

use crate::StoreError;
use overlay_types::{AdvertisementProtocol, OutputRef, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisementRecord {
    pub protocol: AdvertisementProtocol,
    pub outpoint: OutputRef,
    pub identity_key: String,
    pub domain: String,
    /// Topic name for SHIP, lookup service name for SLAP.
    pub topic_or_service: String,
    pub created_at: Timestamp,
}

/// Filter for [`AdvertisementStorage::find_records`]. Unset fields match
/// everything; `names` matches any of the listed capabilities.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdvertisementFilter {
    pub domain: Option<String>,
    pub names: Option<Vec<String>>,
    pub identity_key: Option<String>,
}

impl AdvertisementFilter {
    pub fn matches(&self, record: &AdvertisementRecord) -> bool {
        self.domain.as_ref().map_or(true, |d| *d == record.domain)
            && self
                .identity_key
                .as_ref()
                .map_or(true, |k| *k == record.identity_key)
            && self
                .names
                .as_ref()
                .map_or(true, |names| names.contains(&record.topic_or_service))
    }
}

/// One collection per protocol, keyed by outpoint.
pub trait AdvertisementStorage: Send + Sync {
    /// Store a record. Storing the same outpoint again replaces it.
    fn store_record(&self, record: &AdvertisementRecord) -> Result<(), StoreError>;

    fn delete_record(
        &self,
        protocol: AdvertisementProtocol,
        outpoint: &OutputRef,
    ) -> Result<(), StoreError>;

    /// Records of `protocol` matching `filter`, in outpoint order.
    fn find_records(
        &self,
        protocol: AdvertisementProtocol,
        filter: &AdvertisementFilter,
    ) -> Result<Vec<AdvertisementRecord>, StoreError>;
}
