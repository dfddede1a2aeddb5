//! `ls_ship` / `ls_slap`: index admitted advertisements and answer
//! discovery queries.

use std::sync::Arc;

use async_trait::async_trait;
use overlay_protocol::{LookupService, ProtocolError};
use overlay_store::{AdvertisementFilter, AdvertisementRecord, AdvertisementStorage};
use overlay_types::{
    AdvertisementProtocol, LookupQuestion, LookupResult, OutputRef, ServiceMetaData, Timestamp,
    TxId,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::token::decode_for;

pub const FIND_ALL: &str = "findAll";

fn string_field(map: &Map<String, Value>, name: &str) -> Result<Option<String>, ProtocolError> {
    match map.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ProtocolError::InvalidQuery(format!(
            "\"{name}\" must be a string"
        ))),
    }
}

/// Turn a SHIP or SLAP query into a storage filter.
///
/// SHIP accepts `topics` (array of names), SLAP accepts `service` (a single
/// name). Both accept `domain` and `identityKey`.
pub fn parse_query(
    protocol: AdvertisementProtocol,
    query: Option<&Value>,
) -> Result<AdvertisementFilter, ProtocolError> {
    let map = match query {
        None => {
            return Err(ProtocolError::InvalidQuery(
                "a valid query must be provided".into(),
            ))
        }
        Some(Value::String(s)) if s == FIND_ALL => return Ok(AdvertisementFilter::default()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(ProtocolError::InvalidQuery(format!(
                "unsupported query {other}"
            )))
        }
    };

    let names = match protocol {
        AdvertisementProtocol::Ship => match map.get("topics") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            ProtocolError::InvalidQuery("\"topics\" must be strings".into())
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Some(_) => {
                return Err(ProtocolError::InvalidQuery(
                    "\"topics\" must be an array".into(),
                ))
            }
        },
        AdvertisementProtocol::Slap => string_field(map, "service")?.map(|s| vec![s]),
    };

    Ok(AdvertisementFilter {
        domain: string_field(map, "domain")?,
        names,
        identity_key: string_field(map, "identityKey")?,
    })
}

pub struct AdvertisementLookupService {
    protocol: AdvertisementProtocol,
    storage: Arc<dyn AdvertisementStorage>,
}

impl AdvertisementLookupService {
    pub fn new(protocol: AdvertisementProtocol, storage: Arc<dyn AdvertisementStorage>) -> Self {
        Self { protocol, storage }
    }

    pub fn ship(storage: Arc<dyn AdvertisementStorage>) -> Self {
        Self::new(AdvertisementProtocol::Ship, storage)
    }

    pub fn slap(storage: Arc<dyn AdvertisementStorage>) -> Self {
        Self::new(AdvertisementProtocol::Slap, storage)
    }

    fn owns(&self, topic: &str) -> bool {
        topic == self.protocol.topic()
    }
}

#[async_trait]
impl LookupService for AdvertisementLookupService {
    async fn output_added(
        &self,
        txid: &TxId,
        output_index: u32,
        locking_script: &[u8],
        topic: &str,
    ) -> Result<(), ProtocolError> {
        if !self.owns(topic) {
            return Ok(());
        }
        let ad = match decode_for(self.protocol, locking_script) {
            Ok(ad) => ad,
            Err(e) => {
                warn!(%txid, output_index, error = %e, "admitted output is not an advertisement");
                return Ok(());
            }
        };
        let record = AdvertisementRecord {
            protocol: self.protocol,
            outpoint: OutputRef::new(*txid, output_index),
            identity_key: ad.identity_key,
            domain: ad.domain,
            topic_or_service: ad.topic_or_service,
            created_at: Timestamp::now(),
        };
        self.storage.store_record(&record)?;
        debug!(
            protocol = %self.protocol,
            %txid,
            output_index,
            name = %record.topic_or_service,
            domain = %record.domain,
            "indexed advertisement"
        );
        Ok(())
    }

    async fn output_spent(&self, outpoint: &OutputRef, topic: &str) -> Result<(), ProtocolError> {
        if self.owns(topic) {
            self.storage.delete_record(self.protocol, outpoint)?;
        }
        Ok(())
    }

    async fn output_deleted(
        &self,
        outpoint: &OutputRef,
        topic: &str,
    ) -> Result<(), ProtocolError> {
        if self.owns(topic) {
            self.storage.delete_record(self.protocol, outpoint)?;
        }
        Ok(())
    }

    async fn lookup(&self, question: &LookupQuestion) -> Result<LookupResult, ProtocolError> {
        if question.service != self.protocol.lookup_service() {
            return Err(ProtocolError::InvalidQuery(format!(
                "{} cannot answer questions for {}",
                self.protocol.lookup_service(),
                question.service
            )));
        }
        let filter = parse_query(self.protocol, question.query())?;
        let outputs = self
            .storage
            .find_records(self.protocol, &filter)?
            .into_iter()
            .map(|record| record.outpoint)
            .collect();
        Ok(LookupResult::Formula(outputs))
    }

    async fn get_documentation(&self) -> Result<String, ProtocolError> {
        Ok(match self.protocol {
            AdvertisementProtocol::Ship => include_str!("../docs/ship.md"),
            AdvertisementProtocol::Slap => include_str!("../docs/slap.md"),
        }
        .to_string())
    }

    async fn get_meta_data(&self) -> Result<ServiceMetaData, ProtocolError> {
        let meta = match self.protocol {
            AdvertisementProtocol::Ship => {
                ServiceMetaData::new("SHIP Lookup", "Find nodes hosting a topic")
            }
            AdvertisementProtocol::Slap => {
                ServiceMetaData::new("SLAP Lookup", "Find nodes answering a lookup service")
            }
        };
        Ok(meta.with_version(env!("CARGO_PKG_VERSION")))
    }
}
