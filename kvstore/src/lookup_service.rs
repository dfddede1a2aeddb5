//! `ls_kvstore`: indexes admitted KVStore tokens by protected key.

use std::sync::Arc;

use async_trait::async_trait;
use overlay_protocol::{LookupService, ProtocolError};
use overlay_store::{KvStoreRecord, KvStoreStorage};
use overlay_types::{LookupQuestion, LookupResult, OutputRef, ServiceMetaData, Timestamp, TxId};
use serde_json::Value;
use tracing::{debug, warn};

use crate::token::KvStoreToken;
use crate::TOPIC;

/// Query string selecting every record.
pub const FIND_ALL: &str = "findAll";

/// A parsed `ls_kvstore` query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KvStoreQuery {
    FindAll,
    ProtectedKey(String),
}

impl KvStoreQuery {
    /// Accepts `"findAll"`, a bare key string, or `{"protectedKey": key}`.
    pub fn parse(query: Option<&Value>) -> Result<Self, ProtocolError> {
        match query {
            None => Err(ProtocolError::InvalidQuery(
                "a valid query must be provided".into(),
            )),
            Some(Value::String(s)) if s == FIND_ALL => Ok(Self::FindAll),
            Some(Value::String(s)) => Ok(Self::ProtectedKey(s.clone())),
            Some(Value::Object(map)) => match map.get("protectedKey") {
                Some(Value::String(key)) => Ok(Self::ProtectedKey(key.clone())),
                _ => Err(ProtocolError::InvalidQuery(
                    "expected a string \"protectedKey\" field".into(),
                )),
            },
            Some(other) => Err(ProtocolError::InvalidQuery(format!(
                "unsupported query {other}"
            ))),
        }
    }
}

pub struct KvStoreLookupService {
    storage: Arc<dyn KvStoreStorage>,
}

impl KvStoreLookupService {
    pub fn new(storage: Arc<dyn KvStoreStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl LookupService for KvStoreLookupService {
    async fn output_added(
        &self,
        txid: &TxId,
        output_index: u32,
        locking_script: &[u8],
        topic: &str,
    ) -> Result<(), ProtocolError> {
        if topic != TOPIC {
            return Ok(());
        }
        let token = match KvStoreToken::from_script(locking_script) {
            Ok(token) => token,
            Err(e) => {
                warn!(%txid, output_index, error = %e, "admitted output is not a KVStore token");
                return Ok(());
            }
        };
        let record = KvStoreRecord {
            outpoint: OutputRef::new(*txid, output_index),
            protected_key: token.lookup_key(),
            value: token.value_text(),
            created_at: Timestamp::now(),
        };
        self.storage.store_record(&record)?;
        debug!(%txid, output_index, key = %record.protected_key, "indexed KVStore token");
        Ok(())
    }

    async fn output_spent(&self, outpoint: &OutputRef, topic: &str) -> Result<(), ProtocolError> {
        if topic != TOPIC {
            return Ok(());
        }
        self.storage.delete_record(outpoint)?;
        Ok(())
    }

    async fn output_deleted(
        &self,
        outpoint: &OutputRef,
        topic: &str,
    ) -> Result<(), ProtocolError> {
        if topic != TOPIC {
            return Ok(());
        }
        self.storage.delete_record(outpoint)?;
        Ok(())
    }

    async fn lookup(&self, question: &LookupQuestion) -> Result<LookupResult, ProtocolError> {
        let outputs = match KvStoreQuery::parse(question.query())? {
            KvStoreQuery::FindAll => self.storage.find_all()?,
            KvStoreQuery::ProtectedKey(key) => self.storage.find_by_protected_key(&key)?,
        };
        Ok(LookupResult::Formula(outputs))
    }

    async fn get_documentation(&self) -> Result<String, ProtocolError> {
        Ok(include_str!("../docs/lookup_service.md").to_string())
    }

    async fn get_meta_data(&self) -> Result<ServiceMetaData, ProtocolError> {
        Ok(ServiceMetaData::new("KVStore Lookup", "Find KVStore tokens by protected key")
            .with_version(env!("CARGO_PKG_VERSION")))
    }
}
