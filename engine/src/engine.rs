//! The overlay engine: registry of topic managers and lookup services plus
//! the collaborators they need.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use overlay_codec::Beef;
use overlay_protocol::{Advertiser, Broadcaster, ChainTracker, LookupService, TopicManager};
use overlay_store::OverlayStorage;
use overlay_types::{
    LookupAnswer, LookupQuestion, LookupResult, OutputListItem, OutputRef, ServiceMetaData,
};
use tracing::{debug, warn, Instrument};

use crate::config::EngineConfig;
use crate::metrics::EngineMetrics;
use crate::tracing_spans::lookup_span;
use crate::EngineError;

const DEFAULT_CHAIN_TRACKER_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_BROADCAST_TIMEOUT: Duration = Duration::from_secs(30);

/// Orchestrates admission, lookup, merkle proof ingestion and advertisement
/// sync. Constructed once and shared as `Arc<Engine>`.
pub struct Engine {
    pub(crate) managers: BTreeMap<String, Arc<dyn TopicManager>>,
    pub(crate) lookup_services: BTreeMap<String, Arc<dyn LookupService>>,
    pub(crate) storage: Arc<dyn OverlayStorage>,
    pub(crate) chain_tracker: Arc<dyn ChainTracker>,
    pub(crate) broadcaster: Option<Arc<dyn Broadcaster>>,
    pub(crate) advertiser: Option<Arc<dyn Advertiser>>,
    pub(crate) metrics: Arc<EngineMetrics>,
    pub(crate) chain_tracker_timeout: Duration,
    pub(crate) broadcast_timeout: Duration,
    pub(crate) sync_running: AtomicBool,
}

pub struct EngineBuilder {
    managers: BTreeMap<String, Arc<dyn TopicManager>>,
    lookup_services: BTreeMap<String, Arc<dyn LookupService>>,
    storage: Arc<dyn OverlayStorage>,
    chain_tracker: Arc<dyn ChainTracker>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    advertiser: Option<Arc<dyn Advertiser>>,
    metrics: Option<Arc<EngineMetrics>>,
    chain_tracker_timeout: Duration,
    broadcast_timeout: Duration,
}

impl EngineBuilder {
    pub fn topic_manager(mut self, name: impl Into<String>, manager: Arc<dyn TopicManager>) -> Self {
        self.managers.insert(name.into(), manager);
        self
    }

    pub fn lookup_service(
        mut self,
        name: impl Into<String>,
        service: Arc<dyn LookupService>,
    ) -> Self {
        self.lookup_services.insert(name.into(), service);
        self
    }

    pub fn broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn advertiser(mut self, advertiser: Arc<dyn Advertiser>) -> Self {
        self.advertiser = Some(advertiser);
        self
    }

    pub fn metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn chain_tracker_timeout(mut self, timeout: Duration) -> Self {
        self.chain_tracker_timeout = timeout;
        self
    }

    pub fn broadcast_timeout(mut self, timeout: Duration) -> Self {
        self.broadcast_timeout = timeout;
        self
    }

    /// Apply the timeouts from `config`.
    pub fn configure(self, config: &EngineConfig) -> Self {
        self.chain_tracker_timeout(config.chain_tracker_timeout())
            .broadcast_timeout(config.broadcast_timeout())
    }

    pub fn build(self) -> Engine {
        Engine {
            managers: self.managers,
            lookup_services: self.lookup_services,
            storage: self.storage,
            chain_tracker: self.chain_tracker,
            broadcaster: self.broadcaster,
            advertiser: self.advertiser,
            metrics: self.metrics.unwrap_or_default(),
            chain_tracker_timeout: self.chain_tracker_timeout,
            broadcast_timeout: self.broadcast_timeout,
            sync_running: AtomicBool::new(false),
        }
    }
}

impl Engine {
    pub fn builder(
        storage: Arc<dyn OverlayStorage>,
        chain_tracker: Arc<dyn ChainTracker>,
    ) -> EngineBuilder {
        EngineBuilder {
            managers: BTreeMap::new(),
            lookup_services: BTreeMap::new(),
            storage,
            chain_tracker,
            broadcaster: None,
            advertiser: None,
            metrics: None,
            chain_tracker_timeout: DEFAULT_CHAIN_TRACKER_TIMEOUT,
            broadcast_timeout: DEFAULT_BROADCAST_TIMEOUT,
        }
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn storage(&self) -> &Arc<dyn OverlayStorage> {
        &self.storage
    }

    pub fn topic_names(&self) -> impl Iterator<Item = &str> {
        self.managers.keys().map(String::as_str)
    }

    pub fn lookup_service_names(&self) -> impl Iterator<Item = &str> {
        self.lookup_services.keys().map(String::as_str)
    }

    /// Answer a lookup question, resolving formulas into an `output-list`.
    pub async fn lookup(&self, question: &LookupQuestion) -> Result<LookupAnswer, EngineError> {
        let service = self
            .lookup_services
            .get(&question.service)
            .ok_or_else(|| EngineError::UnknownLookupService(question.service.clone()))?;
        self.metrics.lookups.inc();

        let result = service
            .lookup(question)
            .instrument(lookup_span(&question.service))
            .await?;
        match result {
            LookupResult::Answer(answer) => Ok(answer),
            LookupResult::Formula(outputs) => self.hydrate(&outputs),
        }
    }

    fn hydrate(&self, outputs: &[OutputRef]) -> Result<LookupAnswer, EngineError> {
        let mut items = Vec::with_capacity(outputs.len());
        for outpoint in outputs {
            match self.storage.get_transaction(&outpoint.txid)? {
                Some(beef) => items.push(OutputListItem {
                    beef,
                    output_index: outpoint.output_index,
                }),
                None => warn!(%outpoint, "lookup selected an output with no archived transaction"),
            }
        }
        debug!(requested = outputs.len(), returned = items.len(), "hydrated lookup formula");
        Ok(LookupAnswer::OutputList { outputs: items })
    }

    /// Metadata of every hosted topic manager, keyed by topic name.
    pub async fn list_topic_managers(&self) -> BTreeMap<String, ServiceMetaData> {
        let mut listing = BTreeMap::new();
        for (name, manager) in &self.managers {
            let meta = manager.get_meta_data().await.unwrap_or_else(|e| {
                warn!(topic = %name, error = %e, "topic manager metadata unavailable");
                ServiceMetaData::new(name.clone(), "")
            });
            listing.insert(name.clone(), meta);
        }
        listing
    }

    /// Metadata of every hosted lookup service, keyed by service name.
    pub async fn list_lookup_service_providers(&self) -> BTreeMap<String, ServiceMetaData> {
        let mut listing = BTreeMap::new();
        for (name, service) in &self.lookup_services {
            let meta = service.get_meta_data().await.unwrap_or_else(|e| {
                warn!(service = %name, error = %e, "lookup service metadata unavailable");
                ServiceMetaData::new(name.clone(), "")
            });
            listing.insert(name.clone(), meta);
        }
        listing
    }

    pub async fn get_documentation_for_topic_manager(
        &self,
        name: &str,
    ) -> Result<String, EngineError> {
        let manager = self
            .managers
            .get(name)
            .ok_or_else(|| EngineError::UnknownTopic(name.to_string()))?;
        Ok(manager.get_documentation().await?)
    }

    pub async fn get_documentation_for_lookup_service_provider(
        &self,
        name: &str,
    ) -> Result<String, EngineError> {
        let service = self
            .lookup_services
            .get(name)
            .ok_or_else(|| EngineError::UnknownLookupService(name.to_string()))?;
        Ok(service.get_documentation().await?)
    }

    /// Decode the subject transaction of an archived container.
    pub(crate) fn archived_output_script(
        &self,
        item: &OutputListItem,
    ) -> Result<(OutputRef, Vec<u8>), EngineError> {
        let beef = Beef::from_bytes(&item.beef)?;
        let tx = beef.subject()?;
        let output = tx.outputs.get(item.output_index as usize).ok_or_else(|| {
            EngineError::Codec(overlay_codec::CodecError::Beef(format!(
                "output {} out of range",
                item.output_index
            )))
        })?;
        Ok((
            OutputRef::new(tx.txid(), item.output_index),
            output.locking_script.as_bytes().to_vec(),
        ))
    }
}
