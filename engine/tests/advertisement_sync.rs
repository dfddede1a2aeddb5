//! SHIP/SLAP advertisement reconciliation against the node's own lookup
//! services.

use std::sync::Arc;

use overlay_discovery::{AdvertisementLookupService, AdvertisementTopicManager, PushDropAdvertiser};
use overlay_engine::{Engine, EngineError};
use overlay_kvstore::{KvStoreLookupService, KvStoreTopicManager};
use overlay_nullables::{NullAdvertisementStorage, NullChainTracker, NullKvStoreStorage, NullStore};
use overlay_types::{AdvertisementProtocol, LookupAnswer, LookupQuestion};
use serde_json::json;

const IDENTITY_KEY: &str = "02aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

struct Shared {
    store: Arc<NullStore>,
    kv: Arc<NullKvStoreStorage>,
    ads: Arc<NullAdvertisementStorage>,
}

impl Shared {
    fn new() -> Self {
        Self {
            store: Arc::new(NullStore::new()),
            kv: Arc::new(NullKvStoreStorage::new()),
            ads: Arc::new(NullAdvertisementStorage::new()),
        }
    }

    /// A node hosting KVStore plus SHIP/SLAP, advertising at `hosting_url`.
    fn node(&self, hosting_url: &str) -> Engine {
        let advertiser = PushDropAdvertiser::new(IDENTITY_KEY, hosting_url).unwrap();
        self.builder().advertiser(Arc::new(advertiser)).build()
    }

    fn builder(&self) -> overlay_engine::EngineBuilder {
        Engine::builder(self.store.clone(), Arc::new(NullChainTracker::new()))
            .topic_manager("tm_kvstore", Arc::new(KvStoreTopicManager))
            .topic_manager("tm_ship", Arc::new(AdvertisementTopicManager::ship()))
            .topic_manager("tm_slap", Arc::new(AdvertisementTopicManager::slap()))
            .lookup_service("ls_kvstore", Arc::new(KvStoreLookupService::new(self.kv.clone())))
            .lookup_service("ls_ship", Arc::new(AdvertisementLookupService::ship(self.ads.clone())))
            .lookup_service("ls_slap", Arc::new(AdvertisementLookupService::slap(self.ads.clone())))
    }
}

fn live_count(answer: LookupAnswer) -> usize {
    match answer {
        LookupAnswer::OutputList { outputs } => outputs.len(),
        other => panic!("expected an output list, got {other:?}"),
    }
}

#[tokio::test]
async fn first_run_publishes_then_converges() {
    let shared = Shared::new();
    let node = shared.node("https://overlay.example");

    let first = node.sync_advertisements().await.unwrap();
    assert!(first.failures.is_empty(), "{:?}", first.failures);
    assert!(first.revoked.is_empty());
    assert_eq!(first.published.len(), 6);
    let ship: Vec<&str> = first
        .published
        .iter()
        .filter(|d| d.protocol == AdvertisementProtocol::Ship)
        .map(|d| d.topic_or_service.as_str())
        .collect();
    assert_eq!(ship, vec!["tm_kvstore", "tm_ship", "tm_slap"]);
    assert_eq!(shared.ads.len(), 6);

    let second = node.sync_advertisements().await.unwrap();
    assert_eq!(second.actions(), 0);
    assert_eq!(node.metrics().advertisements_published.get(), 6);
}

#[tokio::test]
async fn moving_host_revokes_and_republishes() {
    let shared = Shared::new();
    shared
        .node("https://old.example")
        .sync_advertisements()
        .await
        .unwrap();

    let moved = shared.node("https://new.example");
    let summary = moved.sync_advertisements().await.unwrap();
    assert!(summary.failures.is_empty(), "{:?}", summary.failures);
    assert_eq!(summary.revoked.len(), 6);
    assert!(summary.revoked.iter().all(|ad| ad.domain == "https://old.example"));
    assert_eq!(summary.published.len(), 6);
    assert_eq!(shared.ads.len(), 6);

    let question = LookupQuestion::new(
        "ls_slap",
        json!({ "domain": "https://old.example" }),
    );
    assert_eq!(live_count(moved.lookup(&question).await.unwrap()), 0);
    let question = LookupQuestion::new(
        "ls_ship",
        json!({ "domain": "https://new.example", "topics": ["tm_kvstore"] }),
    );
    assert_eq!(live_count(moved.lookup(&question).await.unwrap()), 1);
}

#[tokio::test]
async fn sync_requires_an_advertiser() {
    let shared = Shared::new();
    let node = shared.builder().build();
    assert!(matches!(
        node.sync_advertisements().await,
        Err(EngineError::NoAdvertiser)
    ));
}

#[tokio::test]
async fn nothing_to_reconcile_without_discovery_topics() {
    let store = Arc::new(NullStore::new());
    let advertiser = PushDropAdvertiser::new(IDENTITY_KEY, "https://overlay.example").unwrap();
    let node = Engine::builder(store, Arc::new(NullChainTracker::new()))
        .topic_manager("tm_kvstore", Arc::new(KvStoreTopicManager))
        .advertiser(Arc::new(advertiser))
        .build();
    assert_eq!(node.sync_advertisements().await.unwrap().actions(), 0);
}
