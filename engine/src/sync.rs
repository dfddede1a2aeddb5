//! SHIP/SLAP advertisement reconciliation.
//!
//! The desired set is one SHIP advertisement per hosted topic and one SLAP
//! advertisement per hosted lookup service, all at the advertiser's hosting
//! URL. The actual set is whatever this node's own `ls_ship`/`ls_slap`
//! services return for its identity key. Stale advertisements are revoked
//! first, then missing ones are published, one transaction each.

use std::collections::BTreeSet;
use std::sync::atomic::Ordering;

use overlay_protocol::Advertiser;
use overlay_types::{
    Advertisement, AdvertisementData, AdvertisementProtocol, ErrorReport, LookupAnswer,
    LookupQuestion,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn, Instrument};

use crate::tracing_spans::sync_advertisements_span;
use crate::{Engine, EngineError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Publish,
    Revoke,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncFailure {
    pub action: SyncAction,
    pub protocol: AdvertisementProtocol,
    pub topic_or_service: String,
    pub error: ErrorReport,
}

/// What one reconciliation run did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub published: Vec<AdvertisementData>,
    pub revoked: Vec<Advertisement>,
    pub failures: Vec<SyncFailure>,
}

impl SyncSummary {
    /// Number of publish and revoke transactions attempted.
    pub fn actions(&self) -> usize {
        self.published.len() + self.revoked.len() + self.failures.len()
    }
}

/// Clears the in-progress flag when a run ends, however it ends.
struct RunGuard<'a>(&'a std::sync::atomic::AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Split `actual` into advertisements to keep and to revoke, and return the
/// desired entries nothing live covers yet.
///
/// At most one live advertisement is kept per desired entry; duplicates and
/// anything advertising another domain are revoked.
pub fn plan(
    desired: &BTreeSet<AdvertisementData>,
    actual: Vec<Advertisement>,
    hosting_url: &str,
) -> (Vec<Advertisement>, Vec<AdvertisementData>) {
    let mut covered = BTreeSet::new();
    let mut revoke = Vec::new();
    for ad in actual {
        let data = AdvertisementData {
            protocol: ad.protocol,
            topic_or_service: ad.topic_or_service.clone(),
        };
        if ad.domain == hosting_url && desired.contains(&data) && covered.insert(data) {
            continue;
        }
        revoke.push(ad);
    }
    let publish = desired.difference(&covered).cloned().collect();
    (revoke, publish)
}

impl Engine {
    /// Protocols this node can both admit and index.
    fn advertising_protocols(&self) -> Vec<AdvertisementProtocol> {
        [AdvertisementProtocol::Ship, AdvertisementProtocol::Slap]
            .into_iter()
            .filter(|p| {
                self.managers.contains_key(p.topic())
                    && self.lookup_services.contains_key(p.lookup_service())
            })
            .collect()
    }

    fn desired_advertisements(
        &self,
        protocols: &[AdvertisementProtocol],
    ) -> BTreeSet<AdvertisementData> {
        let mut desired = BTreeSet::new();
        for protocol in protocols {
            let names: Vec<&str> = match protocol {
                AdvertisementProtocol::Ship => self.topic_names().collect(),
                AdvertisementProtocol::Slap => self.lookup_service_names().collect(),
            };
            for name in names {
                if name.starts_with(protocol.capability_prefix()) {
                    desired.insert(AdvertisementData {
                        protocol: *protocol,
                        topic_or_service: name.to_string(),
                    });
                } else {
                    debug!(%protocol, name, "name cannot be advertised");
                }
            }
        }
        desired
    }

    /// Live advertisements issued under the advertiser's identity key.
    async fn current_advertisements(
        &self,
        advertiser: &dyn Advertiser,
        protocol: AdvertisementProtocol,
    ) -> Result<Vec<Advertisement>, EngineError> {
        let question = LookupQuestion::new(
            protocol.lookup_service(),
            json!({ "identityKey": advertiser.identity_key() }),
        );
        let outputs = match self.lookup(&question).await? {
            LookupAnswer::OutputList { outputs } => outputs,
            LookupAnswer::Freeform { .. } => {
                warn!(%protocol, "advertisement lookup returned a freeform answer");
                return Ok(Vec::new());
            }
        };

        let mut found = Vec::with_capacity(outputs.len());
        for item in &outputs {
            let parsed = self.archived_output_script(item).and_then(|(outpoint, script)| {
                let mut ad = advertiser.parse_advertisement(&script)?;
                ad.outpoint = Some(outpoint);
                Ok(ad)
            });
            match parsed {
                Ok(ad) if ad.protocol == protocol => found.push(ad),
                Ok(ad) => warn!(%protocol, found = %ad.protocol, "advertisement indexed under the wrong protocol"),
                Err(e) => warn!(%protocol, error = %e, "cannot read indexed advertisement"),
            }
        }
        Ok(found)
    }

    /// Reconcile published SHIP/SLAP advertisements with what this node
    /// hosts. Individual publish/revoke failures are reported in the summary
    /// and do not stop the run.
    pub async fn sync_advertisements(&self) -> Result<SyncSummary, EngineError> {
        let advertiser = self.advertiser.clone().ok_or(EngineError::NoAdvertiser)?;
        if self
            .sync_running
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(EngineError::SyncInProgress);
        }
        let _guard = RunGuard(&self.sync_running);

        self.reconcile(advertiser.as_ref())
            .instrument(sync_advertisements_span())
            .await
    }

    async fn reconcile(&self, advertiser: &dyn Advertiser) -> Result<SyncSummary, EngineError> {
        let protocols = self.advertising_protocols();
        if protocols.is_empty() {
            warn!("SHIP/SLAP topics are not hosted; nothing to reconcile");
            return Ok(SyncSummary::default());
        }
        let desired = self.desired_advertisements(&protocols);
        let mut actual = Vec::new();
        for protocol in &protocols {
            actual.extend(self.current_advertisements(advertiser, *protocol).await?);
        }

        let (to_revoke, to_publish) = plan(&desired, actual, advertiser.hosting_url());
        let mut summary = SyncSummary::default();

        for ad in to_revoke {
            match self.revoke(advertiser, &ad).await {
                Ok(()) => {
                    self.metrics.advertisements_revoked.inc();
                    summary.revoked.push(ad);
                }
                Err(error) => {
                    warn!(protocol = %ad.protocol, name = %ad.topic_or_service, %error, "revocation failed");
                    summary.failures.push(SyncFailure {
                        action: SyncAction::Revoke,
                        protocol: ad.protocol,
                        topic_or_service: ad.topic_or_service,
                        error,
                    });
                }
            }
        }

        for data in to_publish {
            match self.publish(advertiser, &data).await {
                Ok(()) => {
                    self.metrics.advertisements_published.inc();
                    summary.published.push(data);
                }
                Err(error) => {
                    warn!(protocol = %data.protocol, name = %data.topic_or_service, %error, "publication failed");
                    summary.failures.push(SyncFailure {
                        action: SyncAction::Publish,
                        protocol: data.protocol,
                        topic_or_service: data.topic_or_service,
                        error,
                    });
                }
            }
        }

        info!(
            published = summary.published.len(),
            revoked = summary.revoked.len(),
            failed = summary.failures.len(),
            "advertisements reconciled"
        );
        Ok(summary)
    }

    async fn revoke(&self, advertiser: &dyn Advertiser, ad: &Advertisement) -> Result<(), ErrorReport> {
        let tagged = advertiser
            .revoke_advertisements(std::slice::from_ref(ad))
            .await
            .map_err(|e| EngineError::from(e).report())?;
        let result = self.submit(tagged).await.map_err(|e| e.report())?;
        let topic = ad.protocol.topic();
        if let Some(error) = result.failed_topics.get(topic) {
            return Err(error.clone());
        }
        match result.steak.get(topic) {
            Some(entry) if !entry.coins_removed.is_empty() => Ok(()),
            _ => Err(ErrorReport::new(
                overlay_types::ErrorKind::Consistency,
                format!("revocation did not remove the {} advertisement", ad.protocol),
            )),
        }
    }

    async fn publish(
        &self,
        advertiser: &dyn Advertiser,
        data: &AdvertisementData,
    ) -> Result<(), ErrorReport> {
        let tagged = advertiser
            .create_advertisements(std::slice::from_ref(data))
            .await
            .map_err(|e| EngineError::from(e).report())?;
        let result = self.submit(tagged).await.map_err(|e| e.report())?;
        let topic = data.protocol.topic();
        if let Some(error) = result.failed_topics.get(topic) {
            return Err(error.clone());
        }
        match result.steak.get(topic) {
            Some(entry) if !entry.outputs_to_admit.is_empty() => Ok(()),
            _ => Err(ErrorReport::new(
                overlay_types::ErrorKind::MalformedInput,
                format!("{topic} did not admit the advertisement"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_types::{OutputRef, TxId};

    const HOST: &str = "https://node.example";

    fn data(protocol: AdvertisementProtocol, name: &str) -> AdvertisementData {
        AdvertisementData {
            protocol,
            topic_or_service: name.into(),
        }
    }

    fn ad(protocol: AdvertisementProtocol, name: &str, domain: &str, index: u32) -> Advertisement {
        Advertisement {
            protocol,
            identity_key: "02aa".into(),
            domain: domain.into(),
            topic_or_service: name.into(),
            outpoint: Some(OutputRef::new(TxId::new([1; 32]), index)),
        }
    }

    #[test]
    fn nothing_live_publishes_everything() {
        let desired: BTreeSet<_> = [
            data(AdvertisementProtocol::Ship, "tm_kvstore"),
            data(AdvertisementProtocol::Slap, "ls_kvstore"),
        ]
        .into();
        let (revoke, publish) = plan(&desired, Vec::new(), HOST);
        assert!(revoke.is_empty());
        assert_eq!(publish.len(), 2);
    }

    #[test]
    fn converged_state_plans_nothing() {
        let desired: BTreeSet<_> = [data(AdvertisementProtocol::Ship, "tm_kvstore")].into();
        let actual = vec![ad(AdvertisementProtocol::Ship, "tm_kvstore", HOST, 0)];
        let (revoke, publish) = plan(&desired, actual, HOST);
        assert!(revoke.is_empty());
        assert!(publish.is_empty());
    }

    #[test]
    fn stale_domain_is_revoked_and_replaced() {
        let desired: BTreeSet<_> = [data(AdvertisementProtocol::Ship, "tm_kvstore")].into();
        let actual = vec![ad(AdvertisementProtocol::Ship, "tm_kvstore", "https://old.example", 0)];
        let (revoke, publish) = plan(&desired, actual, HOST);
        assert_eq!(revoke.len(), 1);
        assert_eq!(publish, vec![data(AdvertisementProtocol::Ship, "tm_kvstore")]);
    }

    #[test]
    fn unhosted_and_duplicate_advertisements_are_revoked() {
        let desired: BTreeSet<_> = [data(AdvertisementProtocol::Ship, "tm_kvstore")].into();
        let actual = vec![
            ad(AdvertisementProtocol::Ship, "tm_kvstore", HOST, 0),
            ad(AdvertisementProtocol::Ship, "tm_kvstore", HOST, 1),
            ad(AdvertisementProtocol::Ship, "tm_retired", HOST, 2),
        ];
        let (revoke, publish) = plan(&desired, actual, HOST);
        let revoked: Vec<u32> = revoke
            .iter()
            .filter_map(|a| a.outpoint.map(|o| o.output_index))
            .collect();
        assert_eq!(revoked, vec![1, 2]);
        assert!(publish.is_empty());
    }
}
