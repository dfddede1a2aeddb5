//! Builds SHIP/SLAP advertisement and revocation transactions.
//!
//! Transactions are unsigned and unfunded: outputs carry 1 satoshi and
//! revocations spend the advertisement outputs without unlocking data. They
//! are sufficient for this node's own admission; relays will reject them.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use overlay_codec::{Beef, Script, Transaction, TxInput, TxOutput};
use overlay_protocol::{Advertiser, ProtocolError};
use overlay_types::{
    Advertisement, AdvertisementData, AdvertisementProtocol, OutputRef, TaggedTransaction,
    Timestamp, TxId,
};

use crate::token::{
    decode_advertisement, encode_advertisement, is_advertisable_url, is_valid_name,
    AdvertisementError, IDENTITY_KEY_LEN,
};

/// Satoshis locked in each advertisement output.
pub const ADVERTISEMENT_SATOSHIS: u64 = 1;
const FINAL_SEQUENCE: u32 = u32::MAX;

pub struct PushDropAdvertiser {
    identity_key: Vec<u8>,
    identity_key_hex: String,
    hosting_url: String,
    nonce: AtomicU64,
}

impl PushDropAdvertiser {
    pub fn new(identity_key_hex: &str, hosting_url: &str) -> Result<Self, AdvertisementError> {
        let identity_key = hex::decode(identity_key_hex).map_err(|_| AdvertisementError::IdentityKey)?;
        if identity_key.len() != IDENTITY_KEY_LEN || !matches!(identity_key[0], 0x02 | 0x03) {
            return Err(AdvertisementError::IdentityKey);
        }
        if !is_advertisable_url(hosting_url) {
            return Err(AdvertisementError::Domain(hosting_url.to_string()));
        }
        Ok(Self {
            identity_key_hex: hex::encode(&identity_key),
            identity_key,
            hosting_url: hosting_url.to_string(),
            nonce: AtomicU64::new(0),
        })
    }

    /// Placeholder funding input. It spends nothing the node tracks and only
    /// keeps repeated advertisements of the same capability distinct.
    fn funding_input(&self) -> TxInput {
        let mut data = Timestamp::now().as_secs().to_le_bytes().to_vec();
        data.extend_from_slice(&self.nonce.fetch_add(1, Ordering::Relaxed).to_le_bytes());
        let mut unlocking_script = Vec::new();
        overlay_codec::script::push_data(&mut unlocking_script, &data);
        TxInput {
            previous_output: OutputRef::new(TxId::ZERO, u32::MAX),
            unlocking_script: Script::new(unlocking_script),
            sequence: FINAL_SEQUENCE,
        }
    }
}

fn topics_for(protocols: impl Iterator<Item = AdvertisementProtocol>) -> Vec<String> {
    protocols
        .map(|p| p.topic())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl Advertiser for PushDropAdvertiser {
    fn identity_key(&self) -> &str {
        &self.identity_key_hex
    }

    fn hosting_url(&self) -> &str {
        &self.hosting_url
    }

    async fn create_advertisements(
        &self,
        data: &[AdvertisementData],
    ) -> Result<TaggedTransaction, ProtocolError> {
        if data.is_empty() {
            return Err(ProtocolError::Malformed("nothing to advertise".into()));
        }
        let mut outputs = Vec::with_capacity(data.len());
        for item in data {
            if !is_valid_name(item.protocol, &item.topic_or_service) {
                return Err(ProtocolError::Malformed(format!(
                    "cannot advertise {:?} under {}",
                    item.topic_or_service, item.protocol
                )));
            }
            outputs.push(TxOutput {
                satoshis: ADVERTISEMENT_SATOSHIS,
                locking_script: encode_advertisement(
                    item.protocol,
                    &self.identity_key,
                    &self.hosting_url,
                    &item.topic_or_service,
                ),
            });
        }
        let tx = Transaction {
            inputs: vec![self.funding_input()],
            outputs,
            ..Transaction::default()
        };
        Ok(TaggedTransaction::new(
            Beef::from_transaction(tx).to_bytes(),
            topics_for(data.iter().map(|d| d.protocol)),
        ))
    }

    async fn revoke_advertisements(
        &self,
        advertisements: &[Advertisement],
    ) -> Result<TaggedTransaction, ProtocolError> {
        if advertisements.is_empty() {
            return Err(ProtocolError::Malformed("nothing to revoke".into()));
        }
        let inputs = advertisements
            .iter()
            .map(|ad| {
                ad.outpoint
                    .map(|previous_output| TxInput {
                        previous_output,
                        unlocking_script: Script::default(),
                        sequence: FINAL_SEQUENCE,
                    })
                    .ok_or_else(|| {
                        ProtocolError::Malformed(format!(
                            "advertisement for {} has no outpoint",
                            ad.topic_or_service
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let tx = Transaction {
            inputs,
            ..Transaction::default()
        };
        Ok(TaggedTransaction::new(
            Beef::from_transaction(tx).to_bytes(),
            topics_for(advertisements.iter().map(|ad| ad.protocol)),
        ))
    }

    fn parse_advertisement(&self, locking_script: &[u8]) -> Result<Advertisement, ProtocolError> {
        decode_advertisement(locking_script).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "02aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn advertiser() -> PushDropAdvertiser {
        PushDropAdvertiser::new(KEY, "https://node.example").unwrap()
    }

    fn ship(name: &str) -> AdvertisementData {
        AdvertisementData {
            protocol: AdvertisementProtocol::Ship,
            topic_or_service: name.into(),
        }
    }

    #[test]
    fn rejects_bad_identity_or_url() {
        assert!(PushDropAdvertiser::new("02ab", "https://node.example").is_err());
        assert!(PushDropAdvertiser::new(KEY, "node.example").is_err());
    }

    #[tokio::test]
    async fn created_advertisements_parse_back() {
        let advertiser = advertiser();
        let tagged = advertiser
            .create_advertisements(&[
                ship("tm_kvstore"),
                AdvertisementData {
                    protocol: AdvertisementProtocol::Slap,
                    topic_or_service: "ls_kvstore".into(),
                },
            ])
            .await
            .unwrap();
        assert_eq!(tagged.topics, vec!["tm_ship".to_string(), "tm_slap".to_string()]);

        let beef = Beef::from_bytes(&tagged.beef).unwrap();
        let tx = beef.subject().unwrap();
        assert_eq!(tx.outputs.len(), 2);
        let ad = advertiser
            .parse_advertisement(tx.outputs[0].locking_script.as_bytes())
            .unwrap();
        assert_eq!(ad.identity_key, KEY);
        assert_eq!(ad.domain, "https://node.example");
        assert_eq!(ad.topic_or_service, "tm_kvstore");
    }

    #[tokio::test]
    async fn repeated_advertisements_get_distinct_txids() {
        let advertiser = advertiser();
        let a = advertiser.create_advertisements(&[ship("tm_kvstore")]).await.unwrap();
        let b = advertiser.create_advertisements(&[ship("tm_kvstore")]).await.unwrap();
        let txid = |beef: &[u8]| Beef::from_bytes(beef).unwrap().subject().unwrap().txid();
        assert_ne!(txid(&a.beef), txid(&b.beef));
    }

    #[tokio::test]
    async fn invalid_names_are_refused() {
        assert!(matches!(
            advertiser().create_advertisements(&[ship("ls_kvstore")]).await,
            Err(ProtocolError::Malformed(_))
        ));
        assert!(advertiser().create_advertisements(&[]).await.is_err());
    }

    #[tokio::test]
    async fn revocation_spends_the_advertisements() {
        let outpoint = OutputRef::new(TxId::new([8; 32]), 0);
        let ad = Advertisement {
            protocol: AdvertisementProtocol::Slap,
            identity_key: KEY.into(),
            domain: "https://node.example".into(),
            topic_or_service: "ls_kvstore".into(),
            outpoint: Some(outpoint),
        };
        let tagged = advertiser().revoke_advertisements(&[ad.clone()]).await.unwrap();
        assert_eq!(tagged.topics, vec!["tm_slap".to_string()]);
        let beef = Beef::from_bytes(&tagged.beef).unwrap();
        let tx = beef.subject().unwrap();
        assert_eq!(tx.inputs[0].previous_output, outpoint);

        let unknown = Advertisement {
            outpoint: None,
            ..ad
        };
        assert!(advertiser().revoke_advertisements(&[unknown]).await.is_err());
    }
}
