//! `tm_kvstore`: admits outputs carrying a valid KVStore token.

use async_trait::async_trait;
use overlay_codec::Beef;
use overlay_protocol::{ProtocolError, TopicManager};
use overlay_types::{AdmittanceInstructions, ServiceMetaData};
use tracing::debug;

use crate::token::KvStoreToken;

pub struct KvStoreTopicManager;

#[async_trait]
impl TopicManager for KvStoreTopicManager {
    async fn identify_admissible_outputs(
        &self,
        beef: &[u8],
        previous_coins: &[u32],
    ) -> Result<AdmittanceInstructions, ProtocolError> {
        let beef = Beef::from_bytes(beef)?;
        let tx = beef.subject()?;

        let mut outputs_to_admit = Vec::new();
        for (index, output) in tx.outputs.iter().enumerate() {
            match KvStoreToken::from_script(output.locking_script.as_bytes()) {
                Ok(_) => outputs_to_admit.push(index as u32),
                Err(e) => debug!(output_index = index, error = %e, "skipping output"),
            }
        }
        if outputs_to_admit.is_empty() {
            debug!("no KVStore outputs admitted");
        }

        Ok(AdmittanceInstructions {
            outputs_to_admit,
            coins_to_retain: previous_coins.to_vec(),
        })
    }

    async fn get_documentation(&self) -> Result<String, ProtocolError> {
        Ok(include_str!("../docs/topic_manager.md").to_string())
    }

    async fn get_meta_data(&self) -> Result<ServiceMetaData, ProtocolError> {
        Ok(ServiceMetaData::new("KVStore", "Key-value tokens with 32-byte protected keys")
            .with_version(env!("CARGO_PKG_VERSION")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_codec::{PushDropToken, Script, Transaction, TxOutput};

    fn lock_key() -> Vec<u8> {
        let mut k = vec![0x02];
        k.extend_from_slice(&[0x21; 32]);
        k
    }

    fn output(fields: Vec<Vec<u8>>) -> TxOutput {
        TxOutput {
            satoshis: 1,
            locking_script: PushDropToken::new(lock_key(), fields).encode(),
        }
    }

    fn beef(outputs: Vec<TxOutput>) -> Vec<u8> {
        let tx = Transaction {
            outputs,
            ..Transaction::default()
        };
        Beef::from_transaction(tx).to_bytes()
    }

    #[tokio::test]
    async fn admits_only_well_formed_outputs() {
        let beef = beef(vec![
            output(vec![vec![1; 32], b"good".to_vec()]),
            output(vec![vec![1; 32]]),
            output(vec![vec![1; 33], b"oversized key".to_vec()]),
        ]);
        let result = KvStoreTopicManager
            .identify_admissible_outputs(&beef, &[])
            .await
            .unwrap();
        assert_eq!(result.outputs_to_admit, vec![0]);
    }

    #[tokio::test]
    async fn non_token_outputs_are_skipped_not_fatal() {
        let beef = beef(vec![
            TxOutput {
                satoshis: 5,
                locking_script: Script::new(vec![0x76, 0xa9]),
            },
            output(vec![vec![2; 32], b"v".to_vec()]),
        ]);
        let result = KvStoreTopicManager
            .identify_admissible_outputs(&beef, &[])
            .await
            .unwrap();
        assert_eq!(result.outputs_to_admit, vec![1]);
    }

    #[tokio::test]
    async fn zero_admitted_is_valid_and_previous_coins_pass_through() {
        let beef = beef(vec![output(vec![vec![1; 31], b"v".to_vec()])]);
        let result = KvStoreTopicManager
            .identify_admissible_outputs(&beef, &[0, 2])
            .await
            .unwrap();
        assert!(result.outputs_to_admit.is_empty());
        assert_eq!(result.coins_to_retain, vec![0, 2]);
    }

    #[tokio::test]
    async fn unparsable_container_fails() {
        assert!(matches!(
            KvStoreTopicManager
                .identify_admissible_outputs(b"garbage", &[])
                .await,
            Err(ProtocolError::Codec(_))
        ));
    }
}
