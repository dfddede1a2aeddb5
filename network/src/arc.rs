//! Broadcast client for an ARC transaction processor.
//!
//! `POST {url}/v1/tx` with `{"rawTx": hex}`. When a callback URL is set the
//! processor later posts the merkle proof to it (`/arc-ingest` on this node).

use std::time::Duration;

use async_trait::async_trait;
use overlay_protocol::{BroadcastResponse, Broadcaster, ProtocolError};
use overlay_types::TxId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::NetworkError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Statuses ARC reports for transactions it did not accept.
const FAILURE_STATUSES: &[&str] = &["REJECTED", "DOUBLE_SPEND_ATTEMPTED", "INVALID", "MALFORMED"];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArcConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub callback_url: Option<String>,
    pub callback_token: Option<String>,
    pub deployment_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArcRequest {
    raw_tx: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArcResponse {
    #[serde(default)]
    txid: Option<String>,
    #[serde(default)]
    tx_status: Option<String>,
    #[serde(default)]
    extra_info: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

pub struct ArcBroadcaster {
    http_client: reqwest::Client,
    config: ArcConfig,
}

impl ArcBroadcaster {
    pub fn new(config: ArcConfig) -> Self {
        Self::with_timeout(config, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(config: ArcConfig, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            config,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/v1/tx", self.config.url.trim_end_matches('/'))
    }

    async fn post(&self, raw_tx: &[u8]) -> Result<BroadcastResponse, NetworkError> {
        let mut request = self
            .http_client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(&ArcRequest {
                raw_tx: hex::encode(raw_tx),
            });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(url) = &self.config.callback_url {
            request = request.header("X-CallbackUrl", url);
        }
        if let Some(token) = &self.config.callback_token {
            request = request.header("X-CallbackToken", token);
        }
        if let Some(id) = &self.config.deployment_id {
            request = request.header("XDeployment-ID", id);
        }

        let response = request.send().await.map_err(NetworkError::from_reqwest)?;
        let status = response.status();
        let body: ArcResponse = response.json().await.map_err(|e| {
            NetworkError::InvalidResponse(format!("failed to parse ARC response: {e}"))
        })?;
        interpret(status.as_u16(), body)
    }
}

fn interpret(status: u16, body: ArcResponse) -> Result<BroadcastResponse, NetworkError> {
    let tx_status = body.tx_status.unwrap_or_default();
    if !(200..300).contains(&status) || FAILURE_STATUSES.contains(&tx_status.as_str()) {
        let detail = body
            .extra_info
            .filter(|s| !s.is_empty())
            .or(body.detail)
            .or(body.title)
            .unwrap_or(tx_status);
        return Err(NetworkError::Rejected {
            service: "ARC",
            status,
            detail,
        });
    }
    let txid = body
        .txid
        .as_deref()
        .ok_or_else(|| NetworkError::InvalidResponse("ARC response has no txid".into()))
        .and_then(|hex| {
            TxId::from_hex(hex)
                .map_err(|e| NetworkError::InvalidResponse(format!("bad txid in ARC response: {e}")))
        })?;
    Ok(BroadcastResponse {
        txid,
        status: tx_status,
        message: body.extra_info.unwrap_or_default(),
    })
}

#[async_trait]
impl Broadcaster for ArcBroadcaster {
    async fn broadcast(&self, raw_tx: &[u8]) -> Result<BroadcastResponse, ProtocolError> {
        match self.post(raw_tx).await {
            Ok(response) => {
                debug!(txid = %response.txid, status = %response.status, "broadcast accepted");
                Ok(response)
            }
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "broadcast failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> ArcResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let arc = ArcBroadcaster::new(ArcConfig {
            url: "https://arc.example.com/".into(),
            ..ArcConfig::default()
        });
        assert_eq!(arc.endpoint(), "https://arc.example.com/v1/tx");
    }

    #[test]
    fn accepted_response() {
        let txid = "ab".repeat(32);
        let response = interpret(
            200,
            body(&format!(r#"{{"txid":"{txid}","txStatus":"SEEN_ON_NETWORK"}}"#)),
        )
        .unwrap();
        assert_eq!(response.txid.to_hex(), txid);
        assert_eq!(response.status, "SEEN_ON_NETWORK");
    }

    #[test]
    fn rejected_status_and_http_errors() {
        let rejected = interpret(
            200,
            body(r#"{"txid":"00","txStatus":"REJECTED","extraInfo":"missing inputs"}"#),
        );
        assert!(matches!(
            rejected,
            Err(NetworkError::Rejected { ref detail, .. }) if detail == "missing inputs"
        ));

        let http = interpret(401, body(r#"{"title":"Unauthorized"}"#)).unwrap_err();
        assert!(!http.is_retryable());
        let busy = interpret(503, body(r#"{}"#)).unwrap_err();
        assert!(busy.is_retryable());
    }
}
