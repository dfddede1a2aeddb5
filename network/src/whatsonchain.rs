//! Chain tracker backed by the WhatsOnChain block-header API.
//!
//! `GET {base}/v1/bsv/{network}/block/{height}/header` returns the header of
//! the block at that height; its `merkleroot` is in display (reversed) hex.

use std::time::Duration;

use async_trait::async_trait;
use overlay_protocol::{ChainTracker, ProtocolError};
use overlay_types::NetworkId;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::NetworkError;

pub const DEFAULT_BASE_URL: &str = "https://api.whatsonchain.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct BlockHeader {
    merkleroot: String,
}

pub struct WhatsOnChainTracker {
    http_client: reqwest::Client,
    base_url: String,
    network: NetworkId,
    api_key: Option<String>,
}

impl WhatsOnChainTracker {
    pub fn new(network: NetworkId) -> Self {
        Self::with_timeout(network, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(network: NetworkId, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            base_url: DEFAULT_BASE_URL.to_string(),
            network,
            api_key: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn header_url(&self, height: u32) -> String {
        format!(
            "{}/v1/bsv/{}/block/{}/header",
            self.base_url.trim_end_matches('/'),
            self.network.as_str(),
            height
        )
    }

    /// Merkle root of the block at `height` in internal byte order, or
    /// `None` if the service knows no such block.
    pub async fn merkle_root(&self, height: u32) -> Result<Option<[u8; 32]>, NetworkError> {
        let mut request = self.http_client.get(self.header_url(height));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", key);
        }
        let response = request.send().await.map_err(NetworkError::from_reqwest)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(NetworkError::Rejected {
                service: "WhatsOnChain",
                status: response.status().as_u16(),
                detail: format!("header for block {height}"),
            });
        }

        let header: BlockHeader = response.json().await.map_err(|e| {
            NetworkError::InvalidResponse(format!("failed to parse block header: {e}"))
        })?;
        parse_display_root(&header.merkleroot).map(Some)
    }
}

/// Convert a display-order hex merkle root to internal byte order.
pub fn parse_display_root(hex_root: &str) -> Result<[u8; 32], NetworkError> {
    let mut root: [u8; 32] = hex::decode(hex_root)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| NetworkError::InvalidResponse(format!("bad merkle root {hex_root:?}")))?;
    root.reverse();
    Ok(root)
}

#[async_trait]
impl ChainTracker for WhatsOnChainTracker {
    async fn is_valid_root_for_height(
        &self,
        root: &[u8; 32],
        height: u32,
    ) -> Result<bool, ProtocolError> {
        let known = self.merkle_root(height).await?;
        debug!(height, found = known.is_some(), "fetched block header");
        Ok(known.as_ref() == Some(root))
    }
}
