//! Engine configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use overlay_types::NetworkId;

use crate::logging::LogFormat;
use crate::EngineError;

/// Configuration for an overlay node.
///
/// Can be loaded from a TOML file via [`EngineConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Which chain merkle proofs are checked against.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    /// Public URL this node is reachable at; advertised in SHIP/SLAP tokens.
    #[serde(default = "default_hosting_url")]
    pub hosting_url: String,

    /// Hex-encoded 33-byte compressed public key advertisements are issued
    /// under. Without one the node does not advertise.
    #[serde(default)]
    pub identity_key: Option<String>,

    #[serde(default = "default_arc_url")]
    pub arc_url: String,

    #[serde(default)]
    pub arc_api_key: Option<String>,

    /// Where ARC should deliver merkle proofs, normally
    /// `{hosting_url}/arc-ingest`.
    #[serde(default)]
    pub arc_callback_url: Option<String>,

    #[serde(default)]
    pub arc_callback_token: Option<String>,

    #[serde(default)]
    pub arc_deployment_id: Option<String>,

    #[serde(default = "default_chain_tracker_timeout_secs")]
    pub chain_tracker_timeout_secs: u64,

    #[serde(default = "default_broadcast_timeout_secs")]
    pub broadcast_timeout_secs: u64,

    /// Reconcile SHIP/SLAP advertisements once the node has started.
    #[serde(default)]
    pub sync_advertisements_on_start: bool,

    /// Relay admitted transactions through the broadcast client.
    #[serde(default = "default_true")]
    pub enable_broadcast: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Test
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./overlay_data")
}

fn default_lmdb_map_size() -> usize {
    16 * 1024 * 1024 * 1024
}

fn default_rpc_port() -> u16 {
    8080
}

fn default_hosting_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_arc_url() -> String {
    "https://arc.taal.com".to_string()
}

fn default_chain_tracker_timeout_secs() -> u64 {
    10
}

fn default_broadcast_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, EngineError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| EngineError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, EngineError> {
        toml::to_string_pretty(self).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn log_format(&self) -> LogFormat {
        match self.log_format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Human,
        }
    }

    pub fn chain_tracker_timeout(&self) -> Duration {
        Duration::from_secs(self.chain_tracker_timeout_secs)
    }

    pub fn broadcast_timeout(&self) -> Duration {
        Duration::from_secs(self.broadcast_timeout_secs)
    }

    /// Reject settings the node cannot start with.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.chain_tracker_timeout_secs == 0 || self.broadcast_timeout_secs == 0 {
            return Err(EngineError::Config("timeouts must be at least one second".into()));
        }
        if !(self.hosting_url.starts_with("http://") || self.hosting_url.starts_with("https://")) {
            return Err(EngineError::Config(format!(
                "hosting_url must be an http(s) URL, got {:?}",
                self.hosting_url
            )));
        }
        if let Some(key) = &self.identity_key {
            let valid = key.len() == 66
                && key.bytes().all(|b| b.is_ascii_hexdigit())
                && (key.starts_with("02") || key.starts_with("03"));
            if !valid {
                return Err(EngineError::Config(
                    "identity_key must be a hex-encoded compressed public key".into(),
                ));
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            data_dir: default_data_dir(),
            lmdb_map_size: default_lmdb_map_size(),
            rpc_port: default_rpc_port(),
            hosting_url: default_hosting_url(),
            identity_key: None,
            arc_url: default_arc_url(),
            arc_api_key: None,
            arc_callback_url: None,
            arc_callback_token: None,
            arc_deployment_id: None,
            chain_tracker_timeout_secs: default_chain_tracker_timeout_secs(),
            broadcast_timeout_secs: default_broadcast_timeout_secs(),
            sync_advertisements_on_start: false,
            enable_broadcast: default_true(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}
