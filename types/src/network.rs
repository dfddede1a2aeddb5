//! Network identifier.

use serde::{Deserialize, Serialize};

/// Which chain the node indexes and verifies proofs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    /// The production chain.
    Main,
    /// The public test chain.
    Test,
}

impl NetworkId {
    /// Human-readable name, as used by block explorers in URL paths.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Test => "test",
        }
    }

    /// Parse a user-supplied network name. Anything other than a main-net
    /// spelling maps to the test network.
    pub fn parse_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "main" | "mainnet" | "production" => Self::Main,
            _ => Self::Test,
        }
    }
}
