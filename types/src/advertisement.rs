//! Peer-discovery advertisements (SHIP / SLAP).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::OutputRef;

/// Which capability an advertisement claims.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdvertisementProtocol {
    /// Host-interconnect: "this node hosts topic X".
    Ship,
    /// Lookup-availability: "this node hosts lookup service X".
    Slap,
}

impl AdvertisementProtocol {
    /// Protocol tag carried as the first token field.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ship => "SHIP",
            Self::Slap => "SLAP",
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"SHIP" => Some(Self::Ship),
            b"SLAP" => Some(Self::Slap),
            _ => None,
        }
    }

    /// Topic whose outputs carry this kind of advertisement.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Ship => "tm_ship",
            Self::Slap => "tm_slap",
        }
    }

    /// Lookup service indexing this kind of advertisement.
    pub fn lookup_service(&self) -> &'static str {
        match self {
            Self::Ship => "ls_ship",
            Self::Slap => "ls_slap",
        }
    }

    /// Required prefix of the advertised capability name.
    pub fn capability_prefix(&self) -> &'static str {
        match self {
            Self::Ship => "tm_",
            Self::Slap => "ls_",
        }
    }
}

impl fmt::Display for AdvertisementProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A capability the node wants advertised.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertisementData {
    pub protocol: AdvertisementProtocol,
    pub topic_or_service: String,
}

/// A published advertisement, as found on chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advertisement {
    pub protocol: AdvertisementProtocol,
    /// Hex-encoded compressed public key of the advertiser.
    pub identity_key: String,
    /// Hosting URL of the advertiser.
    pub domain: String,
    pub topic_or_service: String,
    /// The output carrying the advertisement, once it is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outpoint: Option<OutputRef>,
}

impl Advertisement {
    /// Whether this advertisement still describes `data` hosted at `domain`.
    pub fn matches(&self, data: &AdvertisementData, domain: &str) -> bool {
        self.protocol == data.protocol
            && self.topic_or_service == data.topic_or_service
            && self.domain == domain
    }
}
