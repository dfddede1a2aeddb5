//! Shared error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while building or validating the shared types.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid transaction id: {0}")]
    InvalidTxId(String),

    #[error("a submission must name at least one topic")]
    EmptyTopics,

    #[error("a submission must carry a transaction")]
    EmptyTransaction,
}

/// Classification every externally visible failure is reported under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A token or container did not have the expected structure.
    MalformedInput,
    /// The named item does not exist.
    NotFound,
    /// Stored state contradicts the requested transition (e.g. spending an
    /// output that was never admitted).
    Consistency,
    /// The chain tracker rejected a merkle proof.
    Verification,
    /// The coin store or a lookup storage failed.
    Storage,
    /// A broadcast relay or chain tracker could not be reached.
    ExternalService,
    /// The request itself was unusable (missing query, unknown service).
    Client,
}

impl ErrorKind {
    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::ExternalService)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::MalformedInput => "malformed_input",
            Self::NotFound => "not_found",
            Self::Consistency => "consistency",
            Self::Verification => "verification",
            Self::Storage => "storage",
            Self::ExternalService => "external_service",
            Self::Client => "client",
        };
        f.write_str(s)
    }
}

/// Structured failure: kind plus a human-readable detail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}
