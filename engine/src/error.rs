use std::time::Duration;

use overlay_codec::CodecError;
use overlay_protocol::ProtocolError;
use overlay_store::StoreError;
use overlay_types::{ErrorKind, ErrorReport, TypesError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid submission: {0}")]
    InvalidSubmission(#[from] TypesError),

    #[error("undecodable container: {0}")]
    Codec(#[from] CodecError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("no topic manager named {0}")]
    UnknownTopic(String),

    #[error("no lookup service named {0}")]
    UnknownLookupService(String),

    #[error("{service} did not answer within {timeout:?}")]
    Timeout {
        service: &'static str,
        timeout: Duration,
    },

    #[error("no advertiser configured")]
    NoAdvertiser,

    #[error("advertisement sync already in progress")]
    SyncInProgress,

    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    /// Classification reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidSubmission(_) | EngineError::Codec(_) => ErrorKind::MalformedInput,
            EngineError::Store(StoreError::NotFound(_)) => ErrorKind::Consistency,
            EngineError::Store(_) => ErrorKind::Storage,
            EngineError::Protocol(e) => e.kind(),
            EngineError::UnknownTopic(_) | EngineError::UnknownLookupService(_) => {
                ErrorKind::NotFound
            }
            EngineError::Timeout { .. } => ErrorKind::ExternalService,
            EngineError::NoAdvertiser | EngineError::SyncInProgress | EngineError::Config(_) => {
                ErrorKind::Client
            }
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.kind(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(
            EngineError::from(TypesError::EmptyTopics).kind(),
            ErrorKind::MalformedInput
        );
        assert_eq!(
            EngineError::from(StoreError::NotFound("coin".into())).kind(),
            ErrorKind::Consistency
        );
        assert_eq!(
            EngineError::from(StoreError::Backend("disk".into())).kind(),
            ErrorKind::Storage
        );
        assert_eq!(
            EngineError::from(ProtocolError::InvalidQuery("missing".into())).kind(),
            ErrorKind::Client
        );
        let timeout = EngineError::Timeout {
            service: "chain tracker",
            timeout: Duration::from_secs(1),
        };
        assert!(timeout.kind().is_retryable());
    }

    #[test]
    fn report_carries_detail() {
        let report = EngineError::UnknownTopic("tm_nope".into()).report();
        assert_eq!(report.kind, ErrorKind::NotFound);
        assert!(report.detail.contains("tm_nope"));
    }
}
