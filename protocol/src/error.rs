use overlay_codec::CodecError;
use overlay_store::StoreError;
use overlay_types::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("not supported: {0}")]
    NotSupported(String),
}

impl ProtocolError {
    /// Classification reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Malformed(_) | ProtocolError::Codec(_) => ErrorKind::MalformedInput,
            ProtocolError::InvalidQuery(_) | ProtocolError::NotSupported(_) => ErrorKind::Client,
            ProtocolError::Verification(_) => ErrorKind::Verification,
            ProtocolError::Storage(StoreError::NotFound(_)) => ErrorKind::Consistency,
            ProtocolError::Storage(_) => ErrorKind::Storage,
            ProtocolError::ExternalService(_) => ErrorKind::ExternalService,
        }
    }
}
