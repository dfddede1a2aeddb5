use overlay_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("service unreachable: {0}")]
    Unreachable(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("rejected by {service} ({status}): {detail}")]
    Rejected {
        service: &'static str,
        status: u16,
        detail: String,
    },
}

impl NetworkError {
    /// Classify a transport error from the HTTP client.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NetworkError::Unreachable(format!("request timed out: {e}"))
        } else if e.is_connect() {
            NetworkError::Unreachable(format!("connection failed: {e}"))
        } else {
            NetworkError::RequestFailed(e.to_string())
        }
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Unreachable(_) | NetworkError::RequestFailed(_) => true,
            NetworkError::Rejected { status, .. } => *status >= 500 || *status == 429,
            NetworkError::InvalidResponse(_) => false,
        }
    }
}

impl From<NetworkError> for ProtocolError {
    fn from(e: NetworkError) -> Self {
        ProtocolError::ExternalService(e.to_string())
    }
}
