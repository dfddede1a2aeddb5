//! RPC error types and their JSON envelope.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use overlay_engine::EngineError;
use overlay_types::{ErrorKind, ErrorReport};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("route not found")]
    RouteNotFound,

    #[error("server error: {0}")]
    Server(String),
}

impl From<JsonRejection> for RpcError {
    fn from(e: JsonRejection) -> Self {
        RpcError::InvalidRequest(e.body_text())
    }
}

impl From<QueryRejection> for RpcError {
    fn from(e: QueryRejection) -> Self {
        RpcError::InvalidRequest(e.body_text())
    }
}

/// Body of every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub status: &'static str,
    pub code: &'static str,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::MalformedInput | ErrorKind::Client => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Consistency => StatusCode::CONFLICT,
        ErrorKind::Verification => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
    }
}

fn code_for(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::MalformedInput => "ERR_MALFORMED_INPUT",
        ErrorKind::NotFound => "ERR_NOT_FOUND",
        ErrorKind::Consistency => "ERR_CONSISTENCY",
        ErrorKind::Verification => "ERR_VERIFICATION",
        ErrorKind::Storage => "ERR_STORAGE",
        ErrorKind::ExternalService => "ERR_EXTERNAL_SERVICE",
        ErrorKind::Client => "ERR_BAD_REQUEST",
    }
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::Engine(e) => status_for(e.kind()),
            RpcError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            RpcError::RouteNotFound => StatusCode::NOT_FOUND,
            RpcError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            RpcError::Engine(e) => {
                let ErrorReport { kind, detail } = e.report();
                ErrorEnvelope {
                    status: "error",
                    code: code_for(kind),
                    description: detail,
                    kind: Some(kind),
                }
            }
            RpcError::InvalidRequest(detail) => ErrorEnvelope {
                status: "error",
                code: "ERR_BAD_REQUEST",
                description: detail.clone(),
                kind: Some(ErrorKind::Client),
            },
            RpcError::RouteNotFound => ErrorEnvelope {
                status: "error",
                code: "ERR_ROUTE_NOT_FOUND",
                description: "Route not found.".into(),
                kind: None,
            },
            RpcError::Server(detail) => ErrorEnvelope {
                status: "error",
                code: "ERR_INTERNAL",
                description: detail.clone(),
                kind: None,
            },
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.envelope())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_keep_their_kind() {
        let err = RpcError::from(EngineError::UnknownLookupService("ls_x".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        let envelope = err.envelope();
        assert_eq!(envelope.code, "ERR_NOT_FOUND");
        assert_eq!(envelope.kind, Some(ErrorKind::NotFound));
    }

    #[test]
    fn route_not_found_envelope() {
        let json = serde_json::to_value(RpcError::RouteNotFound.envelope()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "error",
                "code": "ERR_ROUTE_NOT_FOUND",
                "description": "Route not found."
            })
        );
    }
}
