//! RPC request handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use overlay_codec::MerklePath;
use overlay_engine::tracing_spans::rpc_span;
use overlay_engine::{Engine, SubmitResult, SyncSummary};
use overlay_types::{LookupAnswer, LookupQuestion, ServiceMetaData, TaggedTransaction, TxId};
use serde::{Deserialize, Serialize};
use tracing::{debug, Instrument};

use crate::error::RpcError;

/// Header carrying the JSON array of topics a submission is tagged with.
pub const TOPICS_HEADER: &str = "x-topics";

pub type AppState = Arc<Engine>;

// ── Submission ───────────────────────────────────────────────────────────

fn topics_from(headers: &HeaderMap) -> Result<Vec<String>, RpcError> {
    let raw = headers
        .get(TOPICS_HEADER)
        .ok_or_else(|| RpcError::InvalidRequest(format!("missing {TOPICS_HEADER} header")))?;
    serde_json::from_slice(raw.as_bytes()).map_err(|e| {
        RpcError::InvalidRequest(format!("{TOPICS_HEADER} must be a JSON array of strings: {e}"))
    })
}

pub async fn submit(
    State(engine): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SubmitResult>, RpcError> {
    let topics = topics_from(&headers)?;
    let tagged = TaggedTransaction::new(body.to_vec(), topics);
    let result = engine.submit(tagged).instrument(rpc_span("/submit")).await?;
    Ok(Json(result))
}

// ── Lookup ───────────────────────────────────────────────────────────────

pub async fn lookup(
    State(engine): State<AppState>,
    payload: Result<Json<LookupQuestion>, JsonRejection>,
) -> Result<Json<LookupAnswer>, RpcError> {
    let Json(question) = payload?;
    let answer = engine.lookup(&question).instrument(rpc_span("/lookup")).await?;
    Ok(Json(answer))
}

// ── Listings and documentation ───────────────────────────────────────────

pub async fn list_topic_managers(
    State(engine): State<AppState>,
) -> Json<BTreeMap<String, ServiceMetaData>> {
    Json(
        engine
            .list_topic_managers()
            .instrument(rpc_span("/listTopicManagers"))
            .await,
    )
}

pub async fn list_lookup_service_providers(
    State(engine): State<AppState>,
) -> Json<BTreeMap<String, ServiceMetaData>> {
    Json(
        engine
            .list_lookup_service_providers()
            .instrument(rpc_span("/listLookupServiceProviders"))
            .await,
    )
}

#[derive(Debug, Deserialize)]
pub struct ManagerParams {
    pub manager: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupServiceParams {
    #[serde(alias = "lookupServices")]
    pub lookup_service: String,
}

fn markdown(doc: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/markdown; charset=utf-8")], doc)
}

pub async fn documentation_for_topic_manager(
    State(engine): State<AppState>,
    params: Result<Query<ManagerParams>, QueryRejection>,
) -> Result<impl IntoResponse, RpcError> {
    let Query(params) = params?;
    let doc = engine
        .get_documentation_for_topic_manager(&params.manager)
        .instrument(rpc_span("/getDocumentationForTopicManager"))
        .await?;
    Ok(markdown(doc))
}

pub async fn documentation_for_lookup_service(
    State(engine): State<AppState>,
    params: Result<Query<LookupServiceParams>, QueryRejection>,
) -> Result<impl IntoResponse, RpcError> {
    let Query(params) = params?;
    let doc = engine
        .get_documentation_for_lookup_service_provider(&params.lookup_service)
        .instrument(rpc_span("/getDocumentationForLookupServiceProvider"))
        .await?;
    Ok(markdown(doc))
}

// ── Merkle proofs ────────────────────────────────────────────────────────

/// Proof callback body, as sent by the broadcast relay.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcIngestRequest {
    /// Display (byte-reversed) hex txid.
    pub txid: String,
    /// BUMP-encoded merkle path, hex.
    pub merkle_path: String,
}

#[derive(Debug, Serialize)]
pub struct ArcIngestResponse {
    pub status: &'static str,
    pub confirmed: usize,
}

pub async fn arc_ingest(
    State(engine): State<AppState>,
    payload: Result<Json<ArcIngestRequest>, JsonRejection>,
) -> Result<Json<ArcIngestResponse>, RpcError> {
    let Json(request) = payload?;
    let txid = TxId::from_hex(&request.txid)
        .map_err(|e| RpcError::InvalidRequest(format!("txid: {e}")))?;
    let path = MerklePath::from_hex(&request.merkle_path)
        .map_err(|e| RpcError::InvalidRequest(format!("merklePath: {e}")))?;
    let confirmed = engine
        .handle_new_merkle_proof(txid, path)
        .instrument(rpc_span("/arc-ingest"))
        .await?;
    debug!(%txid, confirmed, "proof callback handled");
    Ok(Json(ArcIngestResponse {
        status: "success",
        confirmed,
    }))
}

// ── Advertisements ───────────────────────────────────────────────────────

pub async fn sync_advertisements(
    State(engine): State<AppState>,
) -> Result<Json<SyncSummary>, RpcError> {
    let summary = engine
        .sync_advertisements()
        .instrument(rpc_span("/syncAdvertisements"))
        .await?;
    Ok(Json(summary))
}

// ── Metrics ──────────────────────────────────────────────────────────────

pub async fn metrics(State(engine): State<AppState>) -> Result<impl IntoResponse, RpcError> {
    let text = engine
        .metrics()
        .encode()
        .map_err(|e| RpcError::Server(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    ))
}

pub async fn not_found() -> RpcError {
    RpcError::RouteNotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn topics_header_must_be_a_json_array() {
        let mut headers = HeaderMap::new();
        assert!(topics_from(&headers).is_err());

        headers.insert(TOPICS_HEADER, HeaderValue::from_static(r#"["tm_kvstore"]"#));
        assert_eq!(topics_from(&headers).unwrap(), vec!["tm_kvstore".to_string()]);

        headers.insert(TOPICS_HEADER, HeaderValue::from_static("tm_kvstore"));
        assert!(matches!(topics_from(&headers), Err(RpcError::InvalidRequest(_))));
    }
}
