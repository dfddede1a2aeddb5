//! Route-level tests driving the router in-process.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use overlay_codec::{Beef, MerklePath, PathLeaf, Script, Transaction, TxOutput};
use overlay_engine::Engine;
use overlay_kvstore::{KvStoreLookupService, KvStoreToken, KvStoreTopicManager};
use overlay_nullables::{NullChainTracker, NullKvStoreStorage, NullStore};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> (Router, Arc<NullChainTracker>) {
    let tracker = Arc::new(NullChainTracker::new());
    let engine = Engine::builder(Arc::new(NullStore::new()), tracker.clone())
        .topic_manager("tm_kvstore", Arc::new(KvStoreTopicManager))
        .lookup_service(
            "ls_kvstore",
            Arc::new(KvStoreLookupService::new(Arc::new(NullKvStoreStorage::new()))),
        )
        .build();
    (overlay_rpc::router(Arc::new(engine)), tracker)
}

fn kv_tx() -> Transaction {
    let mut lock = vec![0x03];
    lock.extend_from_slice(&[0x21; 32]);
    Transaction {
        outputs: vec![TxOutput {
            satoshis: 1,
            locking_script: KvStoreToken {
                protected_key: [0x55; 32],
                value: b"hello".to_vec(),
            }
            .to_script(&lock),
        }],
        ..Transaction::default()
    }
}

fn submit_request(tx: &Transaction, topics: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/submit")
        .header("content-type", "application/octet-stream")
        .header("x-topics", topics)
        .body(Body::from(Beef::from_transaction(tx.clone()).to_bytes()))
        .unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn submit_then_lookup() {
    let (app, _) = app();
    let tx = kv_tx();

    let response = app
        .clone()
        .oneshot(submit_request(&tx, r#"["tm_kvstore"]"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["txid"], json!(tx.txid().to_hex()));
    assert_eq!(body["steak"]["tm_kvstore"]["outputsToAdmit"], json!([0]));

    let response = app
        .oneshot(json_request(
            "/lookup",
            json!({ "service": "ls_kvstore", "query": "findAll" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["type"], "output-list");
    assert_eq!(body["outputs"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn large_containers_are_accepted() {
    let (app, _) = app();
    let mut tx = kv_tx();
    let mut data = vec![0x6a];
    data.resize(3 * 1024 * 1024, 0x00);
    tx.outputs.push(TxOutput {
        satoshis: 0,
        locking_script: Script::new(data),
    });

    let response = app
        .oneshot(submit_request(&tx, r#"["tm_kvstore"]"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["steak"]["tm_kvstore"]["outputsToAdmit"], json!([0]));
}

#[tokio::test]
async fn submit_without_topics_header_is_rejected() {
    let (app, _) = app();
    let request = Request::builder()
        .method("POST")
        .uri("/submit")
        .body(Body::from(kv_tx().to_bytes()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["status"], "error");
}

#[tokio::test]
async fn lookup_errors_map_to_status_codes() {
    let (app, _) = app();
    let response = app
        .clone()
        .oneshot(json_request("/lookup", json!({ "service": "ls_missing", "query": "findAll" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "ERR_NOT_FOUND");

    let response = app
        .clone()
        .oneshot(json_request("/lookup", json!({ "service": "ls_kvstore" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(json_request("/lookup", json!(["not", "a", "question"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn listings_and_documentation() {
    let (app, _) = app();
    let body = body_json(app.clone().oneshot(get("/listTopicManagers")).await.unwrap()).await;
    assert_eq!(body["tm_kvstore"]["name"], "KVStore");

    let body = body_json(
        app.clone()
            .oneshot(get("/listLookupServiceProviders"))
            .await
            .unwrap(),
    )
    .await;
    assert!(body.get("ls_kvstore").is_some());

    let response = app
        .clone()
        .oneshot(get("/getDocumentationForTopicManager?manager=tm_kvstore"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/getDocumentationForLookupServiceProvider?lookupService=ls_nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(get("/getDocumentationForLookupServiceProvider?lookupServices=ls_kvstore"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/getDocumentationForTopicManager"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn arc_ingest_confirms_and_rejects() {
    let (app, tracker) = app();
    let tx = kv_tx();
    let txid = tx.txid();
    app.clone()
        .oneshot(submit_request(&tx, r#"["tm_kvstore"]"#))
        .await
        .unwrap();

    let path = MerklePath::new(900, vec![vec![PathLeaf::client_txid(0, txid)]]);
    let ingest = json!({ "txid": txid.to_hex(), "merklePath": path.to_hex() });

    let response = app
        .clone()
        .oneshot(json_request("/arc-ingest", ingest.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    tracker.add_root(900, *txid.as_bytes());
    let response = app
        .clone()
        .oneshot(json_request("/arc-ingest", ingest))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["confirmed"], 1);

    let response = app
        .oneshot(json_request(
            "/arc-ingest",
            json!({ "txid": "zz", "merklePath": path.to_hex() }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sync_without_advertiser_is_a_client_error() {
    let (app, _) = app();
    let response = app
        .oneshot(json_request("/syncAdvertisements", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_and_unknown_routes() {
    let (app, _) = app();
    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&text).contains("submissions"));

    let response = app.oneshot(get("/nowhere")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({
            "status": "error",
            "code": "ERR_ROUTE_NOT_FOUND",
            "description": "Route not found."
        })
    );
}
