//! API Regression Tests
//!
//! In-process tests that build the hub router via `build_router()` and
//! exercise the /api/v1/* endpoints using `tower::ServiceExt::oneshot()`.
//! No binary spawn, no network port, no database.

mod common;

use common::{FaultyStore, BACKEND_DETAIL};
use manifest_hub::hub::api::build_router;
use manifest_hub::hub::config::HubConfig;
use manifest_hub::hub::HubState;
use manifest_hub::store::{HubStore, InMemoryStore};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_app() -> (Router, Arc<HubState>) {
    let store: Arc<dyn HubStore> = Arc::new(InMemoryStore::new());
    let state = HubState::new(store, HubConfig::default());
    (build_router(Arc::clone(&state)), state)
}

fn create_faulty_app() -> (Router, Arc<FaultyStore>) {
    let faulty = Arc::new(FaultyStore::default());
    let store: Arc<dyn HubStore> = faulty.clone();
    let state = HubState::new(store, HubConfig::default());
    (build_router(state), faulty)
}

async fn send(app: &Router, req: Request<Body>) -> axum::response::Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn manifest(title: &str) -> Value {
    json!({
        "title": title,
        "dataSources": [{"id": "sales"}],
        "dashboards": [{"id": "main", "widgets": [{"id": "revenue", "dataSourceId": "sales"}]}]
    })
}

async fn publish(app: &Router, tenant: &str, payload: Value) -> axum::response::Response {
    send(
        app,
        post_json(
            &format!("/api/v1/tenant/{tenant}/versions"),
            &json!({"payload": payload, "authorId": "alice"}),
        ),
    )
    .await
}

#[tokio::test]
async fn test_health_reports_backend() {
    let (app, _) = create_test_app();
    let resp = send(&app, get("/api/v1/health")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_json(resp).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["backend"], "memory");
    assert_eq!(json["durable"], false);
}

#[tokio::test]
async fn test_current_config_before_any_publish_is_404() {
    let (app, _) = create_test_app();
    let resp = send(&app, get("/api/v1/current-config?tenant=acme&agentVersion=viewer-1")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(resp).await["error"]["code"], "no_published_config");
}

#[tokio::test]
async fn test_publish_then_pull() {
    let (app, _) = create_test_app();

    let resp = publish(&app, "acme", manifest("A")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = body_json(resp).await;
    assert_eq!(created["version"], 1);
    assert!(created["publishedAt"].is_string());

    let resp = send(&app, get("/api/v1/current-config?tenant=acme&agentVersion=viewer-1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-config-version"], "1");
    let current = body_json(resp).await;
    assert_eq!(current["version"], 1);
    assert_eq!(current["payload"], manifest("A"));
}

#[tokio::test]
async fn test_known_version_yields_not_modified() {
    let (app, _) = create_test_app();
    publish(&app, "acme", manifest("A")).await;
    publish(&app, "acme", manifest("B")).await;

    let resp = send(&app, get("/api/v1/current-config?tenant=acme&knownVersion=2")).await;
    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(resp.headers()["x-config-version"], "2");

    let resp = send(&app, get("/api/v1/current-config?tenant=acme&knownVersion=1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["version"], 2);
}

#[tokio::test]
async fn test_zstd_response_when_accepted() {
    let (app, _) = create_test_app();
    publish(&app, "acme", manifest("A")).await;

    let req = Request::builder()
        .uri("/api/v1/current-config?tenant=acme&agentVersion=viewer-1")
        .header(header::ACCEPT_ENCODING, "zstd")
        .body(Body::empty())
        .unwrap();
    let resp = send(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_ENCODING], "zstd");

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let decoded = zstd::decode_all(bytes.as_ref()).unwrap();
    let current: Value = serde_json::from_slice(&decoded).unwrap();
    assert_eq!(current["payload"], manifest("A"));
}

#[tokio::test]
async fn test_invalid_manifest_is_422_with_all_violations() {
    let (app, state) = create_test_app();
    publish(&app, "acme", manifest("A")).await;

    let broken = json!({
        "dataSources": [{"id": "sales"}],
        "dashboards": [{"id": "main", "widgets": [
            {"id": "w1", "dataSourceId": "missing-1"},
            {"id": "w2", "dataSourceId": "missing-2"}
        ]}]
    });
    let resp = publish(&app, "acme", broken).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = body_json(resp).await;
    assert_eq!(json["error"]["code"], "validation_error");
    let paths: Vec<&str> = json["error"]["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["path"].as_str().unwrap())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/dashboards/0/widgets/0/dataSourceId",
            "/dashboards/0/widgets/1/dataSourceId"
        ]
    );

    // Latest is unchanged
    let current = state.distribution.fetch_current("acme", "test").await.unwrap();
    assert_eq!(current.version, 1);
}

#[tokio::test]
async fn test_version_history_and_single_version() {
    let (app, _) = create_test_app();
    for title in ["A", "B", "C"] {
        publish(&app, "acme", manifest(title)).await;
    }

    let resp = send(&app, get("/api/v1/tenant/acme/versions?limit=2")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = body_json(resp).await;
    let versions: Vec<i64> = page["versions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["version"].as_i64().unwrap())
        .collect();
    assert_eq!(versions, vec![3, 2]);
    assert_eq!(page["nextBefore"], 2);

    let resp = send(&app, get("/api/v1/tenant/acme/versions?limit=2&before=2")).await;
    let page = body_json(resp).await;
    assert_eq!(page["versions"].as_array().unwrap().len(), 1);
    assert!(page["nextBefore"].is_null());

    let resp = send(&app, get("/api/v1/tenant/acme/versions/2")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let row = body_json(resp).await;
    assert_eq!(row["status"], "published");
    assert_eq!(row["createdBy"], "alice");
    assert_eq!(row["payload"]["title"], "B");

    let resp = send(&app, get("/api/v1/tenant/acme/versions/99")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sync_result_accepted_and_visible_in_health() {
    let (app, _) = create_test_app();
    publish(&app, "acme", manifest("A")).await;
    publish(&app, "acme", manifest("B")).await;

    let reports = [
        json!({"tenant": "acme", "agentId": "kiosk-1", "agentVersion": "viewer-2", "status": "success", "appliedVersion": 2, "durationMs": 40}),
        json!({"tenant": "acme", "agentId": "kiosk-2", "agentVersion": "viewer-2", "status": "success", "appliedVersion": 1, "durationMs": 35}),
        json!({"tenant": "acme", "agentId": "kiosk-3", "agentVersion": "viewer-2", "status": "failure", "durationMs": 12, "errorMessage": "disk full"}),
    ];
    for report in &reports {
        let resp = send(&app, post_json("/api/v1/sync-result", report)).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let json = body_json(resp).await;
        assert_eq!(json["recorded"], true);
        assert!(json["attemptId"].is_i64());
    }

    let resp = send(&app, get("/api/v1/tenant/acme/sync-health")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let health = body_json(resp).await;
    assert_eq!(health["latestPublishedVersion"], 2);
    assert_eq!(health["summary"], json!({"current": 1, "stale": 1, "erroring": 1, "unknown": 0}));
    let states: Vec<(&str, &str)> = health["agents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| (a["agentKey"].as_str().unwrap(), a["state"].as_str().unwrap()))
        .collect();
    assert_eq!(
        states,
        vec![("kiosk-1", "current"), ("kiosk-2", "stale"), ("kiosk-3", "erroring")]
    );

    let resp = send(&app, get("/api/v1/tenant/acme/sync-attempts")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["attempts"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_bad_query_parameters_are_400() {
    let (app, _) = create_test_app();

    let resp = send(&app, get("/api/v1/tenant/acme/sync-health?freshnessSecs=0")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = send(&app, get("/api/v1/tenant/acme/sync-attempts?since=yesterday")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"]["code"], "bad_request");

    let resp = send(&app, get("/api/v1/current-config?tenant=")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_publish_storage_failure_is_503_without_backend_detail() {
    let (app, faulty) = create_faulty_app();

    for flag in [&faulty.append_down, &faulty.mark_published_down] {
        FaultyStore::set(flag, true);
        let resp = publish(&app, "acme", manifest("A")).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "publish_failed");
        assert!(!json.to_string().contains(BACKEND_DETAIL));
        FaultyStore::set(flag, false);
    }

    // The draft stranded by the second failure holds version 1
    let resp = publish(&app, "acme", manifest("A")).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(body_json(resp).await["version"], 2);
}

#[tokio::test]
async fn test_sync_result_is_503_only_when_log_is_down() {
    let (app, faulty) = create_faulty_app();
    let report = json!({"agentVersion": "v", "status": "success", "appliedVersion": 1, "durationMs": 3});

    FaultyStore::set(&faulty.sync_log_down, true);
    let resp = send(&app, post_json("/api/v1/sync-result", &report)).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(resp).await;
    assert_eq!(json["recorded"], false);
    assert!(json.get("attemptId").is_none());

    // Any other store refusal is still acknowledged
    FaultyStore::set(&faulty.sync_log_down, false);
    FaultyStore::set(&faulty.sync_log_rejects, true);
    let resp = send(&app, post_json("/api/v1/sync-result", &report)).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let json = body_json(resp).await;
    assert_eq!(json["recorded"], false);
    assert!(json.get("attemptId").is_none());
}

#[tokio::test]
async fn test_malformed_sync_report_gets_error_envelope() {
    let (app, _) = create_test_app();

    for body in [
        json!({"agentVersion": "v", "status": "error"}),
        json!({"status": "failure"}),
    ] {
        let resp = send(&app, post_json("/api/v1/sync-result", &body)).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["error"]["code"], "bad_request");
        assert!(json["error"]["message"].as_str().unwrap().starts_with("invalid sync report"));
    }

    let req = Request::builder()
        .method("POST")
        .uri("/api/v1/sync-result")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = send(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["error"]["code"], "bad_request");
}
