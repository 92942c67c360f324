use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value, json};

use super::*;
use crate::config::HttpTimeouts;
use crate::debug::DebugOverrideStore;
use crate::storage::MemoryStore;

#[derive(Clone, Default)]
struct Recorded {
    auth_headers: Arc<Mutex<Vec<String>>>,
    puts: Arc<Mutex<Vec<Value>>>,
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned()
}

async fn profile(State(rec): State<Recorded>, headers: HeaderMap) -> Response {
    let auth = bearer(&headers);
    rec.auth_headers.lock().unwrap().push(auth.clone());
    match auth.as_str() {
        "Bearer good" => Json(json!({
            "first_name": "Jane",
            "last_name": "Doe",
            "role_name": "Advertiser Admin",
            "organization_id": 42
        }))
        .into_response(),
        "Bearer sparse" => Json(json!({ "first_name": "Sam" })).into_response(),
        "Bearer onboarding" => Json(Value::Null).into_response(),
        "Bearer empty" => StatusCode::OK.into_response(),
        "Bearer garbled" => (StatusCode::OK, "{not json").into_response(),
        "Bearer boom" => (StatusCode::INTERNAL_SERVER_ERROR, "database down").into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn put_profile(State(rec): State<Recorded>, Json(body): Json<Value>) -> StatusCode {
    rec.puts.lock().unwrap().push(body);
    StatusCode::NO_CONTENT
}

async fn organization(Path(id): Path<i64>) -> Response {
    if id == 42 {
        Json(json!({ "organization_id": 42, "name": "Acme", "type": "advertiser", "status": "active" })).into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

/// Serve the fake backend on an ephemeral port and return its base URL.
async fn spawn_backend(rec: Recorded) -> String {
    let app = Router::new()
        .route("/profiles/me", get(profile).put(put_profile))
        .route("/organizations/{id}", get(organization))
        .with_state(rec);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(backend_url: &str) -> PortalConfig {
    PortalConfig {
        identity_url: "http://127.0.0.1:1".into(),
        identity_anon_key: "anon".into(),
        backend_url: backend_url.to_owned(),
        timeouts: HttpTimeouts::default(),
        state_file: ".portal-test.json".into(),
    }
}

async fn backend() -> (HttpBackend, Recorded) {
    let rec = Recorded::default();
    let url = spawn_backend(rec.clone()).await;
    (HttpBackend::new(&config(&url)).unwrap(), rec)
}

// =============================================================================
// PROFILE
// =============================================================================

#[tokio::test]
async fn fetch_profile_maps_fields_and_sends_bearer() {
    let (api, rec) = backend().await;
    let profile = api.fetch_profile("good").await.unwrap().unwrap();
    assert_eq!(profile.first_name.as_deref(), Some("Jane"));
    assert_eq!(profile.role_name.as_deref(), Some("Advertiser Admin"));
    assert_eq!(profile.organization_id, Some(42));
    assert_eq!(rec.auth_headers.lock().unwrap().as_slice(), ["Bearer good"]);
}

#[tokio::test]
async fn fetch_profile_defaults_missing_fields() {
    let (api, _) = backend().await;
    let profile = api.fetch_profile("sparse").await.unwrap().unwrap();
    assert_eq!(profile.first_name.as_deref(), Some("Sam"));
    assert_eq!(profile.last_name, None);
    assert_eq!(profile.organization_id, None);
}

#[tokio::test]
async fn null_or_empty_profile_means_onboarding() {
    let (api, _) = backend().await;
    assert_eq!(api.fetch_profile("onboarding").await.unwrap(), None);
    assert_eq!(api.fetch_profile("empty").await.unwrap(), None);
}

#[tokio::test]
async fn fetch_profile_error_mapping() {
    let (api, _) = backend().await;
    assert!(matches!(api.fetch_profile("stranger").await, Err(BackendError::Unauthorized)));
    assert!(matches!(
        api.fetch_profile("boom").await,
        Err(BackendError::Server { status: 500, ref body }) if body == "database down"
    ));
    assert!(matches!(api.fetch_profile("garbled").await, Err(BackendError::Decode(_))));
}

#[tokio::test]
async fn unreachable_backend_is_network_error() {
    let api = HttpBackend::new(&config("http://127.0.0.1:1")).unwrap();
    assert!(matches!(api.fetch_profile("good").await, Err(BackendError::Network(_))));
}

#[tokio::test]
async fn update_profile_puts_json_body() {
    let (api, rec) = backend().await;
    let update = ProfileUpdate { first_name: "Janet".into(), last_name: "Doe".into() };
    api.update_profile("good", &update).await.unwrap();
    assert_eq!(
        rec.puts.lock().unwrap().as_slice(),
        [json!({ "first_name": "Janet", "last_name": "Doe" })]
    );
}

// =============================================================================
// ORGANIZATION
// =============================================================================

#[tokio::test]
async fn fetch_organization_by_id() {
    let (api, _) = backend().await;
    let org = api.fetch_organization("good", 42).await.unwrap();
    assert_eq!(org.name, "Acme");
    assert!(matches!(api.fetch_organization("good", 7).await, Err(BackendError::NotFound)));
}

// =============================================================================
// DEBUG OVERRIDE
// =============================================================================

#[tokio::test]
async fn active_override_redirects_requests() {
    let primary = spawn_backend(Recorded::default()).await;
    let alternate_rec = Recorded::default();
    let alternate = spawn_backend(alternate_rec.clone()).await;

    let overrides = DebugOverrideStore::new(Arc::new(MemoryStore::new()));
    let api = HttpBackend::new(&config(&primary)).unwrap().with_debug_override(overrides.clone());
    assert_eq!(api.base_url(), primary);

    overrides.set_backend_url(&alternate).unwrap();
    assert_eq!(api.base_url(), primary, "URL alone does nothing while disabled");

    overrides.enable().unwrap();
    assert_eq!(api.base_url(), alternate);
    api.fetch_profile("good").await.unwrap();
    assert_eq!(alternate_rec.auth_headers.lock().unwrap().len(), 1);

    overrides.disable().unwrap();
    assert_eq!(api.base_url(), primary);
}
