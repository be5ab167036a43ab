//! `HttpWalletStore` against a local fake of the backend functions.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use fibb_ledger::ledger::SourceBalance;
use fibb_ledger::{
    HttpWalletStore, LedgerConfig, StoreError, TokenManagementService, TokenType, WalletStore,
};

const USER_ID: &str = "user-1";
const ACCESS_TOKEN: &str = "test-token";

#[derive(Clone)]
struct Backend {
    record: Arc<Mutex<(Value, u64)>>,
    /// Wrap responses in a gateway envelope with a string `body`
    envelope: bool,
}

impl Backend {
    fn new(envelope: bool) -> Self {
        let record = json!({
            "fibbTokens": 15,
            "enhancedTokens": 0,
            "researchTokens": 0,
            "subsFibb": 5,
            "paidFibb": 10,
            "subsEnhanced": 0,
            "paidEnhanced": 0,
            "subsResearch": 0,
            "paidResearch": 0
        });
        Self {
            record: Arc::new(Mutex::new((record, 0))),
            envelope,
        }
    }

    fn reply(&self, status: StatusCode, body: Value) -> (StatusCode, Json<Value>) {
        if self.envelope {
            let wrapped = json!({ "statusCode": status.as_u16(), "body": body.to_string() });
            (status, Json(wrapped))
        } else {
            (status, Json(body))
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", ACCESS_TOKEN))
        .unwrap_or(false)
}

async fn get_tokens(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }
    if body["userId"] != USER_ID {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "no such user"})));
    }
    let (record, version) = backend.record.lock().unwrap().clone();
    let mut response = record;
    response["version"] = json!(version);
    backend.reply(StatusCode::OK, response)
}

async fn put_tokens(
    State(backend): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized"})));
    }
    let mut guard = backend.record.lock().unwrap();
    let current = guard.1;
    if body["expectedVersion"] != json!(current) {
        return backend.reply(StatusCode::CONFLICT, json!({ "version": current }));
    }
    *guard = (body["tokens"].clone(), current + 1);
    backend.reply(StatusCode::OK, json!({ "version": current + 1 }))
}

async fn spawn_backend(backend: Backend) -> String {
    let app = Router::new()
        .route("/api/getTokens", post(get_tokens))
        .route("/api/putTokens", post(put_tokens))
        .with_state(backend);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

fn config_for(endpoint: &str) -> LedgerConfig {
    LedgerConfig::default()
        .with_api_endpoint(endpoint)
        .with_access_token(ACCESS_TOKEN)
        .with_request_timeout_secs(5)
}

#[tokio::test]
async fn test_fetch_parses_flat_record() {
    let endpoint = spawn_backend(Backend::new(false)).await;
    let store = HttpWalletStore::new(&config_for(&endpoint)).unwrap();

    let snapshot = store.fetch(USER_ID).await.unwrap();
    assert_eq!(snapshot.wallet.fibb, SourceBalance::new(5, 10));
    assert_eq!(snapshot.version, 0);
}

#[tokio::test]
async fn test_fetch_unwraps_envelope() {
    let endpoint = spawn_backend(Backend::new(true)).await;
    let store = HttpWalletStore::new(&config_for(&endpoint)).unwrap();

    let snapshot = store.fetch(USER_ID).await.unwrap();
    assert_eq!(snapshot.wallet.total(TokenType::Fibb), 15);
}

#[tokio::test]
async fn test_fetch_unknown_user() {
    let endpoint = spawn_backend(Backend::new(false)).await;
    let store = HttpWalletStore::new(&config_for(&endpoint)).unwrap();

    let err = store.fetch("someone-else").await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownUser(_)));
}

#[tokio::test]
async fn test_missing_token_is_backend_error() {
    let endpoint = spawn_backend(Backend::new(false)).await;
    let config = LedgerConfig::default().with_api_endpoint(&endpoint);
    let store = HttpWalletStore::new(&config).unwrap();

    let err = store.fetch(USER_ID).await.unwrap_err();
    assert!(matches!(err, StoreError::Backend { status: 401, .. }));
}

#[tokio::test]
async fn test_stale_persist_is_conflict() {
    let endpoint = spawn_backend(Backend::new(false)).await;
    let store = HttpWalletStore::new(&config_for(&endpoint)).unwrap();

    let snapshot = store.fetch(USER_ID).await.unwrap();
    let next = snapshot.wallet.consume_tokens(TokenType::Fibb, 1).unwrap();
    assert_eq!(store.persist(USER_ID, &next, 0).await.unwrap(), 1);

    let err = store.persist(USER_ID, &next, 0).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::VersionConflict {
            expected: 0,
            actual: 1,
            ..
        }
    ));
}

#[tokio::test]
async fn test_service_consumes_over_http() {
    let backend = Backend::new(true);
    let endpoint = spawn_backend(backend.clone()).await;
    let config = config_for(&endpoint);
    let store = HttpWalletStore::new(&config).unwrap();
    let service = TokenManagementService::new(config, store);

    let updated = service
        .consume_and_persist(USER_ID, TokenType::Fibb, 7)
        .await
        .unwrap();
    assert_eq!(updated.wallet.fibb, SourceBalance::new(0, 8));
    assert_eq!(updated.version, 1);

    let (record, version) = backend.record.lock().unwrap().clone();
    assert_eq!(version, 1);
    assert_eq!(record["subsFibb"], 0);
    assert_eq!(record["paidFibb"], 8);
    assert_eq!(record["fibbTokens"], 8);

    let err = service
        .consume_and_persist(USER_ID, TokenType::Fibb, 100)
        .await
        .unwrap_err();
    assert!(err.is_business_outcome());
}
