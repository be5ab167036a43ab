//! Wallet store backed by the managed backend functions.
//!
//! Endpoints, relative to the configured API endpoint:
//!
//! - `POST /getTokens` with `{"userId": ...}` returns the flat token record,
//!   optionally with a `version` field.
//! - `POST /putTokens` with `{"userId", "expectedVersion", "tokens"}` returns
//!   `{"version": n}`, or `409` with the current `version` when stale.
//!
//! Responses may arrive wrapped in a gateway envelope whose `body` is a JSON
//! string; the envelope is unwrapped before validation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::{validate_user_id, StoreError, StoreResult, VersionedWallet, WalletStore};
use crate::config::LedgerConfig;
use crate::ledger::{parse_version, parse_wallet, SnapshotError, TokenWallet, UserTokens};

const FETCH_PATH: &str = "getTokens";
const PERSIST_PATH: &str = "putTokens";

/// HTTP client for the wallet backend.
#[derive(Debug, Clone)]
pub struct HttpWalletStore {
    client: Client,
    endpoint: String,
    access_token: Option<String>,
}

impl HttpWalletStore {
    /// Build a store from ledger configuration.
    pub fn new(config: &LedgerConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let store = Self::with_client(client, &config.api_endpoint);
        Ok(match &config.access_token {
            Some(token) => store.with_access_token(token),
            None => store,
        })
    }

    /// Build a store around an existing client.
    pub fn with_client(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    async fn post(&self, path: &str, body: &Value) -> StoreResult<(StatusCode, String)> {
        let mut request = self.client.post(self.url(path)).json(body);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }
}

/// Version reported by a successful write. Unlike reads, it is required.
fn persisted_version(text: &str) -> StoreResult<u64> {
    let value = parse_body(text)?;
    match value.get("version") {
        None | Some(Value::Null) => Err(SnapshotError::MissingField("version".to_string()).into()),
        Some(_) => Ok(parse_version(&value)?),
    }
}

/// Parse a response body, unwrapping a gateway envelope if present.
fn parse_body(text: &str) -> StoreResult<Value> {
    let value: Value = serde_json::from_str(text)?;
    match value.get("body") {
        Some(Value::String(inner)) => Ok(serde_json::from_str(inner)?),
        _ => Ok(value),
    }
}

#[async_trait]
impl WalletStore for HttpWalletStore {
    async fn fetch(&self, user_id: &str) -> StoreResult<VersionedWallet> {
        let user_id = validate_user_id(user_id)?;
        let (status, text) = self.post(FETCH_PATH, &json!({ "userId": user_id })).await?;

        match status {
            StatusCode::NOT_FOUND => return Err(StoreError::UnknownUser(user_id.to_string())),
            s if !s.is_success() => {
                return Err(StoreError::Backend {
                    status: s.as_u16(),
                    body: text,
                })
            }
            _ => {}
        }

        let value = parse_body(&text)?;
        let wallet = parse_wallet(&value)?;
        let version = parse_version(&value)?;
        debug!(user_id, version, "Fetched wallet");
        Ok(VersionedWallet::new(wallet, version))
    }

    async fn persist(
        &self,
        user_id: &str,
        wallet: &TokenWallet,
        expected_version: u64,
    ) -> StoreResult<u64> {
        let user_id = validate_user_id(user_id)?;
        let body = json!({
            "userId": user_id,
            "expectedVersion": expected_version,
            "tokens": UserTokens::from(wallet),
        });
        let (status, text) = self.post(PERSIST_PATH, &body).await?;

        match status {
            StatusCode::NOT_FOUND => Err(StoreError::UnknownUser(user_id.to_string())),
            StatusCode::CONFLICT => {
                let actual = parse_body(&text).ok().and_then(|v| parse_version(&v).ok());
                match actual {
                    Some(actual) => {
                        warn!(user_id, expected_version, actual, "Stale wallet write");
                        Err(StoreError::VersionConflict {
                            user_id: user_id.to_string(),
                            expected: expected_version,
                            actual,
                        })
                    }
                    None => Err(StoreError::Backend {
                        status: status.as_u16(),
                        body: text,
                    }),
                }
            }
            s if !s.is_success() => Err(StoreError::Backend {
                status: s.as_u16(),
                body: text,
            }),
            _ => {
                let version = persisted_version(&text)?;
                debug!(user_id, version, "Persisted wallet");
                Ok(version)
            }
        }
    }
}
