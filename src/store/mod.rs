//! Wallet persistence.
//!
//! The canonical wallet lives in an external store. Callers fetch a
//! [`VersionedWallet`], apply pure ledger operations, and write the result
//! back with the version they read. A write against a stale version fails
//! with [`StoreError::VersionConflict`] instead of silently overwriting a
//! concurrent update.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::{SnapshotError, TokenWallet};

pub use http::HttpWalletStore;
pub use memory::InMemoryWalletStore;

/// Errors that can occur while fetching or persisting wallets.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Blank or otherwise unusable user identifier.
    #[error("Invalid user ID")]
    InvalidUserId,

    #[error("No wallet found for user {0}")]
    UnknownUser(String),

    /// The stored wallet changed since it was read.
    #[error("Version conflict for user {user_id}: expected {expected}, found {actual}")]
    VersionConflict {
        user_id: String,
        expected: u64,
        actual: u64,
    },

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid wallet snapshot: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A wallet snapshot together with the version it was read at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedWallet {
    pub wallet: TokenWallet,
    pub version: u64,
    pub fetched_at: DateTime<Utc>,
}

impl VersionedWallet {
    pub fn new(wallet: TokenWallet, version: u64) -> Self {
        Self {
            wallet,
            version,
            fetched_at: Utc::now(),
        }
    }

    /// Time elapsed since the snapshot was read.
    pub fn age(&self) -> Duration {
        Utc::now() - self.fetched_at
    }
}

/// Persistence backend for wallets.
#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Fetch the current wallet of a user.
    async fn fetch(&self, user_id: &str) -> StoreResult<VersionedWallet>;

    /// Replace the stored wallet if it is still at `expected_version`.
    ///
    /// Returns the new version on success.
    async fn persist(
        &self,
        user_id: &str,
        wallet: &TokenWallet,
        expected_version: u64,
    ) -> StoreResult<u64>;
}

/// Reject blank user identifiers before they reach a backend.
pub(crate) fn validate_user_id(user_id: &str) -> StoreResult<&str> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidUserId);
    }
    Ok(trimmed)
}
