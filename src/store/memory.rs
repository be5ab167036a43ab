//! In-process wallet store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

use super::{validate_user_id, StoreError, StoreResult, VersionedWallet, WalletStore};
use crate::ledger::TokenWallet;

#[derive(Debug, Clone, Copy)]
struct StoredWallet {
    wallet: TokenWallet,
    version: u64,
}

/// Wallet store held in memory, with the same versioned writes as a remote
/// backend. Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWalletStore {
    inner: Arc<RwLock<HashMap<String, StoredWallet>>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty wallet for a new account. Existing wallets are kept.
    pub fn provision(&self, user_id: &str) -> StoreResult<()> {
        self.insert_if_absent(user_id, TokenWallet::empty())
    }

    /// Seed a wallet at version 0, replacing any existing entry.
    pub fn seed(&self, user_id: &str, wallet: TokenWallet) -> StoreResult<()> {
        let user_id = validate_user_id(user_id)?;
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.insert(user_id.to_string(), StoredWallet { wallet, version: 0 });
        Ok(())
    }

    fn insert_if_absent(&self, user_id: &str, wallet: TokenWallet) -> StoreResult<()> {
        let user_id = validate_user_id(user_id)?;
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.entry(user_id.to_string())
            .or_insert(StoredWallet { wallet, version: 0 });
        Ok(())
    }

    /// Number of stored wallets.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn fetch(&self, user_id: &str) -> StoreResult<VersionedWallet> {
        let user_id = validate_user_id(user_id)?;
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let stored = map
            .get(user_id)
            .ok_or_else(|| StoreError::UnknownUser(user_id.to_string()))?;
        Ok(VersionedWallet::new(stored.wallet, stored.version))
    }

    async fn persist(
        &self,
        user_id: &str,
        wallet: &TokenWallet,
        expected_version: u64,
    ) -> StoreResult<u64> {
        let user_id = validate_user_id(user_id)?;
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let stored = map
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UnknownUser(user_id.to_string()))?;

        if stored.version != expected_version {
            return Err(StoreError::VersionConflict {
                user_id: user_id.to_string(),
                expected: expected_version,
                actual: stored.version,
            });
        }

        stored.wallet = *wallet;
        stored.version += 1;
        debug!(user_id, version = stored.version, "Persisted wallet");
        Ok(stored.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{TokenSource, TokenType};

    #[tokio::test]
    async fn test_provision_and_fetch() {
        let store = InMemoryWalletStore::new();
        store.provision("user-1").unwrap();

        let snapshot = store.fetch("user-1").await.unwrap();
        assert_eq!(snapshot.wallet, TokenWallet::empty());
        assert_eq!(snapshot.version, 0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_poisoned_lock_still_readable() {
        let store = InMemoryWalletStore::new();
        store.provision("user-1").unwrap();

        let inner = Arc::clone(&store.inner);
        let _ = std::thread::spawn(move || {
            let _guard = inner.write().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(store.inner.is_poisoned());
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
        assert!(store.fetch("user-1").await.is_ok());
    }

    #[tokio::test]
    async fn test_provision_keeps_existing_wallet() {
        let store = InMemoryWalletStore::new();
        let wallet = TokenWallet::empty()
            .add_tokens(TokenType::Fibb, TokenSource::Purchased, 3)
            .unwrap();
        store.seed("user-1", wallet).unwrap();
        store.provision("user-1").unwrap();

        assert_eq!(store.fetch("user-1").await.unwrap().wallet, wallet);
    }

    #[tokio::test]
    async fn test_fetch_unknown_user() {
        let store = InMemoryWalletStore::new();
        assert!(matches!(
            store.fetch("nobody").await,
            Err(StoreError::UnknownUser(_))
        ));
    }

    #[tokio::test]
    async fn test_persist_bumps_version() {
        let store = InMemoryWalletStore::new();
        store.provision("user-1").unwrap();
        let wallet = TokenWallet::empty()
            .refill_tokens(TokenType::Research, 20)
            .unwrap();

        let version = store.persist("user-1", &wallet, 0).await.unwrap();
        assert_eq!(version, 1);

        let snapshot = store.fetch("user-1").await.unwrap();
        assert_eq!(snapshot.wallet, wallet);
        assert_eq!(snapshot.version, 1);
    }

    #[tokio::test]
    async fn test_stale_write_rejected() {
        let store = InMemoryWalletStore::new();
        store.provision("user-1").unwrap();
        let first = store.fetch("user-1").await.unwrap();
        let second = store.fetch("user-1").await.unwrap();

        let a = first.wallet.refill_tokens(TokenType::Fibb, 1).unwrap();
        let b = second.wallet.refill_tokens(TokenType::Fibb, 2).unwrap();
        store.persist("user-1", &a, first.version).await.unwrap();

        let err = store
            .persist("user-1", &b, second.version)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 0,
                actual: 1,
                ..
            }
        ));
        assert_eq!(store.fetch("user-1").await.unwrap().wallet, a);
    }

    #[tokio::test]
    async fn test_blank_user_rejected() {
        let store = InMemoryWalletStore::new();
        assert!(matches!(store.provision(""), Err(StoreError::InvalidUserId)));
        assert!(matches!(
            store.fetch(" ").await,
            Err(StoreError::InvalidUserId)
        ));
    }
}
