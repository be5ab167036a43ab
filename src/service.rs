//! Token management service.
//!
//! The service composes the pure ledger with a [`WalletStore`]. It keeps no
//! wallet state of its own: pure methods take a wallet and return a new one,
//! and the `*_and_persist` methods run a fetch, mutate, persist cycle
//! against the store's versioned writes.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::LedgerConfig;
use crate::ledger::{
    LedgerError, LedgerResult, Price, SubscriptionTier, TokenBillingInfo, TokenSource, TokenType,
    TokenWallet,
};
use crate::store::{StoreError, VersionedWallet, WalletStore};

/// Errors from service operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every attempt lost a race with a concurrent writer.
    #[error("Gave up updating wallet for user {user_id} after {attempts} conflicting writes")]
    ConflictRetriesExhausted { user_id: String, attempts: u32 },
}

impl ServiceError {
    /// Whether this is an expected business outcome (see [`LedgerError::is_business_outcome`]).
    pub fn is_business_outcome(&self) -> bool {
        matches!(self, ServiceError::Ledger(e) if e.is_business_outcome())
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Orchestrates wallet fetches, ledger operations and price queries.
#[derive(Debug, Clone)]
pub struct TokenManagementService<S> {
    config: LedgerConfig,
    store: S,
}

impl<S: WalletStore> TokenManagementService<S> {
    pub fn new(config: LedgerConfig, store: S) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch the current wallet of a user.
    pub async fn get_user_tokens(&self, user_id: &str) -> ServiceResult<VersionedWallet> {
        Ok(self.store.fetch(user_id).await?)
    }

    pub fn consume_user_tokens(
        &self,
        wallet: &TokenWallet,
        token_type: TokenType,
        amount: u64,
    ) -> LedgerResult<TokenWallet> {
        let result = wallet.consume_tokens(token_type, amount);
        match &result {
            Ok(next) => debug!(
                %token_type,
                amount,
                remaining = next.total(token_type),
                "Consumed tokens"
            ),
            Err(e) => warn!(%token_type, amount, "Consumption refused: {}", e),
        }
        result
    }

    pub fn reset_user_subscription_tokens(&self, wallet: &TokenWallet) -> TokenWallet {
        debug!("Resetting monthly tokens");
        wallet.reset_subscription_tokens()
    }

    pub fn refill_user_tokens(
        &self,
        wallet: &TokenWallet,
        token_type: TokenType,
        amount: u64,
    ) -> LedgerResult<TokenWallet> {
        debug!(%token_type, amount, "Refilling monthly tokens");
        wallet.refill_tokens(token_type, amount)
    }

    /// Reset monthly tokens and apply this cycle's grants.
    pub fn renew_user_cycle(
        &self,
        wallet: &TokenWallet,
        grants: &[(TokenType, u64)],
    ) -> LedgerResult<TokenWallet> {
        debug!(grants = grants.len(), "Renewing billing cycle");
        wallet.renew_cycle(grants)
    }

    /// Per-pack price, `None` when the tier cannot buy the type.
    pub fn token_price(&self, token_type: TokenType, tier: SubscriptionTier) -> Option<Price> {
        self.config.pricing.get_token_price(token_type, tier)
    }

    /// Cost of buying `quantity` units in whole packs.
    pub fn token_purchase_cost(
        &self,
        token_type: TokenType,
        quantity: u64,
        tier: SubscriptionTier,
    ) -> Option<Price> {
        self.config
            .pricing
            .calculate_token_cost(token_type, quantity, tier)
    }

    pub fn billing_info(&self) -> &TokenBillingInfo {
        &self.config.pricing
    }

    /// Consume tokens from the stored wallet.
    ///
    /// Insufficient balance is returned without writing anything.
    pub async fn consume_and_persist(
        &self,
        user_id: &str,
        token_type: TokenType,
        amount: u64,
    ) -> ServiceResult<VersionedWallet> {
        self.update_and_persist(user_id, |wallet| {
            self.consume_user_tokens(wallet, token_type, amount)
        })
        .await
    }

    /// Credit tokens to one cell of the stored wallet, e.g. after a checkout.
    pub async fn add_and_persist(
        &self,
        user_id: &str,
        token_type: TokenType,
        source: TokenSource,
        amount: u64,
    ) -> ServiceResult<VersionedWallet> {
        self.update_and_persist(user_id, |wallet| {
            wallet.add_tokens(token_type, source, amount)
        })
        .await
    }

    /// Run the billing-cycle renewal against the stored wallet.
    pub async fn renew_and_persist(
        &self,
        user_id: &str,
        grants: &[(TokenType, u64)],
    ) -> ServiceResult<VersionedWallet> {
        self.update_and_persist(user_id, |wallet| self.renew_user_cycle(wallet, grants))
            .await
    }

    /// Apply `op` to the stored wallet with a versioned write.
    ///
    /// On a version conflict the wallet is fetched again and `op` re-run, at
    /// most `max_conflict_retries` extra times. Ledger errors from `op` end
    /// the call immediately.
    pub async fn update_and_persist<F>(&self, user_id: &str, op: F) -> ServiceResult<VersionedWallet>
    where
        F: Fn(&TokenWallet) -> LedgerResult<TokenWallet> + Send + Sync,
    {
        let attempts = self.config.max_conflict_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let snapshot = self.store.fetch(user_id).await?;
            let next = op(&snapshot.wallet)?;

            match self.store.persist(user_id, &next, snapshot.version).await {
                Ok(version) => {
                    info!(user_id, version, attempt, "Wallet updated");
                    return Ok(VersionedWallet::new(next, version));
                }
                Err(StoreError::VersionConflict { expected, actual, .. }) => {
                    let snapshot_age_ms = snapshot.age().num_milliseconds();
                    warn!(
                        user_id,
                        expected,
                        actual,
                        attempt,
                        snapshot_age_ms,
                        "Concurrent wallet update, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::ConflictRetriesExhausted {
            user_id: user_id.to_string(),
            attempts,
        })
    }
}
