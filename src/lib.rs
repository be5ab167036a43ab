//! Token wallet ledger for Fibb.
//!
//! Users hold typed credits ([`ledger::TokenType`]) from two sources:
//! monthly subscription grants and a-la-carte purchases. This crate provides
//! the pure accounting rules in [`ledger`], a persistence seam in [`store`],
//! and the [`service::TokenManagementService`] that ties them together.

pub mod config;
pub mod ledger;
pub mod logging;
pub mod service;
pub mod store;

pub use config::{ConfigError, LedgerConfig};
pub use ledger::{
    LedgerError, LedgerResult, Price, SourceBalance, SubscriptionTier, TokenBillingInfo,
    TokenSource, TokenType, TokenWallet,
};
pub use service::{ServiceError, ServiceResult, TokenManagementService};
pub use store::{
    HttpWalletStore, InMemoryWalletStore, StoreError, StoreResult, VersionedWallet, WalletStore,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
