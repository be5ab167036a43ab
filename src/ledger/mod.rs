//! Token ledger for Fibb users.
//!
//! This module holds the pure accounting core: typed token balances, the
//! draw-down policy, billing-cycle resets and pack pricing. It performs no
//! I/O; callers fetch a wallet, apply operations and persist the result.
//!
//! # Overview
//!
//! The ledger consists of:
//! - **TokenType / TokenSource**: the closed sets of credit kinds and origins
//! - **TokenWallet**: per-type balances split into monthly and purchased
//! - **TokenBillingInfo**: pack sizes and per-tier pack prices
//! - **parse_wallet**: validation of externally fetched snapshots
//!
//! # Example
//!
//! ```
//! use fibb_ledger::ledger::{SubscriptionTier, TokenBillingInfo, TokenSource, TokenType, TokenWallet};
//!
//! let wallet = TokenWallet::empty()
//!     .add_tokens(TokenType::Fibb, TokenSource::Monthly, 5)?
//!     .add_tokens(TokenType::Fibb, TokenSource::Purchased, 10)?;
//!
//! // Monthly tokens are spent first
//! let wallet = wallet.consume_tokens(TokenType::Fibb, 7)?;
//! assert_eq!(wallet.fibb.monthly, 0);
//! assert_eq!(wallet.fibb.purchased, 8);
//!
//! let billing = TokenBillingInfo::default();
//! assert!(billing.get_token_price(TokenType::Fibb, SubscriptionTier::Basic).is_none());
//! # Ok::<(), fibb_ledger::ledger::LedgerError>(())
//! ```

mod error;
mod pricing;
mod snapshot;
mod types;
mod wallet;

pub use error::{LedgerError, LedgerResult};
pub use pricing::{Price, SubscriptionTier, TokenBillingInfo, TokenInfo};
pub use snapshot::{
    detect_shape, parse_version, parse_wallet, parse_wallet_str, SnapshotError, SnapshotShape,
    UserTokens,
};
pub use types::{TokenSource, TokenType};
pub use wallet::{Drawdown, SourceBalance, TokenWallet};
