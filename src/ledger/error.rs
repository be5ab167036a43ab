//! Ledger error types.

use thiserror::Error;

use super::pricing::SubscriptionTier;
use super::types::TokenType;

/// Errors produced by wallet operations and pricing lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Combined monthly and purchased balance is below the requested amount.
    #[error("Insufficient {token_type} tokens: requested {requested}, available {available}")]
    InsufficientBalance {
        token_type: TokenType,
        requested: u64,
        available: u64,
    },

    /// The tier cannot purchase this token type.
    #[error("No {token_type} price configured for the {tier} tier")]
    PriceUnavailable {
        token_type: TokenType,
        tier: SubscriptionTier,
    },

    /// Adding to a balance cell would overflow.
    #[error("Adding {amount} to {token_type} would overflow the balance")]
    BalanceOverflow { token_type: TokenType, amount: u64 },

    #[error("Unknown token type: {0}")]
    UnknownTokenType(String),

    #[error("Unknown token source: {0}")]
    UnknownTokenSource(String),

    #[error("Unknown subscription tier: {0}")]
    UnknownTier(String),

    /// A billing table failed validation.
    #[error("Invalid billing table: {0}")]
    InvalidBillingTable(String),
}

impl LedgerError {
    /// Whether this is an expected business outcome rather than a caller bug.
    ///
    /// Insufficient balance and unavailable prices are surfaced to the user;
    /// everything else indicates malformed input.
    pub fn is_business_outcome(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientBalance { .. } | LedgerError::PriceUnavailable { .. }
        )
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
