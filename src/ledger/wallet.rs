//! Token wallet and its pure operations.
//!
//! Every operation borrows the wallet and returns a new value, so a failed
//! call can never leave a half-applied balance behind.

use serde::{Deserialize, Serialize};

use super::error::{LedgerError, LedgerResult};
use super::types::{TokenSource, TokenType};

/// Balances of one token type, split by source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBalance {
    /// Subscription-granted tokens, lost at the next reset
    pub monthly: u64,
    /// Purchased tokens, kept until consumed
    pub purchased: u64,
}

impl SourceBalance {
    pub fn new(monthly: u64, purchased: u64) -> Self {
        Self { monthly, purchased }
    }

    /// Get the balance for a source.
    pub fn get(&self, source: TokenSource) -> u64 {
        match source {
            TokenSource::Monthly => self.monthly,
            TokenSource::Purchased => self.purchased,
        }
    }

    fn get_mut(&mut self, source: TokenSource) -> &mut u64 {
        match source {
            TokenSource::Monthly => &mut self.monthly,
            TokenSource::Purchased => &mut self.purchased,
        }
    }

    /// Total across both sources, saturating at `u64::MAX`.
    pub fn total(&self) -> u64 {
        self.monthly.saturating_add(self.purchased)
    }
}

/// How a consumption is split across sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drawdown {
    pub token_type: TokenType,
    /// Taken from the monthly balance
    pub from_monthly: u64,
    /// Taken from the purchased balance
    pub from_purchased: u64,
}

impl Drawdown {
    pub fn total(&self) -> u64 {
        self.from_monthly + self.from_purchased
    }
}

/// Per-user balances of every token type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenWallet {
    pub fibb: SourceBalance,
    pub enhanced: SourceBalance,
    pub research: SourceBalance,
}

impl TokenWallet {
    /// Create the all-zero wallet a new account starts with.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get the balances for a token type.
    pub fn balance(&self, token_type: TokenType) -> &SourceBalance {
        match token_type {
            TokenType::Fibb => &self.fibb,
            TokenType::Enhanced => &self.enhanced,
            TokenType::Research => &self.research,
        }
    }

    fn balance_mut(&mut self, token_type: TokenType) -> &mut SourceBalance {
        match token_type {
            TokenType::Fibb => &mut self.fibb,
            TokenType::Enhanced => &mut self.enhanced,
            TokenType::Research => &mut self.research,
        }
    }

    /// Get a single (type, source) cell.
    pub fn get(&self, token_type: TokenType, source: TokenSource) -> u64 {
        self.balance(token_type).get(source)
    }

    /// Total balance of a token type.
    pub fn total(&self, token_type: TokenType) -> u64 {
        self.balance(token_type).total()
    }

    /// Total balance across all token types.
    pub fn grand_total(&self) -> u64 {
        TokenType::ALL
            .iter()
            .fold(0u64, |sum, t| sum.saturating_add(self.total(*t)))
    }

    /// Whether every cell is zero.
    pub fn is_empty(&self) -> bool {
        self.grand_total() == 0
    }

    /// Add tokens to one (type, source) cell.
    pub fn add_tokens(
        &self,
        token_type: TokenType,
        source: TokenSource,
        amount: u64,
    ) -> LedgerResult<TokenWallet> {
        let mut next = *self;
        let cell = next.balance_mut(token_type).get_mut(source);
        *cell = cell
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow { token_type, amount })?;
        Ok(next)
    }

    /// Work out how a consumption would be split without applying it.
    ///
    /// Monthly tokens are exhausted before purchased tokens are touched.
    pub fn plan_consumption(&self, token_type: TokenType, amount: u64) -> LedgerResult<Drawdown> {
        let balance = self.balance(token_type);
        let available = balance.total();
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                token_type,
                requested: amount,
                available,
            });
        }

        let from_monthly = amount.min(balance.monthly);
        Ok(Drawdown {
            token_type,
            from_monthly,
            from_purchased: amount - from_monthly,
        })
    }

    /// Apply a drawdown produced by [`TokenWallet::plan_consumption`].
    fn apply(&self, drawdown: &Drawdown) -> TokenWallet {
        let mut next = *self;
        let balance = next.balance_mut(drawdown.token_type);
        balance.monthly -= drawdown.from_monthly;
        balance.purchased -= drawdown.from_purchased;
        next
    }

    /// Consume tokens of one type, monthly first.
    ///
    /// Fails with [`LedgerError::InsufficientBalance`] when the combined
    /// balance is too small; `self` is never modified.
    pub fn consume_tokens(&self, token_type: TokenType, amount: u64) -> LedgerResult<TokenWallet> {
        let drawdown = self.plan_consumption(token_type, amount)?;
        Ok(self.apply(&drawdown))
    }

    /// Zero every monthly balance. Purchased balances are untouched.
    pub fn reset_subscription_tokens(&self) -> TokenWallet {
        let mut next = *self;
        for token_type in TokenType::ALL {
            next.balance_mut(token_type).monthly = 0;
        }
        next
    }

    /// Credit a fresh subscription grant to the monthly balance.
    pub fn refill_tokens(&self, token_type: TokenType, amount: u64) -> LedgerResult<TokenWallet> {
        self.add_tokens(token_type, TokenSource::Monthly, amount)
    }

    /// Billing-cycle boundary: reset monthly balances, then apply each grant.
    pub fn renew_cycle(&self, grants: &[(TokenType, u64)]) -> LedgerResult<TokenWallet> {
        grants
            .iter()
            .try_fold(self.reset_subscription_tokens(), |wallet, (token_type, amount)| {
                wallet.refill_tokens(*token_type, *amount)
            })
    }
}
