//! Token pack pricing by subscription tier.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::error::{LedgerError, LedgerResult};
use super::types::TokenType;

/// Subscription tier, ordered from lowest to highest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Basic,
    Starter,
    Standard,
    Pro,
}

impl SubscriptionTier {
    pub const ALL: [SubscriptionTier; 4] = [
        SubscriptionTier::Basic,
        SubscriptionTier::Starter,
        SubscriptionTier::Standard,
        SubscriptionTier::Pro,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Basic => "Basic",
            SubscriptionTier::Starter => "Starter",
            SubscriptionTier::Standard => "Standard",
            SubscriptionTier::Pro => "Pro",
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(SubscriptionTier::Basic),
            "starter" => Ok(SubscriptionTier::Starter),
            "standard" => Ok(SubscriptionTier::Standard),
            "pro" => Ok(SubscriptionTier::Pro),
            _ => Err(LedgerError::UnknownTier(s.to_string())),
        }
    }
}

/// An amount of money in cents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub fn cents(&self) -> u64 {
        self.0
    }

    /// Multiply by a number of packs, `None` on overflow.
    pub fn checked_mul(&self, packs: u64) -> Option<Price> {
        self.0.checked_mul(packs).map(Price)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Billing details for one token type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Display name of the pack
    pub name: String,
    /// Units sold per pack
    pub pack_size: u64,
    /// Price per pack by tier; missing tiers cannot buy this type
    pub pricing: BTreeMap<SubscriptionTier, Price>,
}

impl TokenInfo {
    pub fn new(name: impl Into<String>, pack_size: u64) -> Self {
        Self {
            name: name.into(),
            pack_size,
            pricing: BTreeMap::new(),
        }
    }

    /// Set the per-pack price for a tier.
    pub fn with_price(mut self, tier: SubscriptionTier, price: Price) -> Self {
        self.pricing.insert(tier, price);
        self
    }

    /// Per-pack price for a tier. Zero prices count as unconfigured.
    pub fn price_for(&self, tier: SubscriptionTier) -> Option<Price> {
        self.pricing.get(&tier).copied().filter(|p| p.cents() > 0)
    }

    /// Number of packs needed to cover `quantity` units, rounding up.
    pub fn packs_for(&self, quantity: u64) -> u64 {
        quantity.div_ceil(self.pack_size.max(1))
    }
}

/// Static pricing table covering every token type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenBillingInfo {
    tokens: BTreeMap<TokenType, TokenInfo>,
}

impl Default for TokenBillingInfo {
    fn default() -> Self {
        use SubscriptionTier::*;

        let enhanced = TokenInfo::new("Enhanced Token Pack", 10)
            .with_price(Basic, Price::from_cents(499))
            .with_price(Starter, Price::from_cents(399))
            .with_price(Standard, Price::from_cents(299))
            .with_price(Pro, Price::from_cents(199));
        let research = TokenInfo::new("Research Token Pack", 20)
            .with_price(Basic, Price::from_cents(499))
            .with_price(Starter, Price::from_cents(399))
            .with_price(Standard, Price::from_cents(299))
            .with_price(Pro, Price::from_cents(199));
        // No Basic price: Basic subscribers cannot buy Fibb tokens
        let fibb = TokenInfo::new("Fibb Token", 1)
            .with_price(Starter, Price::from_cents(1500))
            .with_price(Standard, Price::from_cents(1000))
            .with_price(Pro, Price::from_cents(500));

        let tokens = BTreeMap::from([
            (TokenType::Enhanced, enhanced),
            (TokenType::Research, research),
            (TokenType::Fibb, fibb),
        ]);
        Self { tokens }
    }
}

impl TokenBillingInfo {
    /// Build a table from explicit entries, validating it.
    pub fn new(tokens: BTreeMap<TokenType, TokenInfo>) -> LedgerResult<Self> {
        let table = Self { tokens };
        table.validate()?;
        Ok(table)
    }

    /// Check that every token type is priced and every pack holds at least one unit.
    pub fn validate(&self) -> LedgerResult<()> {
        for token_type in TokenType::ALL {
            let info = self.tokens.get(&token_type).ok_or_else(|| {
                LedgerError::InvalidBillingTable(format!("missing entry for {}", token_type))
            })?;
            if info.pack_size == 0 {
                return Err(LedgerError::InvalidBillingTable(format!(
                    "pack size for {} must be at least 1",
                    token_type
                )));
            }
        }
        Ok(())
    }

    /// Billing details for a token type.
    pub fn info(&self, token_type: TokenType) -> Option<&TokenInfo> {
        self.tokens.get(&token_type)
    }

    /// Iterate over all entries in token type order.
    pub fn iter(&self) -> impl Iterator<Item = (&TokenType, &TokenInfo)> {
        self.tokens.iter()
    }

    /// Per-pack price of a token type at a tier, `None` when unavailable.
    pub fn get_token_price(&self, token_type: TokenType, tier: SubscriptionTier) -> Option<Price> {
        self.info(token_type)?.price_for(tier)
    }

    /// Packs needed to buy `quantity` units of a token type.
    pub fn packs_for(&self, token_type: TokenType, quantity: u64) -> Option<u64> {
        self.info(token_type).map(|info| info.packs_for(quantity))
    }

    /// Cost of buying `quantity` units, billed in whole packs.
    ///
    /// `None` when the tier cannot buy the type, or the total does not fit.
    pub fn calculate_token_cost(
        &self,
        token_type: TokenType,
        quantity: u64,
        tier: SubscriptionTier,
    ) -> Option<Price> {
        let info = self.info(token_type)?;
        let unit_price = info.price_for(tier)?;
        unit_price.checked_mul(info.packs_for(quantity))
    }

    /// Like [`TokenBillingInfo::get_token_price`], as an error for `?` callers.
    pub fn require_token_price(
        &self,
        token_type: TokenType,
        tier: SubscriptionTier,
    ) -> LedgerResult<Price> {
        self.get_token_price(token_type, tier)
            .ok_or(LedgerError::PriceUnavailable { token_type, tier })
    }

    /// Like [`TokenBillingInfo::calculate_token_cost`], as an error for `?` callers.
    pub fn require_token_cost(
        &self,
        token_type: TokenType,
        quantity: u64,
        tier: SubscriptionTier,
    ) -> LedgerResult<Price> {
        self.calculate_token_cost(token_type, quantity, tier)
            .ok_or(LedgerError::PriceUnavailable { token_type, tier })
    }
}
