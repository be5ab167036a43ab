//! Token kinds and sources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::LedgerError;

/// Kind of credit a user can hold.
///
/// Balances and prices never mix across types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Fibb tokens, spent on full photo-set generations
    Fibb,
    /// Enhanced generation tokens
    Enhanced,
    /// Research tokens
    Research,
}

impl TokenType {
    /// All token types, in wallet order.
    pub const ALL: [TokenType; 3] = [TokenType::Fibb, TokenType::Enhanced, TokenType::Research];

    /// Lower-case name used in JSON and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Fibb => "fibb",
            TokenType::Enhanced => "enhanced",
            TokenType::Research => "research",
        }
    }

    /// Capitalised fragment used in backend record field names (`subsFibb`, `paidFibb`).
    pub fn record_key(&self) -> &'static str {
        match self {
            TokenType::Fibb => "Fibb",
            TokenType::Enhanced => "Enhanced",
            TokenType::Research => "Research",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fibb" => Ok(TokenType::Fibb),
            "enhanced" => Ok(TokenType::Enhanced),
            "research" => Ok(TokenType::Research),
            _ => Err(LedgerError::UnknownTokenType(s.to_string())),
        }
    }
}

/// Where a balance came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    /// Granted by an active subscription; replaced every billing cycle
    Monthly,
    /// Bought a-la-carte; kept until consumed
    Purchased,
}

impl TokenSource {
    /// Sources in draw-down order.
    pub const ALL: [TokenSource; 2] = [TokenSource::Monthly, TokenSource::Purchased];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenSource::Monthly => "monthly",
            TokenSource::Purchased => "purchased",
        }
    }

    /// Prefix used in backend record field names.
    pub fn record_prefix(&self) -> &'static str {
        match self {
            TokenSource::Monthly => "subs",
            TokenSource::Purchased => "paid",
        }
    }
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenSource {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monthly" | "subscription" | "subs" => Ok(TokenSource::Monthly),
            "purchased" | "paid" => Ok(TokenSource::Purchased),
            _ => Err(LedgerError::UnknownTokenSource(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_type_parsing() {
        assert_eq!("fibb".parse::<TokenType>().unwrap(), TokenType::Fibb);
        assert_eq!(" Enhanced ".parse::<TokenType>().unwrap(), TokenType::Enhanced);
        assert_eq!("RESEARCH".parse::<TokenType>().unwrap(), TokenType::Research);
    }

    #[test]
    fn test_unknown_token_type_rejected() {
        let err = "gen".parse::<TokenType>().unwrap_err();
        assert_eq!(err, LedgerError::UnknownTokenType("gen".to_string()));
    }

    #[test]
    fn test_token_source_aliases() {
        assert_eq!("subs".parse::<TokenSource>().unwrap(), TokenSource::Monthly);
        assert_eq!("paid".parse::<TokenSource>().unwrap(), TokenSource::Purchased);
        assert!("gift".parse::<TokenSource>().is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&TokenType::Fibb).unwrap(), "\"fibb\"");
        assert_eq!(
            serde_json::from_str::<TokenSource>("\"purchased\"").unwrap(),
            TokenSource::Purchased
        );
    }

    #[test]
    fn test_record_field_names() {
        let field = format!(
            "{}{}",
            TokenSource::Monthly.record_prefix(),
            TokenType::Research.record_key()
        );
        assert_eq!(field, "subsResearch");
    }
}
