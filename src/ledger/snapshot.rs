//! Parsing of externally fetched wallet snapshots.
//!
//! The backend functions return one of two shapes:
//!
//! - **Flat record**: `{"subsFibb": 5, "paidFibb": 10, "subsEnhanced": 0, ...}`,
//!   optionally with derived totals (`fibbTokens`, ...) which are ignored on
//!   input and recomputed on output.
//! - **Nested wallet**: `{"fibb": {"monthly": 5, "purchased": 10}, ...}`.
//!
//! Nothing is trusted implicitly: every balance field must be present and
//! hold a non-negative integer, and errors name the offending field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{TokenSource, TokenType};
use super::wallet::{SourceBalance, TokenWallet};

/// Errors from parsing an external wallet snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Malformed JSON: {0}")]
    Malformed(String),

    #[error("Expected a JSON object at {0}")]
    NotAnObject(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Field {field} is not a whole number: {value}")]
    InvalidField { field: String, value: String },

    #[error("Field {field} is negative: {value}")]
    NegativeAmount { field: String, value: i64 },

    /// Neither the flat record nor the nested wallet shape matched.
    #[error("Unrecognized wallet snapshot shape")]
    UnrecognizedShape,
}

/// Flat per-user token record as stored by the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTokens {
    pub fibb_tokens: u64,
    pub enhanced_tokens: u64,
    pub research_tokens: u64,
    pub paid_fibb: u64,
    pub subs_fibb: u64,
    pub paid_enhanced: u64,
    pub subs_enhanced: u64,
    pub paid_research: u64,
    pub subs_research: u64,
}

impl From<&TokenWallet> for UserTokens {
    fn from(wallet: &TokenWallet) -> Self {
        Self {
            fibb_tokens: wallet.total(TokenType::Fibb),
            enhanced_tokens: wallet.total(TokenType::Enhanced),
            research_tokens: wallet.total(TokenType::Research),
            paid_fibb: wallet.fibb.purchased,
            subs_fibb: wallet.fibb.monthly,
            paid_enhanced: wallet.enhanced.purchased,
            subs_enhanced: wallet.enhanced.monthly,
            paid_research: wallet.research.purchased,
            subs_research: wallet.research.monthly,
        }
    }
}

impl From<&UserTokens> for TokenWallet {
    /// The derived totals on the record are ignored.
    fn from(tokens: &UserTokens) -> Self {
        TokenWallet {
            fibb: SourceBalance::new(tokens.subs_fibb, tokens.paid_fibb),
            enhanced: SourceBalance::new(tokens.subs_enhanced, tokens.paid_enhanced),
            research: SourceBalance::new(tokens.subs_research, tokens.paid_research),
        }
    }
}

/// Which of the two snapshot shapes a document uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotShape {
    /// Backend record with `subs*` / `paid*` fields
    Flat,
    /// `{type: {monthly, purchased}}`
    Nested,
}

/// Detect the shape of a snapshot without validating its fields.
pub fn detect_shape(value: &Value) -> Result<SnapshotShape, SnapshotError> {
    let object = value
        .as_object()
        .ok_or_else(|| SnapshotError::NotAnObject("$".to_string()))?;

    if is_flat_record(object) {
        Ok(SnapshotShape::Flat)
    } else if is_nested_wallet(object) {
        Ok(SnapshotShape::Nested)
    } else {
        Err(SnapshotError::UnrecognizedShape)
    }
}

/// Parse a wallet from either backend shape.
pub fn parse_wallet(value: &Value) -> Result<TokenWallet, SnapshotError> {
    let shape = detect_shape(value)?;
    let object = value
        .as_object()
        .ok_or_else(|| SnapshotError::NotAnObject("$".to_string()))?;

    match shape {
        SnapshotShape::Flat => parse_flat(object),
        SnapshotShape::Nested => parse_nested(object),
    }
}

/// Parse a wallet from a JSON string.
pub fn parse_wallet_str(input: &str) -> Result<TokenWallet, SnapshotError> {
    let value: Value = serde_json::from_str(input).map_err(|e| SnapshotError::Malformed(e.to_string()))?;
    parse_wallet(&value)
}

/// Read the optional `version` field next to a snapshot (0 when absent).
pub fn parse_version(value: &Value) -> Result<u64, SnapshotError> {
    match value.get("version") {
        None | Some(Value::Null) => Ok(0),
        Some(v) => read_amount("version", v),
    }
}

fn flat_field(token_type: TokenType, source: TokenSource) -> String {
    format!("{}{}", source.record_prefix(), token_type.record_key())
}

fn is_flat_record(object: &Map<String, Value>) -> bool {
    object.keys().any(|key| {
        TokenType::ALL.iter().any(|t| {
            TokenSource::ALL
                .iter()
                .any(|s| *key == flat_field(*t, *s))
        })
    })
}

fn is_nested_wallet(object: &Map<String, Value>) -> bool {
    TokenType::ALL
        .iter()
        .any(|t| object.contains_key(t.as_str()))
}

fn parse_flat(object: &Map<String, Value>) -> Result<TokenWallet, SnapshotError> {
    let mut wallet = TokenWallet::empty();
    for token_type in TokenType::ALL {
        let mut balance = SourceBalance::default();
        for source in TokenSource::ALL {
            let field = flat_field(token_type, source);
            let value = object
                .get(&field)
                .ok_or_else(|| SnapshotError::MissingField(field.clone()))?;
            let amount = read_amount(&field, value)?;
            match source {
                TokenSource::Monthly => balance.monthly = amount,
                TokenSource::Purchased => balance.purchased = amount,
            }
        }
        wallet = with_balance(wallet, token_type, balance);
    }
    Ok(wallet)
}

fn parse_nested(object: &Map<String, Value>) -> Result<TokenWallet, SnapshotError> {
    let mut wallet = TokenWallet::empty();
    for token_type in TokenType::ALL {
        let key = token_type.as_str();
        let inner = object
            .get(key)
            .ok_or_else(|| SnapshotError::MissingField(key.to_string()))?
            .as_object()
            .ok_or_else(|| SnapshotError::NotAnObject(key.to_string()))?;

        let mut balance = SourceBalance::default();
        for source in TokenSource::ALL {
            let field = format!("{}.{}", key, source.as_str());
            let value = inner
                .get(source.as_str())
                .ok_or_else(|| SnapshotError::MissingField(field.clone()))?;
            let amount = read_amount(&field, value)?;
            match source {
                TokenSource::Monthly => balance.monthly = amount,
                TokenSource::Purchased => balance.purchased = amount,
            }
        }
        wallet = with_balance(wallet, token_type, balance);
    }
    Ok(wallet)
}

fn with_balance(mut wallet: TokenWallet, token_type: TokenType, balance: SourceBalance) -> TokenWallet {
    match token_type {
        TokenType::Fibb => wallet.fibb = balance,
        TokenType::Enhanced => wallet.enhanced = balance,
        TokenType::Research => wallet.research = balance,
    }
    wallet
}

fn read_amount(field: &str, value: &Value) -> Result<u64, SnapshotError> {
    if let Some(amount) = value.as_u64() {
        return Ok(amount);
    }
    if let Some(negative) = value.as_i64() {
        return Err(SnapshotError::NegativeAmount {
            field: field.to_string(),
            value: negative,
        });
    }
    // Numeric stores may hand back integers as whole-valued floats
    if let Some(float) = value.as_f64() {
        if float.fract() == 0.0 && (0.0..u64::MAX as f64).contains(&float) {
            return Ok(float as u64);
        }
        if float < 0.0 {
            return Err(SnapshotError::NegativeAmount {
                field: field.to_string(),
                value: float as i64,
            });
        }
    }
    Err(SnapshotError::InvalidField {
        field: field.to_string(),
        value: value.to_string(),
    })
}
