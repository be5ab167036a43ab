//! Ledger configuration.
//!
//! Configuration is an explicit value handed to the service at construction.
//! It is layered from defaults, an optional TOML file and `FIBB_LEDGER_*`
//! environment variables.
//!
//! ```toml
//! api_endpoint = "https://api.example.com/tokens"
//! request_timeout_secs = 5
//! max_conflict_retries = 3
//!
//! # Replaces the default entry for one token type; prices are in cents
//! [pricing.fibb]
//! name = "Fibb Token"
//! pack_size = 1
//! pricing = { starter = 1500, standard = 1000, pro = 500 }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::ledger::{LedgerError, Price, SubscriptionTier, TokenBillingInfo, TokenInfo, TokenType};

/// Prefix of environment variables read by [`LedgerConfig::load`].
pub const ENV_PREFIX: &str = "FIBB_LEDGER";

/// Default backend endpoint.
pub const DEFAULT_API_ENDPOINT: &str = "http://localhost:3000/api";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default number of re-runs after a version conflict.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration source error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Configuration for the token ledger service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Base URL of the wallet backend functions
    pub api_endpoint: String,

    /// Bearer token sent to the backend
    pub access_token: Option<String>,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// How many times a persisted operation is re-run after a version conflict
    pub max_conflict_retries: u32,

    /// Pack sizes and prices
    pub pricing: TokenBillingInfo,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            access_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            pricing: TokenBillingInfo::default(),
        }
    }
}

impl LedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load defaults, then `path` if given and present, then environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_env(path, env_source())
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }
        let settings = builder.add_source(env).build()?;
        let raw: RawConfig = settings.try_deserialize()?;
        raw.into_config()
    }

    /// Build from environment variables over defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    /// Parse a TOML document over defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(input)?;
        raw.into_config()
    }

    /// Set the backend endpoint.
    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = endpoint.into();
        self
    }

    /// Set the bearer token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the request timeout; values below 1 are raised to 1.
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs.max(1);
        self
    }

    /// Set the number of conflict re-runs.
    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Replace the pricing table.
    pub fn with_pricing(mut self, pricing: TokenBillingInfo) -> Self {
        self.pricing = pricing;
        self
    }
}

fn env_source() -> config::Environment {
    // FIBB_LEDGER_API_ENDPOINT, FIBB_LEDGER_PRICING__FIBB__PACK_SIZE
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// On-disk shape; keys are plain strings so names are validated by hand.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    api_endpoint: Option<String>,
    access_token: Option<String>,
    request_timeout_secs: Option<u64>,
    max_conflict_retries: Option<u32>,
    pricing: BTreeMap<String, RawTokenInfo>,
}

#[derive(Debug, Deserialize)]
struct RawTokenInfo {
    name: String,
    pack_size: u64,
    #[serde(default)]
    pricing: BTreeMap<String, u64>,
}

impl RawConfig {
    fn into_config(self) -> Result<LedgerConfig, ConfigError> {
        let defaults = LedgerConfig::default();

        let mut entries: BTreeMap<TokenType, TokenInfo> = defaults
            .pricing
            .iter()
            .map(|(t, info)| (*t, info.clone()))
            .collect();
        for (key, raw) in self.pricing {
            let token_type: TokenType = key.parse()?;
            let mut info = TokenInfo::new(raw.name, raw.pack_size);
            for (tier, cents) in raw.pricing {
                let tier: SubscriptionTier = tier.parse()?;
                info = info.with_price(tier, Price::from_cents(cents));
            }
            entries.insert(token_type, info);
        }

        let mut config = LedgerConfig {
            api_endpoint: self.api_endpoint.unwrap_or(defaults.api_endpoint),
            access_token: self.access_token.filter(|t| !t.trim().is_empty()),
            request_timeout_secs: defaults.request_timeout_secs,
            max_conflict_retries: self
                .max_conflict_retries
                .unwrap_or(defaults.max_conflict_retries),
            pricing: TokenBillingInfo::new(entries)?,
        };
        if let Some(secs) = self.request_timeout_secs {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "request_timeout_secs",
                    reason: "must be at least 1 second".to_string(),
                });
            }
            config = config.with_request_timeout_secs(secs);
        }
        Ok(config)
    }
}
