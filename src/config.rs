// 8.0 config.rs: all settings in one place. leverage bounds, symbol parsing, p2p rules,
// lock timeout, audit retention. 8.1 presets, 8.2 validation, 8.3 toml loading.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct P2PConfig {
    // Sell orders must reach `banked` before the user can release crypto.
    // Off by default: merchants may pay out of band.
    pub sell_confirm_requires_payment: bool,
    // Fiat amount passed to transfer_payment must equal units * snapshot price.
    // Off, it only has to cover it.
    pub require_exact_payment: bool,
}

impl Default for P2PConfig {
    fn default() -> Self {
        Self {
            sell_confirm_requires_payment: false,
            require_exact_payment: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    // Currency every wallet balance is denominated in. Never a traded symbol.
    pub base_currency: String,
    // Suffixes stripped from concatenated pairs ("BTCUSDT" → "BTC")
    pub quote_suffixes: Vec<String>,
    pub min_leverage: Decimal,
    pub max_leverage: Decimal,
    pub p2p: P2PConfig,
    // How long a writer waits for the ledger before giving up with a retryable error
    pub lock_timeout_ms: u64,
    // Maximum number of audit events retained in memory
    pub max_events: usize,
    // Log every audit event at debug level
    pub verbose: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_currency: "USDT".to_string(),
            quote_suffixes: ["USDT", "USDC", "BUSD", "USD"].iter().map(|s| s.to_string()).collect(),
            min_leverage: dec!(1),
            max_leverage: dec!(5),
            p2p: P2PConfig::default(),
            lock_timeout_ms: 2_000,
            max_events: 100_000,
            verbose: false,
        }
    }
}

impl LedgerConfig {
    /** 8.1: strict preset. sell releases need a recorded payment, short lock waits */
    pub fn strict() -> Self {
        let mut config = Self::default();
        config.p2p.sell_confirm_requires_payment = true;
        config.lock_timeout_ms = 500;
        config
    }

    // 8.2: internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_leverage < Decimal::ONE {
            return Err(ConfigError::InvalidLeverage {
                reason: "min leverage must be at least 1".to_string(),
            });
        }

        if self.max_leverage < self.min_leverage {
            return Err(ConfigError::InvalidLeverage {
                reason: "max leverage must not be below min leverage".to_string(),
            });
        }

        if self.base_currency.trim().is_empty() {
            return Err(ConfigError::InvalidCurrency {
                reason: "base currency is empty".to_string(),
            });
        }

        if self.quote_suffixes.iter().any(|s| s.is_empty() || s.to_ascii_uppercase() != *s) {
            return Err(ConfigError::InvalidCurrency {
                reason: "quote suffixes must be non-empty upper case".to_string(),
            });
        }

        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }

        Ok(())
    }

    // 8.3: partial documents are fine, missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&source)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid leverage bounds: {reason}")]
    InvalidLeverage { reason: String },

    #[error("Invalid currency settings: {reason}")]
    InvalidCurrency { reason: String },

    #[error("Lock timeout must be positive")]
    InvalidTimeout,

    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Config read error: {0}")]
    Io(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Strict,
}

impl Environment {
    pub fn config(&self) -> LedgerConfig {
        match self {
            Environment::Development => LedgerConfig::default(),
            Environment::Strict => LedgerConfig::strict(),
        }
    }
}
