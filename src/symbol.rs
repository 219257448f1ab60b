// 1.6: canonical asset key. holdings and positions are always keyed by the base asset,
// whatever shape the caller sent: "BTC", "btc", "BTC/USDT", "BTC-USDT", "BTCUSDT".

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;

const SEPARATORS: [char; 3] = ['/', '-', '_'];

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Normalize a raw pair or asset name to its base asset.
    ///
    /// Separated pairs keep the part before the separator. Concatenated pairs lose
    /// the longest matching quote suffix, unless that would leave nothing.
    pub fn normalize<S: AsRef<str>>(raw: &str, quote_suffixes: &[S]) -> Result<Self, LedgerError> {
        let upper = raw.trim().to_ascii_uppercase();
        if upper.is_empty() {
            return Err(LedgerError::InvalidInput("symbol is empty".to_string()));
        }

        let base = match upper.find(SEPARATORS) {
            Some(idx) => upper[..idx].to_string(),
            None => strip_quote_suffix(&upper, quote_suffixes),
        };

        if base.is_empty() || !base.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(LedgerError::InvalidInput(format!("malformed symbol '{raw}'")));
        }
        Ok(Self(base))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn strip_quote_suffix<S: AsRef<str>>(upper: &str, quote_suffixes: &[S]) -> String {
    let mut best: Option<&str> = None;
    for suffix in quote_suffixes {
        let suffix = suffix.as_ref();
        if upper.len() > suffix.len()
            && upper.ends_with(suffix)
            && best.map_or(true, |b| suffix.len() > b.len())
        {
            best = Some(suffix);
        }
    }
    match best {
        Some(suffix) => upper[..upper.len() - suffix.len()].to_string(),
        None => upper.to_string(),
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
