// 1.0: all the primitives live here. nothing in the ledger works without these types.
// IDs, money, prices, leverage, timestamps, wallet kinds. each is a newtype so the
// compiler catches a wallet id passed where an order id belongs.

use crate::error::{LedgerError, LedgerResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WalletId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FutureOrderId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct P2POrderId(pub u64);

/// Id of an immutable ledger record (spot trade, bank transfer, wallet transfer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wallet#{}", self.0)
    }
}

impl fmt::Display for FutureOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "future#{}", self.0)
    }
}

impl fmt::Display for P2POrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p2p#{}", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

// 1.1: what a wallet is for. a user owns at most one of each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    Spot,
    Future,
    Merchant,
    Fund,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Spot => "spot",
            WalletType::Future => "future",
            WalletType::Merchant => "merchant",
            WalletType::Fund => "fund",
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spot" => Ok(WalletType::Spot),
            "future" | "futures" => Ok(WalletType::Future),
            "merchant" => Ok(WalletType::Merchant),
            "fund" => Ok(WalletType::Fund),
            other => Err(LedgerError::InvalidInput(format!("unknown wallet type '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Normal,
    Merchant,
    Admin,
}

impl Role {
    // wallets provisioned at registration
    pub fn default_wallets(&self) -> &'static [WalletType] {
        match self {
            Role::Normal => &[WalletType::Future, WalletType::Spot],
            Role::Merchant => &[WalletType::Merchant],
            Role::Admin => &[],
        }
    }
}

impl FromStr for Role {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "user" => Ok(Role::Normal),
            "merchant" => Ok(Role::Merchant),
            "admin" => Ok(Role::Admin),
            other => Err(LedgerError::InvalidInput(format!("unknown role '{other}'"))),
        }
    }
}

// Long = profit when price goes up. Short = profit when price goes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn sign(&self) -> Decimal {
        match self {
            PositionSide::Long => dec!(1),
            PositionSide::Short => dec!(-1),
        }
    }
}

impl FromStr for PositionSide {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" => Ok(PositionSide::Long),
            "short" => Ok(PositionSide::Short),
            other => Err(LedgerError::InvalidInput(format!("unknown position side '{other}'"))),
        }
    }
}

// buy/sell. for p2p orders this is always from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => f.write_str("buy"),
            TradeSide::Sell => f.write_str("sell"),
        }
    }
}

impl FromStr for TradeSide {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(TradeSide::Buy),
            "sell" => Ok(TradeSide::Sell),
            other => Err(LedgerError::InvalidInput(format!("unknown trade side '{other}'"))),
        }
    }
}

// 1.2: price in base currency per unit. must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price(Decimal);

impl Price {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn new_unchecked(value: Decimal) -> Self {
        debug_assert!(value > Decimal::ZERO);
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.3: base currency amount. balances, margin, pnl, fiat all use this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Quote(Decimal);

impl Quote {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn checked_add(&self, other: Quote) -> LedgerResult<Self> {
        checked_add(self.0, other.0).map(Self)
    }

    pub fn checked_sub(&self, other: Quote) -> LedgerResult<Self> {
        checked_sub(self.0, other.0).map(Self)
    }

    pub fn checked_mul(&self, factor: Decimal) -> LedgerResult<Self> {
        checked_mul(self.0, factor).map(Self)
    }

    // total of a column; the first sum that leaves the Decimal range is an error
    pub fn checked_sum<I: IntoIterator<Item = Quote>>(iter: I) -> LedgerResult<Self> {
        iter.into_iter().try_fold(Self::zero(), |acc, q| acc.checked_add(q))
    }

    pub fn negate(&self) -> Self {
        Self(-self.0)
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Quote {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Quote {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// 1.3.1: overflow-checked decimal math. Decimal tops out near 7.9e28 and its
// operators panic past that, so every money or size calculation goes through here.
pub fn checked_add(a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_add(b).ok_or_else(|| overflow(a, "+", b))
}

pub fn checked_sub(a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_sub(b).ok_or_else(|| overflow(a, "-", b))
}

pub fn checked_mul(a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_mul(b).ok_or_else(|| overflow(a, "*", b))
}

pub fn checked_div(a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    a.checked_div(b).ok_or_else(|| overflow(a, "/", b))
}

fn overflow(a: Decimal, op: &str, b: Decimal) -> LedgerError {
    LedgerError::ArithmeticOverflow(format!("{a} {op} {b}"))
}

// 1.4: leverage multiplier. must be >= 1x. the upper bound is a config setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Leverage(Decimal);

impl Leverage {
    #[must_use]
    pub fn new(value: Decimal) -> Option<Self> {
        if value >= Decimal::ONE {
            Some(Self(value))
        } else {
            None
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// 1.5: millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match chrono::DateTime::from_timestamp_millis(self.0) {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f")),
            None => write!(f, "{}ms", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_rejects_non_positive() {
        assert!(Price::new(dec!(0)).is_none());
        assert!(Price::new(dec!(-1)).is_none());
        assert_eq!(Price::new(dec!(0.5)).unwrap().value(), dec!(0.5));
    }

    #[test]
    fn leverage_floor_is_one() {
        assert!(Leverage::new(dec!(0)).is_none());
        assert!(Leverage::new(dec!(0.99)).is_none());
        assert_eq!(Leverage::new(dec!(5)).unwrap().to_string(), "5x");
    }

    #[test]
    fn quote_arithmetic_is_exact() {
        // 0.1 + 0.2 must be exactly 0.3, which binary floats cannot do
        let q = Quote::new(dec!(0.1)).checked_add(Quote::new(dec!(0.2))).unwrap();
        assert_eq!(q.value(), dec!(0.3));

        let total = Quote::checked_sum([Quote::new(dec!(1.5)), Quote::new(dec!(2.25))]).unwrap();
        assert_eq!(total.value(), dec!(3.75));
    }

    #[test]
    fn arithmetic_past_decimal_range_is_an_error() {
        let big = Quote::new(dec!(79000000000000000000000000000));
        let err = big.checked_add(big).unwrap_err();
        assert!(matches!(err, LedgerError::ArithmeticOverflow(_)));
        assert_eq!(err.code(), "arithmetic_overflow");

        assert!(checked_mul(dec!(100000000000000000000), dec!(100000000000000000000)).is_err());
        assert!(checked_div(dec!(1), Decimal::ZERO).is_err());
        assert!(Quote::checked_sum([big, big]).is_err());
        assert_eq!(checked_sub(dec!(5), dec!(7)).unwrap(), dec!(-2));
    }

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("SPOT".parse::<WalletType>().unwrap(), WalletType::Spot);
        assert_eq!("futures".parse::<WalletType>().unwrap(), WalletType::Future);
        assert_eq!(" Long ".parse::<PositionSide>().unwrap(), PositionSide::Long);
        assert_eq!("sell".parse::<TradeSide>().unwrap(), TradeSide::Sell);
        assert!("sideways".parse::<PositionSide>().is_err());
        assert!("vault".parse::<WalletType>().is_err());
    }

    #[test]
    fn role_default_wallets() {
        assert_eq!(Role::Normal.default_wallets(), &[WalletType::Future, WalletType::Spot]);
        assert_eq!(Role::Merchant.default_wallets(), &[WalletType::Merchant]);
        assert!(Role::Admin.default_wallets().is_empty());
    }
}
