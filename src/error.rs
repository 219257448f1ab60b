// 2.0: one error enum for every ledger operation. each variant maps onto a small
// set of kinds so callers can pick a status code without matching every variant.

use crate::types::{FutureOrderId, P2POrderId, Quote, UserId, WalletId, WalletType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    InsufficientFunds,
    InvalidState,
    ConcurrencyConflict,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::ConcurrencyConflict => "concurrency_conflict",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Leverage {requested} outside allowed range {min}..={max}")]
    InvalidLeverage {
        requested: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("User {0} is not a merchant with a quoted price")]
    MerchantNotFound(UserId),

    #[error("Wallet {0} not found")]
    WalletNotFound(WalletId),

    #[error("User {user_id} has no {wallet_type} wallet")]
    WalletTypeNotFound {
        user_id: UserId,
        wallet_type: WalletType,
    },

    #[error("Wallet {wallet_id} is not a {expected} wallet owned by {user_id}")]
    InvalidWallet {
        wallet_id: WalletId,
        user_id: UserId,
        expected: WalletType,
    },

    #[error("Future order {0} not found")]
    OrderNotFound(FutureOrderId),

    #[error("P2P order {0} not found")]
    P2POrderNotFound(P2POrderId),

    #[error("Bank account {0} not found")]
    AccountNotFound(String),

    #[error("Bank account {0} already exists")]
    AccountExists(String),

    #[error("User name '{0}' is already registered")]
    UserExists(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Quote, available: Quote },

    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Quote, available: Quote },

    #[error("Insufficient holdings of {symbol}: requested {requested}, held {held}")]
    InsufficientHoldings {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },

    #[error("Future order {0} is already closed")]
    AlreadyClosed(FutureOrderId),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Source and target account are the same ({0})")]
    SameAccount(String),

    #[error("Source and target wallet are the same ({0})")]
    SameWallet(WalletType),

    #[error("Arithmetic overflow computing {0}")]
    ArithmeticOverflow(String),

    #[error("Ledger is busy, retry the operation")]
    ConcurrencyConflict,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidInput(_)
            | LedgerError::InvalidLeverage { .. }
            | LedgerError::InvalidWallet { .. }
            | LedgerError::SameAccount(_)
            | LedgerError::SameWallet(_)
            | LedgerError::ArithmeticOverflow(_) => ErrorKind::Validation,

            LedgerError::UserNotFound(_)
            | LedgerError::MerchantNotFound(_)
            | LedgerError::WalletNotFound(_)
            | LedgerError::WalletTypeNotFound { .. }
            | LedgerError::OrderNotFound(_)
            | LedgerError::P2POrderNotFound(_)
            | LedgerError::AccountNotFound(_) => ErrorKind::NotFound,

            LedgerError::Unauthorized(_) => ErrorKind::Unauthorized,

            LedgerError::InsufficientBalance { .. }
            | LedgerError::InsufficientMargin { .. }
            | LedgerError::InsufficientHoldings { .. } => ErrorKind::InsufficientFunds,

            LedgerError::AlreadyClosed(_)
            | LedgerError::InvalidState(_)
            | LedgerError::AccountExists(_)
            | LedgerError::UserExists(_) => ErrorKind::InvalidState,

            LedgerError::ConcurrencyConflict => ErrorKind::ConcurrencyConflict,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict)
    }

    // stable machine-readable code, one per variant
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidInput(_) => "invalid_input",
            LedgerError::InvalidLeverage { .. } => "invalid_leverage",
            LedgerError::UserNotFound(_) => "user_not_found",
            LedgerError::MerchantNotFound(_) => "merchant_not_found",
            LedgerError::WalletNotFound(_) => "wallet_not_found",
            LedgerError::WalletTypeNotFound { .. } => "wallet_not_found",
            LedgerError::InvalidWallet { .. } => "invalid_wallet",
            LedgerError::OrderNotFound(_) => "order_not_found",
            LedgerError::P2POrderNotFound(_) => "p2p_order_not_found",
            LedgerError::AccountNotFound(_) => "account_not_found",
            LedgerError::AccountExists(_) => "account_exists",
            LedgerError::UserExists(_) => "user_exists",
            LedgerError::Unauthorized(_) => "unauthorized",
            LedgerError::InsufficientBalance { .. } => "insufficient_balance",
            LedgerError::InsufficientMargin { .. } => "insufficient_margin",
            LedgerError::InsufficientHoldings { .. } => "insufficient_holdings",
            LedgerError::AlreadyClosed(_) => "already_closed",
            LedgerError::InvalidState(_) => "invalid_state",
            LedgerError::SameAccount(_) => "same_account",
            LedgerError::SameWallet(_) => "same_wallet",
            LedgerError::ArithmeticOverflow(_) => "arithmetic_overflow",
            LedgerError::ConcurrencyConflict => "concurrency_conflict",
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
