// 12.0: typed requests. each operation's preconditions on its own input are checked
// once here, before the ledger is touched. validation turns raw decimals and strings
// into the checked newtypes the engine works with.

use crate::bank::validate_account_number;
use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::symbol::Symbol;
use crate::future_order::position_size;
use crate::types::{
    checked_mul, FutureOrderId, Leverage, P2POrderId, PositionSide, Price, Quote, TradeSide, UserId, WalletId, WalletType,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const MAX_NOTE_LEN: usize = 255;

fn positive_units(units: Decimal, what: &str) -> LedgerResult<Decimal> {
    if units > Decimal::ZERO {
        Ok(units)
    } else {
        Err(LedgerError::InvalidInput(format!("{what} must be positive, got {units}")))
    }
}

fn positive_price(raw: Decimal, what: &str) -> LedgerResult<Price> {
    Price::new(raw).ok_or_else(|| LedgerError::InvalidInput(format!("{what} must be positive, got {raw}")))
}

fn positive_amount(raw: Decimal, what: &str) -> LedgerResult<Quote> {
    positive_units(raw, what).map(Quote::new)
}

// balances are held in the base currency, so it cannot also be the traded asset
fn traded_symbol(raw: &str, config: &LedgerConfig) -> LedgerResult<Symbol> {
    let symbol = Symbol::normalize(raw, config.quote_suffixes.as_slice())?;
    if symbol.as_str().eq_ignore_ascii_case(config.base_currency.trim()) {
        return Err(LedgerError::InvalidInput(format!(
            "{symbol} is the base currency and cannot be traded"
        )));
    }
    Ok(symbol)
}

// 12.1: spot

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotOrderRequest {
    pub user_id: UserId,
    pub wallet_id: WalletId,
    pub symbol: String,
    pub units: Decimal,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpotOrder {
    pub user_id: UserId,
    pub wallet_id: WalletId,
    pub symbol: Symbol,
    pub units: Decimal,
    pub price: Price,
    /// units * price, computed once so an unrepresentable total is refused up front
    pub total: Quote,
}

impl SpotOrderRequest {
    pub fn new(user_id: UserId, wallet_id: WalletId, symbol: &str, units: Decimal, price: Decimal) -> Self {
        Self {
            user_id,
            wallet_id,
            symbol: symbol.to_string(),
            units,
            price,
        }
    }

    pub fn validate(&self, config: &LedgerConfig) -> LedgerResult<SpotOrder> {
        let units = positive_units(self.units, "units")?;
        let price = positive_price(self.price, "price")?;
        Ok(SpotOrder {
            user_id: self.user_id,
            wallet_id: self.wallet_id,
            symbol: traded_symbol(&self.symbol, config)?,
            units,
            price,
            total: Quote::new(checked_mul(units, price.value())?),
        })
    }
}

// 12.2: futures

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPositionRequest {
    pub user_id: UserId,
    pub wallet_id: WalletId,
    pub symbol: String,
    pub side: PositionSide,
    pub margin: Decimal,
    pub entry_price: Decimal,
    pub leverage: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub user_id: UserId,
    pub wallet_id: WalletId,
    pub symbol: Symbol,
    pub side: PositionSide,
    pub margin: Quote,
    pub entry_price: Price,
    pub leverage: Leverage,
    pub position_size: Decimal,
}

impl OpenPositionRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: UserId,
        wallet_id: WalletId,
        symbol: &str,
        side: PositionSide,
        margin: Decimal,
        entry_price: Decimal,
        leverage: Decimal,
    ) -> Self {
        Self {
            user_id,
            wallet_id,
            symbol: symbol.to_string(),
            side,
            margin,
            entry_price,
            leverage,
        }
    }

    pub fn validate(&self, config: &LedgerConfig) -> LedgerResult<OpenPosition> {
        let out_of_range = || LedgerError::InvalidLeverage {
            requested: self.leverage,
            min: config.min_leverage,
            max: config.max_leverage,
        };
        if self.leverage < config.min_leverage || self.leverage > config.max_leverage {
            return Err(out_of_range());
        }
        let leverage = Leverage::new(self.leverage).ok_or_else(out_of_range)?;
        let margin = positive_amount(self.margin, "margin")?;
        let entry_price = positive_price(self.entry_price, "entry price")?;

        Ok(OpenPosition {
            user_id: self.user_id,
            wallet_id: self.wallet_id,
            symbol: traded_symbol(&self.symbol, config)?,
            side: self.side,
            margin,
            entry_price,
            leverage,
            position_size: position_size(margin, leverage, entry_price)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosePositionRequest {
    pub order_id: FutureOrderId,
    pub user_id: UserId,
    pub exit_price: Decimal,
}

impl ClosePositionRequest {
    pub fn new(order_id: FutureOrderId, user_id: UserId, exit_price: Decimal) -> Self {
        Self {
            order_id,
            user_id,
            exit_price,
        }
    }

    pub fn validate(&self) -> LedgerResult<Price> {
        positive_price(self.exit_price, "exit price")
    }
}

// 12.3: p2p

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateP2POrderRequest {
    pub user_id: UserId,
    pub merchant_id: UserId,
    pub side: TradeSide,
    pub crypto_units: Decimal,
}

impl CreateP2POrderRequest {
    pub fn new(user_id: UserId, merchant_id: UserId, side: TradeSide, crypto_units: Decimal) -> Self {
        Self {
            user_id,
            merchant_id,
            side,
            crypto_units,
        }
    }

    pub fn validate(&self) -> LedgerResult<Decimal> {
        if self.user_id == self.merchant_id {
            return Err(LedgerError::InvalidInput(format!(
                "{} cannot trade against their own quote",
                self.user_id
            )));
        }
        positive_units(self.crypto_units, "crypto units")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferPaymentRequest {
    pub order_id: P2POrderId,
    pub payer_id: UserId,
    pub source_account: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferPayment {
    pub order_id: P2POrderId,
    pub payer_id: UserId,
    pub source_account: String,
    pub amount: Quote,
}

impl TransferPaymentRequest {
    pub fn new(order_id: P2POrderId, payer_id: UserId, source_account: &str, amount: Decimal) -> Self {
        Self {
            order_id,
            payer_id,
            source_account: source_account.to_string(),
            amount,
        }
    }

    pub fn validate(&self) -> LedgerResult<TransferPayment> {
        Ok(TransferPayment {
            order_id: self.order_id,
            payer_id: self.payer_id,
            source_account: validate_account_number(&self.source_account)?,
            amount: positive_amount(self.amount, "payment amount")?,
        })
    }
}

// 12.4: transfers

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransferRequest {
    pub user_id: UserId,
    pub source_account: String,
    pub target_account: String,
    pub amount: Decimal,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BankTransfer {
    pub user_id: UserId,
    pub source_account: String,
    pub target_account: String,
    pub amount: Quote,
    pub note: Option<String>,
}

impl BankTransferRequest {
    pub fn new(user_id: UserId, source_account: &str, target_account: &str, amount: Decimal) -> Self {
        Self {
            user_id,
            source_account: source_account.to_string(),
            target_account: target_account.to_string(),
            amount,
            note: None,
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    pub fn validate(&self) -> LedgerResult<BankTransfer> {
        let amount = positive_amount(self.amount, "transfer amount")?;
        let source_account = validate_account_number(&self.source_account)?;
        let target_account = validate_account_number(&self.target_account)?;
        if source_account == target_account {
            return Err(LedgerError::SameAccount(source_account));
        }

        let note = match self.note.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(n) if n.chars().count() > MAX_NOTE_LEN => {
                return Err(LedgerError::InvalidInput(format!("note longer than {MAX_NOTE_LEN} characters")));
            }
            Some(n) => Some(n.to_string()),
        };

        Ok(BankTransfer {
            user_id: self.user_id,
            source_account,
            target_account,
            amount,
            note,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransferRequest {
    pub user_id: UserId,
    pub from: WalletType,
    pub to: WalletType,
    pub amount: Decimal,
}

impl WalletTransferRequest {
    pub fn new(user_id: UserId, from: WalletType, to: WalletType, amount: Decimal) -> Self {
        Self {
            user_id,
            from,
            to,
            amount,
        }
    }

    pub fn validate(&self) -> LedgerResult<Quote> {
        if self.from == self.to {
            return Err(LedgerError::SameWallet(self.from));
        }
        positive_amount(self.amount, "transfer amount")
    }
}
