// 7.0: every committed state change produces an event. used for audit trails and
// notifying external systems. events are staged inside the transaction, so a rolled
// back operation leaves no event behind.

use crate::p2p::P2PState;
use crate::symbol::Symbol;
use crate::types::{
    FutureOrderId, P2POrderId, PositionSide, Price, Quote, RecordId, Role, Timestamp, TradeSide, UserId,
    WalletId, WalletType,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Registration events
    UserRegistered(UserRegisteredEvent),
    WalletOpened(WalletOpenedEvent),
    MerchantRequoted(MerchantRequotedEvent),
    BankAccountOpened(BankAccountEvent),
    BankAccountClosed(BankAccountEvent),

    // Balance events
    Deposit(BalanceChangeEvent),
    Withdrawal(BalanceChangeEvent),
    InternalTransfer(InternalTransferEvent),
    BankTransfer(BankTransferEvent),

    // Trading events
    SpotTrade(SpotTradeEvent),
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionClosedEvent),

    // P2P events
    P2PStateChanged(P2PStateChangedEvent),
    CryptoReleased(CryptoReleasedEvent),
}

impl EventPayload {
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::UserRegistered(_) => "user_registered",
            EventPayload::WalletOpened(_) => "wallet_opened",
            EventPayload::MerchantRequoted(_) => "merchant_requoted",
            EventPayload::BankAccountOpened(_) => "bank_account_opened",
            EventPayload::BankAccountClosed(_) => "bank_account_closed",
            EventPayload::Deposit(_) => "deposit",
            EventPayload::Withdrawal(_) => "withdrawal",
            EventPayload::InternalTransfer(_) => "internal_transfer",
            EventPayload::BankTransfer(_) => "bank_transfer",
            EventPayload::SpotTrade(_) => "spot_trade",
            EventPayload::PositionOpened(_) => "position_opened",
            EventPayload::PositionClosed(_) => "position_closed",
            EventPayload::P2PStateChanged(_) => "p2p_state_changed",
            EventPayload::CryptoReleased(_) => "crypto_released",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegisteredEvent {
    pub user_id: UserId,
    pub role: Role,
    pub wallets: Vec<WalletId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletOpenedEvent {
    pub user_id: UserId,
    pub wallet_id: WalletId,
    pub wallet_type: WalletType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantRequotedEvent {
    pub merchant_id: UserId,
    pub old_price: Option<Price>,
    pub new_price: Price,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccountEvent {
    pub user_id: UserId,
    pub account_number: String,
    pub balance: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceChangeEvent {
    pub wallet_id: WalletId,
    pub amount: Quote,
    pub new_balance: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalTransferEvent {
    pub record_id: RecordId,
    pub user_id: UserId,
    pub from_type: WalletType,
    pub to_type: WalletType,
    pub amount: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransferEvent {
    pub record_id: RecordId,
    pub source_account: String,
    pub target_account: String,
    pub amount: Quote,
    pub p2p_order: Option<P2POrderId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotTradeEvent {
    pub record_id: RecordId,
    pub wallet_id: WalletId,
    pub symbol: Symbol,
    pub side: TradeSide,
    pub units: Decimal,
    pub price: Price,
    pub profit: Option<Quote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub order_id: FutureOrderId,
    pub wallet_id: WalletId,
    pub symbol: Symbol,
    pub side: PositionSide,
    pub size: Decimal,
    pub entry_price: Price,
    pub margin: Quote,
    pub leverage: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub order_id: FutureOrderId,
    pub wallet_id: WalletId,
    pub exit_price: Price,
    pub realized_pnl: Quote,
    pub credited: Quote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P2PStateChangedEvent {
    pub order_id: P2POrderId,
    pub from: Option<P2PState>,
    pub to: P2PState,
    pub actor: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoReleasedEvent {
    pub order_id: P2POrderId,
    pub from_wallet: WalletId,
    pub to_wallet: WalletId,
    pub amount: Quote,
}
