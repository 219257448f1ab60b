// 6.0: append-only ledger records. written once inside the operation that produced
// them, never updated. rolled back together with the balances they describe.

use crate::symbol::Symbol;
use crate::types::{Price, Quote, RecordId, Timestamp, TradeSide, UserId, WalletId, WalletType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotTransaction {
    pub id: RecordId,
    pub wallet_id: WalletId,
    pub symbol: Symbol,
    pub side: TradeSide,
    pub price: Price,
    pub units: Decimal,
    pub total: Quote,
    /// Realized on sells only.
    pub profit: Option<Quote>,
    pub executed_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountTransaction {
    pub id: RecordId,
    pub source_account: String,
    pub target_account: String,
    pub amount: Quote,
    pub note: Option<String>,
    pub created_at: Timestamp,
}

impl AccountTransaction {
    pub fn touches(&self, account_number: &str) -> bool {
        self.source_account == account_number || self.target_account == account_number
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalTransfer {
    pub id: RecordId,
    pub user_id: UserId,
    pub from_wallet: WalletId,
    pub to_wallet: WalletId,
    pub from_type: WalletType,
    pub to_type: WalletType,
    pub amount: Quote,
    pub created_at: Timestamp,
}
