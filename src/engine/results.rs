// 10.0.2: what engine operations hand back. everything serializes so the command
// api can return it as is.

use crate::future_order::FutureOrder;
use crate::holding::Holding;
use crate::p2p::P2POrder;
use crate::records::{AccountTransaction, InternalTransfer, SpotTransaction};
use crate::types::Quote;
use crate::user::User;
use crate::wallet::Wallet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub user: User,
    pub wallets: Vec<Wallet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotTradeResult {
    pub wallet: Wallet,
    pub holding: Option<Holding>, // None after a sell that emptied the holding
    pub transaction: SpotTransaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseResult {
    pub wallet: Wallet,
    pub profit: Quote,
    pub order: FutureOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    pub order: P2POrder,
    pub transaction: AccountTransaction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseResult {
    pub order: P2POrder,
    pub source: Wallet,
    pub target: Wallet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransferResult {
    pub source: Wallet,
    pub target: Wallet,
    pub record: InternalTransfer,
}
