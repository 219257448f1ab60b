// 9.4: durable copies of the ledger. rows are stored as plain lists so the json stays
// readable and keyed maps with composite keys never hit the serializer.

use super::state::{Counters, LedgerState};
use super::Ledger;
use crate::bank::BankAccount;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::events::Event;
use crate::future_order::FutureOrder;
use crate::holding::Holding;
use crate::p2p::P2POrder;
use crate::records::{AccountTransaction, InternalTransfer, SpotTransaction};
use crate::user::User;
use crate::wallet::Wallet;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: u32,
    pub counters: Counters,
    pub users: Vec<User>,
    pub wallets: Vec<Wallet>,
    pub holdings: Vec<Holding>,
    pub future_orders: Vec<FutureOrder>,
    pub p2p_orders: Vec<P2POrder>,
    pub bank_accounts: Vec<BankAccount>,
    pub spot_transactions: Vec<SpotTransaction>,
    pub account_transactions: Vec<AccountTransaction>,
    pub internal_transfers: Vec<InternalTransfer>,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported snapshot version {0}")]
    Version(u32),

    #[error("Snapshot is inconsistent: {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl LedgerSnapshot {
    fn from_state(state: &LedgerState) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            counters: state.counters,
            users: state.users.values().cloned().collect(),
            wallets: state.wallets.values().cloned().collect(),
            holdings: state.holdings.values().cloned().collect(),
            future_orders: state.future_orders.values().cloned().collect(),
            p2p_orders: state.p2p_orders.values().cloned().collect(),
            bank_accounts: state.bank_accounts.values().cloned().collect(),
            spot_transactions: state.spot_transactions.clone(),
            account_transactions: state.account_transactions.clone(),
            internal_transfers: state.internal_transfers.clone(),
            events: state.events.iter().cloned().collect(),
        }
    }

    fn into_state(self) -> Result<LedgerState, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version(self.version));
        }

        if let Some(w) = self.wallets.iter().find(|w| w.balance.is_negative()) {
            return Err(SnapshotError::Inconsistent(format!("{} has a negative balance", w.id)));
        }
        if let Some(a) = self.bank_accounts.iter().find(|a| a.account_balance.is_negative()) {
            return Err(SnapshotError::Inconsistent(format!(
                "bank account {} has a negative balance",
                a.account_number
            )));
        }
        if let Some(h) = self.holdings.iter().find(|h| h.unit_number.is_sign_negative()) {
            return Err(SnapshotError::Inconsistent(format!(
                "{} holding in {} is negative",
                h.symbol, h.wallet_id
            )));
        }

        let mut state = LedgerState {
            counters: self.counters,
            spot_transactions: self.spot_transactions,
            account_transactions: self.account_transactions,
            internal_transfers: self.internal_transfers,
            events: self.events.into_iter().collect(),
            ..LedgerState::default()
        };
        state.users = self.users.into_iter().map(|u| (u.id, u)).collect();
        state.wallets = self.wallets.into_iter().map(|w| (w.id, w)).collect();
        state.holdings = self
            .holdings
            .into_iter()
            .map(|h| ((h.wallet_id, h.symbol.clone()), h))
            .collect();
        state.future_orders = self.future_orders.into_iter().map(|o| (o.id, o)).collect();
        state.p2p_orders = self.p2p_orders.into_iter().map(|o| (o.id, o)).collect();
        state.bank_accounts = self
            .bank_accounts
            .into_iter()
            .map(|a| (a.account_number.clone(), a))
            .collect();

        // never hand out an id that already exists, even if the counters were edited
        let c = &mut state.counters;
        c.next_user = c.next_user.max(state.users.keys().last().map_or(1, |id| id.0 + 1));
        c.next_wallet = c.next_wallet.max(state.wallets.keys().last().map_or(1, |id| id.0 + 1));
        c.next_future_order = c
            .next_future_order
            .max(state.future_orders.keys().last().map_or(1, |id| id.0 + 1));
        c.next_p2p_order = c
            .next_p2p_order
            .max(state.p2p_orders.keys().last().map_or(1, |id| id.0 + 1));
        let max_record = state
            .spot_transactions
            .iter()
            .map(|r| r.id.0)
            .chain(state.account_transactions.iter().map(|r| r.id.0))
            .chain(state.internal_transfers.iter().map(|r| r.id.0))
            .max()
            .unwrap_or(0);
        c.next_record = c.next_record.max(max_record + 1);
        c.next_event = c
            .next_event
            .max(state.events.back().map_or(1, |e| e.id.0 + 1));

        Ok(state)
    }
}

impl Ledger {
    pub fn snapshot(&self) -> Result<LedgerSnapshot, SnapshotError> {
        Ok(self.read(|view| LedgerSnapshot::from_state(view.state))?)
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot, config: &LedgerConfig) -> Result<Self, SnapshotError> {
        let state = snapshot.into_state()?;
        Ok(Self::with_state(state, config))
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let snapshot = self.snapshot()?;
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, &snapshot)?;
        info!(path = %path.as_ref().display(), wallets = snapshot.wallets.len(), "ledger snapshot saved");
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>, config: &LedgerConfig) -> Result<Self, SnapshotError> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let snapshot: LedgerSnapshot = serde_json::from_reader(reader)?;
        info!(path = %path.as_ref().display(), wallets = snapshot.wallets.len(), "ledger snapshot loaded");
        Self::from_snapshot(snapshot, config)
    }
}
