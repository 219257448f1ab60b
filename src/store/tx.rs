// 9.2: store handles. `ReadView` sees committed state only. `Transaction` stages every
// write and is applied in one step by `Ledger::write`, or dropped on error.
// 9.3: `LedgerRead` gives both the same lookups so engine code reads one way.

use super::state::{LedgerState, Staged};
use crate::bank::BankAccount;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{Event, EventId, EventPayload};
use crate::future_order::FutureOrder;
use crate::holding::Holding;
use crate::p2p::P2POrder;
use crate::records::{AccountTransaction, InternalTransfer, SpotTransaction};
use crate::symbol::Symbol;
use crate::types::{checked_add, FutureOrderId, P2POrderId, Price, Quote, RecordId, Role, Timestamp, UserId, WalletId, WalletType};
use crate::user::User;
use crate::wallet::Wallet;
use rust_decimal::Decimal;

type Rows<'a, T> = Box<dyn Iterator<Item = &'a T> + 'a>;

pub trait LedgerRead {
    fn get_user(&self, id: UserId) -> Option<&User>;
    fn get_wallet(&self, id: WalletId) -> Option<&Wallet>;
    fn get_holding(&self, wallet_id: WalletId, symbol: &Symbol) -> Option<&Holding>;
    fn get_future_order(&self, id: FutureOrderId) -> Option<&FutureOrder>;
    fn get_p2p_order(&self, id: P2POrderId) -> Option<&P2POrder>;
    fn get_bank_account(&self, account_number: &str) -> Option<&BankAccount>;

    fn users(&self) -> Rows<'_, User>;
    fn wallets(&self) -> Rows<'_, Wallet>;
    fn holdings(&self) -> Rows<'_, Holding>;
    fn future_orders(&self) -> Rows<'_, FutureOrder>;
    fn p2p_orders(&self) -> Rows<'_, P2POrder>;
    fn bank_accounts(&self) -> Rows<'_, BankAccount>;

    fn user(&self, id: UserId) -> LedgerResult<User> {
        self.get_user(id).cloned().ok_or(LedgerError::UserNotFound(id))
    }

    fn user_by_name(&self, name: &str) -> Option<User> {
        self.users().find(|u| u.name == name).cloned()
    }

    fn wallet(&self, id: WalletId) -> LedgerResult<Wallet> {
        self.get_wallet(id).cloned().ok_or(LedgerError::WalletNotFound(id))
    }

    fn find_wallet(&self, user_id: UserId, wallet_type: WalletType) -> Option<Wallet> {
        self.wallets()
            .find(|w| w.user_id == user_id && w.wallet_type == wallet_type)
            .cloned()
    }

    fn wallet_for(&self, user_id: UserId, wallet_type: WalletType) -> LedgerResult<Wallet> {
        self.find_wallet(user_id, wallet_type)
            .ok_or(LedgerError::WalletTypeNotFound { user_id, wallet_type })
    }

    fn wallets_of(&self, user_id: UserId) -> Vec<Wallet> {
        let mut wallets: Vec<Wallet> = self.wallets().filter(|w| w.user_id == user_id).cloned().collect();
        wallets.sort_by_key(|w| w.id);
        wallets
    }

    fn holding(&self, wallet_id: WalletId, symbol: &Symbol) -> Option<Holding> {
        self.get_holding(wallet_id, symbol).cloned()
    }

    fn holdings_of(&self, wallet_id: WalletId) -> Vec<Holding> {
        let mut holdings: Vec<Holding> = self.holdings().filter(|h| h.wallet_id == wallet_id).cloned().collect();
        holdings.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        holdings
    }

    fn future_order(&self, id: FutureOrderId) -> LedgerResult<FutureOrder> {
        self.get_future_order(id).cloned().ok_or(LedgerError::OrderNotFound(id))
    }

    fn p2p_order(&self, id: P2POrderId) -> LedgerResult<P2POrder> {
        self.get_p2p_order(id).cloned().ok_or(LedgerError::P2POrderNotFound(id))
    }

    fn bank_account(&self, account_number: &str) -> LedgerResult<BankAccount> {
        self.get_bank_account(account_number)
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound(account_number.to_string()))
    }

    // oldest first, so the first entry is the account a counterparty gets paid into
    fn bank_accounts_of(&self, user_id: UserId) -> Vec<BankAccount> {
        let mut accounts: Vec<BankAccount> =
            self.bank_accounts().filter(|a| a.user_id == user_id).cloned().collect();
        accounts.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.account_number.cmp(&b.account_number))
        });
        accounts
    }
}

/// Read-only view of committed state.
pub struct ReadView<'a> {
    pub(super) state: &'a LedgerState,
}

impl<'a> ReadView<'a> {
    pub fn spot_transactions(&self) -> &[SpotTransaction] {
        &self.state.spot_transactions
    }

    pub fn account_transactions(&self) -> &[AccountTransaction] {
        &self.state.account_transactions
    }

    pub fn internal_transfers(&self) -> &[InternalTransfer] {
        &self.state.internal_transfers
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.state.events.iter()
    }

    pub fn event_count(&self) -> usize {
        self.state.events.len()
    }
}

impl<'a> LedgerRead for ReadView<'a> {
    fn get_user(&self, id: UserId) -> Option<&User> {
        self.state.users.get(&id)
    }

    fn get_wallet(&self, id: WalletId) -> Option<&Wallet> {
        self.state.wallets.get(&id)
    }

    fn get_holding(&self, wallet_id: WalletId, symbol: &Symbol) -> Option<&Holding> {
        self.state.holdings.get(&(wallet_id, symbol.clone()))
    }

    fn get_future_order(&self, id: FutureOrderId) -> Option<&FutureOrder> {
        self.state.future_orders.get(&id)
    }

    fn get_p2p_order(&self, id: P2POrderId) -> Option<&P2POrder> {
        self.state.p2p_orders.get(&id)
    }

    fn get_bank_account(&self, account_number: &str) -> Option<&BankAccount> {
        self.state.bank_accounts.get(account_number)
    }

    fn users(&self) -> Rows<'_, User> {
        Box::new(self.state.users.values())
    }

    fn wallets(&self) -> Rows<'_, Wallet> {
        Box::new(self.state.wallets.values())
    }

    fn holdings(&self) -> Rows<'_, Holding> {
        Box::new(self.state.holdings.values())
    }

    fn future_orders(&self) -> Rows<'_, FutureOrder> {
        Box::new(self.state.future_orders.values())
    }

    fn p2p_orders(&self) -> Rows<'_, P2POrder> {
        Box::new(self.state.p2p_orders.values())
    }

    fn bank_accounts(&self) -> Rows<'_, BankAccount> {
        Box::new(self.state.bank_accounts.values())
    }
}

/// Exclusive, atomic unit of work. Nothing written here is visible to anyone else
/// until `Ledger::write` commits it.
pub struct Transaction<'a> {
    base: &'a LedgerState,
    staged: Staged,
    now: Timestamp,
}

impl<'a> Transaction<'a> {
    pub(super) fn new(base: &'a LedgerState, now: Timestamp) -> Self {
        Self {
            base,
            staged: Staged::new(base.counters),
            now,
        }
    }

    pub(super) fn into_staged(self) -> Staged {
        self.staged
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    pub fn emit(&mut self, payload: EventPayload) {
        let id = EventId(self.staged.counters.next_event);
        self.staged.counters.next_event += 1;
        self.staged.events.push(Event::new(id, self.now, payload));
    }

    pub fn next_record_id(&mut self) -> RecordId {
        let id = RecordId(self.staged.counters.next_record);
        self.staged.counters.next_record += 1;
        id
    }

    // users

    pub fn insert_user(&mut self, name: String, role: Role, merchant_price: Option<Price>) -> User {
        let id = UserId(self.staged.counters.next_user);
        self.staged.counters.next_user += 1;
        let user = User::new(id, name, role, merchant_price, self.now);
        self.staged.users.put(id, user.clone());
        user
    }

    pub fn put_user(&mut self, user: User) {
        self.staged.users.put(user.id, user);
    }

    // wallets

    pub fn insert_wallet(&mut self, user_id: UserId, wallet_type: WalletType) -> Wallet {
        let id = WalletId(self.staged.counters.next_wallet);
        self.staged.counters.next_wallet += 1;
        let wallet = Wallet::new(id, user_id, wallet_type, self.now);
        self.staged.wallets.put(id, wallet.clone());
        wallet
    }

    /// Stores a mutated wallet. A negative balance never reaches the table.
    pub fn put_wallet(&mut self, wallet: Wallet) -> LedgerResult<()> {
        if wallet.balance.is_negative() {
            let available = self.wallet(wallet.id).map(|w| w.balance).unwrap_or_else(|_| Quote::zero());
            return Err(LedgerError::InsufficientBalance {
                requested: available.checked_sub(wallet.balance)?,
                available,
            });
        }
        self.staged.wallets.put(wallet.id, wallet);
        Ok(())
    }

    /// Absolute balance set. Callers compute the value from a balance read in this
    /// transaction.
    pub fn set_balance(&mut self, wallet_id: WalletId, new_balance: Quote) -> LedgerResult<Wallet> {
        let mut wallet = self.wallet(wallet_id)?;
        wallet.balance = new_balance;
        self.put_wallet(wallet.clone())?;
        Ok(wallet)
    }

    // holdings

    /// Create-or-replace. Replaying the same call leaves the same row.
    pub fn upsert_holding(&mut self, wallet_id: WalletId, symbol: &Symbol, average_buy_price: Price, units: Decimal) -> LedgerResult<Holding> {
        if units < Decimal::ZERO {
            return Err(LedgerError::InvalidInput(format!("negative units {units} for {symbol}")));
        }
        let holding = Holding::new(wallet_id, symbol.clone(), units, average_buy_price, self.now);
        self.staged.holdings.put((wallet_id, symbol.clone()), holding.clone());
        Ok(holding)
    }

    pub fn put_holding(&mut self, holding: Holding) {
        self.staged
            .holdings
            .put((holding.wallet_id, holding.symbol.clone()), holding);
    }

    pub fn remove_holding(&mut self, wallet_id: WalletId, symbol: &Symbol) {
        self.staged.holdings.delete((wallet_id, symbol.clone()));
    }

    /// Relative change. A holding that reaches zero is deleted, one that would go
    /// below zero is refused.
    pub fn adjust_holding_units(&mut self, wallet_id: WalletId, symbol: &Symbol, delta: Decimal) -> LedgerResult<Option<Holding>> {
        let current = self.holding(wallet_id, symbol);
        let held = current.as_ref().map_or(Decimal::ZERO, |h| h.unit_number);
        let next = checked_add(held, delta)?;

        if next < Decimal::ZERO {
            return Err(LedgerError::InsufficientHoldings {
                symbol: symbol.to_string(),
                requested: -delta,
                held,
            });
        }

        match current {
            None => Err(LedgerError::InvalidInput(format!(
                "no {symbol} holding in {wallet_id} to adjust, create it with a price first"
            ))),
            Some(_) if next.is_zero() => {
                self.remove_holding(wallet_id, symbol);
                Ok(None)
            }
            Some(mut holding) => {
                holding.unit_number = next;
                holding.updated_at = self.now;
                self.put_holding(holding.clone());
                Ok(Some(holding))
            }
        }
    }

    // futures

    pub fn insert_future_order(&mut self, build: impl FnOnce(FutureOrderId) -> FutureOrder) -> FutureOrder {
        let id = FutureOrderId(self.staged.counters.next_future_order);
        self.staged.counters.next_future_order += 1;
        let order = build(id);
        self.staged.future_orders.put(id, order.clone());
        order
    }

    pub fn put_future_order(&mut self, order: FutureOrder) {
        self.staged.future_orders.put(order.id, order);
    }

    // p2p

    pub fn insert_p2p_order(&mut self, build: impl FnOnce(P2POrderId) -> P2POrder) -> P2POrder {
        let id = P2POrderId(self.staged.counters.next_p2p_order);
        self.staged.counters.next_p2p_order += 1;
        let order = build(id);
        self.staged.p2p_orders.put(id, order.clone());
        order
    }

    pub fn put_p2p_order(&mut self, order: P2POrder) {
        self.staged.p2p_orders.put(order.id, order);
    }

    // bank accounts

    pub fn put_bank_account(&mut self, account: BankAccount) -> LedgerResult<()> {
        if account.account_balance.is_negative() {
            return Err(LedgerError::InsufficientBalance {
                requested: account.account_balance.negate(),
                available: Quote::zero(),
            });
        }
        self.staged
            .bank_accounts
            .put(account.account_number.clone(), account);
        Ok(())
    }

    pub fn remove_bank_account(&mut self, account_number: &str) {
        self.staged.bank_accounts.delete(account_number.to_string());
    }

    // append-only records

    pub fn push_spot_transaction(&mut self, record: SpotTransaction) {
        self.staged.spot_transactions.push(record);
    }

    pub fn push_account_transaction(&mut self, record: AccountTransaction) {
        self.staged.account_transactions.push(record);
    }

    pub fn push_internal_transfer(&mut self, record: InternalTransfer) {
        self.staged.internal_transfers.push(record);
    }
}

impl<'a> LedgerRead for Transaction<'a> {
    fn get_user(&self, id: UserId) -> Option<&User> {
        self.staged.users.get(&self.base.users, &id)
    }

    fn get_wallet(&self, id: WalletId) -> Option<&Wallet> {
        self.staged.wallets.get(&self.base.wallets, &id)
    }

    fn get_holding(&self, wallet_id: WalletId, symbol: &Symbol) -> Option<&Holding> {
        self.staged.holdings.get(&self.base.holdings, &(wallet_id, symbol.clone()))
    }

    fn get_future_order(&self, id: FutureOrderId) -> Option<&FutureOrder> {
        self.staged.future_orders.get(&self.base.future_orders, &id)
    }

    fn get_p2p_order(&self, id: P2POrderId) -> Option<&P2POrder> {
        self.staged.p2p_orders.get(&self.base.p2p_orders, &id)
    }

    fn get_bank_account(&self, account_number: &str) -> Option<&BankAccount> {
        self.staged
            .bank_accounts
            .get(&self.base.bank_accounts, &account_number.to_string())
    }

    fn users(&self) -> Rows<'_, User> {
        Box::new(self.staged.users.iter(&self.base.users))
    }

    fn wallets(&self) -> Rows<'_, Wallet> {
        Box::new(self.staged.wallets.iter(&self.base.wallets))
    }

    fn holdings(&self) -> Rows<'_, Holding> {
        Box::new(self.staged.holdings.iter(&self.base.holdings))
    }

    fn future_orders(&self) -> Rows<'_, FutureOrder> {
        Box::new(self.staged.future_orders.iter(&self.base.future_orders))
    }

    fn p2p_orders(&self) -> Rows<'_, P2POrder> {
        Box::new(self.staged.p2p_orders.iter(&self.base.p2p_orders))
    }

    fn bank_accounts(&self) -> Rows<'_, BankAccount> {
        Box::new(self.staged.bank_accounts.iter(&self.base.bank_accounts))
    }
}
