// 10.0 engine/core.rs: the engine façade. holds the config, a shared ledger handle and
// the clock. every mutating call runs as one ledger transaction; every rejection is
// logged once, here, before it reaches the caller.

use super::results::Registration;
use crate::bank::{validate_account_number, BankAccount};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, LedgerConfig};
use crate::error::{LedgerError, LedgerResult};
use crate::events::{
    BalanceChangeEvent, BankAccountEvent, Event, EventPayload, MerchantRequotedEvent, UserRegisteredEvent,
    WalletOpenedEvent,
};
use crate::store::{Ledger, LedgerRead, ReadView, Transaction};
use crate::types::{Price, Quote, Role, UserId, WalletId, WalletType};
use crate::user::User;
use crate::wallet::Wallet;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};

/** 10.1: engine struct. cheap to share across threads by reference */
#[derive(Debug)]
pub struct Engine {
    pub(super) config: LedgerConfig,
    pub(super) ledger: Arc<Ledger>,
    pub(super) clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(config: LedgerConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: LedgerConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        let ledger = Arc::new(Ledger::new(&config));
        Ok(Self { config, ledger, clock })
    }

    /// Runs against an existing ledger, e.g. one restored from a snapshot.
    pub fn with_ledger(config: LedgerConfig, ledger: Arc<Ledger>, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, ledger, clock })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }

    // 10.2: plumbing shared by every operation

    pub(super) fn reject(&self, op: &'static str, error: LedgerError) -> LedgerError {
        if error.is_retryable() {
            warn!(op, code = error.code(), "ledger busy, operation not applied");
        } else {
            warn!(op, kind = %error.kind(), code = error.code(), error = %error, "operation rejected");
        }
        error
    }

    pub(super) fn write<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&mut Transaction<'_>) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        self.ledger.write(self.clock.now(), f).map_err(|e| self.reject(op, e))
    }

    pub(super) fn read<T>(&self, f: impl FnOnce(&ReadView<'_>) -> T) -> LedgerResult<T> {
        self.ledger.read(f)
    }

    // 10.3: users and wallets

    pub fn register_user(&self, name: &str, role: Role, merchant_price: Option<Decimal>) -> LedgerResult<Registration> {
        const OP: &str = "register_user";
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(self.reject(OP, LedgerError::InvalidInput("user name is empty".to_string())));
        }

        let quote = match (role, merchant_price) {
            (Role::Merchant, Some(raw)) => Some(Price::new(raw).ok_or_else(|| {
                self.reject(OP, LedgerError::InvalidInput(format!("merchant price must be positive, got {raw}")))
            })?),
            (Role::Merchant, None) => {
                return Err(self.reject(OP, LedgerError::InvalidInput("merchants must quote a price".to_string())));
            }
            (_, Some(_)) => {
                return Err(self.reject(OP, LedgerError::InvalidInput("only merchants quote a price".to_string())));
            }
            (_, None) => None,
        };

        let registration = self.write(OP, |tx| {
            if tx.user_by_name(&name).is_some() {
                return Err(LedgerError::UserExists(name.clone()));
            }

            let user = tx.insert_user(name.clone(), role, quote);
            let wallets: Vec<Wallet> = role
                .default_wallets()
                .iter()
                .map(|wallet_type| tx.insert_wallet(user.id, *wallet_type))
                .collect();

            tx.emit(EventPayload::UserRegistered(UserRegisteredEvent {
                user_id: user.id,
                role,
                wallets: wallets.iter().map(|w| w.id).collect(),
            }));

            Ok(Registration { user, wallets })
        })?;

        info!(
            user_id = registration.user.id.0,
            name = %registration.user.name,
            role = ?role,
            wallets = registration.wallets.len(),
            "user registered"
        );
        Ok(registration)
    }

    /// At most one wallet per type. Opening an existing type hands back that wallet.
    pub fn open_wallet(&self, user_id: UserId, wallet_type: WalletType) -> LedgerResult<Wallet> {
        self.write("open_wallet", |tx| {
            tx.user(user_id)?;
            if let Some(existing) = tx.find_wallet(user_id, wallet_type) {
                return Ok(existing);
            }

            let wallet = tx.insert_wallet(user_id, wallet_type);
            tx.emit(EventPayload::WalletOpened(WalletOpenedEvent {
                user_id,
                wallet_id: wallet.id,
                wallet_type,
            }));
            info!(user_id = user_id.0, wallet_id = wallet.id.0, %wallet_type, "wallet opened");
            Ok(wallet)
        })
    }

    // open orders keep the price they were created at
    pub fn set_merchant_price(&self, merchant_id: UserId, price: Decimal) -> LedgerResult<User> {
        const OP: &str = "set_merchant_price";
        let price = Price::new(price)
            .ok_or_else(|| self.reject(OP, LedgerError::InvalidInput(format!("merchant price must be positive, got {price}"))))?;

        self.write(OP, |tx| {
            let mut merchant = tx.user(merchant_id)?;
            if !merchant.is_merchant() {
                return Err(LedgerError::MerchantNotFound(merchant_id));
            }

            let old_price = merchant.merchant_price.replace(price);
            tx.put_user(merchant.clone());
            tx.emit(EventPayload::MerchantRequoted(MerchantRequotedEvent {
                merchant_id,
                old_price,
                new_price: price,
            }));
            info!(merchant_id = merchant_id.0, %price, "merchant requoted");
            Ok(merchant)
        })
    }

    // 10.4: funding

    pub fn deposit(&self, wallet_id: WalletId, amount: Decimal) -> LedgerResult<Wallet> {
        const OP: &str = "deposit";
        let amount = positive(amount, "deposit amount").map_err(|e| self.reject(OP, e))?;

        self.write(OP, |tx| {
            let mut wallet = tx.wallet(wallet_id)?;
            wallet.credit(amount)?;
            tx.put_wallet(wallet.clone())?;
            tx.emit(EventPayload::Deposit(BalanceChangeEvent {
                wallet_id,
                amount,
                new_balance: wallet.balance,
            }));
            info!(wallet_id = wallet_id.0, %amount, balance = %wallet.balance, "deposit");
            Ok(wallet)
        })
    }

    pub fn withdraw(&self, wallet_id: WalletId, amount: Decimal) -> LedgerResult<Wallet> {
        const OP: &str = "withdraw";
        let amount = positive(amount, "withdrawal amount").map_err(|e| self.reject(OP, e))?;

        self.write(OP, |tx| {
            let mut wallet = tx.wallet(wallet_id)?;
            wallet.debit(amount)?;
            tx.put_wallet(wallet.clone())?;
            tx.emit(EventPayload::Withdrawal(BalanceChangeEvent {
                wallet_id,
                amount,
                new_balance: wallet.balance,
            }));
            info!(wallet_id = wallet_id.0, %amount, balance = %wallet.balance, "withdrawal");
            Ok(wallet)
        })
    }

    pub fn open_bank_account(&self, user_id: UserId, account_number: &str, initial_balance: Decimal) -> LedgerResult<BankAccount> {
        const OP: &str = "open_bank_account";
        let account_number = validate_account_number(account_number).map_err(|e| self.reject(OP, e))?;
        if initial_balance < Decimal::ZERO {
            return Err(self.reject(
                OP,
                LedgerError::InvalidInput(format!("initial balance must not be negative, got {initial_balance}")),
            ));
        }

        self.write(OP, |tx| {
            tx.user(user_id)?;
            if tx.get_bank_account(&account_number).is_some() {
                return Err(LedgerError::AccountExists(account_number.clone()));
            }

            let account = BankAccount::new(account_number.clone(), user_id, Quote::new(initial_balance), tx.now());
            tx.put_bank_account(account.clone())?;
            tx.emit(EventPayload::BankAccountOpened(BankAccountEvent {
                user_id,
                account_number: account.account_number.clone(),
                balance: account.account_balance,
            }));
            info!(user_id = user_id.0, account = %account.account_number, balance = %account.account_balance, "bank account opened");
            Ok(account)
        })
    }

    /// Owner only. A funded account cannot be closed, fiat would vanish with it.
    pub fn close_bank_account(&self, user_id: UserId, account_number: &str) -> LedgerResult<BankAccount> {
        const OP: &str = "close_bank_account";
        let account_number = validate_account_number(account_number).map_err(|e| self.reject(OP, e))?;

        self.write(OP, |tx| {
            let account = tx.bank_account(&account_number)?;
            if account.user_id != user_id {
                return Err(LedgerError::Unauthorized(format!(
                    "bank account {account_number} does not belong to {user_id}"
                )));
            }
            if !account.account_balance.is_zero() {
                return Err(LedgerError::InvalidState(format!(
                    "bank account {account_number} still holds {}",
                    account.account_balance
                )));
            }

            tx.remove_bank_account(&account_number);
            tx.emit(EventPayload::BankAccountClosed(BankAccountEvent {
                user_id,
                account_number: account_number.clone(),
                balance: account.account_balance,
            }));
            info!(user_id = user_id.0, account = %account_number, "bank account closed");
            Ok(account)
        })
    }

    // 10.5: lookups

    pub fn user(&self, user_id: UserId) -> LedgerResult<User> {
        self.read(|view| view.user(user_id))?
    }

    pub fn user_by_name(&self, name: &str) -> LedgerResult<Option<User>> {
        self.read(|view| view.user_by_name(name.trim()))
    }

    pub fn merchants(&self) -> LedgerResult<Vec<User>> {
        self.read(|view| view.users().filter(|u| u.quote().is_some()).cloned().collect())
    }

    pub fn wallets(&self, user_id: UserId) -> LedgerResult<Vec<Wallet>> {
        self.read(|view| {
            view.user(user_id)?;
            Ok(view.wallets_of(user_id))
        })?
    }

    pub fn wallet(&self, user_id: UserId, wallet_type: WalletType) -> LedgerResult<Wallet> {
        self.read(|view| view.wallet_for(user_id, wallet_type))?
    }

    pub fn wallet_by_id(&self, wallet_id: WalletId) -> LedgerResult<Wallet> {
        self.read(|view| view.wallet(wallet_id))?
    }

    pub fn events(&self) -> LedgerResult<Vec<Event>> {
        self.read(|view| view.events().cloned().collect())
    }

    /// Last `n` events, oldest first.
    pub fn recent_events(&self, n: usize) -> LedgerResult<Vec<Event>> {
        self.read(|view| {
            let skip = view.event_count().saturating_sub(n);
            view.events().skip(skip).cloned().collect()
        })
    }

    // 10.6: totals

    pub fn total_wallet_balance(&self) -> LedgerResult<Quote> {
        self.read(|view| Quote::checked_sum(view.wallets().map(|w| w.balance)))?
    }

    pub fn total_bank_balance(&self) -> LedgerResult<Quote> {
        self.read(|view| Quote::checked_sum(view.bank_accounts().map(|a| a.account_balance)))?
    }
}

pub(super) fn positive(amount: Decimal, what: &str) -> LedgerResult<Quote> {
    if amount > Decimal::ZERO {
        Ok(Quote::new(amount))
    } else {
        Err(LedgerError::InvalidInput(format!("{what} must be positive, got {amount}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::Timestamp;
    use rust_decimal_macros::dec;

    fn engine() -> Engine {
        Engine::with_clock(LedgerConfig::default(), Arc::new(ManualClock::new(Timestamp::from_millis(1_000)))).unwrap()
    }

    #[test]
    fn test_registration_provisions_wallets() {
        let engine = engine();
        let alice = engine.register_user("alice", Role::Normal, None).unwrap();
        let types: Vec<WalletType> = alice.wallets.iter().map(|w| w.wallet_type).collect();
        assert_eq!(types, vec![WalletType::Future, WalletType::Spot]);

        let bob = engine.register_user("bob", Role::Merchant, Some(dec!(15500))).unwrap();
        assert_eq!(bob.wallets.len(), 1);
        assert_eq!(bob.wallets[0].wallet_type, WalletType::Merchant);
        assert_eq!(bob.user.quote().unwrap().value(), dec!(15500));

        let root = engine.register_user("root", Role::Admin, None).unwrap();
        assert!(root.wallets.is_empty());

        assert_eq!(engine.merchants().unwrap().len(), 1);
    }

    #[test]
    fn test_registration_rejections() {
        let engine = engine();
        engine.register_user("alice", Role::Normal, None).unwrap();

        assert!(matches!(
            engine.register_user(" alice ", Role::Normal, None),
            Err(LedgerError::UserExists(_))
        ));
        assert!(matches!(engine.register_user("  ", Role::Normal, None), Err(LedgerError::InvalidInput(_))));
        assert!(matches!(engine.register_user("m", Role::Merchant, None), Err(LedgerError::InvalidInput(_))));
        assert!(matches!(
            engine.register_user("m", Role::Merchant, Some(dec!(0))),
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.register_user("n", Role::Normal, Some(dec!(1))),
            Err(LedgerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_open_wallet_is_idempotent() {
        let engine = engine();
        let alice = engine.register_user("alice", Role::Normal, None).unwrap();
        let fund = engine.open_wallet(alice.user.id, WalletType::Fund).unwrap();
        let again = engine.open_wallet(alice.user.id, WalletType::Fund).unwrap();
        assert_eq!(fund.id, again.id);

        let spot = engine.open_wallet(alice.user.id, WalletType::Spot).unwrap();
        assert_eq!(spot.id, alice.wallets[1].id);
        assert_eq!(engine.wallets(alice.user.id).unwrap().len(), 3);

        assert!(matches!(
            engine.open_wallet(UserId(99), WalletType::Spot),
            Err(LedgerError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let engine = engine();
        let alice = engine.register_user("alice", Role::Normal, None).unwrap();
        let spot = engine.wallet(alice.user.id, WalletType::Spot).unwrap();

        engine.deposit(spot.id, dec!(100)).unwrap();
        let after = engine.withdraw(spot.id, dec!(40)).unwrap();
        assert_eq!(after.balance.value(), dec!(60));

        assert!(matches!(
            engine.withdraw(spot.id, dec!(60.01)),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert!(matches!(engine.deposit(spot.id, dec!(-5)), Err(LedgerError::InvalidInput(_))));
        assert_eq!(engine.wallet_by_id(spot.id).unwrap().balance.value(), dec!(60));
    }

    #[test]
    fn test_requote_keeps_role_check() {
        let engine = engine();
        let bob = engine.register_user("bob", Role::Merchant, Some(dec!(100))).unwrap();
        let alice = engine.register_user("alice", Role::Normal, None).unwrap();

        let requoted = engine.set_merchant_price(bob.user.id, dec!(101)).unwrap();
        assert_eq!(requoted.merchant_price.unwrap().value(), dec!(101));
        assert!(matches!(
            engine.set_merchant_price(alice.user.id, dec!(101)),
            Err(LedgerError::MerchantNotFound(_))
        ));
    }

    #[test]
    fn test_bank_account_lifecycle() {
        let engine = engine();
        let alice = engine.register_user("alice", Role::Normal, None).unwrap();
        let bob = engine.register_user("bob", Role::Normal, None).unwrap();

        engine.open_bank_account(alice.user.id, "A-1", dec!(0)).unwrap();
        engine.open_bank_account(alice.user.id, "A-2", dec!(10)).unwrap();
        assert!(matches!(
            engine.open_bank_account(bob.user.id, "A-1", dec!(0)),
            Err(LedgerError::AccountExists(_))
        ));

        assert!(matches!(
            engine.close_bank_account(bob.user.id, "A-1"),
            Err(LedgerError::Unauthorized(_))
        ));
        assert!(matches!(
            engine.close_bank_account(alice.user.id, "A-2"),
            Err(LedgerError::InvalidState(_))
        ));
        engine.close_bank_account(alice.user.id, "A-1").unwrap();
        assert!(matches!(
            engine.close_bank_account(alice.user.id, "A-1"),
            Err(LedgerError::AccountNotFound(_))
        ));
        assert_eq!(engine.total_bank_balance().unwrap().value(), dec!(10));
    }

    #[test]
    fn test_events_and_recent_events() {
        let engine = engine();
        engine.register_user("alice", Role::Normal, None).unwrap();
        engine.register_user("bob", Role::Merchant, Some(dec!(1))).unwrap();
        engine.register_user("carol", Role::Normal, None).unwrap();

        assert_eq!(engine.events().unwrap().len(), 3);
        let recent = engine.recent_events(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].id < recent[1].id);
        assert_eq!(engine.recent_events(10).unwrap().len(), 3);
    }

    #[test]
    fn test_invalid_config_refused() {
        let mut config = LedgerConfig::default();
        config.lock_timeout_ms = 0;
        assert!(Engine::new(config).is_err());
    }
}
