//! Bank account transfers. Shared by user transfers and the fiat leg of p2p orders.

use super::core::Engine;
use crate::bank::{validate_account_number, BankAccount};
use crate::error::{LedgerError, LedgerResult};
use crate::events::{BankTransferEvent, EventPayload};
use crate::records::AccountTransaction;
use crate::requests::BankTransferRequest;
use crate::store::{LedgerRead, Transaction};
use crate::types::{P2POrderId, Quote, UserId};
use tracing::info;

impl Engine {
    /// Debit `source`, credit `target` and append the record, inside the caller's
    /// transaction. Accounts are read in account-number order.
    pub(super) fn move_fiat(
        &self,
        tx: &mut Transaction<'_>,
        source: &str,
        target: &str,
        amount: Quote,
        note: Option<String>,
        p2p_order: Option<P2POrderId>,
    ) -> LedgerResult<AccountTransaction> {
        if source == target {
            return Err(LedgerError::SameAccount(source.to_string()));
        }

        let (mut from, mut to) = if source < target {
            let from = tx.bank_account(source)?;
            (from, tx.bank_account(target)?)
        } else {
            let to = tx.bank_account(target)?;
            (tx.bank_account(source)?, to)
        };

        from.debit(amount)?;
        to.credit(amount)?;
        tx.put_bank_account(from)?;
        tx.put_bank_account(to)?;

        let record = AccountTransaction {
            id: tx.next_record_id(),
            source_account: source.to_string(),
            target_account: target.to_string(),
            amount,
            note,
            created_at: tx.now(),
        };
        tx.push_account_transaction(record.clone());
        tx.emit(EventPayload::BankTransfer(BankTransferEvent {
            record_id: record.id,
            source_account: record.source_account.clone(),
            target_account: record.target_account.clone(),
            amount,
            p2p_order,
        }));
        Ok(record)
    }

    /// User initiated transfer out of one of their own accounts.
    pub fn bank_transfer(&self, request: &BankTransferRequest) -> LedgerResult<AccountTransaction> {
        const OP: &str = "bank_transfer";
        let transfer = request.validate().map_err(|e| self.reject(OP, e))?;

        let record = self.write(OP, |tx| {
            let source = tx.bank_account(&transfer.source_account)?;
            tx.bank_account(&transfer.target_account)?;
            if source.user_id != transfer.user_id {
                return Err(LedgerError::Unauthorized(format!(
                    "bank account {} does not belong to {}",
                    source.account_number, transfer.user_id
                )));
            }

            self.move_fiat(
                tx,
                &transfer.source_account,
                &transfer.target_account,
                transfer.amount,
                transfer.note.clone(),
                None,
            )
        })?;

        info!(
            record_id = record.id.0,
            source = %record.source_account,
            target = %record.target_account,
            amount = %record.amount,
            "bank transfer"
        );
        Ok(record)
    }

    /// Oldest first; the first account is the one p2p payments land in.
    pub fn bank_accounts(&self, user_id: UserId) -> LedgerResult<Vec<BankAccount>> {
        self.read(|view| {
            view.user(user_id)?;
            Ok(view.bank_accounts_of(user_id))
        })?
    }

    /// Transfers in and out of the account, newest first.
    pub fn account_history(&self, account_number: &str) -> LedgerResult<Vec<AccountTransaction>> {
        let account_number = validate_account_number(account_number)?;
        self.read(|view| {
            view.bank_account(&account_number)?;
            let mut rows: Vec<AccountTransaction> = view
                .account_transactions()
                .iter()
                .filter(|t| t.touches(&account_number))
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
            Ok(rows)
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::types::Role;
    use rust_decimal_macros::dec;

    fn setup() -> (Engine, UserId, UserId) {
        let engine = Engine::new(LedgerConfig::default()).unwrap();
        let alice = engine.register_user("alice", Role::Normal, None).unwrap().user.id;
        let bob = engine.register_user("bob", Role::Normal, None).unwrap().user.id;
        engine.open_bank_account(alice, "A-1", dec!(100)).unwrap();
        engine.open_bank_account(bob, "B-1", dec!(5)).unwrap();
        (engine, alice, bob)
    }

    #[test]
    fn test_transfer_moves_exact_amount() {
        let (engine, alice, bob) = setup();
        let record = engine
            .bank_transfer(&BankTransferRequest::new(alice, "A-1", "B-1", dec!(40.25)).with_note("lunch"))
            .unwrap();
        assert_eq!(record.note.as_deref(), Some("lunch"));

        assert_eq!(engine.bank_accounts(alice).unwrap()[0].account_balance.value(), dec!(59.75));
        assert_eq!(engine.bank_accounts(bob).unwrap()[0].account_balance.value(), dec!(45.25));
        assert_eq!(engine.total_bank_balance().unwrap().value(), dec!(105));

        assert_eq!(engine.account_history("A-1").unwrap().len(), 1);
        assert_eq!(engine.account_history("B-1").unwrap()[0].id, record.id);
    }

    #[test]
    fn test_transfer_failures() {
        let (engine, alice, bob) = setup();
        assert!(matches!(
            engine.bank_transfer(&BankTransferRequest::new(alice, "A-1", "A-1", dec!(1))),
            Err(LedgerError::SameAccount(_))
        ));
        assert!(matches!(
            engine.bank_transfer(&BankTransferRequest::new(alice, "A-1", "Z-9", dec!(1))),
            Err(LedgerError::AccountNotFound(_))
        ));
        assert!(matches!(
            engine.bank_transfer(&BankTransferRequest::new(alice, "A-1", "B-1", dec!(100.01))),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            engine.bank_transfer(&BankTransferRequest::new(bob, "A-1", "B-1", dec!(1))),
            Err(LedgerError::Unauthorized(_))
        ));
        assert!(matches!(
            engine.bank_transfer(&BankTransferRequest::new(alice, "A-1", "B-1", dec!(0))),
            Err(LedgerError::InvalidInput(_))
        ));
        assert!(engine.account_history("A-1").unwrap().is_empty());
        assert_eq!(engine.total_bank_balance().unwrap().value(), dec!(105));
    }

    #[test]
    fn test_transfer_in_reverse_lock_order() {
        let (engine, _, bob) = setup();
        // "B-1" > "A-1", so the target is read first
        engine.bank_transfer(&BankTransferRequest::new(bob, "B-1", "A-1", dec!(5))).unwrap();
        assert!(engine.bank_accounts(bob).unwrap()[0].account_balance.is_zero());
    }
}
