// 10.7 engine/p2p.rs: peer to peer fiat/crypto exchange against a merchant quote.
// pending -> banked (fiat leg) -> completed (crypto leg), or pending -> cancelled.
// counterparties are always taken from the stored order, never from the caller.

use super::core::Engine;
use super::results::{PaymentResult, ReleaseResult};
use crate::error::{LedgerError, LedgerResult};
use crate::events::{CryptoReleasedEvent, EventPayload, P2PStateChangedEvent};
use crate::p2p::{P2PAction, P2POrder, P2PState};
use crate::requests::{CreateP2POrderRequest, TransferPaymentRequest};
use crate::store::{LedgerRead, Transaction};
use crate::types::{P2POrderId, TradeSide, UserId, WalletType};
use tracing::info;

fn record_transition(tx: &mut Transaction<'_>, order: &mut P2POrder, to: P2PState, actor: UserId) {
    let from = order.state;
    order.transition(to, tx.now());
    tx.put_p2p_order(order.clone());
    tx.emit(EventPayload::P2PStateChanged(P2PStateChangedEvent {
        order_id: order.id,
        from: Some(from),
        to,
        actor,
    }));
}

impl Engine {
    /// Snapshots the merchant's current quote into a new pending order.
    pub fn create_p2p_order(&self, request: &CreateP2POrderRequest) -> LedgerResult<P2POrder> {
        const OP: &str = "create_p2p_order";
        let crypto_units = request.validate().map_err(|e| self.reject(OP, e))?;

        let order = self.write(OP, |tx| {
            tx.user(request.user_id)?;
            let unit_price = tx
                .get_user(request.merchant_id)
                .and_then(|m| m.quote())
                .ok_or(LedgerError::MerchantNotFound(request.merchant_id))?;

            let now = tx.now();
            let order = tx.insert_p2p_order(|id| {
                P2POrder::new(
                    id,
                    request.user_id,
                    request.merchant_id,
                    request.side,
                    crypto_units,
                    unit_price,
                    now,
                )
            });
            // a fiat leg that cannot be represented could never be paid; the insert rolls back
            order.fiat_amount()?;
            tx.emit(EventPayload::P2PStateChanged(P2PStateChangedEvent {
                order_id: order.id,
                from: None,
                to: P2PState::Pending,
                actor: request.user_id,
            }));
            Ok(order)
        })?;

        info!(
            order_id = order.id.0,
            user_id = order.user_id.0,
            merchant_id = order.merchant_id.0,
            side = %order.side,
            units = %order.crypto_units,
            unit_price = %order.unit_price,
            "p2p order created"
        );
        Ok(order)
    }

    /// Only the order's own user, only while pending.
    pub fn cancel_p2p_order(&self, order_id: P2POrderId, user_id: UserId) -> LedgerResult<P2POrder> {
        self.write("cancel_p2p_order", |tx| {
            let mut order = tx.p2p_order(order_id)?;
            if order.user_id != user_id {
                return Err(LedgerError::Unauthorized(format!("only the order's user may cancel {order_id}")));
            }
            order.ensure_state(P2PAction::Cancel, self.config.p2p.sell_confirm_requires_payment)?;

            record_transition(tx, &mut order, P2PState::Cancelled, user_id);
            info!(order_id = order_id.0, user_id = user_id.0, "p2p order cancelled");
            Ok(order)
        })
    }

    /// Fiat leg. The payer is the user on a buy and the merchant on a sell; the
    /// money lands in the payee's oldest bank account.
    pub fn transfer_payment(&self, request: &TransferPaymentRequest) -> LedgerResult<PaymentResult> {
        const OP: &str = "transfer_payment";
        let payment = request.validate().map_err(|e| self.reject(OP, e))?;
        let p2p_config = &self.config.p2p;

        let result = self.write(OP, |tx| {
            let mut order = tx.p2p_order(payment.order_id)?;
            let payer = order.payer();
            if payment.payer_id != payer {
                return Err(LedgerError::Unauthorized(format!(
                    "{} is paid by {payer}, not {}",
                    order.id, payment.payer_id
                )));
            }
            order.ensure_state(P2PAction::TransferPayment, p2p_config.sell_confirm_requires_payment)?;

            // exact mode wants the amount to the cent; relaxed mode still refuses short payments
            let due = order.fiat_amount()?;
            if p2p_config.require_exact_payment && payment.amount != due {
                return Err(LedgerError::InvalidInput(format!(
                    "payment {} does not match the {due} due on {}",
                    payment.amount, order.id
                )));
            }
            if payment.amount < due {
                return Err(LedgerError::InvalidInput(format!(
                    "payment {} is short of the {due} due on {}",
                    payment.amount, order.id
                )));
            }

            let source = tx.bank_account(&payment.source_account)?;
            if source.user_id != payer {
                return Err(LedgerError::Unauthorized(format!(
                    "bank account {} does not belong to {payer}",
                    source.account_number
                )));
            }
            let payee = order.payee();
            let target = tx
                .bank_accounts_of(payee)
                .into_iter()
                .next()
                .ok_or_else(|| LedgerError::AccountNotFound(format!("for {payee}")))?;

            let note = format!("p2p {} {}", order.side, order.id);
            let transaction = self.move_fiat(
                tx,
                &source.account_number,
                &target.account_number,
                payment.amount,
                Some(note),
                Some(order.id),
            )?;

            order.fiat_transaction = Some(transaction.id);
            record_transition(tx, &mut order, P2PState::Banked, payer);
            Ok(PaymentResult { order, transaction })
        })?;

        info!(
            order_id = result.order.id.0,
            record_id = result.transaction.id.0,
            amount = %result.transaction.amount,
            "p2p payment banked"
        );
        Ok(result)
    }

    /// Crypto leg. A buy is released by the merchant (merchant wallet to the user's
    /// spot wallet), a sell by the user (spot wallet to the merchant wallet).
    pub fn confirm_and_release(&self, order_id: P2POrderId, confirmer_id: UserId) -> LedgerResult<ReleaseResult> {
        let result = self.write("confirm_and_release", |tx| {
            let mut order = tx.p2p_order(order_id)?;
            let confirmer = order.confirmer();
            if confirmer_id != confirmer {
                return Err(LedgerError::Unauthorized(format!(
                    "{order_id} can only be released by {confirmer}, not {confirmer_id}"
                )));
            }
            order.ensure_state(P2PAction::Release, self.config.p2p.sell_confirm_requires_payment)?;

            let merchant_wallet = tx.wallet_for(order.merchant_id, WalletType::Merchant)?;
            let user_wallet = tx.wallet_for(order.user_id, WalletType::Spot)?;
            let (mut source, mut target) = match order.side {
                TradeSide::Buy => (merchant_wallet, user_wallet),
                TradeSide::Sell => (user_wallet, merchant_wallet),
            };

            let amount = order.crypto_amount();
            source.debit(amount)?;
            target.credit(amount)?;
            tx.put_wallet(source.clone())?;
            tx.put_wallet(target.clone())?;

            tx.emit(EventPayload::CryptoReleased(CryptoReleasedEvent {
                order_id,
                from_wallet: source.id,
                to_wallet: target.id,
                amount,
            }));
            record_transition(tx, &mut order, P2PState::Completed, confirmer_id);

            Ok(ReleaseResult { order, source, target })
        })?;

        info!(
            order_id = order_id.0,
            from_wallet = result.source.id.0,
            to_wallet = result.target.id.0,
            amount = %result.order.crypto_units,
            "p2p order completed"
        );
        Ok(result)
    }

    /// Orders where the user is either side, newest first.
    pub fn p2p_orders_for(&self, user_id: UserId) -> LedgerResult<Vec<P2POrder>> {
        self.read(|view| {
            view.user(user_id)?;
            let mut orders: Vec<P2POrder> = view.p2p_orders().filter(|o| o.is_party(user_id)).cloned().collect();
            orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
            Ok(orders)
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::types::Role;
    use rust_decimal_macros::dec;

    struct Fixture {
        engine: Engine,
        user: UserId,
        merchant: UserId,
    }

    // user: spot 50, bank U-1 with 2000. merchant: wallet 500 at 15 per unit, bank M-1 with 1000
    fn fixture(config: LedgerConfig) -> Fixture {
        let engine = Engine::new(config).unwrap();
        let user = engine.register_user("alice", Role::Normal, None).unwrap().user.id;
        let merchant = engine.register_user("mike", Role::Merchant, Some(dec!(15))).unwrap().user.id;

        let spot = engine.wallet(user, WalletType::Spot).unwrap();
        engine.deposit(spot.id, dec!(50)).unwrap();
        let merchant_wallet = engine.wallet(merchant, WalletType::Merchant).unwrap();
        engine.deposit(merchant_wallet.id, dec!(500)).unwrap();

        engine.open_bank_account(user, "U-1", dec!(2000)).unwrap();
        engine.open_bank_account(merchant, "M-1", dec!(1000)).unwrap();
        Fixture { engine, user, merchant }
    }

    fn balance(f: &Fixture, user: UserId, wallet_type: WalletType) -> rust_decimal::Decimal {
        f.engine.wallet(user, wallet_type).unwrap().balance.value()
    }

    #[test]
    fn test_buy_order_full_flow() {
        let f = fixture(LedgerConfig::default());
        let order = f
            .engine
            .create_p2p_order(&CreateP2POrderRequest::new(f.user, f.merchant, TradeSide::Buy, dec!(10)))
            .unwrap();
        assert_eq!(order.fiat_amount().unwrap().value(), dec!(150));

        // release before the fiat leg is refused
        assert!(matches!(
            f.engine.confirm_and_release(order.id, f.merchant),
            Err(LedgerError::InvalidState(_))
        ));

        let paid = f
            .engine
            .transfer_payment(&TransferPaymentRequest::new(order.id, f.user, "U-1", dec!(150)))
            .unwrap();
        assert_eq!(paid.order.state, P2PState::Banked);
        assert_eq!(paid.order.fiat_transaction, Some(paid.transaction.id));
        assert_eq!(paid.transaction.target_account, "M-1");

        let released = f.engine.confirm_and_release(order.id, f.merchant).unwrap();
        assert_eq!(released.order.state, P2PState::Completed);
        assert_eq!(balance(&f, f.user, WalletType::Spot), dec!(60));
        assert_eq!(balance(&f, f.merchant, WalletType::Merchant), dec!(490));
        assert_eq!(f.engine.total_bank_balance().unwrap().value(), dec!(3000));
    }

    #[test]
    fn test_sell_order_released_without_payment_by_default() {
        let f = fixture(LedgerConfig::default());
        let order = f
            .engine
            .create_p2p_order(&CreateP2POrderRequest::new(f.user, f.merchant, TradeSide::Sell, dec!(20)))
            .unwrap();

        let released = f.engine.confirm_and_release(order.id, f.user).unwrap();
        assert_eq!(released.order.state, P2PState::Completed);
        assert_eq!(balance(&f, f.user, WalletType::Spot), dec!(30));
        assert_eq!(balance(&f, f.merchant, WalletType::Merchant), dec!(520));
    }

    #[test]
    fn test_sell_order_strict_needs_payment() {
        let f = fixture(LedgerConfig::strict());
        let order = f
            .engine
            .create_p2p_order(&CreateP2POrderRequest::new(f.user, f.merchant, TradeSide::Sell, dec!(20)))
            .unwrap();
        assert!(matches!(
            f.engine.confirm_and_release(order.id, f.user),
            Err(LedgerError::InvalidState(_))
        ));

        // on a sell the merchant pays the user
        assert!(matches!(
            f.engine
                .transfer_payment(&TransferPaymentRequest::new(order.id, f.user, "U-1", dec!(300))),
            Err(LedgerError::Unauthorized(_))
        ));
        f.engine
            .transfer_payment(&TransferPaymentRequest::new(order.id, f.merchant, "M-1", dec!(300)))
            .unwrap();
        f.engine.confirm_and_release(order.id, f.user).unwrap();
        assert_eq!(f.engine.bank_accounts(f.user).unwrap()[0].account_balance.value(), dec!(2300));
    }

    #[test]
    fn test_release_by_wrong_party_unauthorized() {
        let f = fixture(LedgerConfig::default());
        let other = f.engine.register_user("mona", Role::Merchant, Some(dec!(14))).unwrap().user.id;
        let order = f
            .engine
            .create_p2p_order(&CreateP2POrderRequest::new(f.user, f.merchant, TradeSide::Buy, dec!(1)))
            .unwrap();
        f.engine
            .transfer_payment(&TransferPaymentRequest::new(order.id, f.user, "U-1", dec!(15)))
            .unwrap();

        for stranger in [other, f.user] {
            assert!(matches!(
                f.engine.confirm_and_release(order.id, stranger),
                Err(LedgerError::Unauthorized(_))
            ));
        }
        assert_eq!(balance(&f, f.merchant, WalletType::Merchant), dec!(500));
    }

    #[test]
    fn test_payment_checks() {
        let f = fixture(LedgerConfig::default());
        let order = f
            .engine
            .create_p2p_order(&CreateP2POrderRequest::new(f.user, f.merchant, TradeSide::Buy, dec!(10)))
            .unwrap();

        // wrong amount
        assert!(matches!(
            f.engine
                .transfer_payment(&TransferPaymentRequest::new(order.id, f.user, "U-1", dec!(149))),
            Err(LedgerError::InvalidInput(_))
        ));
        // someone else's account
        assert!(matches!(
            f.engine
                .transfer_payment(&TransferPaymentRequest::new(order.id, f.user, "M-1", dec!(150))),
            Err(LedgerError::Unauthorized(_))
        ));
        assert_eq!(f.engine.p2p_orders_for(f.user).unwrap()[0].state, P2PState::Pending);
    }

    #[test]
    fn test_relaxed_payment_still_refuses_short_amounts() {
        let mut config = LedgerConfig::default();
        config.p2p.require_exact_payment = false;
        let f = fixture(config);
        let order = f
            .engine
            .create_p2p_order(&CreateP2POrderRequest::new(f.user, f.merchant, TradeSide::Buy, dec!(10)))
            .unwrap();

        let short = f
            .engine
            .transfer_payment(&TransferPaymentRequest::new(order.id, f.user, "U-1", dec!(149.99)));
        assert!(matches!(short, Err(LedgerError::InvalidInput(_))));
        assert_eq!(f.engine.p2p_orders_for(f.user).unwrap()[0].state, P2PState::Pending);
        assert_eq!(f.engine.bank_accounts(f.user).unwrap()[0].account_balance.value(), dec!(2000));

        // paying over is the payer's call
        let paid = f
            .engine
            .transfer_payment(&TransferPaymentRequest::new(order.id, f.user, "U-1", dec!(160)))
            .unwrap();
        assert_eq!(paid.order.state, P2PState::Banked);
        assert_eq!(paid.transaction.amount.value(), dec!(160));
        assert_eq!(f.engine.bank_accounts(f.user).unwrap()[0].account_balance.value(), dec!(1840));
    }

    #[test]
    fn test_oversized_order_refused_at_creation() {
        let f = fixture(LedgerConfig::default());
        let result = f.engine.create_p2p_order(&CreateP2POrderRequest::new(
            f.user,
            f.merchant,
            TradeSide::Buy,
            dec!(10000000000000000000000000000),
        ));
        assert!(matches!(result, Err(LedgerError::ArithmeticOverflow(_))));
        assert!(f.engine.p2p_orders_for(f.user).unwrap().is_empty());
    }

    #[test]
    fn test_payee_without_bank_account() {
        let f = fixture(LedgerConfig::default());
        let bare = f.engine.register_user("nobank", Role::Merchant, Some(dec!(2))).unwrap().user.id;
        let order = f
            .engine
            .create_p2p_order(&CreateP2POrderRequest::new(f.user, bare, TradeSide::Buy, dec!(1)))
            .unwrap();
        assert!(matches!(
            f.engine
                .transfer_payment(&TransferPaymentRequest::new(order.id, f.user, "U-1", dec!(2))),
            Err(LedgerError::AccountNotFound(_))
        ));
        assert_eq!(f.engine.total_bank_balance().unwrap().value(), dec!(3000));
    }

    #[test]
    fn test_cancel_rules() {
        let f = fixture(LedgerConfig::default());
        let order = f
            .engine
            .create_p2p_order(&CreateP2POrderRequest::new(f.user, f.merchant, TradeSide::Buy, dec!(1)))
            .unwrap();
        assert!(matches!(
            f.engine.cancel_p2p_order(order.id, f.merchant),
            Err(LedgerError::Unauthorized(_))
        ));
        let cancelled = f.engine.cancel_p2p_order(order.id, f.user).unwrap();
        assert_eq!(cancelled.state, P2PState::Cancelled);

        assert!(matches!(
            f.engine.cancel_p2p_order(order.id, f.user),
            Err(LedgerError::InvalidState(_))
        ));
        assert!(matches!(
            f.engine
                .transfer_payment(&TransferPaymentRequest::new(order.id, f.user, "U-1", dec!(15))),
            Err(LedgerError::InvalidState(_))
        ));
    }

    #[test]
    fn test_order_keeps_snapshot_price() {
        let f = fixture(LedgerConfig::default());
        let order = f
            .engine
            .create_p2p_order(&CreateP2POrderRequest::new(f.user, f.merchant, TradeSide::Buy, dec!(2)))
            .unwrap();
        f.engine.set_merchant_price(f.merchant, dec!(20)).unwrap();
        // still 2 * 15
        f.engine
            .transfer_payment(&TransferPaymentRequest::new(order.id, f.user, "U-1", dec!(30)))
            .unwrap();
    }

    #[test]
    fn test_non_merchant_counterparty() {
        let f = fixture(LedgerConfig::default());
        let bob = f.engine.register_user("bob", Role::Normal, None).unwrap().user.id;
        assert!(matches!(
            f.engine
                .create_p2p_order(&CreateP2POrderRequest::new(f.user, bob, TradeSide::Buy, dec!(1))),
            Err(LedgerError::MerchantNotFound(_))
        ));
    }

    #[test]
    fn test_release_needs_crypto_balance() {
        let f = fixture(LedgerConfig::default());
        let order = f
            .engine
            .create_p2p_order(&CreateP2POrderRequest::new(f.user, f.merchant, TradeSide::Sell, dec!(51)))
            .unwrap();
        assert!(matches!(
            f.engine.confirm_and_release(order.id, f.user),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert_eq!(f.engine.p2p_orders_for(f.merchant).unwrap()[0].state, P2PState::Pending);
    }
}
