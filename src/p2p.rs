// 5.0: p2p fiat/crypto orders between a user and a merchant.
// pending --payment--> banked --release--> completed, pending --cancel--> cancelled.
// 5.1 holds the transition table, 5.2 who pays and who confirms for each side.

use crate::error::{LedgerError, LedgerResult};
use crate::types::{checked_mul, P2POrderId, Price, Quote, RecordId, Timestamp, TradeSide, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum P2PState {
    Pending,
    Banked,
    Completed,
    Cancelled,
}

impl P2PState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, P2PState::Completed | P2PState::Cancelled)
    }
}

impl fmt::Display for P2PState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            P2PState::Pending => "pending",
            P2PState::Banked => "banked",
            P2PState::Completed => "completed",
            P2PState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P2PAction {
    Cancel,
    TransferPayment,
    Release,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct P2POrder {
    pub id: P2POrderId,
    pub user_id: UserId,
    pub merchant_id: UserId,
    pub side: TradeSide,
    pub crypto_units: Decimal,
    /// Merchant quote at creation. Later re-quotes do not touch it.
    pub unit_price: Price,
    #[serde(default)]
    pub fiat_transaction: Option<RecordId>,
    pub state: P2PState,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl P2POrder {
    pub fn new(
        id: P2POrderId,
        user_id: UserId,
        merchant_id: UserId,
        side: TradeSide,
        crypto_units: Decimal,
        unit_price: Price,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            merchant_id,
            side,
            crypto_units,
            unit_price,
            fiat_transaction: None,
            state: P2PState::Pending,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    pub fn fiat_amount(&self) -> LedgerResult<Quote> {
        checked_mul(self.crypto_units, self.unit_price.value()).map(Quote::new)
    }

    pub fn crypto_amount(&self) -> Quote {
        Quote::new(self.crypto_units)
    }

    // 5.2: buy → user pays fiat, merchant releases crypto. sell → the reverse.
    pub fn payer(&self) -> UserId {
        match self.side {
            TradeSide::Buy => self.user_id,
            TradeSide::Sell => self.merchant_id,
        }
    }

    pub fn payee(&self) -> UserId {
        match self.side {
            TradeSide::Buy => self.merchant_id,
            TradeSide::Sell => self.user_id,
        }
    }

    // the party that received fiat confirms and releases crypto
    pub fn confirmer(&self) -> UserId {
        self.payee()
    }

    pub fn is_party(&self, user_id: UserId) -> bool {
        user_id == self.user_id || user_id == self.merchant_id
    }

    // 5.1: which states an action may start from. sell releases may skip the recorded
    // payment when the merchant paid out of band, unless the ledger is configured strict.
    pub fn allowed_from(&self, action: P2PAction, sell_confirm_requires_payment: bool) -> &'static [P2PState] {
        match action {
            P2PAction::Cancel | P2PAction::TransferPayment => &[P2PState::Pending],
            P2PAction::Release => match self.side {
                TradeSide::Sell if !sell_confirm_requires_payment => &[P2PState::Pending, P2PState::Banked],
                _ => &[P2PState::Banked],
            },
        }
    }

    pub fn ensure_state(&self, action: P2PAction, sell_confirm_requires_payment: bool) -> Result<(), LedgerError> {
        let allowed = self.allowed_from(action, sell_confirm_requires_payment);
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(LedgerError::InvalidState(format!(
                "{} is {}, {:?} needs one of {:?}",
                self.id, self.state, action, allowed
            )))
        }
    }

    pub fn transition(&mut self, to: P2PState, timestamp: Timestamp) {
        debug_assert!(!self.state.is_terminal(), "transition out of a terminal state");
        self.state = to;
        self.updated_at = timestamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(side: TradeSide) -> P2POrder {
        P2POrder::new(
            P2POrderId(1),
            UserId(1),
            UserId(2),
            side,
            dec!(100),
            Price::new_unchecked(dec!(15500)),
            Timestamp::from_millis(0),
        )
    }

    #[test]
    fn fiat_amount_uses_snapshot_price() {
        assert_eq!(order(TradeSide::Buy).fiat_amount().unwrap().value(), dec!(1550000));
    }

    #[test]
    fn roles_per_side() {
        let buy = order(TradeSide::Buy);
        assert_eq!(buy.payer(), UserId(1));
        assert_eq!(buy.confirmer(), UserId(2));

        let sell = order(TradeSide::Sell);
        assert_eq!(sell.payer(), UserId(2));
        assert_eq!(sell.confirmer(), UserId(1));
    }

    #[test]
    fn buy_release_needs_banked() {
        let mut buy = order(TradeSide::Buy);
        assert!(buy.ensure_state(P2PAction::Release, false).is_err());
        buy.transition(P2PState::Banked, Timestamp::from_millis(1));
        assert!(buy.ensure_state(P2PAction::Release, false).is_ok());
        assert!(buy.ensure_state(P2PAction::Cancel, false).is_err());
    }

    #[test]
    fn sell_release_from_pending_is_configurable() {
        let sell = order(TradeSide::Sell);
        assert!(sell.ensure_state(P2PAction::Release, false).is_ok());
        assert!(matches!(
            sell.ensure_state(P2PAction::Release, true),
            Err(LedgerError::InvalidState(_))
        ));
    }

    #[test]
    fn terminal_states_allow_nothing() {
        let mut cancelled = order(TradeSide::Sell);
        cancelled.transition(P2PState::Cancelled, Timestamp::from_millis(1));
        for action in [P2PAction::Cancel, P2PAction::TransferPayment, P2PAction::Release] {
            assert!(cancelled.ensure_state(action, false).is_err());
        }
        assert!(cancelled.state.is_terminal());
    }
}
