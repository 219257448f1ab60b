//! Wallet balances.
//!
//! A wallet holds one scalar balance in the base currency. `locked_balance` is the
//! reserved part of it; only the remainder can be debited.

use crate::error::LedgerError;
use crate::types::{Quote, Timestamp, UserId, WalletId, WalletType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub wallet_type: WalletType,
    pub balance: Quote,
    #[serde(default)]
    pub locked_balance: Quote,
    pub created_at: Timestamp,
}

impl Wallet {
    pub fn new(id: WalletId, user_id: UserId, wallet_type: WalletType, timestamp: Timestamp) -> Self {
        Self {
            id,
            user_id,
            wallet_type,
            balance: Quote::zero(),
            locked_balance: Quote::zero(),
            created_at: timestamp,
        }
    }

    pub fn available(&self) -> Quote {
        // both sides are non-negative, so the saturating form never clips
        Quote::new(self.balance.value().saturating_sub(self.locked_balance.value()))
    }

    pub fn is_owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Ownership and type check used at the top of every wallet-scoped operation.
    pub fn ensure(&self, user_id: UserId, expected: WalletType) -> Result<(), LedgerError> {
        if self.is_owned_by(user_id) && self.wallet_type == expected {
            Ok(())
        } else {
            Err(LedgerError::InvalidWallet {
                wallet_id: self.id,
                user_id,
                expected,
            })
        }
    }

    pub fn credit(&mut self, amount: Quote) -> Result<(), LedgerError> {
        self.balance = self.balance.checked_add(amount)?;
        Ok(())
    }

    pub fn debit(&mut self, amount: Quote) -> Result<(), LedgerError> {
        let available = self.available();
        if amount > available {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available,
            });
        }
        self.balance = self.balance.checked_sub(amount)?;
        Ok(())
    }
}
