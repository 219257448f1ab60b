//! Platform-internal bank accounts carrying fiat balances.

use crate::error::LedgerError;
use crate::types::{Quote, Timestamp, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_number: String,
    pub user_id: UserId,
    pub account_balance: Quote,
    pub created_at: Timestamp,
}

impl BankAccount {
    pub fn new(account_number: String, user_id: UserId, initial_balance: Quote, timestamp: Timestamp) -> Self {
        Self {
            account_number,
            user_id,
            account_balance: initial_balance,
            created_at: timestamp,
        }
    }

    pub fn credit(&mut self, amount: Quote) -> Result<(), LedgerError> {
        self.account_balance = self.account_balance.checked_add(amount)?;
        Ok(())
    }

    pub fn debit(&mut self, amount: Quote) -> Result<(), LedgerError> {
        if amount > self.account_balance {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available: self.account_balance,
            });
        }
        self.account_balance = self.account_balance.checked_sub(amount)?;
        Ok(())
    }
}

// account numbers are opaque strings but must be printable and non-empty
pub fn validate_account_number(raw: &str) -> Result<String, LedgerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > 34 || !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(LedgerError::InvalidInput(format!("malformed account number '{raw}'")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn debit_respects_floor() {
        let mut acct = BankAccount::new("ACC-1".into(), UserId(1), Quote::new(dec!(50)), Timestamp::from_millis(0));
        assert!(acct.debit(Quote::new(dec!(50.01))).is_err());
        acct.debit(Quote::new(dec!(50))).unwrap();
        assert!(acct.account_balance.is_zero());
        acct.credit(Quote::new(dec!(5))).unwrap();
        assert_eq!(acct.account_balance.value(), dec!(5));
    }

    #[test]
    fn account_number_shapes() {
        assert_eq!(validate_account_number(" 1234-5678 ").unwrap(), "1234-5678");
        assert!(validate_account_number("").is_err());
        assert!(validate_account_number("12 34").is_err());
        assert!(validate_account_number(&"9".repeat(35)).is_err());
    }
}
