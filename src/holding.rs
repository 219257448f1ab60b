// 3.0: asset holdings ("properties") inside a wallet, with weighted-average cost basis.
// 3.1 acquire folds a buy into the average. 3.2 dispose realizes profit against it.

use crate::error::{LedgerError, LedgerResult};
use crate::symbol::Symbol;
use crate::types::{checked_add, checked_div, checked_mul, checked_sub, Price, Quote, Timestamp, WalletId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub wallet_id: WalletId,
    pub symbol: Symbol,
    pub unit_number: Decimal,
    pub average_buy_price: Price,
    pub updated_at: Timestamp,
}

impl Holding {
    pub fn new(wallet_id: WalletId, symbol: Symbol, units: Decimal, price: Price, timestamp: Timestamp) -> Self {
        Self {
            wallet_id,
            symbol,
            unit_number: units,
            average_buy_price: price,
            updated_at: timestamp,
        }
    }
}

// 3.1: (old_units * old_avg + units * price) / (old_units + units)
pub fn acquire(
    existing: Option<&Holding>,
    wallet_id: WalletId,
    symbol: &Symbol,
    units: Decimal,
    price: Price,
    timestamp: Timestamp,
) -> LedgerResult<Holding> {
    debug_assert!(units > Decimal::ZERO, "acquired units must be positive");

    match existing {
        Some(holding) if holding.unit_number > Decimal::ZERO => {
            let total_units = checked_add(holding.unit_number, units)?;
            let weighted_sum = checked_add(
                checked_mul(holding.unit_number, holding.average_buy_price.value())?,
                checked_mul(units, price.value())?,
            )?;
            Ok(Holding {
                wallet_id,
                symbol: symbol.clone(),
                unit_number: total_units,
                average_buy_price: Price::new_unchecked(checked_div(weighted_sum, total_units)?),
                updated_at: timestamp,
            })
        }
        _ => Ok(Holding::new(wallet_id, symbol.clone(), units, price, timestamp)),
    }
}

#[derive(Debug, Clone)]
pub struct Disposal {
    /// None when the holding was sold out and its row should go away.
    pub remaining: Option<Holding>,
    pub realized_profit: Quote,
    pub proceeds: Quote,
}

// 3.2: profit = (price - avg) * units. the average of what is left is unchanged.
pub fn dispose(holding: &Holding, units: Decimal, price: Price, timestamp: Timestamp) -> Result<Disposal, LedgerError> {
    if units > holding.unit_number {
        return Err(LedgerError::InsufficientHoldings {
            symbol: holding.symbol.to_string(),
            requested: units,
            held: holding.unit_number,
        });
    }

    let spread = checked_sub(price.value(), holding.average_buy_price.value())?;
    let realized_profit = Quote::new(checked_mul(spread, units)?);
    let proceeds = Quote::new(checked_mul(units, price.value())?);
    let left = holding.unit_number - units;

    let remaining = if left.is_zero() {
        None
    } else {
        Some(Holding {
            unit_number: left,
            updated_at: timestamp,
            ..holding.clone()
        })
    };

    Ok(Disposal {
        remaining,
        realized_profit,
        proceeds,
    })
}
