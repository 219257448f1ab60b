// 4.0: leveraged futures positions. one order = one position, open → closed, no partials.
// size = margin * leverage / entry. pnl = size * (exit - entry) * side sign.

use crate::error::LedgerResult;
use crate::symbol::Symbol;
use crate::types::{
    checked_div, checked_mul, checked_sub, FutureOrderId, Leverage, PositionSide, Price, Quote, Timestamp, WalletId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FutureOrder {
    pub id: FutureOrderId,
    pub wallet_id: WalletId,
    pub symbol: Symbol,
    pub side: PositionSide,
    pub entry_price: Price,
    pub margin: Quote,
    pub leverage: Leverage,
    /// Base-asset units. Rows written before sizes were stored carry None.
    #[serde(default)]
    pub position_size: Option<Decimal>,
    pub opened_at: Timestamp,
    #[serde(default)]
    pub exit_price: Option<Price>,
    #[serde(default)]
    pub closed_at: Option<Timestamp>,
    #[serde(default)]
    pub profit: Option<Quote>,
}

impl FutureOrder {
    /// `position_size` comes from [`position_size`], computed while the request
    /// is validated so an unrepresentable size never reaches the ledger.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        id: FutureOrderId,
        wallet_id: WalletId,
        symbol: Symbol,
        side: PositionSide,
        margin: Quote,
        entry_price: Price,
        leverage: Leverage,
        position_size: Decimal,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            wallet_id,
            symbol,
            side,
            entry_price,
            margin,
            leverage,
            position_size: Some(position_size),
            opened_at: timestamp,
            exit_price: None,
            closed_at: None,
            profit: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    pub fn notional(&self) -> LedgerResult<Quote> {
        self.margin.checked_mul(self.leverage.value())
    }

    // legacy rows fall back to margin * leverage
    pub fn effective_position_size(&self) -> LedgerResult<Decimal> {
        match self.position_size {
            Some(size) => Ok(size),
            None => Ok(self.notional()?.value()),
        }
    }

    pub fn pnl_at(&self, exit_price: Price) -> LedgerResult<Quote> {
        calculate_pnl(self.side, self.entry_price, exit_price, self.effective_position_size()?)
    }

    /// Marks the order closed and returns what goes back to the wallet (margin + pnl).
    /// The caller checks the order is open and that the credit keeps the wallet solvent.
    /// On error the order is left untouched.
    pub fn close(&mut self, exit_price: Price, timestamp: Timestamp) -> LedgerResult<Settlement> {
        debug_assert!(self.is_open(), "closing an order twice");
        let size = self.effective_position_size()?;
        let pnl = calculate_pnl(self.side, self.entry_price, exit_price, size)?;
        let credit = self.margin.checked_add(pnl)?;

        self.position_size = Some(size);
        self.exit_price = Some(exit_price);
        self.closed_at = Some(timestamp);
        self.profit = Some(pnl);
        Ok(Settlement { pnl, credit })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub pnl: Quote,
    pub credit: Quote,
}

// 4.1: leverage is already inside the size, so pnl never multiplies by it again
pub fn position_size(margin: Quote, leverage: Leverage, entry_price: Price) -> LedgerResult<Decimal> {
    let notional = margin.checked_mul(leverage.value())?;
    checked_div(notional.value(), entry_price.value())
}

pub fn calculate_pnl(side: PositionSide, entry_price: Price, exit_price: Price, size: Decimal) -> LedgerResult<Quote> {
    let move_per_unit = checked_sub(exit_price.value(), entry_price.value())?;
    let pnl = checked_mul(move_per_unit, size)?;
    Ok(Quote::new(side.sign() * pnl))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> Symbol {
        Symbol::normalize("BTC", &["USDT"]).unwrap()
    }

    fn long_order() -> FutureOrder {
        let margin = Quote::new(dec!(100));
        let entry = Price::new_unchecked(dec!(50000));
        let leverage = Leverage::new(dec!(2)).unwrap();
        FutureOrder::open(
            FutureOrderId(1),
            WalletId(1),
            btc(),
            PositionSide::Long,
            margin,
            entry,
            leverage,
            position_size(margin, leverage, entry).unwrap(),
            Timestamp::from_millis(0),
        )
    }

    #[test]
    fn size_includes_leverage() {
        let order = long_order();
        assert_eq!(order.position_size, Some(dec!(0.004)));
        assert_eq!(order.notional().unwrap().value(), dec!(200));
    }

    #[test]
    fn long_close_in_profit() {
        let mut order = long_order();
        let settlement = order.close(Price::new_unchecked(dec!(52000)), Timestamp::from_millis(10)).unwrap();

        assert_eq!(settlement.pnl.value(), dec!(8));
        assert_eq!(settlement.credit.value(), dec!(108));
        assert!(!order.is_open());
        assert_eq!(order.profit, Some(Quote::new(dec!(8))));
        assert_eq!(order.exit_price, Some(Price::new_unchecked(dec!(52000))));
    }

    #[test]
    fn short_profits_when_price_falls() {
        let mut order = long_order();
        order.side = PositionSide::Short;
        assert_eq!(order.pnl_at(Price::new_unchecked(dec!(48000))).unwrap().value(), dec!(8));
        assert_eq!(order.pnl_at(Price::new_unchecked(dec!(52000))).unwrap().value(), dec!(-8));
    }

    #[test]
    fn legacy_row_without_size() {
        let mut order = long_order();
        order.position_size = None;
        assert_eq!(order.effective_position_size().unwrap(), dec!(200));

        // closing backfills the size it was settled with
        order.close(Price::new_unchecked(dec!(50001)), Timestamp::from_millis(1)).unwrap();
        assert_eq!(order.position_size, Some(dec!(200)));
        assert_eq!(order.profit, Some(Quote::new(dec!(200))));
    }

    #[test]
    fn overflowing_close_leaves_order_open() {
        let margin = Quote::new(dec!(100));
        let entry = Price::new_unchecked(dec!(0.0000000001));
        let leverage = Leverage::new(dec!(5)).unwrap();
        let size = position_size(margin, leverage, entry).unwrap();
        assert_eq!(size, dec!(5000000000000));

        let mut order = FutureOrder::open(
            FutureOrderId(2),
            WalletId(1),
            btc(),
            PositionSide::Long,
            margin,
            entry,
            leverage,
            size,
            Timestamp::from_millis(0),
        );
        let result = order.close(Price::new_unchecked(dec!(100000000000000000000)), Timestamp::from_millis(1));
        assert!(matches!(result, Err(crate::error::LedgerError::ArithmeticOverflow(_))));
        assert!(order.is_open());
        assert!(order.profit.is_none());
    }
}
