//! Spot trading against a spot wallet's base-currency balance.

use super::core::Engine;
use super::results::SpotTradeResult;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{EventPayload, SpotTradeEvent};
use crate::holding::{acquire, dispose, Holding};
use crate::records::SpotTransaction;
use crate::requests::SpotOrderRequest;
use crate::store::LedgerRead;
use crate::types::{TradeSide, WalletId, WalletType};
use rust_decimal::Decimal;
use tracing::info;

impl Engine {
    /// Buy `units` at `price`. Debits `units * price` and folds the lot into the
    /// holding's weighted average.
    pub fn buy(&self, request: &SpotOrderRequest) -> LedgerResult<SpotTradeResult> {
        const OP: &str = "spot_buy";
        let order = request.validate(&self.config).map_err(|e| self.reject(OP, e))?;

        let result = self.write(OP, |tx| {
            let mut wallet = tx.wallet(order.wallet_id)?;
            wallet.ensure(order.user_id, WalletType::Spot)?;

            let total = order.total;
            wallet.debit(total)?;

            let existing = tx.holding(wallet.id, &order.symbol);
            let next = acquire(existing.as_ref(), wallet.id, &order.symbol, order.units, order.price, tx.now())?;
            let holding = tx.upsert_holding(wallet.id, &order.symbol, next.average_buy_price, next.unit_number)?;
            tx.put_wallet(wallet.clone())?;

            let record = SpotTransaction {
                id: tx.next_record_id(),
                wallet_id: wallet.id,
                symbol: order.symbol.clone(),
                side: TradeSide::Buy,
                price: order.price,
                units: order.units,
                total,
                profit: None,
                executed_at: tx.now(),
            };
            tx.push_spot_transaction(record.clone());
            tx.emit(EventPayload::SpotTrade(SpotTradeEvent {
                record_id: record.id,
                wallet_id: wallet.id,
                symbol: order.symbol.clone(),
                side: TradeSide::Buy,
                units: order.units,
                price: order.price,
                profit: None,
            }));

            Ok(SpotTradeResult {
                wallet,
                holding: Some(holding),
                transaction: record,
            })
        })?;

        info!(
            wallet_id = order.wallet_id.0,
            symbol = %order.symbol,
            units = %order.units,
            price = %order.price,
            balance = %result.wallet.balance,
            "spot buy"
        );
        Ok(result)
    }

    /// Sell `units` at `price`. Profit is realized against the average buy price,
    /// which the remaining units keep.
    pub fn sell(&self, request: &SpotOrderRequest) -> LedgerResult<SpotTradeResult> {
        const OP: &str = "spot_sell";
        let order = request.validate(&self.config).map_err(|e| self.reject(OP, e))?;

        let result = self.write(OP, |tx| {
            let mut wallet = tx.wallet(order.wallet_id)?;
            wallet.ensure(order.user_id, WalletType::Spot)?;

            let held = tx.holding(wallet.id, &order.symbol).ok_or_else(|| LedgerError::InsufficientHoldings {
                symbol: order.symbol.to_string(),
                requested: order.units,
                held: Decimal::ZERO,
            })?;
            let disposal = dispose(&held, order.units, order.price, tx.now())?;

            let remaining = tx.adjust_holding_units(wallet.id, &order.symbol, -order.units)?;
            debug_assert_eq!(
                remaining.as_ref().map(|h| h.unit_number),
                disposal.remaining.as_ref().map(|h| h.unit_number)
            );

            wallet.credit(disposal.proceeds)?;
            tx.put_wallet(wallet.clone())?;

            let record = SpotTransaction {
                id: tx.next_record_id(),
                wallet_id: wallet.id,
                symbol: order.symbol.clone(),
                side: TradeSide::Sell,
                price: order.price,
                units: order.units,
                total: disposal.proceeds,
                profit: Some(disposal.realized_profit),
                executed_at: tx.now(),
            };
            tx.push_spot_transaction(record.clone());
            tx.emit(EventPayload::SpotTrade(SpotTradeEvent {
                record_id: record.id,
                wallet_id: wallet.id,
                symbol: order.symbol.clone(),
                side: TradeSide::Sell,
                units: order.units,
                price: order.price,
                profit: Some(disposal.realized_profit),
            }));

            Ok(SpotTradeResult {
                wallet,
                holding: remaining,
                transaction: record,
            })
        })?;

        info!(
            wallet_id = order.wallet_id.0,
            symbol = %order.symbol,
            units = %order.units,
            price = %order.price,
            profit = ?result.transaction.profit.map(|p| p.to_string()),
            "spot sell"
        );
        Ok(result)
    }

    pub fn holdings(&self, wallet_id: WalletId) -> LedgerResult<Vec<Holding>> {
        self.read(|view| {
            view.wallet(wallet_id)?;
            Ok(view.holdings_of(wallet_id))
        })?
    }

    /// Most recent first.
    pub fn spot_history(&self, wallet_id: WalletId) -> LedgerResult<Vec<SpotTransaction>> {
        self.read(|view| {
            view.wallet(wallet_id)?;
            let mut rows: Vec<SpotTransaction> = view
                .spot_transactions()
                .iter()
                .filter(|t| t.wallet_id == wallet_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.executed_at.cmp(&a.executed_at).then_with(|| b.id.cmp(&a.id)));
            Ok(rows)
        })?
    }
}
