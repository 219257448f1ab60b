//! Leveraged futures positions. Margin leaves the future wallet on open and
//! margin + pnl comes back on close. No partial closes, no liquidation.

use super::core::Engine;
use super::results::CloseResult;
use crate::error::{LedgerError, LedgerResult};
use crate::events::{EventPayload, PositionClosedEvent, PositionOpenedEvent};
use crate::future_order::FutureOrder;
use crate::requests::{ClosePositionRequest, OpenPositionRequest};
use crate::store::LedgerRead;
use crate::types::{UserId, WalletId, WalletType};
use tracing::info;

impl Engine {
    pub fn open_position(&self, request: &OpenPositionRequest) -> LedgerResult<FutureOrder> {
        const OP: &str = "open_position";
        // leverage and amounts are checked before the ledger is touched
        let open = request.validate(&self.config).map_err(|e| self.reject(OP, e))?;

        let order = self.write(OP, |tx| {
            let mut wallet = tx.wallet(open.wallet_id)?;
            wallet.ensure(open.user_id, WalletType::Future)?;

            let available = wallet.available();
            if open.margin > available {
                return Err(LedgerError::InsufficientMargin {
                    required: open.margin,
                    available,
                });
            }
            wallet.debit(open.margin)?;
            tx.put_wallet(wallet.clone())?;

            let now = tx.now();
            let order = tx.insert_future_order(|id| {
                FutureOrder::open(
                    id,
                    wallet.id,
                    open.symbol.clone(),
                    open.side,
                    open.margin,
                    open.entry_price,
                    open.leverage,
                    open.position_size,
                    now,
                )
            });

            tx.emit(EventPayload::PositionOpened(PositionOpenedEvent {
                order_id: order.id,
                wallet_id: wallet.id,
                symbol: order.symbol.clone(),
                side: order.side,
                size: open.position_size,
                entry_price: order.entry_price,
                margin: order.margin,
                leverage: order.leverage.value(),
            }));
            Ok(order)
        })?;

        info!(
            order_id = order.id.0,
            wallet_id = order.wallet_id.0,
            symbol = %order.symbol,
            side = ?order.side,
            margin = %order.margin,
            leverage = %order.leverage,
            size = %open.position_size,
            "position opened"
        );
        Ok(order)
    }

    /// Settles an open position at `exit_price`. The order and its wallet are read
    /// and written inside one transaction, so a second close of the same order
    /// only ever sees it closed.
    pub fn close_position(&self, request: &ClosePositionRequest) -> LedgerResult<CloseResult> {
        const OP: &str = "close_position";
        let exit_price = request.validate().map_err(|e| self.reject(OP, e))?;

        let result = self.write(OP, |tx| {
            let mut order = tx.future_order(request.order_id)?;
            let mut wallet = tx.wallet(order.wallet_id)?;
            if !wallet.is_owned_by(request.user_id) {
                return Err(LedgerError::Unauthorized(format!(
                    "{} does not belong to {}",
                    order.id, request.user_id
                )));
            }
            if !order.is_open() {
                return Err(LedgerError::AlreadyClosed(order.id));
            }

            let settlement = order.close(exit_price, tx.now())?;

            // hard floor: a loss bigger than margin plus balance is refused, not booked
            let new_balance = wallet.balance.checked_add(settlement.credit)?;
            if new_balance.is_negative() {
                return Err(LedgerError::InsufficientBalance {
                    requested: settlement.credit.negate(),
                    available: wallet.balance,
                });
            }
            wallet.balance = new_balance;
            tx.put_wallet(wallet.clone())?;
            tx.put_future_order(order.clone());

            tx.emit(EventPayload::PositionClosed(PositionClosedEvent {
                order_id: order.id,
                wallet_id: wallet.id,
                exit_price,
                realized_pnl: settlement.pnl,
                credited: settlement.credit,
            }));

            Ok(CloseResult {
                wallet,
                profit: settlement.pnl,
                order,
            })
        })?;

        info!(
            order_id = result.order.id.0,
            exit_price = %exit_price,
            pnl = %result.profit,
            balance = %result.wallet.balance,
            "position closed"
        );
        Ok(result)
    }

    /// Open positions across all of the user's wallets, newest first.
    pub fn open_positions(&self, user_id: UserId) -> LedgerResult<Vec<FutureOrder>> {
        self.read(|view| {
            view.user(user_id)?;
            let wallets: Vec<WalletId> = view.wallets_of(user_id).iter().map(|w| w.id).collect();
            let orders = view
                .future_orders()
                .filter(|o| o.is_open() && wallets.contains(&o.wallet_id))
                .cloned()
                .collect();
            newest_first(orders)
        })?
    }

    /// Every order ever placed from the wallet, newest first.
    pub fn future_history(&self, user_id: UserId, wallet_id: WalletId) -> LedgerResult<Vec<FutureOrder>> {
        self.read(|view| {
            let wallet = view.wallet(wallet_id)?;
            if !wallet.is_owned_by(user_id) {
                return Err(LedgerError::Unauthorized(format!("{wallet_id} does not belong to {user_id}")));
            }
            let orders = view
                .future_orders()
                .filter(|o| o.wallet_id == wallet_id)
                .cloned()
                .collect();
            newest_first(orders)
        })?
    }
}

// legacy rows without a stored size get it filled in on the way out
fn newest_first(mut orders: Vec<FutureOrder>) -> LedgerResult<Vec<FutureOrder>> {
    for order in &mut orders {
        order.position_size = Some(order.effective_position_size()?);
    }
    orders.sort_by(|a, b| b.opened_at.cmp(&a.opened_at).then_with(|| b.id.cmp(&a.id)));
    Ok(orders)
}
