//! Balance moves between two wallets of the same user.

use super::core::Engine;
use super::results::WalletTransferResult;
use crate::error::LedgerResult;
use crate::events::{EventPayload, InternalTransferEvent};
use crate::records::InternalTransfer;
use crate::requests::WalletTransferRequest;
use crate::store::LedgerRead;
use crate::types::UserId;
use tracing::info;

impl Engine {
    pub fn wallet_transfer(&self, request: &WalletTransferRequest) -> LedgerResult<WalletTransferResult> {
        const OP: &str = "wallet_transfer";
        let amount = request.validate().map_err(|e| self.reject(OP, e))?;

        let result = self.write(OP, |tx| {
            let mut source = tx.wallet_for(request.user_id, request.from)?;
            let mut target = tx.wallet_for(request.user_id, request.to)?;

            source.debit(amount)?;
            target.credit(amount)?;
            tx.put_wallet(source.clone())?;
            tx.put_wallet(target.clone())?;

            let record = InternalTransfer {
                id: tx.next_record_id(),
                user_id: request.user_id,
                from_wallet: source.id,
                to_wallet: target.id,
                from_type: request.from,
                to_type: request.to,
                amount,
                created_at: tx.now(),
            };
            tx.push_internal_transfer(record.clone());
            tx.emit(EventPayload::InternalTransfer(InternalTransferEvent {
                record_id: record.id,
                user_id: request.user_id,
                from_type: request.from,
                to_type: request.to,
                amount,
            }));

            Ok(WalletTransferResult { source, target, record })
        })?;

        info!(
            user_id = request.user_id.0,
            from = %request.from,
            to = %request.to,
            %amount,
            "wallet transfer"
        );
        Ok(result)
    }

    /// Newest first.
    pub fn internal_transfers(&self, user_id: UserId) -> LedgerResult<Vec<InternalTransfer>> {
        self.read(|view| {
            view.user(user_id)?;
            let mut rows: Vec<InternalTransfer> = view
                .internal_transfers()
                .iter()
                .filter(|t| t.user_id == user_id)
                .cloned()
                .collect();
            rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
            Ok(rows)
        })?
    }
}
