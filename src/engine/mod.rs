// 10.0: ledger engine. one method per operation, each a single atomic ledger
// transaction: validate, mutate, record, commit or roll back as a unit.
// operations only take &self, so one engine can be shared by many request threads.

mod bank;
mod core;
mod futures;
mod p2p;
mod results;
mod spot;
mod transfer;

pub use self::core::Engine;
pub use results::{CloseResult, PaymentResult, Registration, ReleaseResult, SpotTradeResult, WalletTransferResult};
