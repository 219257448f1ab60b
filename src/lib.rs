// exchange-ledger: ledger and settlement core of a crypto exchange.
// spot trading, leveraged futures, p2p fiat/crypto settlement, bank and wallet
// transfers. money is never created or destroyed: every operation is one atomic
// ledger transaction that commits whole or leaves no trace.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: ids, Quote, Price, Leverage, Timestamp, enums
//   1.6  symbol.rs: base asset normalization
//   2.x  error.rs: LedgerError and the error kind taxonomy
//   3.x  holding.rs: holdings, weighted average cost basis
//   4.x  future_order.rs: futures positions, sizing, pnl
//   5.x  p2p.rs: p2p orders and their state machine
//   6.x  records.rs: append-only trade and transfer records
//   7.x  events.rs: audit events for every committed change
//   8.x  config.rs: leverage bounds, p2p rules, env presets, toml
//   9.x  store/: the ledger, transactions, snapshots
//   10.x engine/: operations: users, spot, futures, p2p, bank, transfers
//   11.x api.rs: serde command dispatcher
//   12.x requests.rs: typed, validated operation inputs
//   user.rs, wallet.rs, bank.rs, clock.rs: small entities and the time source

// ledger entities
pub mod bank;
pub mod future_order;
pub mod holding;
pub mod p2p;
pub mod records;
pub mod symbol;
pub mod types;
pub mod user;
pub mod wallet;

// storage and operations
pub mod engine;
pub mod events;
pub mod store;

// integration modules
pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod requests;

// re exports for convenience
pub use api::{ApiError, ApiResponse, LedgerCommand};
pub use bank::BankAccount;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, Environment, LedgerConfig, P2PConfig};
pub use engine::*;
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use events::{Event, EventId, EventPayload};
pub use future_order::FutureOrder;
pub use holding::Holding;
pub use p2p::{P2POrder, P2PState};
pub use records::{AccountTransaction, InternalTransfer, SpotTransaction};
pub use requests::*;
pub use store::{Counters, Ledger, LedgerRead, LedgerSnapshot, SnapshotError};
pub use symbol::Symbol;
pub use types::*;
pub use user::User;
pub use wallet::Wallet;
