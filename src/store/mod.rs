// 9.0: the ledger store. one shared handle per process, passed to whoever needs it.
// writers are serialized by an exclusive lock and see their own staged writes.
// readers share the lock and only ever see committed state.

mod snapshot;
mod state;
mod tx;

pub use snapshot::{LedgerSnapshot, SnapshotError};
pub use state::Counters;
pub use tx::{LedgerRead, ReadView, Transaction};

use crate::config::LedgerConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::types::Timestamp;
use parking_lot::RwLock;
use state::LedgerState;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Ledger {
    state: RwLock<LedgerState>,
    lock_timeout: Duration,
    max_events: usize,
    verbose: bool,
}

impl Ledger {
    pub fn new(config: &LedgerConfig) -> Self {
        Self::with_state(LedgerState::default(), config)
    }

    fn with_state(state: LedgerState, config: &LedgerConfig) -> Self {
        Self {
            state: RwLock::new(state),
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
            max_events: config.max_events,
            verbose: config.verbose,
        }
    }

    /// Runs `f` against committed state under a shared lock.
    pub fn read<T>(&self, f: impl FnOnce(&ReadView<'_>) -> T) -> LedgerResult<T> {
        let guard = self
            .state
            .try_read_for(self.lock_timeout)
            .ok_or(LedgerError::ConcurrencyConflict)?;
        let view = ReadView { state: &guard };
        Ok(f(&view))
    }

    /// Runs `f` as one atomic unit of work. Every row it reads is protected from
    /// other writers until it returns. `Ok` commits all staged writes, records and
    /// events at once; `Err` discards them.
    pub fn write<T>(&self, now: Timestamp, f: impl FnOnce(&mut Transaction<'_>) -> LedgerResult<T>) -> LedgerResult<T> {
        let mut guard = self
            .state
            .try_write_for(self.lock_timeout)
            .ok_or(LedgerError::ConcurrencyConflict)?;

        let (value, staged) = {
            let mut tx = Transaction::new(&guard, now);
            let value = f(&mut tx)?;
            (value, tx.into_staged())
        };

        if self.verbose {
            for event in &staged.events {
                debug!(event_id = event.id.0, kind = event.payload.name(), payload = ?event.payload, "ledger event");
            }
        }

        guard.apply(staged, self.max_events);
        Ok(value)
    }

    pub fn counters(&self) -> LedgerResult<Counters> {
        self.read(|view| view.state.counters)
    }
}
