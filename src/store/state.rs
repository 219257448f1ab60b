// 9.1: committed ledger tables plus the staging overlay a transaction writes into.
// BTreeMaps keep listings and snapshots in key order.

use crate::bank::BankAccount;
use crate::events::Event;
use crate::future_order::FutureOrder;
use crate::holding::Holding;
use crate::p2p::P2POrder;
use crate::records::{AccountTransaction, InternalTransfer, SpotTransaction};
use crate::symbol::Symbol;
use crate::types::{FutureOrderId, P2POrderId, UserId, WalletId};
use crate::user::User;
use crate::wallet::Wallet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub next_user: u64,
    pub next_wallet: u64,
    pub next_future_order: u64,
    pub next_p2p_order: u64,
    pub next_record: u64,
    pub next_event: u64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            next_user: 1,
            next_wallet: 1,
            next_future_order: 1,
            next_p2p_order: 1,
            next_record: 1,
            next_event: 1,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    pub(crate) users: BTreeMap<UserId, User>,
    pub(crate) wallets: BTreeMap<WalletId, Wallet>,
    pub(crate) holdings: BTreeMap<(WalletId, Symbol), Holding>,
    pub(crate) future_orders: BTreeMap<FutureOrderId, FutureOrder>,
    pub(crate) p2p_orders: BTreeMap<P2POrderId, P2POrder>,
    pub(crate) bank_accounts: BTreeMap<String, BankAccount>,
    pub(crate) spot_transactions: Vec<SpotTransaction>,
    pub(crate) account_transactions: Vec<AccountTransaction>,
    pub(crate) internal_transfers: Vec<InternalTransfer>,
    pub(crate) events: VecDeque<Event>,
    pub(crate) counters: Counters,
}

impl LedgerState {
    pub(crate) fn apply(&mut self, staged: Staged, max_events: usize) {
        staged.users.apply(&mut self.users);
        staged.wallets.apply(&mut self.wallets);
        staged.holdings.apply(&mut self.holdings);
        staged.future_orders.apply(&mut self.future_orders);
        staged.p2p_orders.apply(&mut self.p2p_orders);
        staged.bank_accounts.apply(&mut self.bank_accounts);
        self.spot_transactions.extend(staged.spot_transactions);
        self.account_transactions.extend(staged.account_transactions);
        self.internal_transfers.extend(staged.internal_transfers);
        self.events.extend(staged.events);
        while self.events.len() > max_events {
            self.events.pop_front();
        }
        self.counters = staged.counters;
    }
}

/// Uncommitted row writes. `None` marks a deleted row.
#[derive(Debug)]
pub(crate) struct Overlay<K, V> {
    writes: BTreeMap<K, Option<V>>,
}

impl<K, V> Default for Overlay<K, V> {
    fn default() -> Self {
        Self {
            writes: BTreeMap::new(),
        }
    }
}

impl<K: Ord, V> Overlay<K, V> {
    pub(crate) fn get<'a>(&'a self, base: &'a BTreeMap<K, V>, key: &K) -> Option<&'a V> {
        match self.writes.get(key) {
            Some(staged) => staged.as_ref(),
            None => base.get(key),
        }
    }

    pub(crate) fn put(&mut self, key: K, value: V) {
        self.writes.insert(key, Some(value));
    }

    pub(crate) fn delete(&mut self, key: K) {
        self.writes.insert(key, None);
    }

    pub(crate) fn iter<'a>(&'a self, base: &'a BTreeMap<K, V>) -> impl Iterator<Item = &'a V> + 'a {
        let committed = base.iter().filter_map(move |(key, value)| match self.writes.get(key) {
            Some(staged) => staged.as_ref(),
            None => Some(value),
        });
        let inserted = self
            .writes
            .iter()
            .filter(move |(key, _)| !base.contains_key(*key))
            .filter_map(|(_, value)| value.as_ref());
        committed.chain(inserted)
    }

    fn apply(self, base: &mut BTreeMap<K, V>) {
        for (key, value) in self.writes {
            match value {
                Some(value) => {
                    base.insert(key, value);
                }
                None => {
                    base.remove(&key);
                }
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct Staged {
    pub(crate) users: Overlay<UserId, User>,
    pub(crate) wallets: Overlay<WalletId, Wallet>,
    pub(crate) holdings: Overlay<(WalletId, Symbol), Holding>,
    pub(crate) future_orders: Overlay<FutureOrderId, FutureOrder>,
    pub(crate) p2p_orders: Overlay<P2POrderId, P2POrder>,
    pub(crate) bank_accounts: Overlay<String, BankAccount>,
    pub(crate) spot_transactions: Vec<SpotTransaction>,
    pub(crate) account_transactions: Vec<AccountTransaction>,
    pub(crate) internal_transfers: Vec<InternalTransfer>,
    pub(crate) events: Vec<Event>,
    pub(crate) counters: Counters,
}

impl Staged {
    pub(crate) fn new(counters: Counters) -> Self {
        Self {
            users: Overlay::default(),
            wallets: Overlay::default(),
            holdings: Overlay::default(),
            future_orders: Overlay::default(),
            p2p_orders: Overlay::default(),
            bank_accounts: Overlay::default(),
            spot_transactions: Vec::new(),
            account_transactions: Vec::new(),
            internal_transfers: Vec::new(),
            events: Vec::new(),
            counters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_shadows_and_deletes() {
        let mut base = BTreeMap::new();
        base.insert(1, "a");
        base.insert(2, "b");

        let mut overlay = Overlay::default();
        overlay.put(2, "B");
        overlay.put(3, "c");
        overlay.delete(1);

        assert_eq!(overlay.get(&base, &1), None);
        assert_eq!(overlay.get(&base, &2), Some(&"B"));
        assert_eq!(overlay.get(&base, &3), Some(&"c"));

        let mut seen: Vec<_> = overlay.iter(&base).copied().collect();
        seen.sort();
        assert_eq!(seen, vec!["B", "c"]);

        // base untouched until apply
        assert_eq!(base.len(), 2);
        overlay.apply(&mut base);
        assert_eq!(base.get(&1), None);
        assert_eq!(base.get(&2), Some(&"B"));
        assert_eq!(base.get(&3), Some(&"c"));
    }
}
