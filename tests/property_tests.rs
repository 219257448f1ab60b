//! Property-based tests for the settlement math and the ledger invariants.
//!
//! Random inputs, fixed rules: the average cost stays inside the prices paid,
//! pnl signs follow the side, and no sequence of transfers creates money or
//! drives a balance below zero.

use exchange_ledger::future_order::{calculate_pnl, position_size};
use exchange_ledger::holding::{acquire, dispose};
use exchange_ledger::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|x| Decimal::new(x, 2)) // $0.01 to $10,000
}

fn units_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000i64).prop_map(|x| Decimal::new(x, 4)) // 0.0001 to 1.0
}

fn leverage_strategy() -> impl Strategy<Value = Decimal> {
    (1u32..=5u32).prop_map(Decimal::from)
}

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..50_000i64).prop_map(|x| Decimal::new(x, 2)) // $0.01 to $500
}

fn symbol() -> Symbol {
    Symbol::normalize("BTC", &["USDT"]).unwrap()
}

proptest! {
    /// The weighted average of any buy sequence lies between the cheapest and
    /// the dearest fill.
    #[test]
    fn average_stays_within_fill_prices(
        fills in proptest::collection::vec((units_strategy(), price_strategy()), 1..12),
    ) {
        let symbol = symbol();
        let mut holding: Option<Holding> = None;
        for &(units, price) in &fills {
            let next = acquire(
                holding.as_ref(),
                WalletId(1),
                &symbol,
                units,
                Price::new_unchecked(price),
                Timestamp::from_millis(0),
            )
            .unwrap();
            holding = Some(next);
        }

        let holding = holding.unwrap();
        let lowest = fills.iter().map(|f| f.1).min().unwrap();
        let highest = fills.iter().map(|f| f.1).max().unwrap();
        let units: Decimal = fills.iter().map(|f| f.0).sum();

        prop_assert_eq!(holding.unit_number, units);
        prop_assert!(holding.average_buy_price.value() >= lowest - dec!(0.000001));
        prop_assert!(holding.average_buy_price.value() <= highest + dec!(0.000001));
    }

    /// Selling never changes the average, and profit is units times the spread
    /// over it.
    #[test]
    fn disposal_keeps_average_and_prices_profit(
        bought in units_strategy(),
        buy_price in price_strategy(),
        sell_price in price_strategy(),
        fraction in 1u32..=100u32,
    ) {
        let holding = Holding::new(
            WalletId(1),
            symbol(),
            bought,
            Price::new_unchecked(buy_price),
            Timestamp::from_millis(0),
        );
        let sold = (bought * Decimal::from(fraction) / dec!(100)).round_dp(4).max(dec!(0.0001));

        let disposal = dispose(&holding, sold, Price::new_unchecked(sell_price), Timestamp::from_millis(1)).unwrap();
        prop_assert_eq!(disposal.realized_profit.value(), sold * (sell_price - buy_price));
        prop_assert_eq!(disposal.proceeds.value(), sold * sell_price);
        match disposal.remaining {
            Some(rest) => {
                prop_assert_eq!(rest.unit_number, bought - sold);
                prop_assert_eq!(rest.average_buy_price.value(), buy_price);
            }
            None => prop_assert_eq!(sold, bought),
        }
    }

    /// Longs profit when price rises, shorts when it falls, and the two sides
    /// of the same move are mirror images.
    #[test]
    fn pnl_sign_follows_side(
        margin in amount_strategy(),
        leverage in leverage_strategy(),
        entry in price_strategy(),
        exit in price_strategy(),
    ) {
        let entry_price = Price::new_unchecked(entry);
        let size = position_size(Quote::new(margin), Leverage::new(leverage).unwrap(), entry_price).unwrap();
        let long = calculate_pnl(PositionSide::Long, entry_price, Price::new_unchecked(exit), size).unwrap();
        let short = calculate_pnl(PositionSide::Short, entry_price, Price::new_unchecked(exit), size).unwrap();

        prop_assert_eq!(long.value(), -short.value());
        if exit > entry {
            prop_assert!(long.is_positive());
        } else if exit < entry {
            prop_assert!(long.is_negative());
        } else {
            prop_assert!(long.is_zero());
        }
    }

    /// Random bank transfers between three accounts: the total is fixed and no
    /// account ever dips below zero, whether a transfer lands or is refused.
    #[test]
    fn bank_transfers_conserve_and_stay_non_negative(
        moves in proptest::collection::vec((0usize..3, 0usize..3, amount_strategy()), 1..40),
    ) {
        let engine = Engine::new(LedgerConfig::default()).unwrap();
        let names = ["ACC-0", "ACC-1", "ACC-2"];
        let mut owners = Vec::new();
        for (i, number) in names.iter().enumerate() {
            let user = engine.register_user(&format!("user{i}"), Role::Normal, None).unwrap().user.id;
            engine.open_bank_account(user, number, dec!(1000)).unwrap();
            owners.push(user);
        }

        for &(from, to, amount) in &moves {
            let request = BankTransferRequest::new(owners[from], names[from], names[to], amount);
            match engine.bank_transfer(&request) {
                Ok(record) => prop_assert_eq!(record.amount.value(), amount),
                Err(e) => prop_assert!(
                    matches!(e, LedgerError::SameAccount(_) | LedgerError::InsufficientBalance { .. }),
                    "unexpected {:?}", e
                ),
            }
            prop_assert_eq!(engine.total_bank_balance().unwrap().value(), dec!(3000));
        }

        for user in owners {
            for account in engine.bank_accounts(user).unwrap() {
                prop_assert!(!account.account_balance.is_negative());
            }
        }
    }

    /// Shuffling funds between a user's own wallets never changes their total.
    #[test]
    fn wallet_transfers_conserve(
        moves in proptest::collection::vec((any::<bool>(), amount_strategy()), 1..40),
    ) {
        let engine = Engine::new(LedgerConfig::default()).unwrap();
        let user = engine.register_user("alice", Role::Normal, None).unwrap().user.id;
        let spot = engine.wallet(user, WalletType::Spot).unwrap().id;
        engine.deposit(spot, dec!(250)).unwrap();

        for &(to_future, amount) in &moves {
            let (from, to) = if to_future {
                (WalletType::Spot, WalletType::Future)
            } else {
                (WalletType::Future, WalletType::Spot)
            };
            let _ = engine.wallet_transfer(&WalletTransferRequest::new(user, from, to, amount));
            prop_assert_eq!(engine.total_wallet_balance().unwrap().value(), dec!(250));
        }

        for wallet in engine.wallets(user).unwrap() {
            prop_assert!(!wallet.balance.is_negative());
        }
    }

    /// Open and close round trips: the wallet ends at start plus realized pnl,
    /// or the close is refused and nothing moves.
    #[test]
    fn futures_round_trip_settles_pnl(
        margin in amount_strategy(),
        leverage in leverage_strategy(),
        entry in price_strategy(),
        exit in price_strategy(),
        long in any::<bool>(),
    ) {
        let engine = Engine::new(LedgerConfig::default()).unwrap();
        let user = engine.register_user("bob", Role::Normal, None).unwrap().user.id;
        let wallet = engine.wallet(user, WalletType::Future).unwrap().id;
        engine.deposit(wallet, dec!(500)).unwrap();

        let side = if long { PositionSide::Long } else { PositionSide::Short };
        let order = engine
            .open_position(&OpenPositionRequest::new(user, wallet, "BTC", side, margin, entry, leverage))
            .unwrap();

        match engine.close_position(&ClosePositionRequest::new(order.id, user, exit)) {
            Ok(closed) => {
                let expected = dec!(500) + closed.profit.value();
                prop_assert!((closed.wallet.balance.value() - expected).abs() < dec!(0.000000001));
                prop_assert!(!closed.wallet.balance.is_negative());
            }
            Err(e) => {
                prop_assert!(matches!(e, LedgerError::InsufficientBalance { .. }), "unexpected error: {:?}", e);
                prop_assert_eq!(engine.wallet_by_id(wallet).unwrap().balance.value(), dec!(500) - margin);
                prop_assert_eq!(engine.open_positions(user).unwrap().len(), 1);
            }
        }
    }
}
