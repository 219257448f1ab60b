//! Exchange ledger simulation.
//!
//! Walks the ledger through spot trades, futures positions, both p2p flows, bank and
//! wallet transfers and a contended double close, printing balances as it goes.
//! `RUST_LOG=debug` shows every committed operation.

use exchange_ledger::*;
use rust_decimal_macros::dec;
use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

type SimResult = Result<(), Box<dyn Error>>;

fn main() -> SimResult {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    println!("Exchange Ledger Simulation");
    println!("Spot, Futures, P2P, Transfers\n");

    scenario_1_spot_trading()?;
    scenario_2_futures_lifecycle()?;
    scenario_3_p2p_buy()?;
    scenario_4_p2p_sell()?;
    scenario_5_transfers()?;
    scenario_6_concurrent_close()?;
    scenario_7_snapshot()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn engine() -> Result<Engine, ConfigError> {
    Engine::new(LedgerConfig::default())
}

/// Two buys at different prices, then a partial sell.
fn scenario_1_spot_trading() -> SimResult {
    println!("Scenario 1: Spot Trading\n");

    let engine = engine()?;
    let alice = engine.register_user("alice", Role::Normal, None)?.user.id;
    let spot = engine.wallet(alice, WalletType::Spot)?.id;
    engine.deposit(spot, dec!(1000))?;
    println!("  Alice deposits $1,000 into her spot wallet");

    engine.buy(&SpotOrderRequest::new(alice, spot, "BTC/USDT", dec!(1), dec!(100)))?;
    let second = engine.buy(&SpotOrderRequest::new(alice, spot, "BTCUSDT", dec!(1), dec!(200)))?;
    if let Some(holding) = &second.holding {
        println!("  Bought 1 @ $100 and 1 @ $200: {} units, avg ${}", holding.unit_number, holding.average_buy_price);
    }

    let sold = engine.sell(&SpotOrderRequest::new(alice, spot, "btc", dec!(1), dec!(180)))?;
    println!(
        "  Sold 1 @ $180: profit ${}, wallet ${}\n",
        sold.transaction.profit.unwrap_or_default(),
        sold.wallet.balance
    );
    Ok(())
}

/// Open a long and a short, close both.
fn scenario_2_futures_lifecycle() -> SimResult {
    println!("Scenario 2: Futures Lifecycle\n");

    let engine = engine()?;
    let bob = engine.register_user("bob", Role::Normal, None)?.user.id;
    let future = engine.wallet(bob, WalletType::Future)?.id;
    engine.deposit(future, dec!(1000))?;

    let long = engine.open_position(&OpenPositionRequest::new(
        bob,
        future,
        "BTC/USDT",
        PositionSide::Long,
        dec!(100),
        dec!(50000),
        dec!(2),
    ))?;
    let short = engine.open_position(&OpenPositionRequest::new(
        bob,
        future,
        "ETH-USDT",
        PositionSide::Short,
        dec!(200),
        dec!(2500),
        dec!(5),
    ))?;
    println!("  Long {} {} @ $50,000 ({} margin, {})", long.effective_position_size()?, long.symbol, long.margin, long.leverage);
    println!("  Short {} {} @ $2,500 ({} margin, {})", short.effective_position_size()?, short.symbol, short.margin, short.leverage);
    println!("  Open positions: {}", engine.open_positions(bob)?.len());

    let closed_long = engine.close_position(&ClosePositionRequest::new(long.id, bob, dec!(52000)))?;
    let closed_short = engine.close_position(&ClosePositionRequest::new(short.id, bob, dec!(2600)))?;
    println!("  Long closed @ $52,000: pnl ${}", closed_long.profit);
    println!("  Short closed @ $2,600: pnl ${}", closed_short.profit);
    println!("  Wallet: ${}\n", closed_short.wallet.balance);

    let leverage_6 = OpenPositionRequest::new(bob, future, "BTC", PositionSide::Long, dec!(10), dec!(50000), dec!(6));
    if let Err(e) = engine.open_position(&leverage_6) {
        println!("  6x leverage refused: {} ({})\n", e, e.kind());
    }
    Ok(())
}

/// User buys crypto from a merchant: fiat first, then the merchant releases.
fn scenario_3_p2p_buy() -> SimResult {
    println!("Scenario 3: P2P Buy\n");

    let engine = engine()?;
    let carol = engine.register_user("carol", Role::Normal, None)?.user.id;
    let mike = engine.register_user("mike", Role::Merchant, Some(dec!(15500)))?.user.id;
    engine.deposit(engine.wallet(mike, WalletType::Merchant)?.id, dec!(500))?;
    engine.open_bank_account(carol, "CAROL-01", dec!(2000000))?;
    engine.open_bank_account(mike, "MIKE-01", dec!(0))?;
    println!("  Mike quotes 15,500 per unit and holds 500 units");

    let order = engine.create_p2p_order(&CreateP2POrderRequest::new(carol, mike, TradeSide::Buy, dec!(100)))?;
    let due = order.fiat_amount()?;
    println!("  Carol orders 100 units, owes {due}");

    let paid = engine.transfer_payment(&TransferPaymentRequest::new(order.id, carol, "CAROL-01", due.value()))?;
    println!("  Fiat leg {} -> {}: {}", paid.transaction.source_account, paid.transaction.target_account, paid.order.state);

    // a different merchant cannot release someone else's order
    let mona = engine.register_user("mona", Role::Merchant, Some(dec!(15000)))?.user.id;
    if let Err(e) = engine.confirm_and_release(order.id, mona) {
        println!("  Mona tries to release: {}", e);
    }

    let released = engine.confirm_and_release(order.id, mike)?;
    println!(
        "  Mike releases: carol spot ${}, mike wallet ${}, order {}\n",
        released.target.balance, released.source.balance, released.order.state
    );
    Ok(())
}

/// User sells crypto to a merchant and confirms once paid.
fn scenario_4_p2p_sell() -> SimResult {
    println!("Scenario 4: P2P Sell (strict)\n");

    let engine = Engine::new(Environment::Strict.config())?;
    let dave = engine.register_user("dave", Role::Normal, None)?.user.id;
    let mike = engine.register_user("mike", Role::Merchant, Some(dec!(10)))?.user.id;
    engine.deposit(engine.wallet(dave, WalletType::Spot)?.id, dec!(40))?;
    engine.open_bank_account(dave, "DAVE-01", dec!(0))?;
    engine.open_bank_account(mike, "MIKE-01", dec!(1000))?;

    let order = engine.create_p2p_order(&CreateP2POrderRequest::new(dave, mike, TradeSide::Sell, dec!(25)))?;
    if let Err(e) = engine.confirm_and_release(order.id, dave) {
        println!("  Early release refused: {}", e);
    }

    engine.transfer_payment(&TransferPaymentRequest::new(order.id, mike, "MIKE-01", dec!(250)))?;
    let released = engine.confirm_and_release(order.id, dave)?;
    println!("  Mike paid 250, dave released 25 units: order {}", released.order.state);
    println!("  Dave bank: {}\n", engine.bank_accounts(dave)?[0].account_balance);
    Ok(())
}

fn scenario_5_transfers() -> SimResult {
    println!("Scenario 5: Bank and Wallet Transfers\n");

    let engine = engine()?;
    let erin = engine.register_user("erin", Role::Normal, None)?.user.id;
    let frank = engine.register_user("frank", Role::Normal, None)?.user.id;
    engine.open_bank_account(erin, "ERIN-01", dec!(300))?;
    engine.open_bank_account(frank, "FRANK-01", dec!(0))?;

    let record = engine.bank_transfer(&BankTransferRequest::new(erin, "ERIN-01", "FRANK-01", dec!(120)).with_note("rent"))?;
    println!("  {} sent {} ({})", record.source_account, record.amount, record.note.as_deref().unwrap_or(""));
    println!("  Bank total unchanged: {}", engine.total_bank_balance()?);

    engine.deposit(engine.wallet(erin, WalletType::Spot)?.id, dec!(50))?;
    let moved = engine.wallet_transfer(&WalletTransferRequest::new(erin, WalletType::Spot, WalletType::Future, dec!(30)))?;
    println!("  Spot -> future 30: spot ${}, future ${}\n", moved.source.balance, moved.target.balance);
    Ok(())
}

/// Eight threads race to close the same position. Exactly one wins.
fn scenario_6_concurrent_close() -> SimResult {
    println!("Scenario 6: Concurrent Double Close\n");

    let engine = engine()?;
    let gina = engine.register_user("gina", Role::Normal, None)?.user.id;
    let future = engine.wallet(gina, WalletType::Future)?.id;
    engine.deposit(future, dec!(100))?;
    let order = engine.open_position(&OpenPositionRequest::new(
        gina,
        future,
        "BTC",
        PositionSide::Long,
        dec!(100),
        dec!(50000),
        dec!(2),
    ))?;

    let close = ClosePositionRequest::new(order.id, gina, dec!(52000));
    let outcomes: Vec<LedgerResult<CloseResult>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| engine.close_position(&close))).collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or(Err(LedgerError::ConcurrencyConflict)))
            .collect()
    });

    let won = outcomes.iter().filter(|r| r.is_ok()).count();
    let already_closed = outcomes
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::AlreadyClosed(_))))
        .count();
    println!("  Settled {} time(s), {} saw AlreadyClosed", won, already_closed);
    println!("  Wallet: ${} (credited once)\n", engine.wallet_by_id(future)?.balance);
    Ok(())
}

/// Save to json, restore, keep trading.
fn scenario_7_snapshot() -> SimResult {
    println!("Scenario 7: Snapshot\n");

    let engine = engine()?;
    let hank = engine.register_user("hank", Role::Normal, None)?.user.id;
    engine.deposit(engine.wallet(hank, WalletType::Spot)?.id, dec!(75))?;

    let path = std::env::temp_dir().join("ledger-sim-snapshot.json");
    engine.ledger().save_json(&path)?;

    let config = LedgerConfig::default();
    let restored = Arc::new(Ledger::load_json(&path, &config)?);
    let engine = Engine::with_ledger(config, restored, Arc::new(SystemClock))?;
    let ivy = engine.register_user("ivy", Role::Normal, None)?;
    println!("  Restored hank with {} wallets, new user gets {}", engine.wallets(hank)?.len(), ivy.user.id);
    println!("  Wallet total: ${}", engine.total_wallet_balance()?);

    std::fs::remove_file(&path)?;
    Ok(())
}
