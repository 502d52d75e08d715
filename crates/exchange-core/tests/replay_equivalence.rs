//! Resuming a shard from a snapshot plus its trailing journal must
//! reproduce exactly the state live execution would have reached.

use common::{Action, BalanceAdjustmentType, Command, Metadata, OrderCategory, SymbolCategoryWire, SymbolWire};
use config::JournalConfig;
use exchange_core::Shard;

fn md(seq: i64) -> Metadata {
    Metadata { seq, timestamp_ns: seq, service_flags: 0, events_group: 0 }
}

fn future_symbol_wire(symbol_id: i32) -> SymbolWire {
    SymbolWire {
        symbol_id,
        category: SymbolCategoryWire::FutureContract,
        base_currency: 1,
        quote_currency: 1,
        base_scale_k: 1,
        quote_scale_k: 1,
        taker_fee: 1,
        maker_fee: 0,
        margin_buy: 10,
        margin_sell: 10,
        underlying_symbol_id: 0,
        strike_price: 0,
        expiry_ts: 0,
    }
}

fn place(seq: i64, user_id: i64, symbol_id: i32, order_id: i64, action: Action, price: i64, quantity: i64) -> Command {
    Command::Place {
        metadata: md(seq),
        user_id,
        symbol_id,
        order_id,
        price,
        reserved_bid_price: price,
        quantity,
        user_cookie: 0,
        action,
        category: OrderCategory::Gtc,
    }
}

/// Compares two shards the way a reviewer would read the state back:
/// per-user balances and margin positions, not raw snapshot bytes
/// (which may order map entries differently between two independently
/// built `HashMap`s holding the same logical content).
fn assert_same_observable_state(a: &Shard, b: &Shard, user_ids: &[i64], symbol_id: i32, currency: i32) {
    for &user_id in user_ids {
        let pa = a.risk().profile(user_id).unwrap();
        let pb = b.risk().profile(user_id).unwrap();
        assert_eq!(pa.balance_of(currency), pb.balance_of(currency), "balance mismatch for user {user_id}");
        assert_eq!(
            pa.margin_position_of(symbol_id).map(|p| (p.pending_buy_quantity, p.pending_sell_quantity, p.open_quantity)),
            pb.margin_position_of(symbol_id).map(|p| (p.pending_buy_quantity, p.pending_sell_quantity, p.open_quantity)),
            "margin position mismatch for user {user_id}"
        );
    }
    assert_eq!(a.matching().book(symbol_id).unwrap().fill_bids(10), b.matching().book(symbol_id).unwrap().fill_bids(10));
    assert_eq!(a.matching().book(symbol_id).unwrap().fill_asks(10), b.matching().book(symbol_id).unwrap().fill_asks(10));
    assert_eq!(a.symbols().contains(symbol_id), b.symbols().contains(symbol_id));
}

#[test]
fn resuming_from_snapshot_matches_live_state() {
    let dir = tempfile::tempdir().unwrap();
    let config = JournalConfig::default();

    let mut live = Shard::open(dir.path(), 1, 0, config.clone()).unwrap();
    live.dispatch(Command::AddSymbols { metadata: md(1), symbols: vec![(7, future_symbol_wire(7))] }).unwrap();
    live.dispatch(Command::AddUser { metadata: md(2), user_id: 1 }).unwrap();
    live.dispatch(Command::AddUser { metadata: md(3), user_id: 2 }).unwrap();
    live.dispatch(Command::BalanceAdj {
        metadata: md(4),
        user_id: 1,
        currency: 1,
        txid: 1,
        amount: 10_000,
        kind: BalanceAdjustmentType::Deposit,
    })
    .unwrap();
    live.dispatch(Command::BalanceAdj {
        metadata: md(5),
        user_id: 2,
        currency: 1,
        txid: 2,
        amount: 10_000,
        kind: BalanceAdjustmentType::Deposit,
    })
    .unwrap();
    live.dispatch(place(6, 1, 7, 1, Action::Bid, 100, 10)).unwrap();

    // Checkpoint: seq 7 becomes the new snapshot id, seq 8 onward go to a
    // fresh journal chain rooted at it.
    live.dispatch(Command::PersistStateMatching { metadata: md(7) }).unwrap();
    live.dispatch(Command::PersistStateRisk { metadata: md(7) }).unwrap();
    let snapshot_id = live.snapshot_id();
    assert_eq!(snapshot_id, 7);

    // Commands after the checkpoint: a partial fill plus a cancel.
    live.dispatch(place(8, 2, 7, 2, Action::Ask, 100, 4)).unwrap();
    live.dispatch(Command::Cancel { metadata: md(9), user_id: 1, symbol_id: 7, order_id: 1 }).unwrap();
    live.dispatch(Command::ShutdownSignal { metadata: md(10) }).unwrap();

    let resumed = Shard::open_from_snapshot(dir.path(), 1, 0, snapshot_id, config).unwrap();

    assert_same_observable_state(&live, &resumed, &[1, 2], 7, 1);
}
