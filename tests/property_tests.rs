//! Property-based tests using quickcheck

use chrono::{DateTime, Duration, TimeZone, Utc};
use orderflow_ladder::{
    classifier::{midpoint_aggressor, IcebergTradeClassifier, TradeClassifier},
    config::OrderFlowConfig,
    data::*,
    engine::OrderFlowEngine,
    price_map::VolumeLedger,
};
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const TICK: Decimal = dec!(0.25);

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap()
}

fn price_at(index: u8) -> Decimal {
    dec!(100) + TICK * Decimal::from(index % 32)
}

fn engine() -> OrderFlowEngine {
    OrderFlowEngine::new(OrderFlowConfig::default()).unwrap()
}

fn buy_tick(price: Decimal, size: i64, time: DateTime<Utc>) -> TradeTick {
    TradeTick {
        ask_price: price,
        ask_size: 0,
        bid_price: price - TICK,
        bid_size: 0,
        price,
        size,
        time,
    }
}

// Sliding volume total always equals the sum of its levels
#[quickcheck]
fn prop_sliding_volume_total_matches_levels(trades: Vec<(u8, u16, u8)>, sweeps: Vec<(u8, u8)>) -> bool {
    let engine = engine();
    let mut sweeps = sweeps.into_iter();

    for (price, size, secs) in trades {
        let time = epoch() + Duration::seconds(i64::from(secs));
        if engine.record_trade(true, &buy_tick(price_at(price), i64::from(size), time)).is_err() {
            return false;
        }
        if let Some((at, window)) = sweeps.next() {
            let window = 1 + u32::from(window);
            engine.evict_by_time(epoch() + Duration::seconds(i64::from(at)), window, window);
        }
        if !engine.ledgers_consistent() {
            return false;
        }
    }
    true
}

// Eviction removes exactly the levels older than the window, and the total
// drops by exactly their size
#[quickcheck]
fn prop_eviction_is_exact(levels: Vec<(u8, u16, u8)>, now_secs: u8, window: u8) -> TestResult {
    if levels.is_empty() {
        return TestResult::discard();
    }

    let ledger = VolumeLedger::new();
    for (price, size, secs) in &levels {
        ledger.accumulate(price_at(*price), i64::from(*size), epoch() + Duration::seconds(i64::from(*secs)));
    }

    let now = epoch() + Duration::seconds(i64::from(now_secs));
    let window = Duration::seconds(i64::from(window));

    let before: Vec<(Decimal, i64, bool)> = (0..32u8)
        .filter_map(|i| ledger.level(&price_at(i)).map(|l| (price_at(i), l.size, now - l.time > window)))
        .collect();
    let expected_evicted: i64 = before.iter().filter(|(_, _, stale)| *stale).map(|(_, size, _)| size).sum();
    let total_before = ledger.total();

    let evicted = ledger.evict_older_than(now, window);

    let survivors_ok = before.iter().all(|(price, size, stale)| {
        if *stale {
            ledger.level(price).is_none()
        } else {
            ledger.size_at(price) == *size
        }
    });

    TestResult::from_bool(
        evicted == expected_evicted
            && ledger.total() == total_before - expected_evicted
            && ledger.total() == ledger.sum_of_levels()
            && survivors_ok,
    )
}

// Replacing a ladder twice with the same rows is idempotent
#[quickcheck]
fn prop_replace_ladder_idempotent(rows: Vec<(u8, u16)>) -> bool {
    let engine = engine();
    let rows: Vec<LadderRow> = rows
        .into_iter()
        .map(|(price, size)| LadderRow {
            price: price_at(price),
            size: i64::from(size),
            time: epoch(),
        })
        .collect();

    engine.replace_ladder(BookSide::Bid, Some(&rows));
    let first: Vec<i64> = (0..32u8).map(|i| engine.bid_size(price_at(i))).collect();

    engine.replace_ladder(BookSide::Bid, Some(&rows));
    let second: Vec<i64> = (0..32u8).map(|i| engine.bid_size(price_at(i))).collect();

    first == second && (0..32u8).all(|i| engine.bid_change(price_at(i)) == 0)
}

// The change returned by an upsert is the difference to the previous size
#[quickcheck]
fn prop_upsert_change_is_delta(sizes: Vec<u16>) -> bool {
    let engine = engine();
    let mut previous = 0i64;
    sizes.into_iter().all(|size| {
        let size = i64::from(size);
        let update = engine.upsert_ask(dec!(100), size, epoch()).unwrap();
        let ok = update.change == size - previous && engine.ask_size(dec!(100)) == size;
        previous = size;
        ok
    })
}

// Strength is always finite and, once active, sums to 100
#[quickcheck]
fn prop_strength_is_defined(trades: Vec<(u8, u16, bool)>, current: u8) -> bool {
    let engine = engine();
    for (price, size, buyer) in trades {
        let price = price_at(price);
        let (ask, bid) = if buyer { (price, price - TICK) } else { (price + TICK, price) };
        engine
            .classify_quote_and_record(true, ask, bid, price, i64::from(size), epoch())
            .unwrap();
    }

    [StrengthMode::Combined, StrengthMode::Imbalance, StrengthMode::BuySell]
        .iter()
        .all(|mode| {
            let s = engine.order_flow_strength(*mode, price_at(current), TICK);
            s.buy.is_finite() && s.sell.is_finite() && (s.buy + s.sell - 100.0).abs() < 1e-9
        })
}

// Session totals never decrease and never exceed what was traded
#[quickcheck]
fn prop_session_totals_monotonic(trades: Vec<(u8, u16)>, sweep_at: u8) -> bool {
    let engine = engine();
    let mut traded = 0i64;
    for (price, size) in trades {
        let before = engine.total_session_buys();
        engine.record_trade(true, &buy_tick(price_at(price), i64::from(size), epoch())).unwrap();
        traded += i64::from(size);
        if engine.total_session_buys() < before {
            return false;
        }
    }

    engine.evict_by_time(epoch() + Duration::seconds(i64::from(sweep_at)), 1, 1);
    engine.total_session_buys() == traded && engine.largest_session_size() <= traded
}

// Mid-point rule: buyer exactly when the trade is above the reference price
#[quickcheck]
fn prop_midpoint_classification(bid_ticks: u8, spread_ticks: u8, trade_ticks: u8) -> bool {
    let bid = TICK * Decimal::from(bid_ticks);
    let ask = bid + TICK * Decimal::from(spread_ticks);
    let price = TICK * Decimal::from(trade_ticks);
    let mid = (ask + bid) / dec!(2);

    let aggressor = midpoint_aggressor(ask, bid, price);
    aggressor.is_buy() == (price > mid)
}

// Iceberg labels only appear when the print exceeds a known touch size
#[quickcheck]
fn prop_iceberg_requires_known_depth(ask_size: u8, bid_size: u8, size: u8, at_ask: bool) -> bool {
    let tick = TradeTick {
        ask_price: dec!(100.25),
        ask_size: i64::from(ask_size),
        bid_price: dec!(100.00),
        bid_size: i64::from(bid_size),
        price: if at_ask { dec!(100.25) } else { dec!(100.00) },
        size: i64::from(size),
        time: epoch(),
    };
    let aggressor = match IcebergTradeClassifier.classify_with_depth(&tick) {
        Ok(aggressor) => aggressor,
        Err(_) => return false,
    };

    let touch = if at_ask { tick.ask_size } else { tick.bid_size };
    aggressor.is_ice() == (touch > 0 && tick.size > touch) && aggressor.is_buy() == at_ask
}
