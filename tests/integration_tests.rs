//! Integration tests for the order flow engine

use chrono::{DateTime, Duration, TimeZone, Utc};
use orderflow_ladder::{
    Aggressor, BookOperation, BookSide, EngineState, FeedProcessor, LadderRow, MarketEvent, OrderFlowConfig,
    OrderFlowEngine, StrengthMode, TradeTick,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

const TICK: Decimal = dec!(0.25);

fn open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap()
}

fn engine() -> OrderFlowEngine {
    OrderFlowEngine::new(OrderFlowConfig::default()).unwrap()
}

/// Ask 100.25 x 50, bid 100.00 x 40
fn quoted(price: Decimal, size: i64, time: DateTime<Utc>) -> TradeTick {
    TradeTick {
        ask_price: dec!(100.25),
        ask_size: 50,
        bid_price: dec!(100.00),
        bid_size: 40,
        price,
        size,
        time,
    }
}

#[test]
fn test_buyer_at_ask_updates_window_and_session() {
    let engine = engine();
    let aggressor = engine.record_trade(true, &quoted(dec!(100.25), 10, open())).unwrap();

    assert_eq!(aggressor, Aggressor::Buyer);
    assert_eq!(engine.buys_in_window_at(dec!(100.25)), 10);
    assert_eq!(engine.session_buys_at(dec!(100.25)), 10);
    assert_eq!(engine.largest_session_size(), 10);
    assert_eq!(engine.last_buy_size(dec!(100.25)), 10);
    assert_eq!(engine.sliding_volume_at(dec!(100.25)), 10);
    assert_eq!(engine.state(), EngineState::Active);
}

#[test]
fn test_repeated_trades_accumulate() {
    let engine = engine();
    for i in 0..3 {
        engine
            .record_trade(true, &quoted(dec!(100.25), 10, open() + Duration::seconds(i)))
            .unwrap();
    }

    assert_eq!(engine.buys_in_window_at(dec!(100.25)), 30);
    assert_eq!(engine.session_buys_at(dec!(100.25)), 30);
    assert_eq!(engine.volume_at(dec!(100.25)), 30);
    assert_eq!(engine.largest_session_size(), 30);

    let trade = engine.buy_trade(dec!(100.25)).unwrap();
    assert_eq!(trade.size, 10);
    assert_eq!(trade.cumulative_size, 30);
    assert_eq!(trade.time, open() + Duration::seconds(2));
    assert_eq!(engine.last_buy_print_max(dec!(100.25)), 10);
}

#[test]
fn test_eviction_tears_down_trade_state() {
    let engine = engine();
    engine.record_trade(true, &quoted(dec!(100.25), 10, open())).unwrap();

    // Exactly one window later nothing goes
    let kept = engine.evict_by_time(open() + Duration::seconds(30), 30, 30);
    assert_eq!(kept.trade_levels, 0);
    assert_eq!(engine.last_buy_size(dec!(100.25)), 10);

    let report = engine.evict_by_time(open() + Duration::seconds(31), 30, 30);
    assert_eq!(report.trade_levels, 1);
    assert_eq!(report.volume, 10);

    assert_eq!(engine.last_buy_size(dec!(100.25)), 0);
    assert_eq!(engine.last_buy_print(dec!(100.25)), 0);
    assert_eq!(engine.last_buy_print_max(dec!(100.25)), 0);
    assert!(engine.buy_trade(dec!(100.25)).is_none());
    assert_eq!(engine.total_sliding_volume(), 0);
    // Session survives eviction
    assert_eq!(engine.session_buys_at(dec!(100.25)), 10);
}

#[test]
fn test_iceberg_volume_tracked_and_evicted() {
    let engine = engine();
    let aggressor = engine.record_trade(true, &quoted(dec!(100.25), 60, open())).unwrap();
    assert_eq!(aggressor, Aggressor::BuyerIce);

    let aggressor = engine
        .record_trade(true, &quoted(dec!(100.00), 45, open() + Duration::seconds(20)))
        .unwrap();
    assert_eq!(aggressor, Aggressor::SellerIce);

    assert_eq!(engine.ice_buys_at(dec!(100.25)), 60);
    assert_eq!(engine.total_ice_buys(), 60);
    assert_eq!(engine.total_ice_sells(), 45);
    assert_eq!(engine.largest_ice_sell(), 45);
    // Iceberg prints count as ordinary flow too
    assert_eq!(engine.buys_in_window(), 60);

    let report = engine.evict_by_time(open() + Duration::seconds(61), 60, 60);
    assert_eq!(report.ice_volume, 60);
    assert_eq!(engine.total_ice_buys(), 0);
    assert_eq!(engine.total_ice_sells(), 45);
    assert!(engine.ledgers_consistent());
}

#[test]
fn test_window_aggregates() {
    let engine = engine();
    let now = open();
    for (price, size) in [(dec!(100.25), 4), (dec!(100.50), 9), (dec!(100.25), 6)] {
        engine
            .classify_quote_and_record(true, price, price - TICK, price, size, now)
            .unwrap();
    }
    for (price, size) in [(dec!(99.75), 3), (dec!(100.00), 12)] {
        engine
            .classify_quote_and_record(true, price + TICK, price, price, size, now)
            .unwrap();
    }

    assert_eq!(engine.buys_in_window(), 19);
    assert_eq!(engine.sells_in_window(), 15);
    assert_eq!(engine.highest_buy_price_in_window(), Some(dec!(100.50)));
    assert_eq!(engine.lowest_sell_price_in_window(), Some(dec!(99.75)));
    assert_eq!(engine.largest_buy_in_window(), 10);
    assert_eq!(engine.largest_sell_in_window(), 12);
    assert_eq!(engine.largest_last_buy_in_window(), 9);
    assert_eq!(engine.largest_max_buy_in_window(), 9);
    assert_eq!(engine.total_buy_prints_in_window(), 15);
    assert_eq!(engine.total_large_buys_in_window(), 15);
    assert_eq!(engine.total_sell_prints_in_window(), 15);
    assert_eq!(engine.largest_sliding_volume(), 12);
    assert_eq!(engine.trade_levels_in_window(), 4);
    assert_eq!(engine.largest_session_size_between(dec!(99.75), dec!(100.50)), 12);
    assert_eq!(engine.largest_session_size_between(dec!(100.00), dec!(100.50)), 10);
}

#[test]
fn test_replace_ladder_resets_changes() {
    let engine = engine();
    let rows = vec![
        LadderRow {
            price: dec!(100.25),
            size: 30,
            time: open(),
        },
        LadderRow {
            price: dec!(100.50),
            size: -3,
            time: open(),
        },
    ];

    engine.upsert_ask(dec!(100.75), 9, open()).unwrap();
    engine.replace_ladder(BookSide::Ask, Some(&rows));

    assert_eq!(engine.ask_size(dec!(100.25)), 30);
    assert_eq!(engine.ask_size(dec!(100.50)), 0);
    assert_eq!(engine.ask_size(dec!(100.75)), 0);
    assert!(!engine.has_ask_change(dec!(100.75)));

    engine.upsert_ask(dec!(100.25), 35, open()).unwrap();
    assert_eq!(engine.ask_change(dec!(100.25)), 5);
}

#[test]
fn test_feed_replay_end_to_end() {
    let engine = Arc::new(engine());
    let feed = FeedProcessor::new(engine.clone());

    let mut events = vec![MarketEvent::SessionStart];
    for i in 0..40i64 {
        let price = if i % 4 == 0 { dec!(100.00) } else { dec!(100.25) };
        events.push(MarketEvent::Trade {
            tick: quoted(price, 5, open() + Duration::seconds(i)),
            live: i >= 10,
            first_of_session: false,
        });
    }
    events.push(MarketEvent::BookUpdate {
        side: BookSide::Bid,
        operation: BookOperation::Add,
        price: dec!(100.00),
        size: 40,
        time: open(),
    });
    feed.apply_all(events);

    let stats = feed.stats();
    assert_eq!(stats.events, 42);
    assert_eq!(stats.backfilled, 10);
    assert_eq!(stats.trades, 30);
    assert_eq!(stats.dropped, 0);

    assert_eq!(engine.total_session_buys() + engine.total_session_sells(), 200);
    assert_eq!(engine.total_sliding_volume(), 150);
    assert_eq!(feed.tape().len(), 30);

    let strength = engine.order_flow_strength(StrengthMode::BuySell, dec!(100.25), TICK);
    // 30 live prints: 7 at the bid, 23 at the ask
    assert!((strength.buy - 23.0 / 30.0 * 100.0).abs() < 1e-9);
}

#[test]
fn test_readers_run_alongside_writer() {
    let engine = Arc::new(engine());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let engine = engine.clone();
            let done = done.clone();
            thread::spawn(move || {
                let mut samples = 0u64;
                while !done.load(Ordering::Acquire) {
                    let strength = engine.order_flow_strength(StrengthMode::Combined, dec!(100.25), TICK);
                    assert!(strength.buy.is_finite() && strength.sell.is_finite());
                    let _ = engine.buys_in_window_at(dec!(100.25));
                    let _ = engine.largest_session_size_between(dec!(99), dec!(101));
                    samples += 1;
                }
                samples
            })
        })
        .collect();

    for i in 0..2_000i64 {
        let price = dec!(100.00) + TICK * Decimal::from(i % 3);
        let time = open() + Duration::milliseconds(i * 10);
        engine.record_trade(true, &quoted(price, 1 + i % 7, time)).unwrap();
        engine.evict_expired(time);
        engine.record_book_update(BookSide::Ask, dec!(100.25), 10 + i % 50, time);
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        reader.join().unwrap();
    }
    assert!(engine.ledgers_consistent());
}
