use anyhow::Context;
use chrono::{Duration, Utc};
use orderflow_ladder::prelude::*;
use orderflow_ladder::{init_logging, HistogramView};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const TICK: Decimal = dec!(0.25);

fn main() -> anyhow::Result<()> {
    init_logging();

    let config = OrderFlowConfig::from_env().context("loading ORDERFLOW_* configuration")?;
    tracing::info!(config = %serde_json::to_string(&config)?, "starting order flow replay");

    let engine = Arc::new(OrderFlowEngine::new(config)?);
    let feed = FeedProcessor::new(engine.clone()).with_histogram(HistogramView {
        tick_size: TICK,
        cutoff_ticks: 8,
    });

    feed.apply_all(synthetic_session());

    let last = dec!(100.25);
    let strength = engine.order_flow_strength(StrengthMode::Combined, last, TICK);
    let (buy_rows, sell_rows) = strength.split_rows(20);

    println!("Order flow at {}: {}", last, strength);
    println!("  strength bar: {} buy rows / {} sell rows", buy_rows, sell_rows);
    println!("  totals: {:?}", engine.totals());
    println!(
        "  window: {} bought / {} sold, highest buy {:?}, lowest sell {:?}",
        engine.buys_in_window(),
        engine.sells_in_window(),
        engine.highest_buy_price_in_window(),
        engine.lowest_sell_price_in_window()
    );

    println!("Tape (newest first):");
    for entry in feed.tape().recent(5) {
        let ice = if entry.ice { " ICE" } else { "" };
        println!("  {} {}@{} {}{}", entry.time.format("%H:%M:%S"), entry.size, entry.price, entry.match_type, ice);
    }

    println!("Feed stats: {}", serde_json::to_string_pretty(&feed.stats())?);
    Ok(())
}

/// Deterministic replay: a ladder snapshot, some backfill, then live prints
/// with a few book updates in between.
fn synthetic_session() -> Vec<MarketEvent> {
    let start = Utc::now() - Duration::minutes(5);
    let mut events = vec![MarketEvent::SessionStart];

    let mut asks = Vec::new();
    let mut bids = Vec::new();
    for level in 0..8i64 {
        let offset = TICK * Decimal::from(level);
        asks.push(LadderRow {
            price: dec!(100.25) + offset,
            size: 20 + 7 * level,
            time: start,
        });
        bids.push(LadderRow {
            price: dec!(100.00) - offset,
            size: 25 + 5 * level,
            time: start,
        });
    }
    events.push(MarketEvent::Ladder {
        side: BookSide::Ask,
        rows: Some(asks),
    });
    events.push(MarketEvent::Ladder {
        side: BookSide::Bid,
        rows: Some(bids),
    });

    for i in 0..120i64 {
        let time = start + Duration::seconds(i * 2);
        let buyer = i % 3 != 0;
        let drift = TICK * Decimal::from((i / 30) % 3);
        let (bid, ask) = (dec!(100.00) + drift, dec!(100.25) + drift);

        events.push(MarketEvent::Trade {
            tick: TradeTick {
                ask_price: ask,
                ask_size: 30,
                bid_price: bid,
                bid_size: 25,
                price: if buyer { ask } else { bid },
                // Every 17th print takes more than the touch shows
                size: if i % 17 == 0 { 45 } else { 1 + i % 9 },
                time,
            },
            live: i >= 30,
            first_of_session: false,
        });

        if i % 10 == 0 {
            events.push(MarketEvent::BookUpdate {
                side: if buyer { BookSide::Ask } else { BookSide::Bid },
                operation: BookOperation::Update,
                price: if buyer { ask } else { bid },
                size: 10 + i % 40,
                time,
            });
        }
    }

    events
}
