//! Market event pipeline
//!
//! [`FeedProcessor`] is the single writer in front of an [`OrderFlowEngine`].
//! It applies host events in the order the ladder expects: a live trade is
//! recorded first and the eviction sweep then runs at that trade's
//! timestamp, and a trade flagged as the first of a session clears
//! everything first.
//! A bad event is reported and counted, never propagated, so one malformed
//! update cannot stop the feed.

use crate::data::{Aggressor, BookSide, LadderRow, TradeTick};
use crate::engine::OrderFlowEngine;
use crate::error::{ErrorContext, ErrorReporter};
use crate::time_and_sales::TimeAndSales;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Kind of change carried by a depth update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookOperation {
    Add,
    Update,
    /// The level is gone; recorded as a zero size
    Remove,
}

/// An event from the host's market data feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    BookUpdate {
        side: BookSide,
        operation: BookOperation,
        price: Decimal,
        size: i64,
        time: chrono::DateTime<chrono::Utc>,
    },
    /// Full book side snapshot; `None` when the host has none to give
    Ladder {
        side: BookSide,
        rows: Option<Vec<LadderRow>>,
    },
    Trade {
        tick: TradeTick,
        /// `false` for historical backfill
        live: bool,
        first_of_session: bool,
    },
    SessionStart,
    ResetWindow,
}

/// Settings for the bid/ask histogram refreshed after book updates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramView {
    pub tick_size: Decimal,
    /// Ticks past the best bid/ask to include
    pub cutoff_ticks: u32,
}

/// Feed counters
#[derive(Debug, Default)]
pub struct FeedStats {
    events: AtomicU64,
    trades: AtomicU64,
    backfilled: AtomicU64,
    book_updates: AtomicU64,
    dropped: AtomicU64,
    evicted_levels: AtomicU64,
}

/// Point-in-time copy of [`FeedStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedStatsSnapshot {
    pub events: u64,
    pub trades: u64,
    pub backfilled: u64,
    pub book_updates: u64,
    pub dropped: u64,
    pub evicted_levels: u64,
}

impl FeedStats {
    pub fn snapshot(&self) -> FeedStatsSnapshot {
        FeedStatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            trades: self.trades.load(Ordering::Relaxed),
            backfilled: self.backfilled.load(Ordering::Relaxed),
            book_updates: self.book_updates.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            evicted_levels: self.evicted_levels.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }
}

/// Applies [`MarketEvent`]s to a shared engine and tape
#[derive(Debug)]
pub struct FeedProcessor {
    engine: Arc<OrderFlowEngine>,
    tape: Arc<TimeAndSales>,
    histogram: Option<HistogramView>,
    /// Best (bid, ask) from the latest trade
    best_quote: Mutex<Option<(Decimal, Decimal)>>,
    stats: FeedStats,
}

impl FeedProcessor {
    pub fn new(engine: Arc<OrderFlowEngine>) -> Self {
        let tape = Arc::new(TimeAndSales::from_config(engine.config()));
        Self::with_tape(engine, tape)
    }

    pub fn with_tape(engine: Arc<OrderFlowEngine>, tape: Arc<TimeAndSales>) -> Self {
        Self {
            engine,
            tape,
            histogram: None,
            best_quote: Mutex::new(None),
            stats: FeedStats::default(),
        }
    }

    /// Recompute bid/ask percentages after every book update
    pub fn with_histogram(mut self, view: HistogramView) -> Self {
        self.histogram = Some(view);
        self
    }

    pub fn engine(&self) -> &Arc<OrderFlowEngine> {
        &self.engine
    }

    pub fn tape(&self) -> &Arc<TimeAndSales> {
        &self.tape
    }

    pub fn stats(&self) -> FeedStatsSnapshot {
        self.stats.snapshot()
    }

    /// Applies every event in order
    pub fn apply_all<I>(&self, events: I)
    where
        I: IntoIterator<Item = MarketEvent>,
    {
        for event in events {
            self.apply(event);
        }
    }

    /// Applies one event. Returns `false` if it was dropped.
    pub fn apply(&self, event: MarketEvent) -> bool {
        FeedStats::bump(&self.stats.events, 1);

        match event {
            MarketEvent::BookUpdate {
                side,
                operation,
                price,
                size,
                time,
            } => {
                let size = match operation {
                    BookOperation::Remove => 0,
                    BookOperation::Add | BookOperation::Update => size,
                };
                let applied = self.engine.record_book_update(side, price, size, time).is_some();
                if applied {
                    FeedStats::bump(&self.stats.book_updates, 1);
                    self.refresh_histogram();
                } else {
                    FeedStats::bump(&self.stats.dropped, 1);
                }
                applied
            }
            MarketEvent::Ladder { side, rows } => {
                self.engine.replace_ladder(side, rows.as_deref());
                self.refresh_histogram();
                true
            }
            MarketEvent::Trade {
                tick,
                live,
                first_of_session,
            } => {
                if first_of_session {
                    self.reset_session();
                }
                self.apply_trade(&tick, live).is_some()
            }
            MarketEvent::SessionStart => {
                self.reset_session();
                true
            }
            MarketEvent::ResetWindow => {
                self.engine.reset_sliding_window();
                true
            }
        }
    }

    fn reset_session(&self) {
        self.engine.reset_session();
        self.tape.clear();
    }

    fn apply_trade(&self, tick: &TradeTick, live: bool) -> Option<Aggressor> {
        match self.engine.record_trade(live, tick) {
            Ok(aggressor) => {
                if live {
                    let report = self.engine.evict_expired(tick.time);
                    FeedStats::bump(&self.stats.evicted_levels, report.trade_levels as u64);
                    FeedStats::bump(&self.stats.trades, 1);
                    self.tape.record(tick);
                    *self.best_quote.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some((tick.bid_price, tick.ask_price));
                } else {
                    FeedStats::bump(&self.stats.backfilled, 1);
                }
                Some(aggressor)
            }
            Err(error) => {
                FeedStats::bump(&self.stats.dropped, 1);
                ErrorReporter::report_error(
                    &error,
                    Some(
                        ErrorContext::new("apply_trade")
                            .with_detail("price", tick.price)
                            .with_detail("size", tick.size)
                            .with_detail("live", live),
                    ),
                );
                None
            }
        }
    }

    fn refresh_histogram(&self) {
        let Some(view) = self.histogram else {
            return;
        };
        let Some((bid, ask)) = *self.best_quote.lock().unwrap_or_else(PoisonError::into_inner) else {
            return;
        };

        let span = Decimal::from(view.cutoff_ticks)
            .checked_mul(view.tick_size)
            .unwrap_or(Decimal::MAX);
        let lower = bid.checked_sub(span).unwrap_or(Decimal::MIN);
        let upper = ask.checked_add(span).unwrap_or(Decimal::MAX);
        self.engine
            .calculate_bid_ask_percentages(view.tick_size, bid, ask, lower, upper);
    }
}
