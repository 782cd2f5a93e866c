//! Order flow engine
//!
//! Keeps every per-price statistic a trading ladder paints: resting bid/ask
//! sizes and their changes, buyer/seller initiated volume inside a sliding
//! window, session totals, iceberg volume and the sliding volume profile.
//!
//! The engine is designed for one feed thread writing and any number of
//! render threads reading through a shared `Arc<OrderFlowEngine>`. All
//! methods take `&self`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use orderflow_ladder::prelude::*;
//!
//! let engine = OrderFlowEngine::new(OrderFlowConfig::default())?;
//! engine.record_book_update(BookSide::Ask, dec!(100.25), 50, now);
//! engine.record_book_update(BookSide::Bid, dec!(100.00), 40, now);
//!
//! let aggressor = engine.record_trade(true, &tick)?;
//! engine.evict_expired(now);
//!
//! let strength = engine.order_flow_strength(StrengthMode::Combined, last, tick_size);
//! ```

use crate::classifier::TradeClassifier;
use crate::config::OrderFlowConfig;
use crate::data::{Aggressor, BidAsk, BidAskPerc, BookLevelChange, BookSide, LadderRow, Trade, TradeTick};
use crate::error::{ErrorContext, ErrorReporter, LadderError, Result};
use crate::price_map::{is_expired, PriceMap, VolumeLedger};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LIFECYCLE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Engine lifecycle
///
/// ```text
/// UNINITIALIZED ──first event / reset_session()──▶ ACTIVE ◀──next trade──┐
///                                                   │                     │
///                                      reset_sliding_window()             │
///                                                   ▼                     │
///                                             WINDOW_CLEARED ─────────────┘
/// ```
///
/// `reset_session()` returns to a fresh `Active` from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Active,
    WindowCleared,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EngineState::Active,
            2 => EngineState::WindowCleared,
            _ => EngineState::Uninitialized,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            EngineState::Uninitialized => 0,
            EngineState::Active => 1,
            EngineState::WindowCleared => 2,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Uninitialized => write!(f, "UNINITIALIZED"),
            EngineState::Active => write!(f, "ACTIVE"),
            EngineState::WindowCleared => write!(f, "WINDOW_CLEARED"),
        }
    }
}

/// Session buys plus sells may not grow past this, so every derived sum
/// (window totals, combined strength numerators) stays inside `i64`
pub const MAX_SESSION_VOLUME: i64 = i64::MAX / 4;

/// Largest price magnitude accepted from the feed
pub const PRICE_LIMIT: Decimal = dec!(1000000000000);

/// Snapshot of the running scalar totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    pub session_buys: i64,
    pub session_sells: i64,
    pub largest_session_size: i64,
    pub ice_buys: i64,
    pub ice_sells: i64,
    pub sliding_volume: i64,
}

/// What an eviction sweep removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EvictionReport {
    /// Buy and sell trade levels removed
    pub trade_levels: usize,
    /// Iceberg volume removed across both sides
    pub ice_volume: i64,
    /// Sliding volume removed
    pub volume: i64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PER-SIDE STATE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trade-side state for one aggressor side
#[derive(Debug, Default)]
pub(crate) struct SideFlow {
    /// Latest trade per price inside the window
    pub(crate) trades: PriceMap<Trade>,
    /// Size of the last print, consumable by the ladder
    pub(crate) last_size: PriceMap<i64>,
    pub(crate) last_print: PriceMap<i64>,
    pub(crate) last_print_max: PriceMap<i64>,
    pub(crate) ice: VolumeLedger,
    pub(crate) session: VolumeLedger,
}

impl SideFlow {
    fn record_window(&self, aggressor: Aggressor, tick: &TradeTick, opposing_price: Decimal, opposing_size: i64) {
        let size = tick.size;
        let trade = Trade {
            size,
            time: tick.time,
            aggressor,
            cumulative_size: size,
            opposing_price,
            opposing_size,
        };

        // Replace the entry, carrying the cumulative size forward
        self.trades.upsert(tick.price, trade.clone(), |old| Trade {
            cumulative_size: old.cumulative_size + size,
            ..trade.clone()
        });

        if aggressor.is_ice() {
            self.ice.accumulate(tick.price, size, tick.time);
        }

        self.last_size.insert(tick.price, size);
        self.last_print.insert(tick.price, size);
        self.last_print_max.raise_to(tick.price, size);
    }

    /// Removes trade levels older than the window, with their trackers.
    /// Returns the number of trade levels removed and the ice volume removed.
    fn evict(&self, now: DateTime<Utc>, window: Duration) -> (usize, i64) {
        let mut removed = 0;
        for price in self.trades.prices() {
            if self
                .trades
                .remove_if(&price, |trade| is_expired(now, trade.time, window))
                .is_some()
            {
                self.last_size.remove(&price);
                self.last_print.remove(&price);
                self.last_print_max.remove(&price);
                removed += 1;
            }
        }

        let ice = self.ice.evict_older_than(now, window);
        (removed, ice)
    }

    fn clear_window(&self) {
        self.trades.clear();
        self.ice.clear();
        self.last_size.clear();
        self.last_print.clear();
        self.last_print_max.clear();
    }

    fn clear_session(&self) {
        self.clear_window();
        self.session.clear();
    }

    pub(crate) fn cumulative_at(&self, price: &Decimal) -> Option<i64> {
        self.trades.get(price).map(|trade| trade.cumulative_size)
    }

    pub(crate) fn cumulative_total(&self) -> i64 {
        self.trades.fold(0, |acc, _, trade| acc + trade.cumulative_size)
    }

    fn largest_cumulative(&self) -> i64 {
        self.trades.fold(0, |acc, _, trade| acc.max(trade.cumulative_size))
    }
}

/// Book-side state for one side of the book
#[derive(Debug, Default)]
pub(crate) struct BookState {
    pub(crate) resting: PriceMap<BidAsk>,
    pub(crate) change: PriceMap<i64>,
    pub(crate) perc: PriceMap<BidAskPerc>,
}

impl BookState {
    fn upsert(&self, side: BookSide, price: Decimal, size: i64, time: DateTime<Utc>) -> BookLevelChange {
        let previous = self.resting.get(&price).map(|level| level.size).unwrap_or(0);
        let change = size - previous;

        // A flattened level keeps a zero change so it reads differently
        // from a price never seen
        self.change.insert(price, if size > 0 { change } else { 0 });

        let snapshot = BidAsk::new(size, time);
        self.resting.insert(price, snapshot);

        BookLevelChange {
            side,
            price,
            snapshot,
            change,
        }
    }

    fn replace(&self, rows: &[LadderRow]) -> usize {
        self.resting.clear();
        self.change.clear();

        let mut skipped = 0;
        for row in rows {
            if row.size < 0 || check_price(row.price).is_err() {
                skipped += 1;
                continue;
            }
            self.resting.insert(row.price, BidAsk::new(row.size, row.time));
        }
        skipped
    }

    fn clear(&self) {
        self.resting.clear();
        self.change.clear();
        self.perc.clear();
    }

    fn size_at(&self, price: &Decimal) -> i64 {
        self.resting.get(price).map(|level| level.size).unwrap_or(0)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ENGINE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-price order flow state for a single instrument
pub struct OrderFlowEngine {
    pub(crate) config: OrderFlowConfig,
    classifier: Arc<dyn TradeClassifier>,
    pub(crate) buys: SideFlow,
    pub(crate) sells: SideFlow,
    pub(crate) bids: BookState,
    pub(crate) asks: BookState,
    sliding_volume: VolumeLedger,
    largest_session_size: AtomicI64,
    state: AtomicU8,
}

impl fmt::Debug for OrderFlowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderFlowEngine")
            .field("classifier", &self.classifier)
            .field("state", &self.state())
            .field("totals", &self.totals())
            .finish()
    }
}

impl OrderFlowEngine {
    /// Create an engine using the classifier named in `config`
    pub fn new(config: OrderFlowConfig) -> Result<Self> {
        let classifier = config.classifier.build();
        Self::with_classifier(config, classifier)
    }

    /// Create an engine with a custom classification policy
    pub fn with_classifier(config: OrderFlowConfig, classifier: Arc<dyn TradeClassifier>) -> Result<Self> {
        config.validate()?;
        tracing::debug!(?classifier, "creating order flow engine");

        Ok(Self {
            config,
            classifier,
            buys: SideFlow::default(),
            sells: SideFlow::default(),
            bids: BookState::default(),
            asks: BookState::default(),
            sliding_volume: VolumeLedger::new(),
            largest_session_size: AtomicI64::new(0),
            state: AtomicU8::new(EngineState::Uninitialized.as_u8()),
        })
    }

    pub fn config(&self) -> &OrderFlowConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: EngineState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn activate(&self) {
        if self.state() != EngineState::Active {
            self.set_state(EngineState::Active);
        }
    }

    pub(crate) fn book(&self, side: BookSide) -> &BookState {
        match side {
            BookSide::Bid => &self.bids,
            BookSide::Ask => &self.asks,
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // RESETS
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Clears all state and starts a fresh session
    pub fn reset_session(&self) {
        self.clear_window_state();

        self.buys.clear_session();
        self.sells.clear_session();
        self.largest_session_size.store(0, Ordering::Release);

        self.bids.clear();
        self.asks.clear();

        self.set_state(EngineState::Active);
        tracing::info!("order flow session reset");
    }

    /// Clears sliding-window state only; session totals and the book survive
    pub fn reset_sliding_window(&self) {
        self.clear_window_state();
        self.set_state(EngineState::WindowCleared);
        tracing::debug!("sliding window reset");
    }

    fn clear_window_state(&self) {
        self.buys.clear_window();
        self.sells.clear_window();
        self.sliding_volume.clear();
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // BOOK UPDATES
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Stores the resting bid size at `price` and records the change
    pub fn upsert_bid(&self, price: Decimal, size: i64, time: DateTime<Utc>) -> Result<BookLevelChange> {
        self.upsert_level(BookSide::Bid, price, size, time)
    }

    /// Stores the resting ask size at `price` and records the change
    pub fn upsert_ask(&self, price: Decimal, size: i64, time: DateTime<Utc>) -> Result<BookLevelChange> {
        self.upsert_level(BookSide::Ask, price, size, time)
    }

    fn upsert_level(
        &self,
        side: BookSide,
        price: Decimal,
        size: i64,
        time: DateTime<Utc>,
    ) -> Result<BookLevelChange> {
        if size < 0 {
            return Err(LadderError::MalformedInput(format!(
                "negative {:?} size {} at {}",
                side, size, price
            )));
        }
        check_price(price)?;

        let update = self.book(side).upsert(side, price, size, time);
        self.activate_if_uninitialized();
        tracing::trace!(?side, %price, size, change = update.change, "book level updated");
        Ok(update)
    }

    /// Applies one incremental book update from the feed.
    ///
    /// Malformed updates are logged and dropped; existing state is left as is.
    pub fn record_book_update(
        &self,
        side: BookSide,
        price: Decimal,
        size: i64,
        time: DateTime<Utc>,
    ) -> Option<BookLevelChange> {
        match self.upsert_level(side, price, size, time) {
            Ok(update) => Some(update),
            Err(error) => {
                ErrorReporter::report_error(
                    &error,
                    Some(
                        ErrorContext::new("record_book_update")
                            .with_detail("price", price)
                            .with_detail("size", size),
                    ),
                );
                None
            }
        }
    }

    /// Replaces one side of the book with a full snapshot.
    ///
    /// `None` leaves the current side untouched. Rows with negative sizes
    /// or out-of-range prices are skipped. Change tracking restarts from the snapshot.
    pub fn replace_ladder(&self, side: BookSide, rows: Option<&[LadderRow]>) {
        let Some(rows) = rows else {
            tracing::debug!(?side, "ignoring missing ladder snapshot");
            return;
        };

        let skipped = self.book(side).replace(rows);
        if skipped > 0 {
            ErrorReporter::report_error(
                &LadderError::MalformedInput(format!("{} ladder rows with negative size or bad price", skipped)),
                Some(ErrorContext::new("replace_ladder").with_detail("side", format!("{:?}", side))),
            );
        }

        self.activate_if_uninitialized();
        tracing::debug!(?side, rows = rows.len() - skipped, "ladder replaced");
    }

    fn activate_if_uninitialized(&self) {
        if self.state() == EngineState::Uninitialized {
            self.set_state(EngineState::Active);
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // TRADES
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Classifies a trade with the depth-aware classifier and records it.
    ///
    /// With `update_sliding_window == false` (historical backfill) only the
    /// session totals are updated.
    pub fn record_trade(&self, update_sliding_window: bool, tick: &TradeTick) -> Result<Aggressor> {
        self.check_tick(tick)?;
        let aggressor = self.classifier.classify_with_depth(tick)?;
        self.apply_trade(aggressor, update_sliding_window, tick);
        Ok(aggressor)
    }

    /// Same as [`record_trade`](Self::record_trade) for the store-level name
    pub fn classify_and_record(&self, update_sliding_window: bool, tick: &TradeTick) -> Result<Aggressor> {
        self.record_trade(update_sliding_window, tick)
    }

    /// Classifies a trade from quote prices alone and records it.
    ///
    /// For feeds without depth; never produces iceberg labels.
    pub fn classify_quote_and_record(
        &self,
        update_sliding_window: bool,
        ask_price: Decimal,
        bid_price: Decimal,
        trade_price: Decimal,
        trade_size: i64,
        time: DateTime<Utc>,
    ) -> Result<Aggressor> {
        let tick = TradeTick {
            ask_price,
            ask_size: 0,
            bid_price,
            bid_size: 0,
            price: trade_price,
            size: trade_size,
            time,
        };
        self.check_tick(&tick)?;

        let aggressor = self
            .classifier
            .classify(ask_price, bid_price, trade_price, trade_size, time);
        self.apply_trade(aggressor, update_sliding_window, &tick);
        Ok(aggressor)
    }

    /// Rejects a tick before anything is mutated.
    ///
    /// Assumes the single feed writer, so the session headroom read here
    /// still holds when the trade is applied.
    fn check_tick(&self, tick: &TradeTick) -> Result<()> {
        if tick.size < 0 {
            return Err(LadderError::MalformedInput(format!(
                "negative trade size {} at {}",
                tick.size, tick.price
            )));
        }
        for price in [tick.price, tick.ask_price, tick.bid_price] {
            check_price(price)?;
        }

        // Buys plus sells never exceed MAX_SESSION_VOLUME, so this cannot overflow
        let session = self.total_session_buys() + self.total_session_sells();
        if tick.size > MAX_SESSION_VOLUME - session {
            return Err(LadderError::MalformedInput(format!(
                "trade size {} at {} exceeds remaining session volume {}",
                tick.size,
                tick.price,
                MAX_SESSION_VOLUME - session
            )));
        }
        Ok(())
    }

    fn apply_trade(&self, aggressor: Aggressor, update_sliding_window: bool, tick: &TradeTick) {
        let (flow, opposing_price, opposing_size) = if aggressor.is_buy() {
            (&self.buys, tick.ask_price, tick.ask_size)
        } else {
            (&self.sells, tick.bid_price, tick.bid_size)
        };

        if update_sliding_window {
            flow.record_window(aggressor, tick, opposing_price, opposing_size);
            self.sliding_volume.accumulate(tick.price, tick.size, tick.time);
        }

        let session_size = flow.session.accumulate(tick.price, tick.size, tick.time);
        self.largest_session_size.fetch_max(session_size, Ordering::AcqRel);

        self.activate();
        tracing::trace!(
            %aggressor,
            price = %tick.price,
            size = tick.size,
            live = update_sliding_window,
            "trade recorded"
        );
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // EVICTION
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Drops sliding-volume levels last traded more than `window_secs` before `now`
    pub fn evict_sliding_volume(&self, now: DateTime<Utc>, window_secs: u32) -> i64 {
        self.sliding_volume
            .evict_older_than(now, Duration::seconds(i64::from(window_secs)))
    }

    /// Drops buy/sell trade levels and iceberg levels last traded more than
    /// `window_secs` before `now`
    pub fn evict_sliding_trades(&self, now: DateTime<Utc>, window_secs: u32) -> (usize, i64) {
        let window = Duration::seconds(i64::from(window_secs));
        let (buy_levels, buy_ice) = self.buys.evict(now, window);
        let (sell_levels, sell_ice) = self.sells.evict(now, window);
        (buy_levels + sell_levels, buy_ice + sell_ice)
    }

    /// Runs both eviction sweeps
    pub fn evict_by_time(
        &self,
        now: DateTime<Utc>,
        trade_window_secs: u32,
        volume_window_secs: u32,
    ) -> EvictionReport {
        let (trade_levels, ice_volume) = self.evict_sliding_trades(now, trade_window_secs);
        let volume = self.evict_sliding_volume(now, volume_window_secs);

        let report = EvictionReport {
            trade_levels,
            ice_volume,
            volume,
        };
        if report != EvictionReport::default() {
            tracing::debug!(?report, %now, "evicted stale order flow");
        }
        report
    }

    /// Runs both eviction sweeps with the configured windows
    pub fn evict_expired(&self, now: DateTime<Utc>) -> EvictionReport {
        self.evict_by_time(now, self.config.trade_window_secs, self.config.volume_window_secs)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // PER-PRICE ACCESSORS
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub fn bid_size(&self, price: Decimal) -> i64 {
        self.bids.size_at(&price)
    }

    pub fn ask_size(&self, price: Decimal) -> i64 {
        self.asks.size_at(&price)
    }

    pub fn bid_change(&self, price: Decimal) -> i64 {
        self.bids.change.value_or_zero(&price)
    }

    pub fn ask_change(&self, price: Decimal) -> i64 {
        self.asks.change.value_or_zero(&price)
    }

    /// Whether a change was ever recorded at `price`, including a flattening
    pub fn has_bid_change(&self, price: Decimal) -> bool {
        self.bids.change.contains(&price)
    }

    pub fn has_ask_change(&self, price: Decimal) -> bool {
        self.asks.change.contains(&price)
    }

    pub fn bid_perc(&self, price: Decimal) -> Option<BidAskPerc> {
        self.bids.perc.get(&price)
    }

    pub fn ask_perc(&self, price: Decimal) -> Option<BidAskPerc> {
        self.asks.perc.get(&price)
    }

    /// Latest buy trade at `price` inside the window
    pub fn buy_trade(&self, price: Decimal) -> Option<Trade> {
        self.buys.trades.get(&price)
    }

    /// Latest sell trade at `price` inside the window
    pub fn sell_trade(&self, price: Decimal) -> Option<Trade> {
        self.sells.trades.get(&price)
    }

    /// Cumulative buy size at `price` inside the window
    pub fn buys_in_window_at(&self, price: Decimal) -> i64 {
        self.buys.cumulative_at(&price).unwrap_or(0)
    }

    /// Cumulative sell size at `price` inside the window
    pub fn sells_in_window_at(&self, price: Decimal) -> i64 {
        self.sells.cumulative_at(&price).unwrap_or(0)
    }

    pub fn last_buy_size(&self, price: Decimal) -> i64 {
        self.buys.last_size.value_or_zero(&price)
    }

    pub fn last_sell_size(&self, price: Decimal) -> i64 {
        self.sells.last_size.value_or_zero(&price)
    }

    /// Consumes the last buy size marker at `price`
    pub fn remove_last_buy(&self, price: Decimal) -> Option<i64> {
        self.buys.last_size.remove(&price)
    }

    /// Consumes the last sell size marker at `price`
    pub fn remove_last_sell(&self, price: Decimal) -> Option<i64> {
        self.sells.last_size.remove(&price)
    }

    pub fn last_buy_print(&self, price: Decimal) -> i64 {
        self.buys.last_print.value_or_zero(&price)
    }

    pub fn last_sell_print(&self, price: Decimal) -> i64 {
        self.sells.last_print.value_or_zero(&price)
    }

    pub fn last_buy_print_max(&self, price: Decimal) -> i64 {
        self.buys.last_print_max.value_or_zero(&price)
    }

    pub fn last_sell_print_max(&self, price: Decimal) -> i64 {
        self.sells.last_print_max.value_or_zero(&price)
    }

    pub fn ice_buys_at(&self, price: Decimal) -> i64 {
        self.buys.ice.size_at(&price)
    }

    pub fn ice_sells_at(&self, price: Decimal) -> i64 {
        self.sells.ice.size_at(&price)
    }

    pub fn session_buys_at(&self, price: Decimal) -> i64 {
        self.buys.session.size_at(&price)
    }

    pub fn session_sells_at(&self, price: Decimal) -> i64 {
        self.sells.session.size_at(&price)
    }

    /// Session buys plus session sells at `price`
    pub fn volume_at(&self, price: Decimal) -> i64 {
        self.session_buys_at(price) + self.session_sells_at(price)
    }

    pub fn sliding_volume_at(&self, price: Decimal) -> i64 {
        self.sliding_volume.size_at(&price)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // AGGREGATE ACCESSORS
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Total cumulative buy size across the window
    pub fn buys_in_window(&self) -> i64 {
        self.buys.cumulative_total()
    }

    /// Total cumulative sell size across the window
    pub fn sells_in_window(&self) -> i64 {
        self.sells.cumulative_total()
    }

    pub fn total_large_buys_in_window(&self) -> i64 {
        self.buys.last_print_max.sum()
    }

    pub fn total_large_sells_in_window(&self) -> i64 {
        self.sells.last_print_max.sum()
    }

    pub fn total_buy_prints_in_window(&self) -> i64 {
        self.buys.last_print.sum()
    }

    pub fn total_sell_prints_in_window(&self) -> i64 {
        self.sells.last_print.sum()
    }

    pub fn highest_buy_price_in_window(&self) -> Option<Decimal> {
        self.buys.trades.prices().into_iter().max()
    }

    pub fn lowest_sell_price_in_window(&self) -> Option<Decimal> {
        self.sells.trades.prices().into_iter().min()
    }

    pub fn largest_buy_in_window(&self) -> i64 {
        self.buys.largest_cumulative()
    }

    pub fn largest_sell_in_window(&self) -> i64 {
        self.sells.largest_cumulative()
    }

    pub fn largest_max_buy_in_window(&self) -> i64 {
        self.buys.last_print_max.max_value()
    }

    pub fn largest_max_sell_in_window(&self) -> i64 {
        self.sells.last_print_max.max_value()
    }

    pub fn largest_last_buy_in_window(&self) -> i64 {
        self.buys.last_print.max_value()
    }

    pub fn largest_last_sell_in_window(&self) -> i64 {
        self.sells.last_print.max_value()
    }

    pub fn largest_ice_buy(&self) -> i64 {
        self.buys.ice.largest()
    }

    pub fn largest_ice_sell(&self) -> i64 {
        self.sells.ice.largest()
    }

    pub fn largest_sliding_volume(&self) -> i64 {
        self.sliding_volume.largest()
    }

    pub fn total_session_buys(&self) -> i64 {
        self.buys.session.total()
    }

    pub fn total_session_sells(&self) -> i64 {
        self.sells.session.total()
    }

    /// Largest single-price session size seen since the session started
    pub fn largest_session_size(&self) -> i64 {
        self.largest_session_size.load(Ordering::Acquire)
    }

    /// Largest single-price session buy or sell size strictly inside
    /// `(lower, upper)`
    pub fn largest_session_size_between(&self, lower: Decimal, upper: Decimal) -> i64 {
        self.buys
            .session
            .largest_between(lower, upper)
            .max(self.sells.session.largest_between(lower, upper))
    }

    pub fn total_ice_buys(&self) -> i64 {
        self.buys.ice.total()
    }

    pub fn total_ice_sells(&self) -> i64 {
        self.sells.ice.total()
    }

    pub fn total_sliding_volume(&self) -> i64 {
        self.sliding_volume.total()
    }

    /// Number of buy plus sell trade levels in the window
    pub fn trade_levels_in_window(&self) -> usize {
        self.buys.trades.len() + self.sells.trades.len()
    }

    pub fn totals(&self) -> Totals {
        Totals {
            session_buys: self.total_session_buys(),
            session_sells: self.total_session_sells(),
            largest_session_size: self.largest_session_size(),
            ice_buys: self.total_ice_buys(),
            ice_sells: self.total_ice_sells(),
            sliding_volume: self.total_sliding_volume(),
        }
    }

    /// Whether each scalar total matches the sum of its backing map.
    ///
    /// Only meaningful while no writer is active.
    pub fn ledgers_consistent(&self) -> bool {
        [
            &self.sliding_volume,
            &self.buys.ice,
            &self.sells.ice,
            &self.buys.session,
            &self.sells.session,
        ]
        .iter()
        .all(|ledger| ledger.total() == ledger.sum_of_levels())
    }
}

fn check_price(price: Decimal) -> Result<()> {
    if price.abs() > PRICE_LIMIT {
        return Err(LadderError::MalformedInput(format!(
            "price {} outside +/-{}",
            price, PRICE_LIMIT
        )));
    }
    Ok(())
}
