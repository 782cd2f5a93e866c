//! Time & Sales tape
//!
//! A bounded list of recent prints, each tagged with where it executed
//! relative to the quote, plus a second list holding only the large prints.
//! Optionally consecutive prints of the same price and match type are
//! folded into one entry.

use crate::config::OrderFlowConfig;
use crate::data::TradeTick;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Where a print executed relative to the quote at the time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    AtBid,
    AtAsk,
    AboveAsk,
    BelowBid,
    BetweenBidAsk,
    Unknown,
}

impl MatchType {
    /// Ask takes precedence over bid on a locked quote
    pub fn of(tick: &TradeTick) -> Self {
        if tick.price == tick.ask_price {
            MatchType::AtAsk
        } else if tick.price == tick.bid_price {
            MatchType::AtBid
        } else if tick.price > tick.ask_price {
            MatchType::AboveAsk
        } else if tick.price < tick.bid_price {
            MatchType::BelowBid
        } else if tick.price > tick.bid_price && tick.price < tick.ask_price {
            MatchType::BetweenBidAsk
        } else {
            MatchType::Unknown
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchType::AtBid => "AT_BID",
            MatchType::AtAsk => "AT_ASK",
            MatchType::AboveAsk => "ABOVE_ASK",
            MatchType::BelowBid => "BELOW_BID",
            MatchType::BetweenBidAsk => "BETWEEN_BID_ASK",
            MatchType::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// One line on the tape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapeEntry {
    pub price: Decimal,
    pub size: i64,
    pub time: DateTime<Utc>,
    pub match_type: MatchType,
    /// Print took more than the resting size at the touch
    pub ice: bool,
}

#[derive(Debug)]
struct PendingPrint {
    price: Decimal,
    size: i64,
    match_type: MatchType,
}

#[derive(Debug, Default)]
struct Tape {
    entries: VecDeque<TapeEntry>,
    filtered: VecDeque<TapeEntry>,
    pending: Option<PendingPrint>,
}

/// Bounded time & sales tape, safe to read while the feed thread writes
#[derive(Debug)]
pub struct TimeAndSales {
    capacity: usize,
    filter_size: i64,
    aggregate: bool,
    tape: Mutex<Tape>,
}

impl TimeAndSales {
    pub fn new(capacity: usize, filter_size: i64) -> Self {
        Self {
            capacity: capacity.max(1),
            filter_size,
            aggregate: false,
            tape: Mutex::new(Tape::default()),
        }
    }

    pub fn from_config(config: &OrderFlowConfig) -> Self {
        Self::new(config.tape_capacity, config.tape_filter_size).with_aggregation(config.tape_aggregate)
    }

    /// Fold consecutive prints at the same price and match type
    pub fn with_aggregation(mut self, aggregate: bool) -> Self {
        self.aggregate = aggregate;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Tape> {
        self.tape.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a print. Returns the entry written to the tape, if any.
    ///
    /// With aggregation on, an entry is only written when the price or
    /// match type changes, carrying the folded size of the previous run.
    pub fn record(&self, tick: &TradeTick) -> Option<TapeEntry> {
        let match_type = MatchType::of(tick);
        let mut tape = self.lock();

        if !self.aggregate {
            let entry = TapeEntry {
                price: tick.price,
                size: tick.size,
                time: tick.time,
                match_type,
                ice: is_ice(tick, match_type),
            };
            self.push(&mut tape, entry.clone());
            return Some(entry);
        }

        if let Some(pending) = tape.pending.as_mut() {
            if pending.price == tick.price && pending.match_type == match_type {
                pending.size += tick.size;
                return None;
            }
        }

        let finished = tape.pending.replace(PendingPrint {
            price: tick.price,
            size: tick.size,
            match_type,
        })?;

        if finished.match_type == MatchType::Unknown {
            return None;
        }

        let entry = TapeEntry {
            price: finished.price,
            size: finished.size,
            time: tick.time,
            match_type: finished.match_type,
            ice: false,
        };
        self.push(&mut tape, entry.clone());
        Some(entry)
    }

    fn push(&self, tape: &mut Tape, entry: TapeEntry) {
        if entry.size > self.filter_size {
            bounded_push(&mut tape.filtered, entry.clone(), self.capacity);
        }
        bounded_push(&mut tape.entries, entry, self.capacity);
    }

    /// Tape entries, oldest first
    pub fn entries(&self) -> Vec<TapeEntry> {
        self.lock().entries.iter().cloned().collect()
    }

    /// Entries larger than the filter size, oldest first
    pub fn filtered_entries(&self) -> Vec<TapeEntry> {
        self.lock().filtered.iter().cloned().collect()
    }

    /// Most recent `limit` entries, newest first
    pub fn recent(&self, limit: usize) -> Vec<TapeEntry> {
        self.lock().entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn clear(&self) {
        let mut tape = self.lock();
        tape.entries.clear();
        tape.filtered.clear();
        tape.pending = None;
    }
}

fn is_ice(tick: &TradeTick, match_type: MatchType) -> bool {
    match match_type {
        MatchType::AtBid => tick.bid_size > 0 && tick.size > tick.bid_size,
        MatchType::AtAsk => tick.ask_size > 0 && tick.size > tick.ask_size,
        _ => false,
    }
}

fn bounded_push(list: &mut VecDeque<TapeEntry>, entry: TapeEntry, capacity: usize) {
    list.push_back(entry);
    while list.len() > capacity {
        list.pop_front();
    }
}
