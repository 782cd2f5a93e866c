//! Data models for ladder order flow state

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side that initiated a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Aggressor {
    Buyer,
    Seller,
    /// Buyer lifted more than the visible ask size
    BuyerIce,
    /// Seller hit more than the visible bid size
    SellerIce,
}

impl Aggressor {
    pub fn is_buy(&self) -> bool {
        matches!(self, Aggressor::Buyer | Aggressor::BuyerIce)
    }

    pub fn is_ice(&self) -> bool {
        matches!(self, Aggressor::BuyerIce | Aggressor::SellerIce)
    }
}

impl fmt::Display for Aggressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Aggressor::Buyer => "BUYER",
            Aggressor::Seller => "SELLER",
            Aggressor::BuyerIce => "BUYER_ICE",
            Aggressor::SellerIce => "SELLER_ICE",
        };
        f.write_str(label)
    }
}

/// Side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookSide {
    Bid,
    Ask,
}

/// A trade print together with the best quote at the time it printed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub ask_price: Decimal,
    pub ask_size: i64,
    pub bid_price: Decimal,
    pub bid_size: i64,
    pub price: Decimal,
    pub size: i64,
    pub time: DateTime<Utc>,
}

impl fmt::Display for TradeTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Trade: {}@{} (bid {}x{} / ask {}x{}) @ {}",
            self.size, self.price, self.bid_size, self.bid_price, self.ask_size, self.ask_price, self.time
        )
    }
}

/// Latest trade recorded at a price inside the sliding window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Size of the most recent print at this price
    pub size: i64,
    pub time: DateTime<Utc>,
    pub aggressor: Aggressor,
    /// Volume accumulated at this price since the entry was created
    pub cumulative_size: i64,
    /// Best quote on the side this trade executed against
    pub opposing_price: Decimal,
    pub opposing_size: i64,
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (cum {}) vs {}x{} @ {}",
            self.aggressor, self.size, self.cumulative_size, self.opposing_size, self.opposing_price, self.time
        )
    }
}

/// Size accumulated at a price, stamped with the latest contributing event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeStamped {
    pub size: i64,
    pub time: DateTime<Utc>,
}

/// Resting size at a price on one side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidAsk {
    pub size: i64,
    pub time: DateTime<Utc>,
}

impl BidAsk {
    pub fn new(size: i64, time: DateTime<Utc>) -> Self {
        Self { size, time }
    }
}

/// Resting size and its share of the largest visible size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BidAskPerc {
    pub size: i64,
    /// Fraction in `[0, 1]` of the largest resting size in range
    pub perc: f64,
}

/// Result of applying one incremental book update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookLevelChange {
    pub side: BookSide,
    pub price: Decimal,
    pub snapshot: BidAsk,
    /// Signed size change against the previous resting size
    pub change: i64,
}

/// One row of a full ladder snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LadderRow {
    pub price: Decimal,
    pub size: i64,
    pub time: DateTime<Utc>,
}

impl fmt::Display for LadderRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.size, self.price)
    }
}

/// Which signals feed the order flow strength bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrengthMode {
    #[default]
    Combined,
    Imbalance,
    BuySell,
}

/// Buy/sell strength percentages
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderFlowStrength {
    pub buy: f64,
    pub sell: f64,
}

impl OrderFlowStrength {
    /// Whether enough activity existed to compute a strength at all
    pub fn is_active(&self) -> bool {
        self.buy + self.sell > 0.0
    }

    /// Percentages rounded half away from zero, as shown on the ladder
    pub fn rounded(&self) -> (i64, i64) {
        (self.buy.round() as i64, self.sell.round() as i64)
    }

    /// Splits `total_rows` ladder rows into (buy rows, sell rows)
    /// proportional to buy strength.
    pub fn split_rows(&self, total_rows: usize) -> (usize, usize) {
        let buy_rows = ((total_rows as f64) * (self.buy / 100.0)).round();
        let buy_rows = (buy_rows.max(0.0) as usize).min(total_rows);
        (buy_rows, total_rows - buy_rows)
    }
}

impl fmt::Display for OrderFlowStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buy {:.1}% / sell {:.1}%", self.buy, self.sell)
    }
}
