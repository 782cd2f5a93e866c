//! Trade classification policies
//!
//! A classifier decides which side initiated a print by comparing the trade
//! price to the quote at the time of the trade. Two policies ship with the
//! crate:
//!
//! - [`SimpleTradeClassifier`] - mid-point rule, needs no depth
//! - [`IcebergTradeClassifier`] - mid-point rule, plus iceberg flags when a
//!   print executes more than the visible resting size at the touch
//!
//! Custom policies implement [`TradeClassifier`] and are handed to
//! [`OrderFlowEngine::with_classifier`](crate::engine::OrderFlowEngine::with_classifier).

use crate::data::{Aggressor, TradeTick};
use crate::error::{LadderError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Classifies trades as buyer or seller initiated
pub trait TradeClassifier: fmt::Debug + Send + Sync {
    /// Classifies using quote prices only. Never returns an iceberg label.
    fn classify(
        &self,
        ask_price: Decimal,
        bid_price: Decimal,
        trade_price: Decimal,
        trade_size: i64,
        time: DateTime<Utc>,
    ) -> Aggressor;

    /// Classifies using quote prices and the resting sizes at the touch.
    fn classify_with_depth(&self, tick: &TradeTick) -> Result<Aggressor>;
}

/// Mid-point rule shared by the bundled classifiers.
///
/// A trade exactly at the mid-point, or exactly at a locked (ask == bid)
/// quote, is attributed to the seller.
pub fn midpoint_aggressor(ask_price: Decimal, bid_price: Decimal, trade_price: Decimal) -> Aggressor {
    let reference = if ask_price == bid_price {
        ask_price
    } else {
        match ask_price.checked_add(bid_price) {
            Some(sum) => sum / dec!(2),
            None => ask_price / dec!(2) + bid_price / dec!(2),
        }
    };

    if trade_price > reference {
        Aggressor::Buyer
    } else {
        Aggressor::Seller
    }
}

/// Mid-point classifier without iceberg detection
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTradeClassifier;

impl TradeClassifier for SimpleTradeClassifier {
    fn classify(
        &self,
        ask_price: Decimal,
        bid_price: Decimal,
        trade_price: Decimal,
        _trade_size: i64,
        _time: DateTime<Utc>,
    ) -> Aggressor {
        midpoint_aggressor(ask_price, bid_price, trade_price)
    }

    fn classify_with_depth(&self, _tick: &TradeTick) -> Result<Aggressor> {
        Err(LadderError::ClassificationNotSupported(
            "simple classifier has no depth-aware rule; use classify()".to_string(),
        ))
    }
}

/// Mid-point classifier that flags hidden, replenishing orders
#[derive(Debug, Clone, Copy, Default)]
pub struct IcebergTradeClassifier;

impl TradeClassifier for IcebergTradeClassifier {
    fn classify(
        &self,
        ask_price: Decimal,
        bid_price: Decimal,
        trade_price: Decimal,
        _trade_size: i64,
        _time: DateTime<Utc>,
    ) -> Aggressor {
        midpoint_aggressor(ask_price, bid_price, trade_price)
    }

    fn classify_with_depth(&self, tick: &TradeTick) -> Result<Aggressor> {
        let aggressor = midpoint_aggressor(tick.ask_price, tick.bid_price, tick.price);

        // Resting size <= 0 means depth was not available for this print
        let ice = match aggressor {
            Aggressor::Buyer => {
                tick.price == tick.ask_price && tick.ask_size > 0 && tick.size > tick.ask_size
            }
            _ => tick.price == tick.bid_price && tick.bid_size > 0 && tick.size > tick.bid_size,
        };

        Ok(match (aggressor, ice) {
            (Aggressor::Buyer, true) => Aggressor::BuyerIce,
            (Aggressor::Seller, true) => Aggressor::SellerIce,
            (other, _) => other,
        })
    }
}

/// Built-in classifier selection, usable from configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    Simple,
    #[default]
    Iceberg,
}

impl ClassifierKind {
    pub fn build(&self) -> Arc<dyn TradeClassifier> {
        match self {
            ClassifierKind::Simple => Arc::new(SimpleTradeClassifier),
            ClassifierKind::Iceberg => Arc::new(IcebergTradeClassifier),
        }
    }
}

impl std::str::FromStr for ClassifierKind {
    type Err = LadderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(ClassifierKind::Simple),
            "iceberg" | "ice" => Ok(ClassifierKind::Iceberg),
            other => Err(LadderError::Configuration(format!("unknown classifier: {}", other))),
        }
    }
}
