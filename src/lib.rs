//! # Order Flow Ladder
//!
//! Per-price order flow statistics for a trading ladder: aggressor
//! classification with iceberg detection, sliding-window buy/sell volume,
//! session totals, bid/ask size changes, imbalance and strength metrics.
//!
//! The engine is written to by one feed thread and read concurrently by
//! render threads. Everything is synchronous.
//!
//! ## Quick Start
//! ```rust,ignore
//! use orderflow_ladder::prelude::*;
//!
//! let engine = Arc::new(OrderFlowEngine::new(OrderFlowConfig::from_env()?)?);
//! let feed = FeedProcessor::new(engine.clone());
//!
//! feed.apply(MarketEvent::Trade { tick, live: true, first_of_session: false });
//!
//! let strength = engine.order_flow_strength(StrengthMode::Combined, last_price, tick_size);
//! println!("{}", strength);
//! ```

pub mod classifier;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod price_map;
pub mod time_and_sales;

pub use classifier::{ClassifierKind, IcebergTradeClassifier, SimpleTradeClassifier, TradeClassifier};
pub use config::{OrderFlowConfig, OrderFlowConfigBuilder};
pub use data::*;
pub use engine::{EngineState, EvictionReport, OrderFlowEngine, Totals, MAX_SESSION_VOLUME, PRICE_LIMIT};
pub use error::*;
pub use feed::{BookOperation, FeedProcessor, FeedStatsSnapshot, HistogramView, MarketEvent};
pub use price_map::{PriceMap, VolumeLedger};
pub use time_and_sales::{MatchType, TapeEntry, TimeAndSales};

/// Prelude - minimal public API surface
///
/// Import with: `use orderflow_ladder::prelude::*;`
pub mod prelude {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // ENGINE
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    pub use crate::config::OrderFlowConfig;
    pub use crate::engine::{EngineState, OrderFlowEngine};
    pub use crate::error::{LadderError, Result};

    /// Core data types
    pub use crate::data::{
        Aggressor, BookSide, LadderRow, OrderFlowStrength, StrengthMode, TradeTick,
    };

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // FEED
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    pub use crate::feed::{BookOperation, FeedProcessor, MarketEvent};
    pub use crate::time_and_sales::{MatchType, TimeAndSales};

    pub use std::sync::Arc;
}

/// Initialize logging
pub fn init_logging() {
    tracing_subscriber::fmt::init();
}
