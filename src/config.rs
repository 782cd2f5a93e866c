//! Engine configuration
//!
//! Configuration can be built in code with [`OrderFlowConfigBuilder`],
//! deserialized with serde, or read from `ORDERFLOW_*` environment variables
//! (a `.env` file is honoured) through [`OrderFlowConfig::from_env`].

use crate::classifier::ClassifierKind;
use crate::error::{LadderError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Smallest accepted imbalance factor
pub const MIN_IMBALANCE_FACTOR: f64 = 1.5;

/// Order flow engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFlowConfig {
    /// Which bundled classifier to use
    pub classifier: ClassifierKind,
    /// Ratio one side must reach over the adjacent opposite side to count
    /// as imbalanced
    pub imbalance_factor: f64,
    /// Ticks the market may move past an imbalanced level before the
    /// imbalance stops counting
    pub imbalance_invalidate_distance: u32,
    /// Sliding window for buys, sells and icebergs (seconds)
    pub trade_window_secs: u32,
    /// Sliding window for the volume profile (seconds)
    pub volume_window_secs: u32,
    /// Minimum number of buy+sell price levels in the window before a
    /// strength is computed
    pub min_activity_trades: usize,
    /// Number of prints kept on the time & sales tape
    pub tape_capacity: usize,
    /// Prints larger than this also go to the filtered tape
    pub tape_filter_size: i64,
    /// Fold consecutive prints at the same price and match type
    pub tape_aggregate: bool,
}

impl Default for OrderFlowConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierKind::Iceberg,
            imbalance_factor: 2.0,
            imbalance_invalidate_distance: 10,
            trade_window_secs: 60,
            volume_window_secs: 60,
            min_activity_trades: 0,
            tape_capacity: 200,
            tape_filter_size: 20,
            tape_aggregate: false,
        }
    }
}

impl OrderFlowConfig {
    pub fn builder() -> OrderFlowConfigBuilder {
        OrderFlowConfigBuilder::new()
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if !self.imbalance_factor.is_finite() || self.imbalance_factor < MIN_IMBALANCE_FACTOR {
            return Err(LadderError::Configuration(format!(
                "Imbalance factor must be at least {}, got {}",
                MIN_IMBALANCE_FACTOR, self.imbalance_factor
            )));
        }

        if self.trade_window_secs == 0 {
            return Err(LadderError::Configuration(
                "Trade sliding window must be at least 1 second".to_string(),
            ));
        }

        if self.volume_window_secs == 0 {
            return Err(LadderError::Configuration(
                "Volume sliding window must be at least 1 second".to_string(),
            ));
        }

        if self.tape_capacity == 0 {
            return Err(LadderError::Configuration(
                "Tape capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Loads configuration from the environment, starting from defaults.
    ///
    /// Recognised variables: `ORDERFLOW_CLASSIFIER`,
    /// `ORDERFLOW_IMBALANCE_FACTOR`, `ORDERFLOW_INVALIDATE_DISTANCE`,
    /// `ORDERFLOW_TRADE_WINDOW_SECS`, `ORDERFLOW_VOLUME_WINDOW_SECS`,
    /// `ORDERFLOW_MIN_ACTIVITY_TRADES`, `ORDERFLOW_TAPE_CAPACITY`,
    /// `ORDERFLOW_TAPE_FILTER_SIZE`, `ORDERFLOW_TAPE_AGGREGATE`.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup("ORDERFLOW_CLASSIFIER") {
            config.classifier = value.parse()?;
        }
        if let Some(value) = lookup("ORDERFLOW_IMBALANCE_FACTOR") {
            config.imbalance_factor = parse_var("ORDERFLOW_IMBALANCE_FACTOR", &value)?;
        }
        if let Some(value) = lookup("ORDERFLOW_INVALIDATE_DISTANCE") {
            config.imbalance_invalidate_distance = parse_var("ORDERFLOW_INVALIDATE_DISTANCE", &value)?;
        }
        if let Some(value) = lookup("ORDERFLOW_TRADE_WINDOW_SECS") {
            config.trade_window_secs = parse_var("ORDERFLOW_TRADE_WINDOW_SECS", &value)?;
        }
        if let Some(value) = lookup("ORDERFLOW_VOLUME_WINDOW_SECS") {
            config.volume_window_secs = parse_var("ORDERFLOW_VOLUME_WINDOW_SECS", &value)?;
        }
        if let Some(value) = lookup("ORDERFLOW_MIN_ACTIVITY_TRADES") {
            config.min_activity_trades = parse_var("ORDERFLOW_MIN_ACTIVITY_TRADES", &value)?;
        }
        if let Some(value) = lookup("ORDERFLOW_TAPE_CAPACITY") {
            config.tape_capacity = parse_var("ORDERFLOW_TAPE_CAPACITY", &value)?;
        }
        if let Some(value) = lookup("ORDERFLOW_TAPE_FILTER_SIZE") {
            config.tape_filter_size = parse_var("ORDERFLOW_TAPE_FILTER_SIZE", &value)?;
        }
        if let Some(value) = lookup("ORDERFLOW_TAPE_AGGREGATE") {
            config.tape_aggregate = parse_var("ORDERFLOW_TAPE_AGGREGATE", &value)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| LadderError::Configuration(format!("{} has invalid value '{}'", key, value)))
}

/// Builder for [`OrderFlowConfig`]
pub struct OrderFlowConfigBuilder {
    config: OrderFlowConfig,
}

impl OrderFlowConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: OrderFlowConfig::default(),
        }
    }

    pub fn classifier(mut self, kind: ClassifierKind) -> Self {
        self.config.classifier = kind;
        self
    }

    pub fn imbalance_factor(mut self, factor: f64) -> Self {
        self.config.imbalance_factor = factor;
        self
    }

    pub fn invalidate_distance(mut self, ticks: u32) -> Self {
        self.config.imbalance_invalidate_distance = ticks;
        self
    }

    pub fn trade_window_secs(mut self, secs: u32) -> Self {
        self.config.trade_window_secs = secs;
        self
    }

    pub fn volume_window_secs(mut self, secs: u32) -> Self {
        self.config.volume_window_secs = secs;
        self
    }

    pub fn min_activity_trades(mut self, trades: usize) -> Self {
        self.config.min_activity_trades = trades;
        self
    }

    pub fn tape(mut self, capacity: usize, filter_size: i64) -> Self {
        self.config.tape_capacity = capacity;
        self.config.tape_filter_size = filter_size;
        self
    }

    pub fn aggregate_tape(mut self, aggregate: bool) -> Self {
        self.config.tape_aggregate = aggregate;
        self
    }

    /// Validates and returns the configuration
    pub fn build(self) -> Result<OrderFlowConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for OrderFlowConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
