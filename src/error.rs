//! Error types for the order flow engine

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, LadderError>;

/// Main error type for the engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LadderError {
    /// The classifier cannot classify with the data supplied to this overload
    #[error("Classification not supported: {0}")]
    ClassificationNotSupported(String),

    /// A feed event carried values the engine refuses to store
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Error context for debugging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub details: HashMap<String, String>,
}

impl ErrorContext {
    pub fn new(operation: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] Operation: {}", self.timestamp, self.operation)?;

        if !self.details.is_empty() {
            let mut details: Vec<_> = self.details.iter().collect();
            details.sort();
            write!(f, " | Details: {:?}", details)?;
        }

        Ok(())
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,    // Expected noise on a live feed
    Medium, // Caller bug, processing continues
    High,   // Engine cannot be built or used as configured
}

impl ErrorSeverity {
    pub fn from_error(error: &LadderError) -> Self {
        match error {
            LadderError::MalformedInput(_) => ErrorSeverity::Low,
            LadderError::ClassificationNotSupported(_) => ErrorSeverity::Medium,
            LadderError::Configuration(_) => ErrorSeverity::High,
        }
    }
}

/// Routes suppressed feed errors to structured logging.
///
/// The feed path never surfaces errors to the presentation layer; this is
/// the only place they become visible.
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn report_error(error: &LadderError, context: Option<ErrorContext>) {
        let severity = ErrorSeverity::from_error(error);
        let context = context.map(|c| c.to_string()).unwrap_or_default();

        match severity {
            ErrorSeverity::High => {
                tracing::error!(%error, %context, "order flow error");
            }
            ErrorSeverity::Medium => {
                tracing::warn!(%error, %context, "order flow error");
            }
            ErrorSeverity::Low => {
                tracing::debug!(%error, %context, "dropped feed input");
            }
        }
    }
}
