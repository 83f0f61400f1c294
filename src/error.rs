//! Library error type
//!
//! Most detector outcomes degrade to "no result" instead of failing.
//! These variants cover the cases that cannot degrade.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SignalError {
    /// ZigZag lookback window must hold at least one bar
    #[error("zigzag length must be positive, got {0}")]
    InvalidLength(usize),

    /// Streaming input must be strictly increasing in time
    #[error("bar at {current} does not follow previous bar at {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    /// Malformed row in an input file
    #[error("invalid series row {row}: {reason}")]
    InvalidSeries { row: usize, reason: String },
}
