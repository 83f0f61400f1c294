//! OHLC bars and series normalisation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One sample of a time-ordered price series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Absolute candle body size
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }
}

/// Bar with its moving average (and RSI once warmed up) attached.
///
/// Only bars whose moving average is defined get one of these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedBar {
    pub bar: Bar,
    pub ma: f64,
    pub rsi: Option<f64>,
}

impl AveragedBar {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.bar.timestamp
    }
}

/// Position of `timestamp` in a chronologically sorted series
pub fn position_of(series: &[AveragedBar], timestamp: DateTime<Utc>) -> Option<usize> {
    series
        .binary_search_by_key(&timestamp, |b| b.bar.timestamp)
        .ok()
}

/// Sort bars by timestamp and drop duplicate timestamps (first wins)
pub fn normalize_series(bars: &[Bar]) -> Vec<Bar> {
    let mut sorted = bars.to_vec();
    // Stable sort keeps the first-seen duplicate in front
    sorted.sort_by_key(|b| b.timestamp);

    let before = sorted.len();
    sorted.dedup_by_key(|b| b.timestamp);
    let dropped = before - sorted.len();
    if dropped > 0 {
        warn!("Dropped {} bars with duplicate timestamps", dropped);
    }

    sorted
}
