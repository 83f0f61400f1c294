//! Interest zones for pullback entries
//!
//! After a new trend extreme (HH or LL), the first candle between the
//! preceding opposite pivot and the extreme that closes across the moving
//! average marks the breakout. The zone spans from that candle's extreme
//! back to the preceding pivot's price.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bars::{position_of, AveragedBar};
use super::zigzag::{Pivot, PivotKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneDirection {
    Bullish,
    Bearish,
}

impl fmt::Display for ZoneDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneDirection::Bullish => write!(f, "bullish"),
            ZoneDirection::Bearish => write!(f, "bearish"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterestZone {
    /// Breakout candle's high (bullish) or low (bearish)
    pub start_price: f64,
    /// Preceding pivot's price
    pub end_price: f64,
    pub direction: ZoneDirection,
    pub breakout_timestamp: DateTime<Utc>,
    pub preceding_pivot_timestamp: DateTime<Utc>,
    /// Pivot the zone was derived from
    pub pivot_timestamp: DateTime<Utc>,
    /// When that pivot was confirmed; the zone is unknown before this
    pub confirmed_at: DateTime<Utc>,
}

impl InterestZone {
    pub fn lower(&self) -> f64 {
        self.start_price.min(self.end_price)
    }

    pub fn upper(&self) -> f64 {
        self.start_price.max(self.end_price)
    }

    pub fn size(&self) -> f64 {
        self.upper() - self.lower()
    }

    pub fn contains(&self, price: f64) -> bool {
        self.lower() <= price && price <= self.upper()
    }
}

/// Zone for the pivot at `index`, measured against its predecessor.
///
/// Returns `None` for an index without a predecessor, two pivots of the
/// same kind, timestamps missing from `series`, or no crossing candle.
pub fn find_interest_zone(
    series: &[AveragedBar],
    pivots: &[Pivot],
    index: usize,
) -> Option<InterestZone> {
    if index < 1 || index >= pivots.len() {
        return None;
    }
    let pivot = &pivots[index];
    let preceding = &pivots[index - 1];
    if pivot.kind == preceding.kind {
        debug!("Pivots {} and {} share kind {}", index - 1, index, pivot.kind);
        return None;
    }

    let Some(start) = position_of(series, preceding.timestamp).map(|p| p + 1) else {
        debug!("Preceding pivot {} has no moving average", preceding.timestamp);
        return None;
    };
    let Some(end) = position_of(series, pivot.timestamp) else {
        debug!("Pivot {} has no moving average", pivot.timestamp);
        return None;
    };
    if start > end {
        return None;
    }

    let window = &series[start..=end];
    let (breakout, direction) = match pivot.kind {
        PivotKind::High => (
            window.iter().find(|b| b.bar.close > b.ma)?,
            ZoneDirection::Bullish,
        ),
        PivotKind::Low => (
            window.iter().find(|b| b.bar.close < b.ma)?,
            ZoneDirection::Bearish,
        ),
    };

    let start_price = match direction {
        ZoneDirection::Bullish => breakout.bar.high,
        ZoneDirection::Bearish => breakout.bar.low,
    };

    Some(InterestZone {
        start_price,
        end_price: preceding.price,
        direction,
        breakout_timestamp: breakout.bar.timestamp,
        preceding_pivot_timestamp: preceding.timestamp,
        pivot_timestamp: pivot.timestamp,
        confirmed_at: pivot.confirmed_at,
    })
}

/// Zones for every higher-high and lower-low pivot
pub fn find_interest_zones(series: &[AveragedBar], pivots: &[Pivot]) -> Vec<InterestZone> {
    (1..pivots.len())
        .filter(|&i| pivots[i].status.is_extreme())
        .filter_map(|i| find_interest_zone(series, pivots, i))
        .collect()
}
