//! RSI divergence while price trades inside an interest zone

use std::fmt;

use serde::{Deserialize, Serialize};

use super::zigzag::{Pivot, PivotKind};
use super::zones::{InterestZone, ZoneDirection};

/// Fraction of the zone height price must clear the pivot by
const PRICE_TOLERANCE_RATIO: f64 = 0.05;

/// Tolerance used for zero-height zones
const MIN_PRICE_TOLERANCE: f64 = 0.00001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DivergenceKind {
    /// Lower low in price, higher RSI
    BullRegular,
    /// Higher low in price, lower RSI
    BullContinuation,
    /// Higher high in price, lower RSI
    BearRegular,
    /// Lower high in price, higher RSI
    BearContinuation,
}

impl DivergenceKind {
    pub fn is_continuation(self) -> bool {
        matches!(
            self,
            DivergenceKind::BullContinuation | DivergenceKind::BearContinuation
        )
    }
}

impl fmt::Display for DivergenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivergenceKind::BullRegular => write!(f, "BULL_REGULAR"),
            DivergenceKind::BullContinuation => write!(f, "BULL_CONTINUATION"),
            DivergenceKind::BearRegular => write!(f, "BEAR_REGULAR"),
            DivergenceKind::BearContinuation => write!(f, "BEAR_CONTINUATION"),
        }
    }
}

/// Check the current bar against the zone and the pivot that bounds it.
///
/// `pivot` must be the low (bullish zone) or high (bearish zone) the zone
/// ends on, and `rsi_at_pivot` the RSI on that pivot's bar.
pub fn check_divergence_in_zone(
    current_low: f64,
    current_high: f64,
    current_rsi: f64,
    zone: &InterestZone,
    pivot: &Pivot,
    rsi_at_pivot: f64,
) -> Option<DivergenceKind> {
    if !current_rsi.is_finite() || !rsi_at_pivot.is_finite() {
        return None;
    }

    let tolerance = if zone.size() > 0.0 {
        zone.size() * PRICE_TOLERANCE_RATIO
    } else {
        MIN_PRICE_TOLERANCE
    };

    match zone.direction {
        ZoneDirection::Bullish => {
            if pivot.kind != PivotKind::Low || !zone.contains(current_low) {
                return None;
            }
            if current_low < pivot.price - tolerance && current_rsi > rsi_at_pivot {
                return Some(DivergenceKind::BullRegular);
            }
            if current_low > pivot.price + tolerance && current_rsi < rsi_at_pivot {
                return Some(DivergenceKind::BullContinuation);
            }
        }
        ZoneDirection::Bearish => {
            if pivot.kind != PivotKind::High || !zone.contains(current_high) {
                return None;
            }
            if current_high > pivot.price + tolerance && current_rsi < rsi_at_pivot {
                return Some(DivergenceKind::BearRegular);
            }
            if current_high < pivot.price - tolerance && current_rsi > rsi_at_pivot {
                return Some(DivergenceKind::BearContinuation);
            }
        }
    }

    None
}
