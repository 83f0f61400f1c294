//! Engulfing candle trigger

use super::bars::Bar;
use super::zones::ZoneDirection;

/// Previous body must exceed this fraction of its close to be engulfed
const MIN_BODY_RATIO: f64 = 0.0001;

/// Body floor used when the previous close is not positive
const MIN_BODY_FALLBACK: f64 = 0.01;

/// Does the bar at `index` engulf the one before it in `direction`?
///
/// A near-doji previous candle never counts as engulfed.
pub fn detect_engulfing(bars: &[Bar], index: usize, direction: ZoneDirection) -> bool {
    if index < 1 || index >= bars.len() {
        return false;
    }
    let current = &bars[index];
    let previous = &bars[index - 1];

    let min_body = if previous.close > 0.0 {
        previous.close * MIN_BODY_RATIO
    } else {
        MIN_BODY_FALLBACK
    };
    if previous.body() < min_body {
        return false;
    }

    match direction {
        ZoneDirection::Bullish => {
            current.is_bullish()
                && previous.is_bearish()
                && current.open < previous.close
                && current.close > previous.open
        }
        ZoneDirection::Bearish => {
            current.is_bearish()
                && previous.is_bullish()
                && current.open > previous.close
                && current.close < previous.open
        }
    }
}
