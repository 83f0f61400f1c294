//! Moving average and RSI columns for zone finding and divergence checks

use serde::{Deserialize, Serialize};

use super::bars::{AveragedBar, Bar};

/// Indicator periods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// Simple moving average period over close (default: 20)
    pub sma_period: usize,
    /// RSI period, Wilder smoothing (default: 14)
    pub rsi_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma_period: 20,
            rsi_period: 14,
        }
    }
}

/// Simple moving average. `None` until `period` values have been seen.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }

    let mut sum = 0.0;
    for i in 0..values.len() {
        sum += values[i];
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

/// Relative Strength Index with Wilder smoothing.
///
/// The first value lands on index `period`, seeded with the plain average
/// of the first `period` gains and losses.
/// This is the TA-Lib seeding; EWM-based RSI (as in pandas-ta) differs
/// over the first few dozen bars and converges afterwards.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    let n = period as f64;
    for i in period + 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, -change) };
        avg_gain = (avg_gain * (n - 1.0) + gain) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss) / n;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Attach SMA and RSI to each bar, dropping bars whose SMA is still warming up
pub fn with_indicators(bars: &[Bar], config: &IndicatorConfig) -> Vec<AveragedBar> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let averages = sma(&closes, config.sma_period);
    let strengths = rsi(&closes, config.rsi_period);

    bars.iter()
        .zip(averages)
        .zip(strengths)
        .filter_map(|((bar, ma), rsi)| ma.map(|ma| AveragedBar { bar: *bar, ma, rsi }))
        .collect()
}
