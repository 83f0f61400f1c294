//! Stop loss, take profit and position sizing for zone setups

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::bars::Bar;
use super::divergence::DivergenceKind;
use super::zigzag::{Pivot, PivotKind};
use super::zones::{InterestZone, ZoneDirection};

/// Contract specification needed to turn a risk budget into lots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub name: String,
    /// Price change of one point
    pub point: f64,
    /// Account-currency value of one tick per lot
    pub tick_value: f64,
    pub tick_size: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
}

impl Default for SymbolSpec {
    fn default() -> Self {
        Self::us30_cash()
    }
}

impl SymbolSpec {
    /// US30 cash index CFD on a EUR account (approximate broker values)
    pub fn us30_cash() -> Self {
        Self {
            name: "US30.cash".to_string(),
            point: 1.0,
            tick_value: 0.09,
            tick_size: 0.1,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
        }
    }

    /// Account-currency value of a one-point move for one lot
    pub fn point_value_per_lot(&self) -> f64 {
        self.tick_value / self.tick_size * self.point
    }
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Decimal places of a volume step such as 0.01
fn step_decimals(step: f64) -> u32 {
    let text = step.to_string();
    text.split_once('.')
        .map(|(_, fraction)| fraction.len() as u32)
        .unwrap_or(0)
}

/// Structure stop beyond the candles that formed the trigger.
///
/// Walks back from the bar before `index` (at most `max_lookback` bars) to
/// the nearest candle against the setup direction, then places the stop
/// `buffer` beyond the extreme of that range through `index`.
pub fn stop_loss(
    bars: &[Bar],
    index: usize,
    direction: ZoneDirection,
    buffer: f64,
    max_lookback: usize,
) -> Option<f64> {
    if index < 1 || index >= bars.len() {
        return None;
    }

    let search_start = index - 1;
    let lowest = (search_start + 1).saturating_sub(max_lookback);
    let range_start = (lowest..=search_start)
        .rev()
        .find(|&i| match direction {
            ZoneDirection::Bullish => bars[i].is_bearish(),
            ZoneDirection::Bearish => bars[i].is_bullish(),
        })
        .unwrap_or(search_start);

    let range = &bars[range_start..=index];
    let level = match direction {
        ZoneDirection::Bullish => {
            range.iter().map(|b| b.low).fold(f64::INFINITY, f64::min) - buffer
        }
        ZoneDirection::Bearish => {
            range.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max) + buffer
        }
    };

    Some(round_to(level, 2))
}

/// Target for a setup confirmed at `at`.
///
/// Continuation divergences aim at the latest opposite swing already known
/// at `at`; regular divergences aim at the zone's breakout extreme.
pub fn take_profit(
    pivots: &[Pivot],
    at: DateTime<Utc>,
    direction: ZoneDirection,
    divergence: DivergenceKind,
    zone: &InterestZone,
) -> Option<f64> {
    let level = if divergence.is_continuation() {
        let target_kind = match direction {
            ZoneDirection::Bullish => PivotKind::High,
            ZoneDirection::Bearish => PivotKind::Low,
        };
        let Some(target) = pivots
            .iter()
            .rev()
            .find(|p| p.kind == target_kind && p.timestamp < at && p.confirmed_at <= at)
        else {
            debug!("No {} pivot known before {} for {} target", target_kind, at, direction);
            return None;
        };
        target.price
    } else {
        zone.start_price
    };

    Some(round_to(level, 2))
}

/// Lots that risk `risk_pct` of `balance` between `entry` and `stop`.
///
/// Returns `None` when the inputs cannot produce a tradable size.
pub fn position_size(
    balance: f64,
    risk_pct: f64,
    stop: f64,
    entry: f64,
    spec: &SymbolSpec,
) -> Option<f64> {
    if balance <= 0.0 || risk_pct <= 0.0 || stop == entry {
        return None;
    }
    if spec.point == 0.0 || spec.tick_size == 0.0 || spec.volume_step <= 0.0 {
        return None;
    }

    let risk_amount = balance * (risk_pct / 100.0);
    let stop_points = (entry - stop).abs() / spec.point;
    if stop_points <= 0.0 {
        return None;
    }
    let point_value = spec.point_value_per_lot();
    if point_value <= 0.0 {
        return None;
    }

    let ideal = risk_amount / (stop_points * point_value);
    let stepped = (ideal / spec.volume_step).floor() * spec.volume_step;
    let volume = stepped.max(spec.volume_min).min(spec.volume_max);

    let min_volume_risk = stop_points * point_value * spec.volume_min;
    if min_volume_risk > risk_amount && volume == spec.volume_min {
        warn!(
            "Minimum volume {} on {} risks {:.2}, above budget {:.2}",
            spec.volume_min, spec.name, min_volume_risk, risk_amount
        );
    }

    let volume = round_to(volume, step_decimals(spec.volume_step));
    if volume < spec.volume_min {
        return None;
    }
    Some(volume)
}
