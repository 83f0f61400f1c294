//! Pullback setup scanner
//!
//! Walks the averaged series in time order. Each direction keeps the newest
//! zone whose pivot is already confirmed. A bar inside that zone showing RSI
//! divergence against the zone's pivot, followed by an engulfing candle,
//! becomes a trade setup with stop, target and size attached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::bars::{position_of, AveragedBar, Bar};
use super::divergence::{check_divergence_in_zone, DivergenceKind};
use super::patterns::detect_engulfing;
use super::risk::{position_size, stop_loss, take_profit, SymbolSpec};
use super::zigzag::Pivot;
use super::zones::{InterestZone, ZoneDirection};

/// Account and stop settings for setup sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Account balance in account currency (default: 10,000)
    pub balance: f64,
    /// Percent of balance risked per setup (default: 1.0)
    pub risk_pct: f64,
    /// Points beyond the trigger range for the stop (default: 5.0)
    pub sl_buffer: f64,
    /// Bars searched back for the stop's range start (default: 10)
    pub max_sl_lookback: usize,
    pub symbol: SymbolSpec,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            balance: 10_000.0,
            risk_pct: 1.0,
            sl_buffer: 5.0,
            max_sl_lookback: 10,
            symbol: SymbolSpec::us30_cash(),
        }
    }
}

/// Candidate entry found by the scanner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSetup {
    pub timestamp: DateTime<Utc>,
    pub direction: ZoneDirection,
    pub divergence: DivergenceKind,
    pub entry: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub size: Option<f64>,
    pub zone: InterestZone,
}

/// Zone with the pivot it ends on and that pivot's RSI
#[derive(Debug, Clone, Copy)]
struct ActiveZone {
    zone: InterestZone,
    pivot: Pivot,
    rsi_at_pivot: f64,
}

fn activate(series: &[AveragedBar], pivots: &[Pivot], zone: &InterestZone) -> Option<ActiveZone> {
    let pivot = pivots
        .iter()
        .find(|p| p.timestamp == zone.preceding_pivot_timestamp)?;
    let rsi_at_pivot = position_of(series, pivot.timestamp).and_then(|i| series[i].rsi);
    let Some(rsi_at_pivot) = rsi_at_pivot else {
        debug!("No RSI on pivot {}, {} zone inactive", pivot.timestamp, zone.direction);
        return None;
    };
    Some(ActiveZone {
        zone: *zone,
        pivot: *pivot,
        rsi_at_pivot,
    })
}

pub fn scan_setups(
    series: &[AveragedBar],
    pivots: &[Pivot],
    zones: &[InterestZone],
    config: &ScanConfig,
) -> Vec<TradeSetup> {
    let bars: Vec<Bar> = series.iter().map(|b| b.bar).collect();

    let mut pending = zones.to_vec();
    pending.sort_by_key(|z| z.confirmed_at);
    let mut pending = pending.into_iter().peekable();

    let mut bullish: Option<ActiveZone> = None;
    let mut bearish: Option<ActiveZone> = None;
    let mut setups = Vec::new();

    for (i, averaged) in series.iter().enumerate() {
        let bar = &averaged.bar;
        while let Some(zone) = pending.next_if(|z| z.confirmed_at <= bar.timestamp) {
            let active = activate(series, pivots, &zone);
            match zone.direction {
                ZoneDirection::Bullish => bullish = active,
                ZoneDirection::Bearish => bearish = active,
            }
        }

        let Some(rsi) = averaged.rsi else {
            continue;
        };

        for active in [bullish, bearish].into_iter().flatten() {
            let Some(divergence) = check_divergence_in_zone(
                bar.low,
                bar.high,
                rsi,
                &active.zone,
                &active.pivot,
                active.rsi_at_pivot,
            ) else {
                continue;
            };

            let direction = active.zone.direction;
            if !detect_engulfing(&bars, i, direction) {
                continue;
            }

            let entry = bar.close;
            let stop = stop_loss(&bars, i, direction, config.sl_buffer, config.max_sl_lookback);
            let target = take_profit(pivots, bar.timestamp, direction, divergence, &active.zone);
            let size = match (stop, target) {
                (Some(stop), Some(_)) if stop != entry => position_size(
                    config.balance,
                    config.risk_pct,
                    stop,
                    entry,
                    &config.symbol,
                ),
                _ => None,
            };

            info!(
                "{} setup at {}: {} entry {:.2} stop {:?} target {:?} size {:?}",
                direction, bar.timestamp, divergence, entry, stop, target, size
            );

            setups.push(TradeSetup {
                timestamp: bar.timestamp,
                direction,
                divergence,
                entry,
                stop_loss: stop,
                take_profit: target,
                size,
                zone: active.zone,
            });
        }
    }

    setups
}
