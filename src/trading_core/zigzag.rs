//! ZigZag swing pivot detection
//!
//! A bar that breaks below the lowest low of the preceding `length` bars
//! turns an up-swing down and confirms a swing high. A bar that breaks
//! above the highest high turns a down-swing up and confirms a swing low.
//! The confirmed pivot is the true extreme since the last opposite pivot,
//! not the bar where the break happened.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::bars::{normalize_series, Bar};
use super::rolling::RollingExtremes;
use crate::error::SignalError;

/// Whether the re-scan window starts on the previous opposite pivot's bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LookbackBoundary {
    /// Window starts on the anchor bar. An extreme found there is rejected.
    #[default]
    Inclusive,
    /// Window starts on the bar after the anchor
    Exclusive,
}

impl LookbackBoundary {
    fn offset(self) -> usize {
        match self {
            LookbackBoundary::Inclusive => 0,
            LookbackBoundary::Exclusive => 1,
        }
    }
}

impl fmt::Display for LookbackBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookbackBoundary::Inclusive => write!(f, "inclusive"),
            LookbackBoundary::Exclusive => write!(f, "exclusive"),
        }
    }
}

impl FromStr for LookbackBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inclusive" => Ok(LookbackBoundary::Inclusive),
            "exclusive" => Ok(LookbackBoundary::Exclusive),
            other => Err(format!("unknown lookback boundary: {}", other)),
        }
    }
}

/// Configuration for pivot detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZigZagConfig {
    /// Number of bars in the trailing high/low window (default: 9)
    pub length: usize,
    /// Start convention of the extreme re-scan window
    pub boundary: LookbackBoundary,
}

impl Default for ZigZagConfig {
    fn default() -> Self {
        Self {
            length: 9,
            boundary: LookbackBoundary::Inclusive,
        }
    }
}

impl ZigZagConfig {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), SignalError> {
        if self.length == 0 {
            return Err(SignalError::InvalidLength(self.length));
        }
        Ok(())
    }
}

/// Current swing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    High,
    Low,
}

impl fmt::Display for PivotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PivotKind::High => write!(f, "high"),
            PivotKind::Low => write!(f, "low"),
        }
    }
}

/// Classification against the previous pivot of the same kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PivotStatus {
    /// First high
    H,
    /// Higher high
    HH,
    /// Lower high
    LH,
    /// Equal high
    EH,
    /// First low
    L,
    /// Lower low
    LL,
    /// Higher low
    HL,
    /// Equal low
    EL,
}

impl PivotStatus {
    pub fn classify(kind: PivotKind, price: f64, previous: Option<f64>) -> Self {
        match (kind, previous) {
            (PivotKind::High, None) => PivotStatus::H,
            (PivotKind::Low, None) => PivotStatus::L,
            (PivotKind::High, Some(prev)) => {
                if price > prev {
                    PivotStatus::HH
                } else if price < prev {
                    PivotStatus::LH
                } else {
                    PivotStatus::EH
                }
            }
            (PivotKind::Low, Some(prev)) => {
                if price < prev {
                    PivotStatus::LL
                } else if price > prev {
                    PivotStatus::HL
                } else {
                    PivotStatus::EL
                }
            }
        }
    }

    /// New trend extreme (HH or LL)
    pub fn is_extreme(self) -> bool {
        matches!(self, PivotStatus::HH | PivotStatus::LL)
    }
}

impl fmt::Display for PivotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Confirmed swing high or low
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    /// Bar holding the extreme
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub kind: PivotKind,
    pub status: PivotStatus,
    /// Bar whose trend flip confirmed this pivot
    pub confirmed_at: DateTime<Utc>,
}

/// What a pushed bar did to the pivot list
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PivotEvent {
    /// A new pivot was appended
    Confirmed(Pivot),
    /// The last pivot was superseded by a more extreme one of the same kind
    Replaced { previous: Pivot, pivot: Pivot },
}

impl PivotEvent {
    /// Pivot now at the end of the list
    pub fn pivot(&self) -> Pivot {
        match self {
            PivotEvent::Confirmed(pivot) => *pivot,
            PivotEvent::Replaced { pivot, .. } => *pivot,
        }
    }

    /// Apply the event to a list built from earlier events
    pub fn apply(&self, pivots: &mut Vec<Pivot>) {
        if let PivotEvent::Replaced { .. } = self {
            pivots.pop();
        }
        pivots.push(self.pivot());
    }
}

/// Incremental pivot detector for a single bar stream
#[derive(Debug, Clone)]
pub struct PivotDetector {
    config: ZigZagConfig,
    window: RollingExtremes,
    /// Bars from absolute index `base` onward
    history: VecDeque<Bar>,
    base: usize,
    next_index: usize,
    first_close: f64,
    last_timestamp: Option<DateTime<Utc>>,
    trend: Option<Trend>,
    last_high: Option<usize>,
    last_low: Option<usize>,
    pivots: Vec<Pivot>,
}

impl PivotDetector {
    pub fn new(config: ZigZagConfig) -> Result<Self, SignalError> {
        config.validate()?;
        Ok(Self {
            window: RollingExtremes::new(config.length),
            history: VecDeque::with_capacity(config.length * 4),
            config,
            base: 0,
            next_index: 0,
            first_close: 0.0,
            last_timestamp: None,
            trend: None,
            last_high: None,
            last_low: None,
            pivots: Vec::new(),
        })
    }

    /// Feed the next bar.
    ///
    /// Returns `Confirmed` when the bar appends a pivot, and `Replaced` when
    /// it extends the last, still unanswered pivot. In that case the
    /// previously emitted pivot is no longer part of [`Self::pivots`].
    pub fn push(&mut self, bar: Bar) -> Result<Option<PivotEvent>, SignalError> {
        if let Some(previous) = self.last_timestamp {
            if bar.timestamp <= previous {
                return Err(SignalError::OutOfOrder {
                    previous,
                    current: bar.timestamp,
                });
            }
        }
        self.last_timestamp = Some(bar.timestamp);

        let index = self.next_index;
        self.next_index += 1;
        if index == 0 {
            self.first_close = bar.close;
        }

        let extremes = self.window.window_before(index);
        self.window.push(index, bar.high, bar.low);
        self.history.push_back(bar);

        let Some(trend) = self.trend else {
            if index + 1 == self.config.length {
                // Heuristic seed: no swing exists before a full window
                let seed = if bar.close > self.first_close {
                    Trend::Up
                } else {
                    Trend::Down
                };
                debug!("Seeded trend {:?} at bar {}", seed, index);
                self.trend = Some(seed);
            }
            return Ok(None);
        };

        let Some((highest, lowest)) = extremes else {
            return Ok(None);
        };

        let confirmed = match trend {
            Trend::Up if bar.low <= lowest => {
                self.trend = Some(Trend::Down);
                self.confirm(PivotKind::High, index, bar.timestamp)
            }
            Trend::Down if bar.high >= highest => {
                self.trend = Some(Trend::Up);
                self.confirm(PivotKind::Low, index, bar.timestamp)
            }
            _ => None,
        };

        Ok(confirmed)
    }

    fn confirm(
        &mut self,
        kind: PivotKind,
        flip_index: usize,
        confirmed_at: DateTime<Utc>,
    ) -> Option<PivotEvent> {
        // Series start stands in for a missing opposite pivot
        let anchor = match kind {
            PivotKind::High => self.last_low,
            PivotKind::Low => self.last_high,
        }
        .unwrap_or(0);

        let start = anchor + self.config.boundary.offset();
        if start >= flip_index {
            debug!("Empty {} re-scan window at bar {}", kind, flip_index);
            return None;
        }

        let (position, price) = self.extreme_between(kind, start, flip_index);
        if position <= anchor {
            debug!(
                "{} extreme sits on anchor bar {}, flip at {} ignored",
                kind, anchor, flip_index
            );
            return None;
        }

        let mut replaced = None;
        if let Some(last) = self.pivots.last().copied() {
            if last.kind == kind {
                let extends = match kind {
                    PivotKind::High => price > last.price,
                    PivotKind::Low => price < last.price,
                };
                if !extends {
                    debug!("{} at {} does not extend the open swing", kind, price);
                    return None;
                }
                self.pivots.pop();
                replaced = Some(last);
            }
        }

        let previous = self
            .pivots
            .iter()
            .rev()
            .find(|p| p.kind == kind)
            .map(|p| p.price);

        let pivot = Pivot {
            timestamp: self.history[position - self.base].timestamp,
            price,
            kind,
            status: PivotStatus::classify(kind, price, previous),
            confirmed_at,
        };

        match kind {
            PivotKind::High => self.last_high = Some(position),
            PivotKind::Low => self.last_low = Some(position),
        }
        self.pivots.push(pivot);
        self.trim_history();

        debug!(
            "Confirmed {} pivot {} @ {:.2} ({})",
            kind, pivot.status, pivot.price, pivot.timestamp
        );
        Some(match replaced {
            Some(previous) => PivotEvent::Replaced { previous, pivot },
            None => PivotEvent::Confirmed(pivot),
        })
    }

    /// First bar holding the highest high (or lowest low) in `[start, end)`
    fn extreme_between(&self, kind: PivotKind, start: usize, end: usize) -> (usize, f64) {
        let mut best_pos = start;
        let mut best = self.price_at(kind, start);
        for pos in start + 1..end {
            let price = self.price_at(kind, pos);
            let better = match kind {
                PivotKind::High => price > best,
                PivotKind::Low => price < best,
            };
            if better {
                best_pos = pos;
                best = price;
            }
        }
        (best_pos, best)
    }

    fn price_at(&self, kind: PivotKind, position: usize) -> f64 {
        let bar = &self.history[position - self.base];
        match kind {
            PivotKind::High => bar.high,
            PivotKind::Low => bar.low,
        }
    }

    /// Re-scan windows never reach behind the older of the two anchors
    fn trim_history(&mut self) {
        if let (Some(high), Some(low)) = (self.last_high, self.last_low) {
            let keep_from = high.min(low);
            while self.base < keep_from {
                self.history.pop_front();
                self.base += 1;
            }
        }
    }

    pub fn trend(&self) -> Option<Trend> {
        self.trend
    }

    pub fn bars_seen(&self) -> usize {
        self.next_index
    }

    pub fn pivots(&self) -> &[Pivot] {
        &self.pivots
    }

    pub fn into_pivots(self) -> Vec<Pivot> {
        self.pivots
    }
}

/// Detect all confirmed pivots in a series.
///
/// Bars are put in timestamp order first, so input order does not matter.
/// A series shorter than `config.length` yields no pivots.
pub fn detect_pivots(bars: &[Bar], config: &ZigZagConfig) -> Result<Vec<Pivot>, SignalError> {
    config.validate()?;

    let series = normalize_series(bars);
    if series.len() < config.length {
        debug!(
            "{} bars is shorter than zigzag length {}",
            series.len(),
            config.length
        );
        return Ok(Vec::new());
    }

    let mut detector = PivotDetector::new(config.clone())?;
    for bar in series {
        detector.push(bar)?;
    }

    let pivots = detector.into_pivots();
    info!(
        "ZigZag(length={}, {}) found {} pivots",
        config.length,
        config.boundary,
        pivots.len()
    );
    Ok(pivots)
}
