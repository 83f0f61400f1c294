//! Trading Core - price structure logic shared by the CLI and library users
//!
//! This module contains the core components:
//! - ZigZag swing pivot detection
//! - Interest zones from moving-average breakouts
//! - SMA / RSI indicator columns
//! - RSI divergence and engulfing triggers
//! - Stop, target and position sizing
//! - Pullback setup scanning

pub mod bars;
pub mod divergence;
pub mod indicators;
pub mod patterns;
pub mod risk;
pub mod rolling;
pub mod scanner;
pub mod zigzag;
pub mod zones;

// Re-export commonly used types
pub use bars::{normalize_series, AveragedBar, Bar};
pub use divergence::{check_divergence_in_zone, DivergenceKind};
pub use indicators::{rsi, sma, with_indicators, IndicatorConfig};
pub use patterns::detect_engulfing;
pub use risk::{position_size, stop_loss, take_profit, SymbolSpec};
pub use scanner::{scan_setups, ScanConfig, TradeSetup};
pub use zigzag::{
    detect_pivots, LookbackBoundary, Pivot, PivotDetector, PivotEvent, PivotKind, PivotStatus,
    Trend, ZigZagConfig,
};
pub use zones::{find_interest_zone, find_interest_zones, InterestZone, ZoneDirection};
