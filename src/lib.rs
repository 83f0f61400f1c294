// Library crate - swing pivots, interest zones and pullback setups over OHLC bars

pub mod config;
pub mod data;
pub mod error;
pub mod processing;
pub mod trading_core;

// Re-export commonly used types
pub use config::{AnalysisConfig, Stage};
pub use error::SignalError;
pub use processing::{analyze_file, analyze_series, Report};
pub use trading_core::*;
