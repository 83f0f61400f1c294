//! Configuration for a full file analysis

use anyhow::{anyhow, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::trading_core::{IndicatorConfig, ScanConfig, ZigZagConfig};

/// How far the analysis runs for each file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Swing pivots only
    Pivots,
    /// Pivots and interest zones
    Zones,
    /// Pivots, zones and trade setups
    Scan,
}

impl Default for Stage {
    fn default() -> Self {
        Self::Zones
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pivots => write!(f, "pivots"),
            Self::Zones => write!(f, "zones"),
            Self::Scan => write!(f, "scan"),
        }
    }
}

/// Everything needed to turn one OHLC file into a report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub stage: Stage,

    pub zigzag: ZigZagConfig,

    pub indicators: IndicatorConfig,

    pub scan: ScanConfig,

    /// IANA zone the file's timestamps are written in (default: "Etc/GMT-1")
    pub source_tz: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stage: Stage::default(),
            zigzag: ZigZagConfig::default(),
            indicators: IndicatorConfig::default(),
            scan: ScanConfig::default(),
            source_tz: "Etc/GMT-1".to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn timezone(&self) -> Result<Tz> {
        self.source_tz
            .parse::<Tz>()
            .map_err(|e| anyhow!("Unknown timezone {:?}: {}", self.source_tz, e))
    }

    /// Reject settings that would make every file fail
    pub fn validate(&self) -> Result<()> {
        self.zigzag.validate()?;
        self.timezone()?;
        if self.indicators.sma_period == 0 || self.indicators.rsi_period == 0 {
            return Err(anyhow!(
                "Indicator periods must be positive (sma {}, rsi {})",
                self.indicators.sma_period,
                self.indicators.rsi_period
            ));
        }
        Ok(())
    }
}
