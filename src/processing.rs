//! File analysis pipeline: bars -> indicators -> pivots -> zones -> setups

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::{AnalysisConfig, Stage};
use crate::data::load_bars;
use crate::error::SignalError;
use crate::trading_core::{
    detect_pivots, find_interest_zones, normalize_series, scan_setups, with_indicators, Bar,
    InterestZone, Pivot, TradeSetup,
};

/// Output for one analysed series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub source: String,
    pub stage: Stage,
    /// Bars read from the source
    pub bars: usize,
    /// Bars left once the moving average has warmed up
    pub analysed_bars: usize,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub pivots: Vec<Pivot>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub zones: Option<Vec<InterestZone>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub setups: Option<Vec<TradeSetup>>,
}

/// Run the configured stages over an in-memory series.
///
/// Pivots are detected on the bars that carry a moving average, so zone
/// windows never reach into the warm-up.
pub fn analyze_series(
    source: &str,
    bars: &[Bar],
    config: &AnalysisConfig,
) -> Result<Report, SignalError> {
    let bars = normalize_series(bars);
    let series = with_indicators(&bars, &config.indicators);
    let analysed: Vec<Bar> = series.iter().map(|b| b.bar).collect();

    let pivots = detect_pivots(&analysed, &config.zigzag)?;

    let zones = match config.stage {
        Stage::Pivots => None,
        Stage::Zones | Stage::Scan => Some(find_interest_zones(&series, &pivots)),
    };

    let setups = match (config.stage, &zones) {
        (Stage::Scan, Some(zones)) => Some(scan_setups(&series, &pivots, zones, &config.scan)),
        _ => None,
    };

    Ok(Report {
        source: source.to_string(),
        stage: config.stage,
        bars: bars.len(),
        analysed_bars: series.len(),
        first_timestamp: analysed.first().map(|b| b.timestamp),
        last_timestamp: analysed.last().map(|b| b.timestamp),
        pivots,
        zones,
        setups,
    })
}

/// Load and analyse one file
pub fn analyze_file(path: &Path, config: &AnalysisConfig) -> Result<Report> {
    let tz = config.timezone()?;
    let bars = load_bars(path, tz)?;
    let report = analyze_series(&path.display().to_string(), &bars, config)
        .with_context(|| format!("Failed to analyse {:?}", path))?;

    info!(
        "Analysed {:?}: {} bars, {} pivots, {} zones, {} setups",
        path,
        report.bars,
        report.pivots.len(),
        report.zones.as_ref().map_or(0, Vec::len),
        report.setups.as_ref().map_or(0, Vec::len)
    );
    Ok(report)
}

/// Analyse files in parallel; results keep the input order
pub fn analyze_files_parallel(
    paths: &[PathBuf],
    config: &AnalysisConfig,
) -> Vec<(PathBuf, Result<Report>)> {
    paths
        .par_iter()
        .map(|path| (path.clone(), analyze_file(path, config)))
        .collect()
}

/// `<output_dir>/<file stem>.<stage>.json[.zst]`
pub fn report_path(output_dir: &Path, source: &Path, stage: Stage, compress: bool) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "series".to_string());
    let name = name.strip_suffix(".zst").unwrap_or(&name);
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());

    let suffix = if compress { ".json.zst" } else { ".json" };
    output_dir.join(format!("{}.{}{}", stem, stage, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading_core::bars::test_support::ts;
    use crate::trading_core::{IndicatorConfig, ZigZagConfig};

    // Rising waves with pullbacks, enough for a few swings after warm-up
    fn wave_bars() -> Vec<Bar> {
        let closes: Vec<f64> = (0..60)
            .map(|i| {
                let t = i as f64;
                100.0 + t * 0.5 + 6.0 * (t / 4.0).sin()
            })
            .collect();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let open = if i == 0 { c } else { closes[i - 1] };
                Bar::new(ts(i as i64), open, open.max(c) + 0.5, open.min(c) - 0.5, c)
            })
            .collect()
    }

    fn config(stage: Stage) -> AnalysisConfig {
        AnalysisConfig {
            stage,
            zigzag: ZigZagConfig::new(3),
            indicators: IndicatorConfig {
                sma_period: 5,
                rsi_period: 3,
            },
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn test_stages_control_report_contents() {
        let bars = wave_bars();

        let pivots_only = analyze_series("wave", &bars, &config(Stage::Pivots)).unwrap();
        assert!(pivots_only.zones.is_none());
        assert!(pivots_only.setups.is_none());
        assert!(!pivots_only.pivots.is_empty());

        let zones = analyze_series("wave", &bars, &config(Stage::Zones)).unwrap();
        assert!(zones.zones.is_some());
        assert!(zones.setups.is_none());
        assert_eq!(zones.pivots, pivots_only.pivots);

        let scan = analyze_series("wave", &bars, &config(Stage::Scan)).unwrap();
        assert!(scan.zones.is_some());
        assert!(scan.setups.is_some());
    }

    #[test]
    fn test_warm_up_bars_are_not_analysed() {
        let bars = wave_bars();
        let report = analyze_series("wave", &bars, &config(Stage::Zones)).unwrap();

        assert_eq!(report.bars, 60);
        assert_eq!(report.analysed_bars, 56);
        assert_eq!(report.first_timestamp, Some(ts(4)));
        assert!(report.pivots.iter().all(|p| p.timestamp >= ts(4)));
        for zone in report.zones.unwrap() {
            assert!(zone.breakout_timestamp > zone.preceding_pivot_timestamp);
            assert!(zone.breakout_timestamp <= zone.pivot_timestamp);
        }
    }

    #[test]
    fn test_short_series_gives_empty_report() {
        let bars = wave_bars();
        let report = analyze_series("short", &bars[..6], &config(Stage::Scan)).unwrap();
        assert!(report.pivots.is_empty());
        assert_eq!(report.zones, Some(vec![]));
        assert_eq!(report.setups, Some(vec![]));
    }

    #[test]
    fn test_invalid_length_is_an_error() {
        let mut config = config(Stage::Pivots);
        config.zigzag.length = 0;
        assert_eq!(
            analyze_series("wave", &wave_bars(), &config).unwrap_err(),
            SignalError::InvalidLength(0)
        );
    }

    #[test]
    fn test_report_path() {
        let out = Path::new("out");
        assert_eq!(
            report_path(out, Path::new("data/US30.cash_M1.csv.zst"), Stage::Zones, false),
            PathBuf::from("out/US30.cash_M1.zones.json")
        );
        assert_eq!(
            report_path(out, Path::new("US30.csv"), Stage::Scan, true),
            PathBuf::from("out/US30.scan.json.zst")
        );
    }

    #[test]
    fn test_parallel_files_keep_order_and_isolate_failures() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.csv");
        let mut text = String::from("<DATE>\t<TIME>\t<OPEN>\t<HIGH>\t<LOW>\t<CLOSE>\n");
        for bar in wave_bars() {
            text.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\n",
                bar.timestamp.format("%Y.%m.%d"),
                bar.timestamp.format("%H:%M:%S"),
                bar.open,
                bar.high,
                bar.low,
                bar.close
            ));
        }
        std::fs::write(&good, text).unwrap();
        let missing = dir.path().join("missing.csv");

        let paths = vec![missing.clone(), good.clone()];
        let results = analyze_files_parallel(&paths, &config(Stage::Zones));

        assert_eq!(results[0].0, missing);
        assert!(results[0].1.is_err());
        assert_eq!(results[1].0, good);
        let report = results[1].1.as_ref().unwrap();
        assert_eq!(report.bars, 60);
        assert!(!report.pivots.is_empty());
    }
}
