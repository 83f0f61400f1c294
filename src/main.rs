use anyhow::{bail, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use swing_zones::config::{AnalysisConfig, Stage};
use swing_zones::data::save_json;
use swing_zones::processing::{analyze_files_parallel, report_path};
use swing_zones::trading_core::{IndicatorConfig, LookbackBoundary, ScanConfig, ZigZagConfig};

#[derive(Parser, Debug)]
#[command(name = "swing-zones")]
#[command(author, version)]
#[command(about = "ZigZag swing pivots, interest zones and pullback setups")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Print verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Bars in the zigzag high/low window
    #[arg(short, long, global = true, env = "SWING_ZONES_LENGTH", default_value = "9")]
    length: usize,

    /// Re-scan window start: inclusive or exclusive of the last opposite pivot
    #[arg(long, global = true, env = "SWING_ZONES_BOUNDARY", default_value = "inclusive")]
    boundary: LookbackBoundary,

    /// Moving average period for zone breakouts
    #[arg(long, global = true, env = "SWING_ZONES_SMA_PERIOD", default_value = "20")]
    sma_period: usize,

    /// RSI period for divergence checks
    #[arg(long, global = true, env = "SWING_ZONES_RSI_PERIOD", default_value = "14")]
    rsi_period: usize,

    /// Timezone the export's timestamps are written in
    #[arg(long, global = true, env = "SWING_ZONES_SOURCE_TZ", default_value = "Etc/GMT-1")]
    source_tz: String,

    /// Write one JSON report per file here instead of printing to stdout
    #[arg(short, long, global = true, env = "SWING_ZONES_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Compress written reports with zstd
    #[arg(long, global = true)]
    compress: bool,
}

#[derive(ClapArgs, Debug)]
struct Inputs {
    /// MetaTrader exports (.csv, or .csv.zst)
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect swing pivots
    Pivots(Inputs),

    /// Detect pivots and the interest zones behind new extremes
    Zones(Inputs),

    /// Find divergence + engulfing setups inside interest zones
    Scan {
        #[command(flatten)]
        inputs: Inputs,

        /// Account balance used for sizing
        #[arg(long, env = "SWING_ZONES_BALANCE", default_value = "10000")]
        balance: f64,

        /// Percent of balance risked per setup
        #[arg(long, env = "SWING_ZONES_RISK_PCT", default_value = "1.0")]
        risk_pct: f64,

        /// Points beyond the trigger range for the stop
        #[arg(long, env = "SWING_ZONES_SL_BUFFER", default_value = "5.0")]
        sl_buffer: f64,

        /// Bars searched back for the stop's range start
        #[arg(long, env = "SWING_ZONES_MAX_SL_LOOKBACK", default_value = "10")]
        max_sl_lookback: usize,
    },
}

impl Args {
    fn analysis_config(&self) -> (AnalysisConfig, &[PathBuf]) {
        let mut config = AnalysisConfig {
            zigzag: ZigZagConfig {
                length: self.length,
                boundary: self.boundary,
            },
            indicators: IndicatorConfig {
                sma_period: self.sma_period,
                rsi_period: self.rsi_period,
            },
            source_tz: self.source_tz.clone(),
            ..AnalysisConfig::default()
        };

        let files = match &self.command {
            Commands::Pivots(inputs) => {
                config.stage = Stage::Pivots;
                &inputs.files
            }
            Commands::Zones(inputs) => {
                config.stage = Stage::Zones;
                &inputs.files
            }
            Commands::Scan {
                inputs,
                balance,
                risk_pct,
                sl_buffer,
                max_sl_lookback,
            } => {
                config.stage = Stage::Scan;
                config.scan = ScanConfig {
                    balance: *balance,
                    risk_pct: *risk_pct,
                    sl_buffer: *sl_buffer,
                    max_sl_lookback: *max_sl_lookback,
                    ..ScanConfig::default()
                };
                &inputs.files
            }
        };

        (config, files)
    }
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = if args.verbose {
        "swing_zones=debug"
    } else {
        "swing_zones=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let (config, files) = args.analysis_config();
    config.validate()?;

    info!(
        "Running {} on {} file(s): length={} boundary={} sma={} rsi={} tz={}",
        config.stage,
        files.len(),
        config.zigzag.length,
        config.zigzag.boundary,
        config.indicators.sma_period,
        config.indicators.rsi_period,
        config.source_tz
    );

    let results = analyze_files_parallel(files, &config);

    let mut failed = 0;
    for (path, result) in results {
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                error!("Skipping {:?}: {:#}", path, e);
                failed += 1;
                continue;
            }
        };

        match &args.output_dir {
            Some(dir) => {
                let out = report_path(dir, &path, config.stage, args.compress);
                save_json(&report, &out, args.compress)?;
                info!("Wrote {:?}", out);
            }
            None => println!("{}", serde_json::to_string_pretty(&report)?),
        }
    }

    if failed > 0 {
        bail!("{} of {} file(s) failed", failed, files.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_scan_flags_map_to_config() {
        let args = Args::try_parse_from([
            "swing-zones",
            "scan",
            "a.csv",
            "b.csv.zst",
            "--length",
            "5",
            "--boundary",
            "exclusive",
            "--risk-pct",
            "0.5",
        ])
        .unwrap();

        let (config, files) = args.analysis_config();
        assert_eq!(files.len(), 2);
        assert_eq!(config.stage, Stage::Scan);
        assert_eq!(config.zigzag.length, 5);
        assert_eq!(config.zigzag.boundary, LookbackBoundary::Exclusive);
        assert_eq!(config.scan.risk_pct, 0.5);
        assert_eq!(config.scan.balance, 10_000.0);
        assert_eq!(config.scan.symbol.name, "US30.cash");
    }

    #[test]
    fn test_files_are_required() {
        assert!(Args::try_parse_from(["swing-zones", "pivots"]).is_err());
        assert!(
            Args::try_parse_from(["swing-zones", "zones", "x.csv", "--boundary", "sideways"])
                .is_err()
        );
    }
}
