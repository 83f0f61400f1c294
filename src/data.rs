//! OHLC file loading and result export
//!
//! Input files are MetaTrader history exports: tab separated, angle-bracket
//! headers, broker-local timestamps. A `.zst` extension means the file is
//! zstd compressed.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

use crate::error::SignalError;
use crate::trading_core::bars::{normalize_series, Bar};

/// Row of a MetaTrader export; volume and spread columns are ignored
#[derive(Debug, Deserialize)]
struct MtRow {
    #[serde(rename = "<DATE>")]
    date: String,
    // Daily exports have no time column
    #[serde(rename = "<TIME>", default)]
    time: Option<String>,
    #[serde(rename = "<OPEN>")]
    open: f64,
    #[serde(rename = "<HIGH>")]
    high: f64,
    #[serde(rename = "<LOW>")]
    low: f64,
    #[serde(rename = "<CLOSE>")]
    close: f64,
}

fn is_zst(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "zst")
}

fn parse_timestamp(row: &MtRow, index: usize) -> Result<NaiveDateTime, SignalError> {
    let invalid = |reason: String| SignalError::InvalidSeries { row: index, reason };

    let date = NaiveDate::parse_from_str(row.date.trim(), "%Y.%m.%d")
        .map_err(|e| invalid(format!("date {:?}: {}", row.date, e)))?;
    let time = match row.time.as_deref().map(str::trim) {
        None | Some("") => NaiveTime::MIN,
        Some(text) => NaiveTime::parse_from_str(text, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
            .map_err(|e| invalid(format!("time {:?}: {}", text, e)))?,
    };
    Ok(date.and_time(time))
}

fn row_to_bar(row: MtRow, index: usize, source_tz: Tz) -> Result<Bar, SignalError> {
    let naive = parse_timestamp(&row, index)?;
    let local = source_tz
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| SignalError::InvalidSeries {
            row: index,
            reason: format!("{} does not exist in {}", naive, source_tz),
        })?;

    let bar = Bar::new(local.with_timezone(&Utc), row.open, row.high, row.low, row.close);
    let finite = [bar.open, bar.high, bar.low, bar.close]
        .iter()
        .all(|v| v.is_finite());
    // High and low must bound the body
    let bounded = bar.high >= bar.open.max(bar.close) && bar.low <= bar.open.min(bar.close);
    if !finite || !bounded {
        return Err(SignalError::InvalidSeries {
            row: index,
            reason: format!(
                "bad prices o={} h={} l={} c={}",
                bar.open, bar.high, bar.low, bar.close
            ),
        });
    }
    Ok(bar)
}

/// Parse bars from any reader holding a MetaTrader export
pub fn read_bars<R: Read>(reader: R, source_tz: Tz) -> Result<Vec<Bar>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_reader(reader);

    let mut bars = Vec::new();
    for (index, result) in csv_reader.deserialize().enumerate() {
        let row: MtRow = result.with_context(|| format!("Failed to parse row {}", index))?;
        bars.push(row_to_bar(row, index, source_tz)?);
    }

    Ok(normalize_series(&bars))
}

/// Load a (possibly zstd compressed) export and convert timestamps to UTC
pub fn load_bars(path: &Path, source_tz: Tz) -> Result<Vec<Bar>> {
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;

    let bars = if is_zst(path) {
        let decoder = zstd::stream::Decoder::new(file)
            .with_context(|| format!("Failed to create zstd decoder for: {:?}", path))?;
        read_bars(BufReader::new(decoder), source_tz)
    } else {
        read_bars(BufReader::new(file), source_tz)
    }
    .with_context(|| format!("Failed to read bars from {:?}", path))?;

    debug!("Loaded {} bars from {:?}", bars.len(), path);
    Ok(bars)
}

/// Write a value as pretty JSON, zstd compressed when `compress` is set
pub fn save_json<T: Serialize>(value: &T, path: &Path, compress: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_vec_pretty(value)?;
    let bytes = if compress {
        zstd::encode_all(&json[..], 3)?
    } else {
        json
    };
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXPORT: &str = "\
        <DATE>\t<TIME>\t<OPEN>\t<HIGH>\t<LOW>\t<CLOSE>\t<TICKVOL>\t<VOL>\t<SPREAD>\n\
        2025.03.28\t14:01:00\t42010.5\t42020.0\t42000.0\t42015.0\t120\t0\t15\n\
        2025.03.28\t14:00:00\t42000.0\t42012.0\t41990.0\t42010.5\t98\t0\t15\n\
        2025.03.28\t14:02\t42015.0\t42030.0\t42011.0\t42025.0\t140\t0\t15\n";

    fn utc(h: u32, m: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 28, h, m, 0).unwrap()
    }

    #[test]
    fn test_read_export_converts_to_utc() {
        let tz: Tz = "Etc/GMT-1".parse().unwrap();
        let bars = read_bars(EXPORT.as_bytes(), tz).unwrap();

        assert_eq!(bars.len(), 3);
        // Sorted, and shifted from UTC+1
        assert_eq!(bars[0].timestamp, utc(13, 0));
        assert_eq!(bars[1].timestamp, utc(13, 1));
        assert_eq!(bars[2].timestamp, utc(13, 2));
        assert_eq!(bars[0].close, 42010.5);
    }

    #[test]
    fn test_daily_export_without_time() {
        let text = "<DATE>\t<OPEN>\t<HIGH>\t<LOW>\t<CLOSE>\n2025.03.28\t1.0\t2.0\t0.5\t1.5\n";
        let bars = read_bars(text.as_bytes(), Tz::UTC).unwrap();
        assert_eq!(bars[0].timestamp, utc(0, 0));
    }

    fn single_row(row: &str) -> String {
        format!("<DATE>\t<TIME>\t<OPEN>\t<HIGH>\t<LOW>\t<CLOSE>\n{}\n", row)
    }

    #[test]
    fn test_bad_prices_rejected() {
        let rows = [
            // High below low
            "2025.03.28\t10:00\t1.0\t0.5\t2.0\t1.5",
            // High below close
            "2025.03.28\t10:00\t1.0\t1.2\t0.5\t1.5",
            // High below open
            "2025.03.28\t10:00\t1.6\t1.55\t0.5\t1.5",
            // Low above open
            "2025.03.28\t10:00\t1.0\t2.0\t1.1\t1.5",
            // Low above close
            "2025.03.28\t10:00\t1.5\t2.0\t1.2\t1.1",
            "2025.03.28\t10:00\tNaN\t2.0\t0.5\t1.5",
            "28/03/2025\t10:00\t1.0\t2.0\t0.5\t1.5",
        ];
        for row in rows {
            let err = read_bars(single_row(row).as_bytes(), Tz::UTC).unwrap_err();
            let invalid = err.downcast_ref::<SignalError>();
            assert!(
                matches!(invalid, Some(SignalError::InvalidSeries { row: 0, .. })),
                "row {:?} gave {:#}",
                row,
                err
            );
        }

        // Body touching both extremes is fine
        let text = single_row("2025.03.28\t10:00\t1.0\t1.5\t1.0\t1.5");
        let bars = read_bars(text.as_bytes(), Tz::UTC).unwrap();
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn test_load_plain_and_zst_files() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("US30.cash_M1.csv");
        std::fs::write(&plain, EXPORT).unwrap();

        let packed = dir.path().join("US30.cash_M1.csv.zst");
        let mut encoder = zstd::stream::Encoder::new(File::create(&packed).unwrap(), 3).unwrap();
        encoder.write_all(EXPORT.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let a = load_bars(&plain, Tz::UTC).unwrap();
        let b = load_bars(&packed, Tz::UTC).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);

        assert!(load_bars(&dir.path().join("missing.csv"), Tz::UTC).is_err());
    }

    #[test]
    fn test_save_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let bars = read_bars(EXPORT.as_bytes(), Tz::UTC).unwrap();

        let path = dir.path().join("out/bars.json.zst");
        save_json(&bars, &path, true).unwrap();

        let json = zstd::decode_all(&std::fs::read(&path).unwrap()[..]).unwrap();
        let restored: Vec<Bar> = serde_json::from_slice(&json).unwrap();
        assert_eq!(restored, bars);
    }
}
