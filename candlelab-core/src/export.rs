//! Persistence of series and indicator frames as CSV or Parquet.
//!
//! Column order is `timestamp, open, high, low, close, volume`, followed by
//! the indicator columns for frames. Timestamps are naive UTC
//! (`YYYY-MM-DD HH:MM:SS` in CSV, millisecond datetime in Parquet).
//! Undefined indicator cells are empty in CSV and null in Parquet.

use crate::domain::{Candle, Series, Timeframe};
use crate::indicators::{IndicatorFrame, INDICATOR_COLUMNS};
use chrono::{DateTime, NaiveDateTime, Utc};
use polars::prelude::*;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const BASE_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] PolarsError),

    #[error("unsupported file extension for {0} (expected .csv or .parquet)")]
    UnsupportedFormat(String),

    #[error("row {row}: {message}")]
    InvalidRow { row: usize, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Ok(ExportFormat::Csv),
            Some("parquet") => Ok(ExportFormat::Parquet),
            _ => Err(ExportError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Parquet => "parquet",
        }
    }
}

/// Write a raw series, choosing the format from the file extension.
pub fn write_series(path: &Path, series: &Series) -> Result<ExportFormat, ExportError> {
    let format = ExportFormat::from_path(path)?;
    write_series_as(path, series, format)?;
    Ok(format)
}

/// Write a frame, choosing the format from the file extension.
pub fn write_frame(path: &Path, frame: &IndicatorFrame) -> Result<ExportFormat, ExportError> {
    let format = ExportFormat::from_path(path)?;
    write_frame_as(path, frame, format)?;
    Ok(format)
}

pub fn write_series_as(
    path: &Path,
    series: &Series,
    format: ExportFormat,
) -> Result<(), ExportError> {
    let file = create_file(path)?;
    match format {
        ExportFormat::Csv => write_series_csv(file, series)?,
        ExportFormat::Parquet => write_parquet(file, &mut series_dataframe(series)?)?,
    }
    info!(path = %path.display(), rows = series.len(), "series written");
    Ok(())
}

pub fn write_frame_as(
    path: &Path,
    frame: &IndicatorFrame,
    format: ExportFormat,
) -> Result<(), ExportError> {
    let file = create_file(path)?;
    match format {
        ExportFormat::Csv => write_frame_csv(file, frame)?,
        ExportFormat::Parquet => write_parquet(file, &mut frame_dataframe(frame)?)?,
    }
    info!(path = %path.display(), rows = frame.len(), "indicator frame written");
    Ok(())
}

fn create_file(path: &Path) -> Result<fs::File, ExportError> {
    let io_err = |source| ExportError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::File::create(path).map_err(io_err)
}

// ── CSV ─────────────────────────────────────────────────────────────

fn candle_fields(c: &Candle) -> [String; 6] {
    [
        c.open_time.format(TIMESTAMP_FORMAT).to_string(),
        c.open.to_string(),
        c.high.to_string(),
        c.low.to_string(),
        c.close.to_string(),
        c.volume.to_string(),
    ]
}

pub fn write_series_csv<W: io::Write>(writer: W, series: &Series) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(BASE_COLUMNS)?;
    for c in series.candles() {
        wtr.write_record(candle_fields(c))?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_frame_csv<W: io::Write>(writer: W, frame: &IndicatorFrame) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(BASE_COLUMNS.iter().chain(INDICATOR_COLUMNS.iter()))?;
    for (i, c) in frame.series().candles().iter().enumerate() {
        let cells = INDICATOR_COLUMNS
            .iter()
            .map(|name| frame.value(name, i).map(|v| v.to_string()).unwrap_or_default());
        wtr.write_record(candle_fields(c).into_iter().chain(cells))?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Load a raw CSV (as written by [`write_series`]) back into a Series.
///
/// Rows are kept in file order and empty price cells become NaN, so the
/// result can be validated without being silently repaired.
pub fn read_series_csv(
    path: &Path,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<Series, ExportError> {
    let file = fs::File::open(path).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_series_csv_from(file, symbol, timeframe)
}

pub fn read_series_csv_from<R: io::Read>(
    reader: R,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<Series, ExportError> {
    let mut rdr = csv::Reader::from_reader(reader);

    let headers = rdr.headers()?.clone();
    let index_of = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| ExportError::InvalidRow {
                row: 0,
                message: format!("missing column '{name}'"),
            })
    };
    let idx = [
        index_of("timestamp")?,
        index_of("open")?,
        index_of("high")?,
        index_of("low")?,
        index_of("close")?,
        index_of("volume")?,
    ];

    let mut candles = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let row = row + 1;
        let raw_time = record.get(idx[0]).unwrap_or("").trim();
        let open_time = parse_timestamp(raw_time).ok_or_else(|| ExportError::InvalidRow {
            row,
            message: format!("bad timestamp '{raw_time}'"),
        })?;

        let mut values = [0.0f64; 5];
        for ((slot, &col), name) in values.iter_mut().zip(&idx[1..]).zip(&BASE_COLUMNS[1..]) {
            let cell = record.get(col).unwrap_or("").trim();
            *slot = if cell.is_empty() {
                f64::NAN
            } else {
                cell.parse().map_err(|_| ExportError::InvalidRow {
                    row,
                    message: format!("bad number '{cell}' in column {name}"),
                })?
            };
        }

        candles.push(Candle {
            open_time,
            open: values[0],
            high: values[1],
            low: values[2],
            close: values[3],
            volume: values[4],
        });
    }

    Ok(Series::new(symbol, timeframe, candles))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc)))
}

// ── Parquet ─────────────────────────────────────────────────────────

fn base_columns(series: &Series) -> Result<Vec<Column>, ExportError> {
    let candles = series.candles();
    let times: Vec<i64> = candles.iter().map(|c| c.open_time.timestamp_millis()).collect();
    let field = |f: fn(&Candle) -> f64| candles.iter().map(f).collect::<Vec<f64>>();

    Ok(vec![
        Column::new("timestamp".into(), times)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        Column::new("open".into(), field(|c| c.open)),
        Column::new("high".into(), field(|c| c.high)),
        Column::new("low".into(), field(|c| c.low)),
        Column::new("close".into(), field(|c| c.close)),
        Column::new("volume".into(), field(|c| c.volume)),
    ])
}

fn series_dataframe(series: &Series) -> Result<DataFrame, ExportError> {
    Ok(DataFrame::new(base_columns(series)?)?)
}

fn frame_dataframe(frame: &IndicatorFrame) -> Result<DataFrame, ExportError> {
    let rows = frame.len();
    let mut columns = base_columns(frame.series())?;
    for name in INDICATOR_COLUMNS {
        let cells: Vec<Option<f64>> = match frame.column(name) {
            Some(col) if col.len() == rows => col.to_vec(),
            _ => vec![None; rows],
        };
        columns.push(Column::new(name.into(), cells));
    }
    Ok(DataFrame::new(columns)?)
}

fn write_parquet(file: fs::File, df: &mut DataFrame) -> Result<(), ExportError> {
    ParquetWriter::new(file)
        .with_compression(ParquetCompression::Snappy)
        .finish(df)?;
    Ok(())
}

/// Load the OHLCV part of a Parquet file written by this module.
pub fn read_series_parquet(
    path: &Path,
    symbol: &str,
    timeframe: Timeframe,
) -> Result<Series, ExportError> {
    let file = fs::File::open(path).map_err(|source| ExportError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let df = ParquetReader::new(file).finish()?;

    let times = df.column("timestamp")?.cast(&DataType::Int64)?;
    let times = times.i64()?;
    let f64_col = |name: &str| -> Result<Float64Chunked, ExportError> {
        Ok(df.column(name)?.f64()?.clone())
    };
    let (open, high, low, close, volume) = (
        f64_col("open")?,
        f64_col("high")?,
        f64_col("low")?,
        f64_col("close")?,
        f64_col("volume")?,
    );

    let mut candles = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let open_time = times
            .get(i)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(|| ExportError::InvalidRow {
                row: i + 1,
                message: "null or out-of-range timestamp".into(),
            })?;
        candles.push(Candle {
            open_time,
            open: open.get(i).unwrap_or(f64::NAN),
            high: high.get(i).unwrap_or(f64::NAN),
            low: low.get(i).unwrap_or(f64::NAN),
            close: close.get(i).unwrap_or(f64::NAN),
            volume: volume.get(i).unwrap_or(f64::NAN),
        });
    }

    Ok(Series::new(symbol, timeframe, candles))
}
