//! Month-by-month raw candle archiving.
//!
//! Layout: `{data_dir}/csv/{SYM}_{YYYY}_{MM}_{tf}.csv` and
//! `{data_dir}/parquet/{SYM}_{YYYY}_{MM}_{tf}.parquet`, where `SYM` is the
//! symbol with `/` replaced by `_` (`BTC/USDT` → `BTC_USDT`).

use crate::data::CancelToken;
use crate::domain::Timeframe;
use crate::export::{write_series_as, ExportError, ExportFormat};
use crate::pipeline::{Pipeline, PipelineError, PipelineRequest};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid month '{0}' (expected YYYY-MM)")]
pub struct MonthParseError(pub String);

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, MonthParseError> {
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(MonthParseError(format!("{year}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Every month from `self` through `last`, inclusive.
    pub fn through(self, last: YearMonth) -> Vec<YearMonth> {
        let mut months = Vec::new();
        let mut current = self;
        while current <= last {
            months.push(current);
            current = current.next();
        }
        months
    }
}

impl FromStr for YearMonth {
    type Err = MonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || MonthParseError(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(bad)?;
        let year = y.parse().map_err(|_| bad())?;
        let month = m.parse().map_err(|_| bad())?;
        Self::new(year, month).map_err(|_| bad())
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// First instant of the month through the last second of its last day.
pub fn month_range(month: YearMonth) -> (DateTime<Utc>, DateTime<Utc>) {
    let first = NaiveDate::from_ymd_opt(month.year, month.month, 1).unwrap_or(NaiveDate::MIN);
    let next = month.next();
    let next_first = NaiveDate::from_ymd_opt(next.year, next.month, 1).unwrap_or(NaiveDate::MIN);

    let start = first.and_time(NaiveTime::MIN).and_utc();
    let end = next_first.and_time(NaiveTime::MIN).and_utc() - Duration::seconds(1);
    (start, end)
}

/// `BTC/USDT`, 2024-12, 1m → `BTC_USDT_2024_12_1m`.
pub fn monthly_file_stem(symbol: &str, month: YearMonth, timeframe: Timeframe) -> String {
    format!(
        "{}_{}_{:02}_{timeframe}",
        symbol.replace('/', "_"),
        month.year,
        month.month
    )
}

#[derive(Debug, Error)]
enum MonthError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthRecord {
    pub month: YearMonth,
    pub candles: usize,
    pub gaps: usize,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthFailure {
    pub month: YearMonth,
    pub error: String,
}

/// Outcome of a batch run; one entry per attempted month.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub succeeded: Vec<MonthRecord>,
    pub failed: Vec<MonthFailure>,
    /// True if the batch stopped early on cancellation.
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }
}

/// Collects and archives one symbol, month by month.
pub struct MonthlyBatch<'p, 'a> {
    pipeline: &'p Pipeline<'a>,
    symbol: String,
    timeframe: Timeframe,
    data_dir: PathBuf,
    formats: Vec<ExportFormat>,
}

impl<'p, 'a> MonthlyBatch<'p, 'a> {
    pub fn new(
        pipeline: &'p Pipeline<'a>,
        symbol: impl Into<String>,
        timeframe: Timeframe,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            symbol: symbol.into(),
            timeframe,
            data_dir: data_dir.into(),
            formats: vec![ExportFormat::Csv, ExportFormat::Parquet],
        }
    }

    /// Restrict which formats are written.
    pub fn with_formats(mut self, csv: bool, parquet: bool) -> Self {
        self.formats.clear();
        if csv {
            self.formats.push(ExportFormat::Csv);
        }
        if parquet {
            self.formats.push(ExportFormat::Parquet);
        }
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// `{data_dir}/{csv|parquet}/{stem}.{ext}`
    pub fn file_path(&self, month: YearMonth, format: ExportFormat) -> PathBuf {
        let stem = monthly_file_stem(&self.symbol, month, self.timeframe);
        self.data_dir
            .join(format.extension())
            .join(format!("{stem}.{}", format.extension()))
    }

    /// Archive every month in `[from, to]`. A failed month is recorded and
    /// the batch moves on; cancellation stops it.
    pub fn run(&self, from: YearMonth, to: YearMonth, cancel: &CancelToken) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for month in from.through(to) {
            if cancel.is_cancelled() {
                warn!(%month, "monthly batch cancelled");
                summary.cancelled = true;
                break;
            }

            match self.save_month(month, cancel) {
                Ok(record) => {
                    info!(%month, candles = record.candles, "month saved");
                    summary.succeeded.push(record);
                }
                Err(MonthError::Pipeline(PipelineError::Cancelled { .. })) => {
                    summary.cancelled = true;
                    break;
                }
                Err(e) => {
                    error!(%month, error = %e, "month failed");
                    summary.failed.push(MonthFailure {
                        month,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            succeeded = summary.success_count(),
            failed = summary.failure_count(),
            dir = %self.data_dir.display(),
            "monthly batch finished"
        );
        summary
    }

    fn save_month(
        &self,
        month: YearMonth,
        cancel: &CancelToken,
    ) -> Result<MonthRecord, MonthError> {
        let (start, end) = month_range(month);
        let request = PipelineRequest {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe,
            start,
            end,
            raw_only: true,
        };
        let output = self.pipeline.run(&request, cancel)?;
        let series = output.data.series();

        let mut files = Vec::with_capacity(self.formats.len());
        for &format in &self.formats {
            let path = self.file_path(month, format);
            write_series_as(&path, series, format)?;
            files.push(path);
        }

        Ok(MonthRecord {
            month,
            candles: series.len(),
            gaps: output.collection.gap_count(),
            files,
        })
    }
}
