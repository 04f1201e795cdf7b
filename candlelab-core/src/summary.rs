//! Human-readable summary of a collected series or indicator frame.

use crate::domain::Series;
use crate::indicators::{IndicatorFrame, INDICATOR_COLUMNS};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Min / max / mean of one numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub total: f64,
}

impl FieldStats {
    fn of(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut n = 0usize;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut total = 0.0;
        for v in values.filter(|v| v.is_finite()) {
            n += 1;
            min = min.min(v);
            max = max.max(v);
            total += v;
        }
        (n > 0).then(|| Self {
            min,
            max,
            mean: total / n as f64,
            total,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub symbol: String,
    pub timeframe: String,
    pub candles: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<FieldStats>,
    pub latest_close: Option<f64>,
    pub volume: Option<FieldStats>,
    pub fingerprint: String,
    /// Latest defined value per indicator column (frames only), in column order.
    pub indicators: Vec<(String, Option<f64>)>,
}

impl SeriesSummary {
    pub fn of_series(series: &Series) -> Self {
        let candles = series.candles();
        Self {
            symbol: series.symbol().to_string(),
            timeframe: series.timeframe().to_string(),
            candles: candles.len(),
            first: series.first().map(|c| c.open_time),
            last: series.last().map(|c| c.open_time),
            high: FieldStats::of(candles.iter().map(|c| c.high)).map(|s| s.max),
            low: FieldStats::of(candles.iter().map(|c| c.low)).map(|s| s.min),
            close: FieldStats::of(candles.iter().map(|c| c.close)),
            latest_close: series.last().map(|c| c.close),
            volume: FieldStats::of(candles.iter().map(|c| c.volume)),
            fingerprint: series.fingerprint(),
            indicators: Vec::new(),
        }
    }

    pub fn of_frame(frame: &IndicatorFrame) -> Self {
        let mut summary = Self::of_series(frame.series());
        summary.indicators = INDICATOR_COLUMNS
            .iter()
            .map(|name| {
                let latest = frame
                    .column(name)
                    .and_then(|col| col.iter().rev().find_map(|c| *c));
                (name.to_string(), latest)
            })
            .collect();
        summary
    }
}

fn opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into())
}

impl fmt::Display for SeriesSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}: {} candles", self.symbol, self.timeframe, self.candles)?;
        if let (Some(first), Some(last)) = (self.first, self.last) {
            writeln!(f, "  range:       {first} .. {last}")?;
        }
        writeln!(f, "  high / low:  {} / {}", opt(self.high), opt(self.low))?;
        if let Some(close) = &self.close {
            writeln!(
                f,
                "  close:       latest {} mean {:.2} (min {:.2}, max {:.2})",
                opt(self.latest_close),
                close.mean,
                close.min,
                close.max
            )?;
        }
        if let Some(volume) = &self.volume {
            writeln!(f, "  volume:      total {:.2} mean {:.4}", volume.total, volume.mean)?;
        }
        for (name, value) in &self.indicators {
            writeln!(f, "  {name:<15}{}", opt(*value))?;
        }
        write!(f, "  fingerprint: {}", self.fingerprint)
    }
}
