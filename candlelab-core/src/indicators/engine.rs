//! Indicator engine: runs the standard indicator set over a Series and
//! assembles the resulting columns into an `IndicatorFrame`.

use super::{Bollinger, Ema, Indicator, Macd, MacdLine, Rsi};
use crate::domain::Series;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// The fixed derived-column set, in output order.
pub const INDICATOR_COLUMNS: [&str; 11] = [
    "ema_12",
    "ema_26",
    "ema_50",
    "ema_200",
    "macd",
    "macd_signal",
    "macd_histogram",
    "rsi",
    "bb_upper",
    "bb_middle",
    "bb_lower",
];

/// A Series plus named derived columns, one cell per candle.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    series: Series,
    columns: HashMap<String, Vec<Option<f64>>>,
}

impl IndicatorFrame {
    /// Assemble a frame from precomputed columns.
    pub fn from_columns(series: Series, columns: HashMap<String, Vec<Option<f64>>>) -> Self {
        Self { series, columns }
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn into_series(self) -> Series {
        self.series
    }

    /// Number of rows (candles).
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// The full column for a named indicator.
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(|v| v.as_slice())
    }

    /// The cell at a row index; `None` for warm-up, unknown column or index.
    pub fn value(&self, name: &str, index: usize) -> Option<f64> {
        self.columns.get(name).and_then(|v| v.get(index).copied().flatten())
    }

    /// Number of derived columns stored.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Computes the standard indicator set.
pub struct IndicatorEngine {
    indicators: Vec<Box<dyn Indicator>>,
}

impl IndicatorEngine {
    /// EMA 12/26/50/200, MACD 12/26/9, RSI 14, Bollinger 20/2σ.
    pub fn standard() -> Self {
        let indicators: Vec<Box<dyn Indicator>> = vec![
            Box::new(Ema::new(12)),
            Box::new(Ema::new(26)),
            Box::new(Ema::new(50)),
            Box::new(Ema::new(200)),
            Box::new(Macd::standard(MacdLine::Macd)),
            Box::new(Macd::standard(MacdLine::Signal)),
            Box::new(Macd::standard(MacdLine::Histogram)),
            Box::new(Rsi::new(14)),
            Box::new(Bollinger::upper(20, 2.0)),
            Box::new(Bollinger::middle(20, 2.0)),
            Box::new(Bollinger::lower(20, 2.0)),
        ];
        Self { indicators }
    }

    pub fn indicators(&self) -> &[Box<dyn Indicator>] {
        &self.indicators
    }

    /// Compute every column. Pure and deterministic; columns run in parallel.
    pub fn compute(&self, series: &Series) -> IndicatorFrame {
        let closes = series.closes();
        let columns: HashMap<String, Vec<Option<f64>>> = self
            .indicators
            .par_iter()
            .map(|ind| (ind.name().to_string(), ind.compute(&closes)))
            .collect();

        debug!(
            symbol = series.symbol(),
            rows = series.len(),
            columns = columns.len(),
            "indicators computed"
        );

        IndicatorFrame::from_columns(series.clone(), columns)
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::standard()
    }
}
