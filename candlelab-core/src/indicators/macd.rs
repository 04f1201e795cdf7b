//! MACD: fast EMA minus slow EMA, plus a signal line and histogram.
//!
//! - macd      = EMA(fast)(close) - EMA(slow)(close)
//! - signal    = EMA(signal)(macd)  (smooths the MACD line, not price)
//! - histogram = macd - signal
//!
//! All three lines share the EMA seed convention and are defined from index 0.

use super::ema::ema_of_series;
use super::{to_cells, Indicator};

/// Which MACD line to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdLine {
    Macd,
    Signal,
    Histogram,
}

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal: usize,
    line: MacdLine,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize, line: MacdLine) -> Self {
        assert!(fast >= 1 && slow >= 1 && signal >= 1, "MACD periods must be >= 1");
        Self {
            fast,
            slow,
            signal,
            line,
        }
    }

    /// Standard 12/26/9 configuration.
    pub fn standard(line: MacdLine) -> Self {
        Self::new(12, 26, 9, line)
    }

    /// All three lines in one pass.
    pub fn lines(&self, closes: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let fast = ema_of_series(closes, self.fast);
        let slow = ema_of_series(closes, self.slow);
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = ema_of_series(&macd, self.signal);
        let histogram = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();
        (macd, signal, histogram)
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        match self.line {
            MacdLine::Macd => "macd",
            MacdLine::Signal => "macd_signal",
            MacdLine::Histogram => "macd_histogram",
        }
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let (macd, signal, histogram) = self.lines(closes);
        to_cells(match self.line {
            MacdLine::Macd => macd,
            MacdLine::Signal => signal,
            MacdLine::Histogram => histogram,
        })
    }
}
