//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = k * close[t] + (1 - k) * EMA[t-1], k = 2 / (n + 1)
//! Seed: EMA[0] = close[0] (exponential-smoothing convention, no SMA seed).
//! Lookback: 0.

use super::{to_cells, Indicator};

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        0
    }

    fn compute(&self, closes: &[f64]) -> Vec<Option<f64>> {
        to_cells(ema_of_series(closes, self.period))
    }
}

/// Compute raw EMA values from a pre-extracted f64 slice.
///
/// Used directly by MACD, which smooths its own line rather than price.
/// A NaN input taints its own cell and every later one.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if n == 0 || period == 0 {
        return result;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = values[0];
    if prev.is_nan() {
        return result;
    }
    result[0] = prev;

    for i in 1..n {
        if values[i].is_nan() {
            return result;
        }
        let ema = values[i] * k + prev * (1.0 - k);
        result[i] = ema;
        prev = ema;
    }

    result
}
