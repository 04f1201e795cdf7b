//! Indicator trait and the concrete indicators behind the frame columns.
//!
//! Indicators are pure functions: a close series in, one column out, same
//! length. Cells that are not yet computable (warm-up) are `None`, never a
//! numeric stand-in, so consumers can tell "undefined" from "computed as 0".
//!
//! Multi-series indicators (MACD, Bollinger) are exposed as separate named
//! instances per line, keeping the single-column `Indicator` trait unchanged.

pub mod bollinger;
pub mod ema;
pub mod engine;
pub mod macd;
pub mod rsi;

pub use bollinger::{Bollinger, BollingerBand};
pub use ema::Ema;
pub use engine::{IndicatorEngine, IndicatorFrame, INDICATOR_COLUMNS};
pub use macd::{Macd, MacdLine};
pub use rsi::Rsi;

/// Trait for indicators.
///
/// # Look-ahead guard
/// No value at index t may depend on closes after t. Every indicator must
/// give the same prefix on a truncated series as on the full one.
pub trait Indicator: Send + Sync {
    /// Column name in the indicator frame (e.g. "ema_12", "bb_upper").
    fn name(&self) -> &str;

    /// Number of leading cells that are always undefined.
    fn lookback(&self) -> usize;

    /// Compute the column for the entire close series.
    fn compute(&self, closes: &[f64]) -> Vec<Option<f64>>;
}

/// Convert a raw numeric column to frame cells, mapping NaN to undefined.
pub(crate) fn to_cells(values: Vec<f64>) -> Vec<Option<f64>> {
    values
        .into_iter()
        .map(|v| if v.is_nan() { None } else { Some(v) })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Unwrap a defined cell and compare it.
#[cfg(test)]
pub fn assert_cell(cell: Option<f64>, expected: f64, epsilon: f64) {
    match cell {
        Some(v) => assert_approx(v, expected, epsilon),
        None => panic!("expected defined cell ~{expected}, got undefined"),
    }
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
