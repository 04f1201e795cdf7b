//! Candle: one OHLCV record for one fixed interval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV candle for a single interval.
///
/// Candles are built at the fetch boundary and never mutated afterwards.
/// The OHLC containment invariant is not enforced here: exchange data that
/// violates it must still reach the validator so it can be reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Returns true if any OHLCV field is NaN or infinite.
    pub fn has_missing_fields(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite())
    }

    pub fn has_positive_prices(&self) -> bool {
        self.open > 0.0 && self.high > 0.0 && self.low > 0.0 && self.close > 0.0
    }

    /// `low <= min(open, close) <= max(open, close) <= high`, with `low <= high`.
    pub fn is_contained(&self) -> bool {
        self.low <= self.high
            && self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
    }

    /// Basic sanity check used by tests and the summary.
    pub fn is_sane(&self) -> bool {
        !self.has_missing_fields()
            && self.has_positive_prices()
            && self.volume >= 0.0
            && self.is_contained()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_candle() -> Candle {
        Candle {
            open_time: Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap(),
            open: 96_000.0,
            high: 96_100.0,
            low: 95_950.0,
            close: 96_050.0,
            volume: 12.5,
        }
    }

    #[test]
    fn candle_is_sane() {
        assert!(sample_candle().is_sane());
    }

    #[test]
    fn detects_missing_fields() {
        let mut c = sample_candle();
        c.volume = f64::NAN;
        assert!(c.has_missing_fields());
        assert!(!c.is_sane());
    }

    #[test]
    fn detects_inverted_high_low() {
        let mut c = sample_candle();
        c.high = 95_900.0;
        assert!(!c.is_contained());
    }

    #[test]
    fn close_above_high_is_not_contained() {
        let mut c = sample_candle();
        c.close = 96_200.0;
        assert!(c.low <= c.high);
        assert!(!c.is_contained());
    }

    #[test]
    fn flat_candle_is_contained() {
        let mut c = sample_candle();
        c.open = 100.0;
        c.high = 100.0;
        c.low = 100.0;
        c.close = 100.0;
        assert!(c.is_contained());
    }

    #[test]
    fn serialization_roundtrip() {
        let c = sample_candle();
        let json = serde_json::to_string(&c).unwrap();
        let back: Candle = serde_json::from_str(&json).unwrap();
        assert_eq!(c, back);
    }
}
