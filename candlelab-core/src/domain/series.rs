//! Series: an owned, ordered run of candles for one symbol and timeframe.

use super::candle::Candle;
use super::timeframe::Timeframe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A hole between two consecutive candles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    /// Open time of the last candle before the hole.
    pub after: DateTime<Utc>,
    /// Open time of the first candle after the hole.
    pub before: DateTime<Utc>,
    /// Number of whole timeframe steps absent between the two.
    pub missing: u64,
}

/// Ordered candle sequence.
///
/// A series is never edited in place: collection rebuilds it from the
/// accumulated rows with [`Series::canonical`]. [`Series::new`] keeps the
/// candles exactly as given so that externally loaded data can be validated
/// without being silently repaired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    symbol: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl Series {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, candles: Vec<Candle>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            candles,
        }
    }

    /// Build a series from unordered rows: deduplicate by open time (the
    /// last row seen for a given open time wins) and sort ascending.
    ///
    /// Returns the series and the number of rows dropped as duplicates.
    pub fn canonical(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        rows: impl IntoIterator<Item = Candle>,
    ) -> (Self, usize) {
        let mut by_time: BTreeMap<DateTime<Utc>, Candle> = BTreeMap::new();
        let mut seen = 0usize;
        for candle in rows {
            seen += 1;
            by_time.insert(candle.open_time, candle);
        }
        let duplicates = seen - by_time.len();
        let series = Self::new(symbol, timeframe, by_time.into_values().collect());
        (series, duplicates)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn into_candles(self) -> Vec<Candle> {
        self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    /// Holes between consecutive candles whose spacing exceeds the step.
    ///
    /// Spacing that is not a whole multiple of the step is rounded down.
    pub fn gaps(&self) -> Vec<Gap> {
        let step = self.timeframe.step_millis();
        self.candles
            .windows(2)
            .filter_map(|pair| {
                let delta = (pair[1].open_time - pair[0].open_time).num_milliseconds();
                if delta > step {
                    Some(Gap {
                        after: pair[0].open_time,
                        before: pair[1].open_time,
                        missing: ((delta / step) - 1).max(0) as u64,
                    })
                } else {
                    None
                }
            })
            .filter(|gap| gap.missing > 0)
            .collect()
    }

    /// Number of candles a complete series between the first and last
    /// observed open time would contain.
    ///
    /// Zero for an empty series, or when the last candle opens before the
    /// first (an unordered series has no meaningful span).
    pub fn expected_len(&self) -> u64 {
        match (self.first(), self.last()) {
            (Some(first), Some(last)) => {
                let span = (last.open_time - first.open_time).num_milliseconds();
                u64::try_from(span / self.timeframe.step_millis()).map_or(0, |steps| steps + 1)
            }
            _ => 0,
        }
    }

    /// Content fingerprint over open times and OHLCV bit patterns.
    ///
    /// Two series with byte-identical candle sequences share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.symbol.as_bytes());
        hasher.update(self.timeframe.to_string().as_bytes());
        for c in &self.candles {
            hasher.update(&c.open_time.timestamp_millis().to_le_bytes());
            for v in [c.open, c.high, c.low, c.close, c.volume] {
                hasher.update(&v.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn candle_at(minute: i64, close: f64) -> Candle {
        Candle {
            open_time: Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn canonical_sorts_and_dedupes_last_wins() {
        let rows = vec![
            candle_at(2, 102.0),
            candle_at(0, 100.0),
            candle_at(1, 101.0),
            candle_at(1, 111.0),
        ];
        let (series, dropped) = Series::canonical("BTC/USDT", Timeframe::ONE_MINUTE, rows);
        assert_eq!(dropped, 1);
        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![100.0, 111.0, 102.0]);
    }

    #[test]
    fn gaps_report_missing_steps() {
        let candles = vec![candle_at(0, 1.0), candle_at(1, 1.0), candle_at(4, 1.0)];
        let series = Series::new("X", Timeframe::ONE_MINUTE, candles);
        let gaps = series.gaps();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].missing, 2);
        assert_eq!(gaps[0].after, candle_at(1, 1.0).open_time);
        assert_eq!(series.expected_len(), 5);
    }

    #[test]
    fn contiguous_series_has_no_gaps() {
        let candles: Vec<Candle> = (0..10).map(|i| candle_at(i, 100.0)).collect();
        let series = Series::new("X", Timeframe::ONE_MINUTE, candles);
        assert!(series.gaps().is_empty());
        assert_eq!(series.expected_len(), 10);
    }

    #[test]
    fn fingerprint_is_content_addressed() {
        let a = Series::new("X", Timeframe::ONE_MINUTE, vec![candle_at(0, 1.0)]);
        let b = Series::new("X", Timeframe::ONE_MINUTE, vec![candle_at(0, 1.0)]);
        let c = Series::new("X", Timeframe::ONE_MINUTE, vec![candle_at(0, 2.0)]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn reversed_series_expects_nothing() {
        let candles = vec![candle_at(9, 1.0), candle_at(3, 1.0), candle_at(0, 1.0)];
        let s = Series::new("X", Timeframe::ONE_MINUTE, candles);
        assert_eq!(s.expected_len(), 0);
    }

    #[test]
    fn empty_series_expects_nothing() {
        let s = Series::new("X", Timeframe::ONE_MINUTE, Vec::new());
        assert_eq!(s.expected_len(), 0);
        assert!(s.gaps().is_empty());
    }
}
