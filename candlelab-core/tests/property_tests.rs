//! Property tests for indicator and series invariants.
//!
//! Uses proptest to verify:
//! 1. EMA of a constant series is the constant
//! 2. RSI stays within [0, 100] and saturates on monotonic prices
//! 3. Bollinger bands are ordered wherever defined
//! 4. Canonical series are strictly increasing with no duplicates
//! 5. Series that pass raw validation are ordered with low <= high

use candlelab_core::domain::{Candle, Series, Timeframe};
use candlelab_core::indicators::{Bollinger, Ema, Indicator, Rsi};
use candlelab_core::validate::Validator;
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (1.0..100_000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_closes(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(arb_price(), 1..max_len)
}

fn candle_at(minute: i64, close: f64) -> Candle {
    Candle {
        open_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minute),
        open: close,
        high: close * 1.001,
        low: close * 0.999,
        close,
        volume: 1.0,
    }
}

// ── 1. EMA ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn ema_of_constant_is_constant(c in arb_price(), n in 1usize..400, period in 1usize..250) {
        let result = Ema::new(period).compute(&vec![c; n]);
        for cell in result {
            let v = cell.expect("EMA is defined from index 0");
            prop_assert!((v - c).abs() <= c * 1e-12, "EMA drifted: {v} vs {c}");
        }
    }
}

// ── 2. RSI ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_within_bounds(closes in arb_closes(300)) {
        for v in Rsi::new(14).compute(&closes).into_iter().flatten() {
            prop_assert!((0.0..=100.0).contains(&v), "RSI out of range: {v}");
        }
    }

    #[test]
    fn rsi_saturates_on_monotonic_prices(
        start in arb_price(),
        step in 0.01..50.0_f64,
        n in 16usize..200,
    ) {
        let up: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
        let down: Vec<f64> = (0..n).map(|i| start + step * (n - i) as f64).collect();
        let rsi = Rsi::new(14);
        for v in rsi.compute(&up).into_iter().flatten() {
            prop_assert!((v - 100.0).abs() < 1e-9);
        }
        for v in rsi.compute(&down).into_iter().flatten() {
            prop_assert!(v.abs() < 1e-9);
        }
    }
}

// ── 3. Bollinger ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn bollinger_bands_ordered(closes in arb_closes(200)) {
        let upper = Bollinger::upper(20, 2.0).compute(&closes);
        let middle = Bollinger::middle(20, 2.0).compute(&closes);
        let lower = Bollinger::lower(20, 2.0).compute(&closes);
        for i in 0..closes.len() {
            if i < 19 {
                prop_assert!(middle[i].is_none());
                continue;
            }
            let (u, m, l) = (upper[i].unwrap(), middle[i].unwrap(), lower[i].unwrap());
            prop_assert!(l <= m && m <= u, "bands out of order at {i}: {l} {m} {u}");
        }
    }
}

// ── 4. Canonical series ──────────────────────────────────────────────

proptest! {
    #[test]
    fn canonical_is_strictly_increasing(minutes in prop::collection::vec(0i64..500, 0..300)) {
        let rows: Vec<Candle> = minutes.iter().map(|&m| candle_at(m, 100.0 + m as f64)).collect();
        let distinct: std::collections::BTreeSet<i64> = minutes.iter().copied().collect();

        let (series, dropped) = Series::canonical("BTC/USDT", Timeframe::ONE_MINUTE, rows);
        prop_assert_eq!(series.len(), distinct.len());
        prop_assert_eq!(dropped, minutes.len() - distinct.len());
        for w in series.candles().windows(2) {
            prop_assert!(w[0].open_time < w[1].open_time);
        }
    }
}

// ── 5. Raw validation ────────────────────────────────────────────────

proptest! {
    #[test]
    fn validated_series_are_ordered(
        minutes in prop::collection::vec(0i64..100, 1..60),
        spread in -2.0..2.0_f64,
    ) {
        let candles: Vec<Candle> = minutes
            .iter()
            .map(|&m| {
                let mut c = candle_at(m, 100.0);
                c.high = 100.0 + spread;
                c.low = 100.0 - spread;
                c
            })
            .collect();
        let series = Series::new("BTC/USDT", Timeframe::ONE_MINUTE, candles);
        let report = Validator::validate_raw(&series);
        if !report.has_errors() {
            for w in series.candles().windows(2) {
                prop_assert!(w[0].open_time < w[1].open_time);
            }
            for c in series.candles() {
                prop_assert!(c.low <= c.high);
            }
        }
    }
}
