//! Relative Strength Index (RSI).
//!
//! Uses Wilder smoothing of average gains and average losses.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss)
//! Lookback: period.
//! Edge cases: both averages zero → 0; avg_loss == 0 → 100.

use super::Indicator;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self { period }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        "rsi"
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let n = closes.len();
        let p = self.period;
        let mut result = vec![None; n];

        if n < p + 1 {
            return result;
        }

        // Seed: simple mean of the first `period` deltas.
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 1..=p {
            let ch = closes[i] - closes[i - 1];
            if ch.is_nan() {
                return result;
            }
            if ch > 0.0 {
                avg_gain += ch;
            } else {
                avg_loss -= ch;
            }
        }
        avg_gain /= p as f64;
        avg_loss /= p as f64;
        result[p] = Some(rsi_value(avg_gain, avg_loss));

        let pf = p as f64;
        for i in (p + 1)..n {
            let ch = closes[i] - closes[i - 1];
            if ch.is_nan() {
                return result;
            }
            let gain = ch.max(0.0);
            let loss = (-ch).max(0.0);
            avg_gain = (avg_gain * (pf - 1.0) + gain) / pf;
            avg_loss = (avg_loss * (pf - 1.0) + loss) / pf;
            result[i] = Some(rsi_value(avg_gain, avg_loss));
        }

        result
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        0.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_cell, DEFAULT_EPSILON};

    #[test]
    fn rsi_all_gains() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let result = Rsi::new(14).compute(&closes);
        for cell in &result[14..] {
            assert_cell(*cell, 100.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn rsi_all_losses() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let result = Rsi::new(14).compute(&closes);
        for cell in &result[14..] {
            assert_cell(*cell, 0.0, DEFAULT_EPSILON);
        }
    }

    #[test]
    fn rsi_flat_is_zero() {
        let result = Rsi::new(14).compute(&[50.0; 20]);
        assert_cell(result[14], 0.0, DEFAULT_EPSILON);
        assert_cell(result[19], 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rsi_warmup_is_undefined() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 3) as f64).collect();
        let result = Rsi::new(14).compute(&closes);
        assert!(result[..14].iter().all(|c| c.is_none()));
        assert!(result[14..].iter().all(|c| c.is_some()));
    }

    #[test]
    fn rsi_short_series_all_undefined() {
        let result = Rsi::new(14).compute(&[1.0; 14]);
        assert!(result.iter().all(|c| c.is_none()));
    }

    #[test]
    fn rsi_mixed_known_values() {
        // Closes: 44, 44.34, 44.09, 43.61, 44.33
        // Changes: +0.34, -0.25, -0.48, +0.72
        // period=3 seed: avg_gain = 0.34/3, avg_loss = 0.73/3
        // RSI[3] = 100 - 100/(1 + 0.34/0.73)
        // Wilder step: avg_gain = (0.34/3*2 + 0.72)/3, avg_loss = (0.73/3*2)/3
        let result = Rsi::new(3).compute(&[44.0, 44.34, 44.09, 43.61, 44.33]);
        assert!(result[..3].iter().all(|c| c.is_none()));
        assert_cell(result[3], 100.0 - 100.0 / (1.0 + 0.34 / 0.73), 1e-9);

        let g = (0.34 / 3.0 * 2.0 + 0.72) / 3.0;
        let l = (0.73 / 3.0 * 2.0) / 3.0;
        assert_cell(result[4], 100.0 - 100.0 / (1.0 + g / l), 1e-9);
    }

    #[test]
    fn rsi_bounds() {
        let closes = [100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0];
        let result = Rsi::new(3).compute(&closes);
        for (i, v) in result.iter().enumerate() {
            if let Some(v) = v {
                assert!((0.0..=100.0).contains(v), "RSI out of bounds at {i}: {v}");
            }
        }
    }

    #[test]
    fn rsi_nan_in_seed_window() {
        let result = Rsi::new(3).compute(&[100.0, 101.0, f64::NAN, 103.0, 104.0]);
        assert!(result.iter().all(|c| c.is_none()));
    }

    #[test]
    fn rsi_lookback() {
        assert_eq!(Rsi::new(14).lookback(), 14);
    }
}
