//! Bollinger Bands: moving average +/- standard deviation multiplier.
//!
//! Three bands (separate Indicator instances):
//! - Middle: SMA(close, period)
//! - Upper: middle + mult * stddev(close, period)
//! - Lower: middle - mult * stddev(close, period)
//!
//! Uses population stddev (divide by N).
//! Lookback: period - 1.

use super::Indicator;

/// Which band of the Bollinger Bands to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            multiplier,
            band,
        }
    }

    pub fn upper(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Upper)
    }

    pub fn middle(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Middle)
    }

    pub fn lower(period: usize, multiplier: f64) -> Self {
        Self::new(period, multiplier, BollingerBand::Lower)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        match self.band {
            BollingerBand::Upper => "bb_upper",
            BollingerBand::Middle => "bb_middle",
            BollingerBand::Lower => "bb_lower",
        }
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let n = closes.len();
        let mut result = vec![None; n];

        if n < self.period {
            return result;
        }

        let pf = self.period as f64;
        for i in (self.period - 1)..n {
            let window = &closes[i + 1 - self.period..=i];
            if window.iter().any(|c| c.is_nan()) {
                continue;
            }

            let mean = window.iter().sum::<f64>() / pf;
            result[i] = Some(match self.band {
                BollingerBand::Middle => mean,
                BollingerBand::Upper | BollingerBand::Lower => {
                    let variance = window.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / pf;
                    let width = self.multiplier * variance.sqrt();
                    if self.band == BollingerBand::Upper {
                        mean + width
                    } else {
                        mean - width
                    }
                }
            });
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, assert_cell, DEFAULT_EPSILON};

    #[test]
    fn bollinger_middle_is_sma() {
        let result = Bollinger::middle(3, 2.0).compute(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert!(result[0].is_none());
        assert!(result[1].is_none());
        assert_cell(result[2], 11.0, DEFAULT_EPSILON);
        assert_cell(result[3], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_population_stddev() {
        // window 2,4,4,4,5,5,7,9: mean 5, population stddev 2
        let closes = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_cell(Bollinger::upper(8, 2.0).compute(&closes)[7], 9.0, DEFAULT_EPSILON);
        assert_cell(Bollinger::lower(8, 2.0).compute(&closes)[7], 1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_bands_symmetric() {
        let closes = [10.0, 11.0, 12.0, 13.0, 14.0];
        let upper = Bollinger::upper(3, 2.0).compute(&closes);
        let middle = Bollinger::middle(3, 2.0).compute(&closes);
        let lower = Bollinger::lower(3, 2.0).compute(&closes);

        for i in 2..5 {
            let (u, m, l) = (upper[i].unwrap(), middle[i].unwrap(), lower[i].unwrap());
            assert_approx(m - l, u - m, DEFAULT_EPSILON);
            assert!(l <= m && m <= u);
        }
    }

    #[test]
    fn bollinger_constant_price_zero_width() {
        let closes = [100.0; 25];
        let upper = Bollinger::upper(20, 2.0).compute(&closes);
        let lower = Bollinger::lower(20, 2.0).compute(&closes);
        assert!(upper[18].is_none());
        assert_cell(upper[19], 100.0, DEFAULT_EPSILON);
        assert_cell(lower[24], 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_nan_only_taints_its_windows() {
        let closes = [10.0, 11.0, f64::NAN, 13.0, 14.0, 15.0, 16.0];
        let result = Bollinger::middle(3, 2.0).compute(&closes);
        assert!(result[2].is_none());
        assert!(result[4].is_none()); // window includes index 2
        assert_cell(result[5], 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_lookback() {
        assert_eq!(Bollinger::upper(20, 2.0).lookback(), 19);
    }
}
