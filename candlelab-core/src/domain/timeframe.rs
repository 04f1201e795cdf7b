//! Candle timeframe in exchange notation (`1m`, `15m`, `4h`, `1d`, ...).

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported timeframe '{0}' (expected e.g. 1m, 5m, 1h, 1d)")]
pub struct TimeframeError(pub String);

/// Fixed-step candle interval.
///
/// Only fixed-length intervals are supported; calendar months (`1M`) have no
/// constant step and cannot be gap-checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    Minutes(u32),
    Hours(u32),
    Days(u32),
    Weeks(u32),
}

impl Timeframe {
    pub const ONE_MINUTE: Timeframe = Timeframe::Minutes(1);

    /// Distance between consecutive candle open times.
    pub fn step(&self) -> Duration {
        Duration::milliseconds(self.step_millis())
    }

    pub fn step_millis(&self) -> i64 {
        let (n, unit_ms) = match *self {
            Timeframe::Minutes(n) => (n, 60_000),
            Timeframe::Hours(n) => (n, 3_600_000),
            Timeframe::Days(n) => (n, 86_400_000),
            Timeframe::Weeks(n) => (n, 604_800_000),
        };
        i64::from(n) * unit_ms
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TimeframeError(s.to_string());
        let Some(unit_start) = s.char_indices().last().map(|(i, _)| i) else {
            return Err(err());
        };
        let (digits, unit) = s.split_at(unit_start);
        let n: u32 = digits.parse().map_err(|_| err())?;
        if n == 0 {
            return Err(err());
        }
        match unit {
            "m" => Ok(Timeframe::Minutes(n)),
            "h" => Ok(Timeframe::Hours(n)),
            "d" => Ok(Timeframe::Days(n)),
            "w" => Ok(Timeframe::Weeks(n)),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Timeframe::Minutes(n) => write!(f, "{n}m"),
            Timeframe::Hours(n) => write!(f, "{n}h"),
            Timeframe::Days(n) => write!(f, "{n}d"),
            Timeframe::Weeks(n) => write!(f, "{n}w"),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exchange_notation() {
        assert_eq!("1m".parse::<Timeframe>().unwrap(), Timeframe::Minutes(1));
        assert_eq!("15m".parse::<Timeframe>().unwrap(), Timeframe::Minutes(15));
        assert_eq!("4h".parse::<Timeframe>().unwrap(), Timeframe::Hours(4));
        assert_eq!("1d".parse::<Timeframe>().unwrap(), Timeframe::Days(1));
        assert_eq!("1w".parse::<Timeframe>().unwrap(), Timeframe::Weeks(1));
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Timeframe>().is_err());
        assert!("m".parse::<Timeframe>().is_err());
        assert!("0m".parse::<Timeframe>().is_err());
        assert!("1M".parse::<Timeframe>().is_err());
        assert!("abc".parse::<Timeframe>().is_err());
        assert!("1µ".parse::<Timeframe>().is_err());
    }

    #[test]
    fn step_lengths() {
        assert_eq!(Timeframe::ONE_MINUTE.step(), Duration::seconds(60));
        assert_eq!(Timeframe::Hours(4).step_millis(), 4 * 3_600_000);
        assert_eq!(Timeframe::Days(1).step(), Duration::days(1));
    }

    #[test]
    fn display_roundtrips() {
        for s in ["1m", "5m", "1h", "12h", "1d", "1w"] {
            assert_eq!(s.parse::<Timeframe>().unwrap().to_string(), s);
        }
    }
}
