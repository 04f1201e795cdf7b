//! Exchange client trait, structured fetch errors and the row adapter.
//!
//! The `ExchangeClient` trait abstracts over candle sources (Binance REST,
//! the offline synthetic exchange, scripted mocks in tests). Clients return
//! rows in the loosely typed shape exchanges use on the wire; [`parse_row`]
//! is the only place those rows are turned into [`Candle`]s.

use crate::domain::{Candle, Timeframe};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// One untyped OHLCV row: `[open_time_ms, open, high, low, close, volume, ...]`.
///
/// Prices may arrive as JSON numbers or as numeric strings; trailing
/// exchange-specific fields are ignored.
pub type RawRow = Vec<Value>;

/// Structured error types for a single page request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("invalid symbol: {symbol}")]
    InvalidSymbol { symbol: String },

    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("rate limited by exchange (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("malformed exchange response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Whether the collector may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::TransientNetwork(_) | FetchError::RateLimited { .. }
        )
    }
}

/// Trait for exchange clients exposing a page-bounded OHLCV endpoint.
///
/// Implementations do no throttling or retrying; both belong to the layers
/// above.
pub trait ExchangeClient: Send + Sync {
    /// Human-readable name of this exchange.
    fn name(&self) -> &str;

    /// Largest page the endpoint will return.
    fn max_page_size(&self) -> usize;

    /// Fetch up to `limit` rows with open time at or after `since`.
    fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RawRow>, FetchError>;
}

/// Map one raw row to a typed candle.
///
/// A missing or null price/volume becomes NaN so the validator can report it;
/// a missing or unparsable open time fails the row outright.
pub fn parse_row(row: &[Value]) -> Result<Candle, FetchError> {
    let ts = row
        .first()
        .and_then(as_i64)
        .ok_or_else(|| FetchError::MalformedResponse(format!("row without open time: {row:?}")))?;
    let open_time = Utc
        .timestamp_millis_opt(ts)
        .single()
        .ok_or_else(|| FetchError::MalformedResponse(format!("invalid open time: {ts}")))?;

    let field = |i: usize| -> Result<f64, FetchError> {
        match row.get(i) {
            None | Some(Value::Null) => Ok(f64::NAN),
            Some(v) => as_f64(v).ok_or_else(|| {
                FetchError::MalformedResponse(format!("non-numeric field {i}: {v}"))
            }),
        }
    };

    Ok(Candle {
        open_time,
        open: field(1)?,
        high: field(2)?,
        low: field(3)?,
        close: field(4)?,
        volume: field(5)?,
    })
}

/// Map a whole page, preserving exchange order.
pub fn parse_rows(rows: &[RawRow]) -> Result<Vec<Candle>, FetchError> {
    rows.iter().map(|r| parse_row(r)).collect()
}

fn as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
