//! Binance spot klines client.
//!
//! Fetches one page of candles from `GET /api/v3/klines`. Each kline is a
//! heterogeneous JSON array (`[open_time, "open", "high", "low", "close",
//! "volume", close_time, ...]`) and is handed upward untouched; typing happens
//! in the fetcher. HTTP failures are classified into the fetch error kinds the
//! collector knows how to retry.

use super::provider::{ExchangeClient, FetchError, RawRow};
use crate::config::ExchangeConfig;
use crate::domain::Timeframe;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Binance caps klines pages at 1000 rows.
pub const BINANCE_MAX_PAGE: usize = 1000;

/// Error code Binance returns for an unknown trading pair.
const INVALID_SYMBOL_CODE: i64 = -1121;

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

pub struct BinanceClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(config: &ExchangeConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("candlelab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                FetchError::TransientNetwork(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `BTC/USDT` → `BTCUSDT`.
    pub fn market_id(symbol: &str) -> String {
        symbol.replace(['/', '-'], "").to_ascii_uppercase()
    }

    fn klines_url(&self) -> String {
        format!("{}/api/v3/klines", self.base_url)
    }

    fn classify_status(
        symbol: &str,
        status: reqwest::StatusCode,
        retry_after: Option<Duration>,
        body: &str,
    ) -> FetchError {
        // 418 is Binance's "IP banned after ignoring 429s".
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            return FetchError::RateLimited { retry_after };
        }

        if status.is_client_error() {
            if let Ok(api) = serde_json::from_str::<ApiError>(body) {
                if api.code == INVALID_SYMBOL_CODE {
                    return FetchError::InvalidSymbol {
                        symbol: symbol.to_string(),
                    };
                }
                return FetchError::MalformedResponse(format!(
                    "HTTP {status} for {symbol}: {} ({})",
                    api.msg, api.code
                ));
            }
            return FetchError::MalformedResponse(format!("HTTP {status} for {symbol}"));
        }

        FetchError::TransientNetwork(format!("HTTP {status} for {symbol}"))
    }
}

impl ExchangeClient for BinanceClient {
    fn name(&self) -> &str {
        "binance"
    }

    fn max_page_size(&self) -> usize {
        BINANCE_MAX_PAGE
    }

    fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<RawRow>, FetchError> {
        let market = Self::market_id(symbol);
        let query = [
            ("symbol", market),
            ("interval", timeframe.to_string()),
            ("startTime", since.timestamp_millis().to_string()),
            ("limit", limit.min(BINANCE_MAX_PAGE).to_string()),
        ];

        let resp = self
            .client
            .get(self.klines_url())
            .query(&query)
            .send()
            .map_err(|e| FetchError::TransientNetwork(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = resp.text().unwrap_or_default();
            return Err(Self::classify_status(symbol, status, retry_after, &body));
        }

        resp.json::<Vec<RawRow>>().map_err(|e| {
            if e.is_decode() {
                FetchError::MalformedResponse(format!("failed to parse klines for {symbol}: {e}"))
            } else {
                FetchError::TransientNetwork(e.to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn market_id_strips_separator() {
        assert_eq!(BinanceClient::market_id("BTC/USDT"), "BTCUSDT");
        assert_eq!(BinanceClient::market_id("eth-usdt"), "ETHUSDT");
    }

    #[test]
    fn too_many_requests_is_rate_limited() {
        let err = BinanceClient::classify_status(
            "BTC/USDT",
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(7)),
            "",
        );
        assert_eq!(
            err,
            FetchError::RateLimited {
                retry_after: Some(Duration::from_secs(7))
            }
        );
    }

    #[test]
    fn ip_ban_is_rate_limited() {
        let status = StatusCode::from_u16(418).unwrap();
        let err = BinanceClient::classify_status("BTC/USDT", status, None, "");
        assert!(matches!(err, FetchError::RateLimited { .. }));
    }

    #[test]
    fn invalid_symbol_code_maps_to_invalid_symbol() {
        let body = r#"{"code":-1121,"msg":"Invalid symbol."}"#;
        let err = BinanceClient::classify_status("NOPE/USDT", StatusCode::BAD_REQUEST, None, body);
        assert_eq!(
            err,
            FetchError::InvalidSymbol {
                symbol: "NOPE/USDT".into()
            }
        );
    }

    #[test]
    fn server_errors_are_transient() {
        let err = BinanceClient::classify_status(
            "BTC/USDT",
            StatusCode::BAD_GATEWAY,
            None,
            "<html>bad gateway</html>",
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn other_client_errors_are_not_retried() {
        let body = r#"{"code":-1100,"msg":"Illegal characters found in parameter."}"#;
        let err = BinanceClient::classify_status("BTC/USDT", StatusCode::BAD_REQUEST, None, body);
        assert!(!err.is_retryable());
    }

    #[test]
    fn base_url_is_normalized() {
        let config = ExchangeConfig {
            base_url: "https://api.binance.com/".into(),
            timeout_secs: 5,
        };
        let client = BinanceClient::new(&config).unwrap();
        assert_eq!(client.klines_url(), "https://api.binance.com/api/v3/klines");
    }
}
