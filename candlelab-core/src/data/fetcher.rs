//! Rate-limited page fetcher.
//!
//! Issues one bounded page request at a time and keeps consecutive requests
//! at least `min_interval` apart. Retrying is the collector's job; this layer
//! only throttles, clamps the page size and converts rows to candles.

use super::provider::{parse_rows, ExchangeClient, FetchError};
use crate::domain::{Candle, Timeframe};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};
use tracing::debug;

/// Minimum-spacing throttle for outgoing requests.
///
/// Owned by a single fetcher. Concurrent pipelines each hold their own
/// throttle, or share one explicitly behind a lock.
#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RequestThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time left before the next request may be issued.
    pub fn remaining(&self) -> Duration {
        match self.last_request {
            None => Duration::ZERO,
            Some(at) => self.min_interval.saturating_sub(at.elapsed()),
        }
    }

    /// Block until the next request may be issued, then mark it as issued.
    pub fn acquire(&mut self) {
        let wait = self.remaining();
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        self.last_request = Some(Instant::now());
    }
}

/// Fetches single pages of candles through an exchange client.
pub struct RateLimitedFetcher<'a> {
    client: &'a dyn ExchangeClient,
    throttle: RequestThrottle,
    max_page_size: usize,
    requests_issued: usize,
}

impl<'a> RateLimitedFetcher<'a> {
    /// `max_page_size` is further capped by the client's own maximum.
    pub fn new(
        client: &'a dyn ExchangeClient,
        min_interval: Duration,
        max_page_size: usize,
    ) -> Self {
        let max_page_size = max_page_size.clamp(1, client.max_page_size().max(1));
        Self {
            client,
            throttle: RequestThrottle::new(min_interval),
            max_page_size,
            requests_issued: 0,
        }
    }

    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    /// Number of requests sent to the exchange so far, failed ones included.
    pub fn requests_issued(&self) -> usize {
        self.requests_issued
    }

    /// Fetch one page of candles with open time at or after `since`.
    ///
    /// `limit` is clamped into `1..=max_page_size`. Rows come back in exchange
    /// order; no sorting or clipping happens here.
    pub fn fetch_page(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Candle>, FetchError> {
        let limit = limit.clamp(1, self.max_page_size);
        self.throttle.acquire();
        self.requests_issued += 1;

        debug!(
            exchange = self.client.name(),
            symbol,
            %timeframe,
            %since,
            limit,
            "fetching page"
        );
        let rows = self.client.fetch_ohlcv(symbol, timeframe, since, limit)?;
        parse_rows(&rows)
    }
}
