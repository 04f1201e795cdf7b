//! Historical collector: turns a page-bounded endpoint into one series.
//!
//! The loop is strictly sequential: the cursor for page N+1 is derived from
//! the last candle of page N, so no two requests are ever in flight.
//!
//! 1. cursor = start
//! 2. fetch a page at the cursor (with retry/backoff on transient failures)
//! 3. stop on an empty page or once the page reaches `end`
//! 4. otherwise cursor = last open time + one step, repeat
//! 5. clip to `[start, end]`, dedupe (last write wins), sort, gap-check

use super::fetcher::RateLimitedFetcher;
use super::provider::{ExchangeClient, FetchError};
use crate::config::{CollectionConfig, PipelineConfig, RetryConfig};
use crate::domain::{Candle, Gap, Series, Timeframe};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CollectError {
    #[error("collection aborted: {reason} ({partial_candles} candles collected so far)")]
    Aborted {
        reason: String,
        partial_candles: usize,
    },

    #[error("no data available for {symbol} between {start} and {end}")]
    NoDataAvailable {
        symbol: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("invalid symbol: {symbol}")]
    InvalidSymbol { symbol: String },

    #[error("malformed exchange response: {0}")]
    MalformedResponse(String),
}

/// Cooperative abort signal, checked between page fetches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Collector metadata reported alongside the series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub requested_start: DateTime<Utc>,
    pub requested_end: DateTime<Utc>,
    pub pages_fetched: usize,
    pub requests_issued: usize,
    pub rows_received: usize,
    /// Rows outside `[start, end]` dropped at page boundaries.
    pub rows_clipped: usize,
    pub duplicates_dropped: usize,
    pub gaps: Vec<Gap>,
    pub missing_candles: u64,
    pub expected_candles: u64,
    /// False when the run was cancelled before the range was exhausted.
    pub complete: bool,
}

impl CollectionReport {
    /// Number of distinct holes in the series.
    pub fn gap_count(&self) -> usize {
        self.gaps.len()
    }

    pub fn missing_fraction(&self) -> f64 {
        if self.expected_candles == 0 {
            0.0
        } else {
            self.missing_candles as f64 / self.expected_candles as f64
        }
    }
}

/// A finalized series together with how it was assembled.
#[derive(Debug, Clone)]
pub struct Collection {
    pub series: Series,
    pub report: CollectionReport,
}

/// Drives a [`RateLimitedFetcher`] across an arbitrary date range.
pub struct HistoricalCollector<'a> {
    fetcher: RateLimitedFetcher<'a>,
    retry: RetryConfig,
    collection: CollectionConfig,
}

impl<'a> HistoricalCollector<'a> {
    pub fn new(client: &'a dyn ExchangeClient, config: &PipelineConfig) -> Self {
        Self {
            fetcher: RateLimitedFetcher::new(
                client,
                config.fetch.min_request_interval(),
                config.fetch.page_size,
            ),
            retry: config.retry.clone(),
            collection: config.collection.clone(),
        }
    }

    pub fn requests_issued(&self) -> usize {
        self.fetcher.requests_issued()
    }

    /// Collect every candle with open time in `[start, end]`.
    pub fn collect(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<Collection, CollectError> {
        if start >= end {
            return Err(CollectError::Aborted {
                reason: format!("start {start} is not before end {end}"),
                partial_candles: 0,
            });
        }

        info!(symbol, %timeframe, %start, %end, "starting collection");

        let step = timeframe.step();
        let mut cursor = start;
        let mut buffer: Vec<Candle> = Vec::new();
        let mut pages = 0usize;
        let mut complete = true;

        loop {
            if cancel.is_cancelled() {
                warn!(symbol, pages, candles = buffer.len(), "collection cancelled");
                complete = false;
                break;
            }

            let page = self.fetch_with_retry(symbol, timeframe, cursor, buffer.len())?;
            let Some(last_time) = page.last().map(|c| c.open_time) else {
                debug!(symbol, %cursor, "empty page, exchange has no more data");
                break;
            };

            pages += 1;
            buffer.extend(page);

            if last_time >= end {
                break;
            }

            let next = last_time + step;
            if next <= cursor {
                return Err(CollectError::Aborted {
                    reason: format!("cursor did not advance past {cursor}"),
                    partial_candles: buffer.len(),
                });
            }
            cursor = next;

            if pages % 10 == 0 {
                info!(pages, candles = buffer.len(), last = %last_time, "collection progress");
            }
        }

        let rows_received = buffer.len();
        buffer.retain(|c| c.open_time >= start && c.open_time <= end);
        let rows_clipped = rows_received - buffer.len();

        let (series, duplicates_dropped) = Series::canonical(symbol, timeframe, buffer);

        if series.is_empty() && complete {
            return Err(CollectError::NoDataAvailable {
                symbol: symbol.to_string(),
                start,
                end,
            });
        }

        let gaps = series.gaps();
        let report = CollectionReport {
            symbol: symbol.to_string(),
            timeframe,
            requested_start: start,
            requested_end: end,
            pages_fetched: pages,
            requests_issued: self.fetcher.requests_issued(),
            rows_received,
            rows_clipped,
            duplicates_dropped,
            missing_candles: gaps.iter().map(|g| g.missing).sum(),
            expected_candles: series.expected_len(),
            gaps,
            complete,
        };

        if !report.gaps.is_empty() {
            warn!(
                symbol,
                gaps = report.gap_count(),
                missing = report.missing_candles,
                fraction = report.missing_fraction(),
                "series has gaps"
            );
        }

        if complete && report.missing_fraction() > self.collection.max_gap_fraction {
            return Err(CollectError::Aborted {
                reason: format!(
                    "{} of {} expected candles missing ({:.4} > {:.4})",
                    report.missing_candles,
                    report.expected_candles,
                    report.missing_fraction(),
                    self.collection.max_gap_fraction
                ),
                partial_candles: series.len(),
            });
        }

        info!(
            symbol,
            candles = series.len(),
            pages,
            clipped = rows_clipped,
            duplicates = duplicates_dropped,
            "collection finished"
        );

        Ok(Collection { series, report })
    }

    /// Fetch one page, retrying transient failures and rate limits at the
    /// same cursor.
    fn fetch_with_retry(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        cursor: DateTime<Utc>,
        collected: usize,
    ) -> Result<Vec<Candle>, CollectError> {
        let limit = self.fetcher.max_page_size();
        let mut failures = 0u32;
        let mut rate_limits = 0u32;

        loop {
            let err = match self.fetcher.fetch_page(symbol, timeframe, cursor, limit) {
                Ok(page) => return Ok(page),
                Err(e) => e,
            };

            let wait = match err {
                FetchError::TransientNetwork(msg) => {
                    failures += 1;
                    if failures >= self.retry.max_consecutive_failures {
                        return Err(CollectError::Aborted {
                            reason: format!(
                                "{failures} consecutive network failures at {cursor}: {msg}"
                            ),
                            partial_candles: collected,
                        });
                    }
                    let wait = self.retry.backoff(failures);
                    warn!(
                        %cursor,
                        attempt = failures,
                        ?wait,
                        error = %msg,
                        "transient fetch failure, backing off"
                    );
                    wait
                }
                FetchError::RateLimited { retry_after } => {
                    // A rate-limit response breaks a run of network failures.
                    failures = 0;
                    rate_limits += 1;
                    if rate_limits > self.retry.max_rate_limit_retries {
                        return Err(CollectError::Aborted {
                            reason: format!("rate limited {rate_limits} times at {cursor}"),
                            partial_candles: collected,
                        });
                    }
                    let wait = retry_after
                        .unwrap_or(Duration::ZERO)
                        .max(self.retry.rate_limit_cooldown());
                    warn!(%cursor, ?wait, "rate limited, cooling down");
                    wait
                }
                FetchError::InvalidSymbol { symbol } => {
                    return Err(CollectError::InvalidSymbol { symbol });
                }
                FetchError::MalformedResponse(msg) => {
                    return Err(CollectError::MalformedResponse(msg));
                }
            };

            std::thread::sleep(wait);
        }
    }
}
