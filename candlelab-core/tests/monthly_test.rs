//! Monthly archiving against the synthetic exchange.

use candlelab_core::config::{PipelineConfig, RetryConfig};
use candlelab_core::data::{CancelToken, SyntheticExchange};
use candlelab_core::domain::Timeframe;
use candlelab_core::export::{read_series_csv, read_series_parquet, ExportFormat};
use candlelab_core::monthly::{MonthlyBatch, YearMonth};
use candlelab_core::pipeline::Pipeline;
use chrono::{TimeZone, Utc};
use tempfile::TempDir;

fn pipeline_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.fetch.min_request_interval_ms = 0;
    config.retry = RetryConfig::immediate();
    config
}

fn exchange() -> SyntheticExchange {
    SyntheticExchange::new(
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
    )
}

fn month(s: &str) -> YearMonth {
    s.parse().unwrap()
}

#[test]
fn writes_csv_and_parquet_per_month() {
    let dir = TempDir::new().unwrap();
    let ex = exchange();
    let pipeline = Pipeline::new(&ex, pipeline_config());
    let batch = MonthlyBatch::new(&pipeline, "BTC/USDT", Timeframe::ONE_MINUTE, dir.path());

    let summary = batch.run(month("2024-02"), month("2024-03"), &CancelToken::new());
    assert_eq!(summary.success_count(), 2);
    assert_eq!(summary.failure_count(), 0);

    let feb = &summary.succeeded[0];
    assert_eq!(feb.candles, 29 * 24 * 60);
    assert_eq!(feb.files.len(), 2);

    let csv_path = dir.path().join("csv/BTC_USDT_2024_02_1m.csv");
    let parquet_path = dir.path().join("parquet/BTC_USDT_2024_02_1m.parquet");
    assert_eq!(batch.file_path(month("2024-02"), ExportFormat::Csv), csv_path);
    assert!(parquet_path.exists());

    let from_csv = read_series_csv(&csv_path, "BTC/USDT", Timeframe::ONE_MINUTE).unwrap();
    let from_parquet =
        read_series_parquet(&parquet_path, "BTC/USDT", Timeframe::ONE_MINUTE).unwrap();
    assert_eq!(from_csv.len(), feb.candles);
    assert_eq!(from_csv.fingerprint(), from_parquet.fingerprint());
}

#[test]
fn failed_month_is_counted_and_batch_continues() {
    let dir = TempDir::new().unwrap();
    let ex = exchange();
    let pipeline = Pipeline::new(&ex, pipeline_config());
    let batch = MonthlyBatch::new(&pipeline, "ETH/USDT", Timeframe::ONE_MINUTE, dir.path())
        .with_formats(true, false);

    // January predates the listing; April is past the live edge.
    let summary = batch.run(month("2024-01"), month("2024-04"), &CancelToken::new());
    assert_eq!(summary.success_count(), 2);
    assert_eq!(summary.failure_count(), 2);
    assert_eq!(summary.failed[0].month, month("2024-01"));
    assert_eq!(summary.failed[1].month, month("2024-04"));
    assert!(!dir.path().join("parquet").exists());
}

#[test]
fn cancelled_batch_stops_early() {
    let dir = TempDir::new().unwrap();
    let ex = exchange();
    let pipeline = Pipeline::new(&ex, pipeline_config());
    let batch = MonthlyBatch::new(&pipeline, "BTC/USDT", Timeframe::ONE_MINUTE, dir.path());

    let cancel = CancelToken::new();
    cancel.cancel();
    let summary = batch.run(month("2024-02"), month("2024-03"), &cancel);
    assert!(summary.cancelled);
    assert_eq!(summary.success_count(), 0);
    assert_eq!(summary.failure_count(), 0);
}
