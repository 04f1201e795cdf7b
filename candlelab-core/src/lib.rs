//! CandleLab Core: historical candle collection, indicators and validation.
//!
//! This crate contains:
//! - Domain types (candles, series, timeframes)
//! - Exchange clients and the paginated, rate-limited historical collector
//! - Indicator engine (EMA, MACD, RSI, Bollinger Bands)
//! - Raw and derived validation rules
//! - The end-to-end pipeline, CSV/Parquet export and monthly archiving

pub mod config;
pub mod data;
pub mod domain;
pub mod export;
pub mod indicators;
pub mod monthly;
pub mod pipeline;
pub mod summary;
pub mod validate;

pub use config::{ConfigError, PipelineConfig};
pub use data::{CancelToken, CollectError, ExchangeClient, FetchError, HistoricalCollector};
pub use domain::{Candle, Series, Timeframe};
pub use indicators::{IndicatorEngine, IndicatorFrame};
pub use pipeline::{Pipeline, PipelineError, PipelineOutput, PipelineRequest};
pub use validate::{Severity, ValidationReport, Validator};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: data handed between threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Candle>();
        require_sync::<domain::Candle>();
        require_send::<domain::Series>();
        require_sync::<domain::Series>();
        require_send::<indicators::IndicatorFrame>();
        require_sync::<indicators::IndicatorFrame>();
        require_send::<indicators::IndicatorEngine>();
        require_sync::<indicators::IndicatorEngine>();
        require_send::<validate::ValidationReport>();
        require_sync::<validate::ValidationReport>();
        require_send::<data::CollectionReport>();
        require_sync::<data::CollectionReport>();
        require_send::<data::CancelToken>();
        require_sync::<data::CancelToken>();
        require_send::<data::BinanceClient>();
        require_sync::<data::BinanceClient>();
        require_send::<data::SyntheticExchange>();
        require_sync::<data::SyntheticExchange>();
        require_send::<pipeline::PipelineError>();
        require_sync::<pipeline::PipelineError>();
    }

    /// The collector only sees exchanges through the trait object.
    #[test]
    fn exchange_client_is_object_safe() {
        fn _takes_dyn(client: &dyn ExchangeClient) -> &str {
            client.name()
        }
    }
}
