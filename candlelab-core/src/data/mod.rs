//! Exchange access and historical collection

pub mod binance;
pub mod collector;
pub mod fetcher;
pub mod provider;
pub mod synthetic;

pub use binance::BinanceClient;
pub use collector::{CancelToken, CollectError, Collection, CollectionReport, HistoricalCollector};
pub use fetcher::{RateLimitedFetcher, RequestThrottle};
pub use provider::{parse_row, parse_rows, ExchangeClient, FetchError, RawRow};
pub use synthetic::SyntheticExchange;
