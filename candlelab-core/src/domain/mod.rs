//! Domain types for CandleLab

pub mod candle;
pub mod series;
pub mod timeframe;

pub use candle::Candle;
pub use series::{Gap, Series};
pub use timeframe::{Timeframe, TimeframeError};
