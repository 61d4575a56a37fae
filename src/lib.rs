// =============================================================================
// EMA Alignment Scanner — library root
// =============================================================================
//
// Scans a list of instruments, computes EMA 20/50/100/200 on each price
// series and reports the ones in perfect bullish or bearish alignment.
// =============================================================================

pub mod alignment;
pub mod error;
pub mod export;
pub mod indicators;
pub mod instrument;
pub mod instrument_source;
pub mod market_data;
pub mod runtime_config;
pub mod scanner;
pub mod types;

pub use alignment::{classify, Classification, EmaSnapshot};
pub use error::{Result, ScannerError};
pub use instrument::Instrument;
pub use market_data::{MarketDataFetcher, PriceBar, PriceSeries};
pub use scanner::{scan, ScanCancel, ScanProgress, ScanReport, ScanRequest, ScanResult};
pub use types::{Market, Timeframe};
