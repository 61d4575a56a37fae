// =============================================================================
// Market Data — price series and the provider seam
// =============================================================================

pub mod cache;
pub mod yahoo;

pub use cache::{CachedFetcher, SeriesCache};
pub use yahoo::YahooClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::Timeframe;

/// Bars required before any EMA computation is trusted.
pub const MIN_BARS: usize = 200;

/// A single OHLCV bar. `timestamp` is the bar open in UNIX seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Time-ascending bars for one symbol on one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Build a series, sorting bars by timestamp.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        Self {
            symbol: symbol.into(),
            timeframe,
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Close prices in time order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    /// Whether the series is long enough for the 200-span EMA.
    pub fn has_min_history(&self) -> bool {
        self.len() >= MIN_BARS
    }
}

/// Source of historical price series.
///
/// `Err` is a transport or decoding failure; `Ok(None)` means the provider
/// had no usable series (unknown symbol, short history). The scanner skips
/// the instrument either way.
#[async_trait]
pub trait MarketDataFetcher: Send + Sync {
    async fn fetch(&self, symbol: &str, timeframe: Timeframe) -> anyhow::Result<Option<PriceSeries>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(ts: i64, close: f64) -> PriceBar {
        PriceBar {
            timestamp: ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }

    #[test]
    fn new_sorts_bars_ascending() {
        let series = PriceSeries::new("AAPL", Timeframe::Daily, vec![bar(3, 3.0), bar(1, 1.0), bar(2, 2.0)]);
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
        assert_eq!(series.last_close(), Some(3.0));
    }

    #[test]
    fn min_history_threshold() {
        let short: Vec<PriceBar> = (0..199).map(|i| bar(i, 1.0)).collect();
        assert!(!PriceSeries::new("X", Timeframe::Daily, short).has_min_history());
        let enough: Vec<PriceBar> = (0..200).map(|i| bar(i, 1.0)).collect();
        assert!(PriceSeries::new("X", Timeframe::Daily, enough).has_min_history());
    }
}
