// =============================================================================
// Series Cache — in-process reuse of fetched price series
// =============================================================================
//
// Entries live in memory only and are keyed by (symbol, timeframe). A cache
// hit needs the same key to be requested twice by one process: a symbol
// repeated within a list, or several scans sharing one `CachedFetcher`.
// Each `ema-scanner scan` invocation runs one scan and starts cold.
// =============================================================================

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::{MarketDataFetcher, PriceSeries};
use crate::types::Timeframe;

/// Composite key that identifies a cached series.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
struct SeriesKey {
    symbol: String,
    timeframe: Timeframe,
}

struct CacheEntry {
    series: PriceSeries,
    fetched_at: Instant,
}

/// Thread-safe store of fetched series keyed by `(symbol, timeframe)`.
///
/// An entry is served while younger than the timeframe's
/// [`Timeframe::cache_ttl`], further capped by `max_age` when set.
pub struct SeriesCache {
    entries: RwLock<HashMap<SeriesKey, CacheEntry>>,
    max_age: Option<Duration>,
}

impl SeriesCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_age: None,
        }
    }

    /// Cache whose entries never outlive `max_age`, whatever the timeframe.
    pub fn with_max_age(max_age: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_age: Some(max_age),
        }
    }

    fn ttl(&self, timeframe: Timeframe) -> Duration {
        match self.max_age {
            Some(cap) => cap.min(timeframe.cache_ttl()),
            None => timeframe.cache_ttl(),
        }
    }

    /// Return a fresh copy of the cached series, if any.
    pub fn get(&self, symbol: &str, timeframe: Timeframe) -> Option<PriceSeries> {
        let key = SeriesKey {
            symbol: symbol.to_string(),
            timeframe,
        };
        let ttl = self.ttl(timeframe);
        let map = self.entries.read();
        map.get(&key)
            .filter(|e| e.fetched_at.elapsed() < ttl)
            .map(|e| e.series.clone())
    }

    pub fn insert(&self, series: PriceSeries) {
        let key = SeriesKey {
            symbol: series.symbol.clone(),
            timeframe: series.timeframe,
        };
        self.entries.write().insert(
            key,
            CacheEntry {
                series,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop every entry older than its TTL.
    pub fn purge_expired(&self) {
        let mut map = self.entries.write();
        map.retain(|key, entry| entry.fetched_at.elapsed() < self.ttl(key.timeframe));
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SeriesCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Fetcher wrapper that serves repeated requests from a [`SeriesCache`].
///
/// Only successful fetches are cached, so a failed symbol is retried on the
/// next scan.
pub struct CachedFetcher<F> {
    inner: F,
    cache: SeriesCache,
}

impl<F: MarketDataFetcher> CachedFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self::with_cache(inner, SeriesCache::new())
    }

    pub fn with_cache(inner: F, cache: SeriesCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &SeriesCache {
        &self.cache
    }
}

#[async_trait]
impl<F: MarketDataFetcher> MarketDataFetcher for CachedFetcher<F> {
    async fn fetch(&self, symbol: &str, timeframe: Timeframe) -> anyhow::Result<Option<PriceSeries>> {
        if let Some(series) = self.cache.get(symbol, timeframe) {
            debug!(symbol, timeframe = %timeframe, "series served from cache");
            return Ok(Some(series));
        }
        let Some(series) = self.inner.fetch(symbol, timeframe).await? else {
            return Ok(None);
        };
        self.cache.insert(series.clone());
        Ok(Some(series))
    }
}
