// =============================================================================
// Alignment Scanner — batch scan over an instrument list
// =============================================================================
//
// For each instrument, in input order:
//   fetch series → (skip if absent or < 200 bars) → EMA 20/50/100/200 →
//   classify the latest bar → keep Bullish / Bearish rows.
//
// Fetches run through a bounded pool (`concurrency`, 1 = sequential). The pool
// yields completions in input order, so rows and progress both follow the
// input regardless of which fetch finishes first.
//
// Failures are absorbed per instrument and only show up as the gap between
// `visited_count` and `processed_count`. Series with a non-finite close are
// skipped, never classified. Cancellation stops new dispatches; fetches
// already in flight drain and their rows are kept, and the instruments never
// dispatched are counted separately from failures.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::alignment::{Classification, EmaSnapshot};
use crate::indicators::ema::compute_emas;
use crate::instrument::Instrument;
use crate::market_data::MarketDataFetcher;
use crate::types::{Market, Timeframe};

// =============================================================================
// Request / progress
// =============================================================================

/// Everything one scan needs. Replaces any notion of ambient session state.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub market: Market,
    pub timeframe: Timeframe,
    pub instruments: Vec<Instrument>,
    /// Maximum fetches in flight at once. Values below 1 are treated as 1.
    pub concurrency: usize,
}

impl ScanRequest {
    pub fn new(market: Market, timeframe: Timeframe, instruments: Vec<Instrument>) -> Self {
        Self {
            market,
            timeframe,
            instruments,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// What happened to one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentOutcome {
    /// Data was missing, failed to load, was too short or not finite.
    Skipped,
    Evaluated(Classification),
}

/// Emitted once per instrument, after its work has completed.
#[derive(Debug, Clone)]
pub struct ScanProgress<'a> {
    /// 1-based position in the input list.
    pub current: usize,
    pub total: usize,
    pub instrument: &'a Instrument,
    pub outcome: InstrumentOutcome,
}

impl ScanProgress<'_> {
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}

/// Shared flag that asks a running scan to stop dispatching.
#[derive(Debug, Clone, Default)]
pub struct ScanCancel(Arc<AtomicBool>);

impl ScanCancel {
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

// =============================================================================
// Results
// =============================================================================

/// One aligned instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub display_symbol: String,
    pub display_name: String,
    pub classification: Classification,
    /// Provider symbol, kept for re-querying.
    pub original_symbol: String,
}

impl ScanResult {
    pub fn new(instrument: &Instrument, classification: Classification) -> Self {
        Self {
            display_symbol: instrument.display_symbol(),
            display_name: instrument.display_name.clone(),
            classification,
            original_symbol: instrument.symbol.clone(),
        }
    }

    pub fn status_glyph(&self) -> &'static str {
        self.classification.glyph().unwrap_or("")
    }
}

/// Outcome of one scan. Replaced wholesale by the next scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub rows: Vec<ScanResult>,
    pub requested_count: usize,
    /// Instruments dispatched before the scan finished or was cancelled.
    pub visited_count: usize,
    pub processed_count: usize,
    pub timestamp: DateTime<Utc>,
    pub market: Market,
    pub timeframe: Timeframe,
    pub timeframe_label: String,
    /// Set when the scan stopped before visiting every instrument.
    pub cancelled: bool,
}

impl ScanReport {
    fn empty(request: &ScanRequest) -> Self {
        Self {
            rows: Vec::new(),
            requested_count: request.instruments.len(),
            visited_count: 0,
            processed_count: 0,
            timestamp: Utc::now(),
            market: request.market,
            timeframe: request.timeframe,
            timeframe_label: request.timeframe.label().to_string(),
            cancelled: false,
        }
    }

    /// Visited instruments whose data could not be retrieved or was unusable.
    pub fn unprocessed_count(&self) -> usize {
        self.visited_count - self.processed_count
    }

    pub fn unprocessed_note(&self) -> Option<String> {
        match self.unprocessed_count() {
            0 => None,
            n => Some(format!("Data for {n} instruments could not be retrieved or processed.")),
        }
    }

    /// Instruments never dispatched because the scan was cancelled.
    pub fn unscanned_count(&self) -> usize {
        self.requested_count - self.visited_count
    }

    pub fn unscanned_note(&self) -> Option<String> {
        match self.unscanned_count() {
            0 => None,
            n => Some(format!("{n} instruments not scanned (cancelled).")),
        }
    }

    pub fn bullish(&self) -> Vec<&ScanResult> {
        self.with_classification(Classification::Bullish)
    }

    pub fn bearish(&self) -> Vec<&ScanResult> {
        self.with_classification(Classification::Bearish)
    }

    fn with_classification(&self, classification: Classification) -> Vec<&ScanResult> {
        self.rows
            .iter()
            .filter(|r| r.classification == classification)
            .collect()
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Last scan: {} | Market: {} | Timeframe: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.market,
            self.timeframe_label
        )
    }
}

// =============================================================================
// Scan
// =============================================================================

/// Scan `request.instruments` for perfect EMA alignment.
///
/// `on_progress` is called once per visited instrument, in input order.
pub async fn scan<F, P>(
    request: &ScanRequest,
    fetcher: &F,
    cancel: &ScanCancel,
    mut on_progress: P,
) -> ScanReport
where
    F: MarketDataFetcher + ?Sized,
    P: FnMut(&ScanProgress<'_>),
{
    let mut report = ScanReport::empty(request);
    let total = request.instruments.len();
    let timeframe = request.timeframe;
    let workers = request.concurrency.max(1);

    info!(
        market = %request.market,
        timeframe = %timeframe,
        total,
        workers,
        "EMA alignment scan starting"
    );

    let mut completed = stream::iter(request.instruments.iter())
        .take_while(|_| future::ready(!cancel.is_cancelled()))
        .map(move |instrument| async move {
            let outcome = evaluate(fetcher, instrument, timeframe).await;
            (instrument, outcome)
        })
        .buffered(workers);

    while let Some((instrument, outcome)) = completed.next().await {
        report.visited_count += 1;

        match outcome {
            InstrumentOutcome::Skipped => {
                debug!(symbol = %instrument.symbol, "instrument skipped");
            }
            InstrumentOutcome::Evaluated(classification) => {
                report.processed_count += 1;
                if classification.is_aligned() {
                    report.rows.push(ScanResult::new(instrument, classification));
                }
            }
        }

        on_progress(&ScanProgress {
            current: report.visited_count,
            total,
            instrument,
            outcome,
        });
    }

    report.cancelled = report.visited_count < total;
    if report.cancelled {
        warn!(
            visited = report.visited_count,
            unscanned = report.unscanned_count(),
            total,
            "scan cancelled before completion"
        );
    }
    if let Some(note) = report.unprocessed_note() {
        info!(unprocessed = report.unprocessed_count(), "{note}");
    }
    info!(
        processed = report.processed_count,
        matches = report.rows.len(),
        "EMA alignment scan complete"
    );

    report
}

/// Fetch, compute and classify a single instrument.
async fn evaluate<F>(fetcher: &F, instrument: &Instrument, timeframe: Timeframe) -> InstrumentOutcome
where
    F: MarketDataFetcher + ?Sized,
{
    let series = match fetcher.fetch(&instrument.symbol, timeframe).await {
        Ok(Some(series)) => series,
        Ok(None) => return InstrumentOutcome::Skipped,
        Err(e) => {
            warn!(symbol = %instrument.symbol, error = %e, "price fetch failed");
            return InstrumentOutcome::Skipped;
        }
    };
    if !series.has_min_history() {
        return InstrumentOutcome::Skipped;
    }

    let closes = series.closes();
    if closes.iter().any(|c| !c.is_finite()) {
        debug!(symbol = %instrument.symbol, "non-finite close in series");
        return InstrumentOutcome::Skipped;
    }
    let Some(close) = series.last_close() else {
        return InstrumentOutcome::Skipped;
    };

    let emas = compute_emas(&closes);
    match EmaSnapshot::latest(close, &emas) {
        Some(snapshot) if snapshot.is_finite() => InstrumentOutcome::Evaluated(snapshot.classify()),
        _ => InstrumentOutcome::Skipped,
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::{PriceBar, PriceSeries};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    /// In-memory fetcher serving canned close sequences, with optional delays.
    #[derive(Default)]
    struct StubFetcher {
        closes: HashMap<String, Vec<f64>>,
        delays_ms: HashMap<String, u64>,
        failing: Vec<String>,
    }

    impl StubFetcher {
        fn with(mut self, symbol: &str, closes: Vec<f64>) -> Self {
            self.closes.insert(symbol.to_string(), closes);
            self
        }

        fn delayed(mut self, symbol: &str, ms: u64) -> Self {
            self.delays_ms.insert(symbol.to_string(), ms);
            self
        }

        fn failing(mut self, symbol: &str) -> Self {
            self.failing.push(symbol.to_string());
            self
        }
    }

    #[async_trait]
    impl MarketDataFetcher for StubFetcher {
        async fn fetch(&self, symbol: &str, timeframe: Timeframe) -> anyhow::Result<Option<PriceSeries>> {
            if let Some(ms) = self.delays_ms.get(symbol) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
            if self.failing.iter().any(|s| s == symbol) {
                anyhow::bail!("connection reset fetching {symbol}");
            }
            let Some(closes) = self.closes.get(symbol) else {
                return Ok(None);
            };
            let bars = closes
                .iter()
                .enumerate()
                .map(|(i, &c)| PriceBar {
                    timestamp: i as i64,
                    open: c,
                    high: c,
                    low: c,
                    close: c,
                    volume: 1.0,
                })
                .collect();
            Ok(Some(PriceSeries::new(symbol, timeframe, bars)))
        }
    }

    fn rising(n: usize) -> Vec<f64> {
        (1..=n).map(|x| x as f64).collect()
    }

    fn falling(n: usize) -> Vec<f64> {
        (1..=n).rev().map(|x| x as f64).collect()
    }

    fn inst(symbol: &str) -> Instrument {
        Instrument::new(symbol, &format!("{symbol} Corp")).unwrap()
    }

    fn request(symbols: &[&str]) -> ScanRequest {
        ScanRequest::new(
            Market::Us,
            Timeframe::Daily,
            symbols.iter().map(|s| inst(s)).collect(),
        )
    }

    #[tokio::test]
    async fn empty_list_yields_empty_report() {
        let report = scan(&request(&[]), &StubFetcher::default(), &ScanCancel::new(), |_| {}).await;
        assert!(report.rows.is_empty());
        assert_eq!(report.requested_count, 0);
        assert_eq!(report.processed_count, 0);
        assert!(!report.cancelled);
        assert!(report.unprocessed_note().is_none());
    }

    #[tokio::test]
    async fn classifies_and_filters_rows() {
        let fetcher = StubFetcher::default()
            .with("UP", rising(300))
            .with("DOWN", falling(300))
            .with("FLAT", vec![50.0; 300]);
        let report = scan(&request(&["UP", "FLAT", "DOWN"]), &fetcher, &ScanCancel::new(), |_| {}).await;

        assert_eq!(report.processed_count, 3);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].display_symbol, "UP");
        assert_eq!(report.rows[0].classification, Classification::Bullish);
        assert_eq!(report.rows[1].display_symbol, "DOWN");
        assert_eq!(report.rows[1].classification, Classification::Bearish);
        assert_eq!(report.bullish().len(), 1);
        assert_eq!(report.bearish().len(), 1);
        assert_eq!(report.rows[0].status_glyph(), "🟢");
    }

    #[tokio::test]
    async fn failed_and_short_series_are_unprocessed() {
        let fetcher = StubFetcher::default()
            .with("UP", rising(300))
            .with("SHORT", rising(199))
            .failing("DOWN");
        let report = scan(
            &request(&["UP", "MISSING", "SHORT", "DOWN"]),
            &fetcher,
            &ScanCancel::new(),
            |_| {},
        )
        .await;

        assert_eq!(report.requested_count, 4);
        assert_eq!(report.visited_count, 4);
        assert_eq!(report.processed_count, 1);
        assert!(report.rows.len() <= report.processed_count);
        assert_eq!(report.unprocessed_count(), 3);
        assert_eq!(
            report.unprocessed_note().unwrap(),
            "Data for 3 instruments could not be retrieved or processed."
        );
        assert!(report.unscanned_note().is_none());
    }

    #[tokio::test]
    async fn non_finite_closes_are_skipped() {
        let mut last_nan = rising(300);
        last_nan[299] = f64::NAN;
        let mut mid_inf = rising(300);
        mid_inf[150] = f64::INFINITY;
        let fetcher = StubFetcher::default()
            .with("NAN", last_nan)
            .with("INF", mid_inf)
            .with("UP", rising(300));
        let mut outcomes = Vec::new();
        let report = scan(&request(&["NAN", "INF", "UP"]), &fetcher, &ScanCancel::new(), |p| {
            outcomes.push(p.outcome)
        })
        .await;

        assert_eq!(outcomes[0], InstrumentOutcome::Skipped);
        assert_eq!(outcomes[1], InstrumentOutcome::Skipped);
        assert_eq!(report.processed_count, 1);
        assert_eq!(report.unprocessed_count(), 2);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].original_symbol, "UP");
    }

    #[tokio::test]
    async fn exactly_min_bars_is_processed() {
        let fetcher = StubFetcher::default().with("UP", rising(200));
        let report = scan(&request(&["UP"]), &fetcher, &ScanCancel::new(), |_| {}).await;
        assert_eq!(report.processed_count, 1);
    }

    #[tokio::test]
    async fn progress_reported_for_every_instrument() {
        let fetcher = StubFetcher::default().with("A", rising(300));
        let mut seen = Vec::new();
        let report = scan(&request(&["A", "B", "C"]), &fetcher, &ScanCancel::new(), |p| {
            seen.push((p.current, p.total, p.instrument.symbol.clone(), p.outcome));
        })
        .await;

        assert_eq!(report.processed_count, 1);
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], (1, 3, "A".to_string(), InstrumentOutcome::Evaluated(Classification::Bullish)));
        assert_eq!(seen[1].3, InstrumentOutcome::Skipped);
        assert_eq!(seen[2].0, 3);
    }

    #[tokio::test]
    async fn concurrent_scan_preserves_input_order() {
        // First instrument is slowest, so it completes last.
        let fetcher = StubFetcher::default()
            .with("A", rising(300))
            .with("B", falling(300))
            .with("C", rising(300))
            .delayed("A", 60)
            .delayed("B", 30);
        let req = request(&["A", "B", "C"]).with_concurrency(3);

        let mut progress = Vec::new();
        let report = scan(&req, &fetcher, &ScanCancel::new(), |p| progress.push(p.current)).await;

        let symbols: Vec<&str> = report.rows.iter().map(|r| r.original_symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B", "C"]);
        assert_eq!(progress, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn cancel_stops_dispatch_and_keeps_partial_rows() {
        let fetcher = StubFetcher::default()
            .with("A", rising(300))
            .with("B", rising(300))
            .with("C", rising(300));
        let cancel = ScanCancel::new();
        let trigger = cancel.clone();
        let report = scan(&request(&["A", "B", "C"]), &fetcher, &cancel, |p| {
            if p.current == 1 {
                trigger.cancel();
            }
        })
        .await;

        assert!(report.cancelled);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].original_symbol, "A");
        assert_eq!(report.requested_count, 3);
    }

    #[tokio::test]
    async fn cancelled_instruments_are_not_reported_as_failures() {
        let fetcher = StubFetcher::default()
            .with("A", rising(300))
            .with("B", rising(300))
            .with("C", rising(300))
            .with("D", rising(300));
        let cancel = ScanCancel::new();
        let trigger = cancel.clone();
        let report = scan(&request(&["A", "B", "C", "D"]), &fetcher, &cancel, |p| {
            if p.current == 1 {
                trigger.cancel();
            }
        })
        .await;

        assert!(report.cancelled);
        assert_eq!(report.visited_count, 1);
        assert_eq!(report.processed_count, 1);
        assert_eq!(report.unprocessed_count(), 0);
        assert!(report.unprocessed_note().is_none());
        assert_eq!(report.unscanned_count(), 3);
        assert_eq!(report.unscanned_note().unwrap(), "3 instruments not scanned (cancelled).");
    }

    #[tokio::test]
    async fn display_symbol_strips_exchange_suffix() {
        let fetcher = StubFetcher::default().with("INFY.NS", rising(300));
        let req = ScanRequest::new(
            Market::India,
            Timeframe::Hourly,
            vec![Instrument::for_market("INFY", "Infosys", Market::India).unwrap()],
        );
        let report = scan(&req, &fetcher, &ScanCancel::new(), |_| {}).await;

        assert_eq!(report.rows[0].display_symbol, "INFY");
        assert_eq!(report.rows[0].original_symbol, "INFY.NS");
        assert_eq!(report.timeframe_label, "Hourly");
        assert!(report.summary_line().contains("Market: India | Timeframe: Hourly"));
    }

    #[test]
    fn progress_fraction() {
        let i = inst("A");
        let p = ScanProgress {
            current: 1,
            total: 4,
            instrument: &i,
            outcome: InstrumentOutcome::Skipped,
        };
        assert!((p.fraction() - 0.25).abs() < f64::EPSILON);
    }
}
