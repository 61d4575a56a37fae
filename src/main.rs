// =============================================================================
// EMA Alignment Scanner — Main Entry Point
// =============================================================================
//
// Config precedence: CLI flags > EMA_SCANNER_* env vars > config file >
// built-in defaults. Ctrl+C stops dispatching new fetches; whatever finished
// is still reported and exported.
// =============================================================================

mod cli;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ema_scanner::export::{self, ALL_RESULTS_PREFIX, BEARISH_PREFIX, BULLISH_PREFIX};
use ema_scanner::instrument_source::{self, InstrumentList};
use ema_scanner::market_data::{CachedFetcher, MarketDataFetcher, YahooClient};
use ema_scanner::runtime_config::ScannerConfig;
use ema_scanner::{scan, Market, ScanCancel, ScanReport, ScanRequest, ScanResult};

use crate::cli::{Cli, Command, ScanArgs, SourceArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ScannerConfig::load(&cli.config).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        ScannerConfig::default()
    });
    config.apply_env();

    match cli.command {
        Command::Scan(args) => run_scan(config, args).await,
        Command::List(args) => run_list(config, args),
    }
}

// =============================================================================
// Instrument list resolution
// =============================================================================

fn resolve_instruments(config: &ScannerConfig, args: &SourceArgs) -> Result<(Market, InstrumentList)> {
    let market = args.market.unwrap_or(config.market);
    let limits = config.source_limits();

    let list = match &args.list {
        // A user-supplied list is an input error if it cannot be read.
        Some(path) => instrument_source::load_instrument_file(path, market, limits)
            .with_context(|| format!("failed to load instrument list {}", path.display()))?,
        None => instrument_source::load_market_list(market, config.list_path(market), limits),
    };

    if list.dropped > 0 {
        warn!(dropped = list.dropped, "invalid instrument rows dropped");
    }
    Ok((market, list))
}

fn run_list(config: ScannerConfig, args: SourceArgs) -> Result<()> {
    let (market, list) = resolve_instruments(&config, &args)?;
    println!("{} instruments ({market})", list.len());
    for instrument in &list.instruments {
        println!("{:<20} {}", instrument.symbol, instrument.display_name);
    }
    if list.truncated {
        println!("List limited to {} instruments", config.max_instruments);
    }
    Ok(())
}

// =============================================================================
// Scan
// =============================================================================

async fn run_scan(mut config: ScannerConfig, args: ScanArgs) -> Result<()> {
    if let Some(timeframe) = args.timeframe {
        config.timeframe = timeframe;
    }
    if let Some(n) = args.concurrency {
        config.concurrency = n.max(1);
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if args.no_cache {
        config.cache_enabled = false;
    }

    let (market, list) = resolve_instruments(&config, &args.source)?;
    let request = ScanRequest::new(market, config.timeframe, list.instruments)
        .with_concurrency(config.concurrency);

    let client = YahooClient::new(config.request_timeout());
    let fetcher: Arc<dyn MarketDataFetcher> = if config.cache_enabled {
        Arc::new(CachedFetcher::new(client))
    } else {
        Arc::new(client)
    };

    let cancel = ScanCancel::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight fetches");
            on_ctrl_c.cancel();
        }
    });

    let report = scan(&request, fetcher.as_ref(), &cancel, |p| {
        info!(
            current = p.current,
            total = p.total,
            symbol = %p.instrument.symbol,
            name = %p.instrument.display_name,
            "Scanning {} instruments: {}/{}",
            market,
            p.current,
            p.total
        );
    })
    .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    write_exports(&report, &config.output_dir, args.split)
}

fn print_report(report: &ScanReport) {
    println!("{}", report.summary_line());
    if let Some(note) = report.unprocessed_note() {
        println!("Note: {note}");
    }
    if let Some(note) = report.unscanned_note() {
        println!("Note: {note}");
    }
    if report.rows.is_empty() {
        println!("No instruments found with perfect EMA alignment.");
        return;
    }

    let bullish = report.bullish();
    let bearish = report.bearish();
    print_section(&format!("Bullish ({})", bullish.len()), &bullish);
    print_section(&format!("Bearish ({})", bearish.len()), &bearish);
}

fn print_section(title: &str, rows: &[&ScanResult]) {
    println!();
    println!("{title}");
    if rows.is_empty() {
        println!("  none");
        return;
    }
    println!("  {:<12} {:<40} {:<8} Status", "Symbol", "Company Name", "Trend");
    for row in rows {
        println!(
            "  {:<12} {:<40} {:<8} {}",
            row.display_symbol,
            row.display_name,
            row.classification.to_string(),
            row.status_glyph()
        );
    }
}

fn write_exports(report: &ScanReport, dir: &Path, split: bool) -> Result<()> {
    if report.rows.is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir {}", dir.display()))?;

    let today = report.timestamp.date_naive();
    let mut targets = vec![(ALL_RESULTS_PREFIX, report.rows.iter().collect::<Vec<_>>())];
    if split {
        targets.push((BULLISH_PREFIX, report.bullish()));
        targets.push((BEARISH_PREFIX, report.bearish()));
    }

    for (prefix, rows) in targets {
        if rows.is_empty() {
            continue;
        }
        let bytes = export::export(rows).context("failed to render results workbook")?;
        let path = dir.join(export::export_file_name(prefix, report.market, report.timeframe, today));
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "results workbook written");
    }
    Ok(())
}
