use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use ema_scanner::{Market, Timeframe};

#[derive(Parser, Debug)]
#[command(name = "ema-scanner")]
#[command(version, about = "Scan instruments for perfect EMA 20/50/100/200 alignment")]
pub struct Cli {
    /// JSON config file (missing file falls back to defaults)
    #[arg(short, long, global = true, default_value = "scanner_config.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run an alignment scan and export the matches
    Scan(ScanArgs),
    /// Print the resolved instrument list without scanning
    List(SourceArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Market: us | india
    #[arg(short, long, value_parser = parse_market)]
    pub market: Option<Market>,

    /// CSV or XLSX file with symbol / name columns
    #[arg(short, long)]
    pub list: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Timeframe: daily | hourly | 15m | weekly
    #[arg(short, long, value_parser = parse_timeframe)]
    pub timeframe: Option<Timeframe>,

    /// Maximum fetches in flight
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,

    /// Directory for the exported workbooks
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Fetch every symbol from the provider, even repeats within the list
    #[arg(long)]
    pub no_cache: bool,

    /// Also write separate bullish and bearish workbooks
    #[arg(long)]
    pub split: bool,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

fn parse_market(raw: &str) -> Result<Market, String> {
    raw.parse().map_err(|e: ema_scanner::ScannerError| e.to_string())
}

fn parse_timeframe(raw: &str) -> Result<Timeframe, String> {
    raw.parse().map_err(|e: ema_scanner::ScannerError| e.to_string())
}
