// =============================================================================
// Instrument Sources — built-in lists and user-supplied CSV / XLSX files
// =============================================================================
//
// Column detection is case-insensitive on trimmed headers:
//   symbol, ticker, stock                          → symbol
//   name, company, company name, stock name        → name
//
// A missing symbol column rejects the whole file. A missing name column falls
// back to the symbol. Rows that sanitize to nothing are dropped and counted.
// The list is capped at `max_instruments`; surplus rows are dropped with a
// warning.
// =============================================================================

use std::fs::File;
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook, Reader, Xlsx};
use csv::ReaderBuilder;
use tracing::{info, warn};

use crate::error::{Result, ScannerError};
use crate::instrument::Instrument;
use crate::types::Market;

/// Default cap on the number of instruments in one list.
pub const DEFAULT_MAX_INSTRUMENTS: usize = 9999;
/// Default cap on the size of an uploaded list file.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 50 * 1024 * 1024;

const SYMBOL_HEADERS: &[&str] = &["symbol", "ticker", "stock"];
const NAME_HEADERS: &[&str] = &["name", "company", "company name", "stock name"];

const US_DEFAULTS: &[(&str, &str)] = &[
    ("AAPL", "Apple"),
    ("MSFT", "Microsoft"),
    ("AMZN", "Amazon"),
    ("GOOGL", "Alphabet"),
    ("META", "Meta Platforms"),
    ("TSLA", "Tesla"),
    ("NVDA", "NVIDIA"),
    ("JPM", "JPMorgan Chase"),
    ("V", "Visa"),
    ("WMT", "Walmart"),
];

const INDIA_DEFAULTS: &[(&str, &str)] = &[
    ("RELIANCE.NS", "Reliance Industries"),
    ("TCS.NS", "Tata Consultancy Services"),
    ("HDFCBANK.NS", "HDFC Bank"),
    ("INFY.NS", "Infosys"),
    ("ICICIBANK.NS", "ICICI Bank"),
    ("HINDUNILVR.NS", "Hindustan Unilever"),
    ("ITC.NS", "ITC"),
    ("SBIN.NS", "State Bank of India"),
    ("BAJFINANCE.NS", "Bajaj Finance"),
    ("BHARTIARTL.NS", "Bharti Airtel"),
];

/// Size limits applied while loading a list.
#[derive(Debug, Clone, Copy)]
pub struct SourceLimits {
    pub max_instruments: usize,
    pub max_file_bytes: u64,
}

impl Default for SourceLimits {
    fn default() -> Self {
        Self {
            max_instruments: DEFAULT_MAX_INSTRUMENTS,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

/// Validated instruments plus what was discarded on the way.
#[derive(Debug, Clone, Default)]
pub struct InstrumentList {
    pub instruments: Vec<Instrument>,
    /// Rows whose symbol or name sanitized to nothing.
    pub dropped: usize,
    /// Whether rows beyond `max_instruments` were cut off.
    pub truncated: bool,
}

impl InstrumentList {
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

/// Built-in ten-name list for `market`.
pub fn default_instruments(market: Market) -> Vec<Instrument> {
    let pairs = match market {
        Market::Us => US_DEFAULTS,
        Market::India => INDIA_DEFAULTS,
    };
    pairs
        .iter()
        .filter_map(|(symbol, name)| Instrument::for_market(symbol, name, market))
        .collect()
}

/// Load the configured list for `market`, falling back to the built-in one.
pub fn load_market_list(market: Market, path: &Path, limits: SourceLimits) -> InstrumentList {
    match load_instrument_file(path, market, limits) {
        Ok(list) if !list.is_empty() => list,
        Ok(_) => {
            warn!(path = %path.display(), market = %market, "instrument list is empty, using default list");
            builtin(market)
        }
        Err(e) => {
            warn!(path = %path.display(), market = %market, error = %e, "failed to load instrument list, using default list");
            builtin(market)
        }
    }
}

fn builtin(market: Market) -> InstrumentList {
    InstrumentList {
        instruments: default_instruments(market),
        ..InstrumentList::default()
    }
}

/// Load a CSV or XLSX instrument list from disk.
pub fn load_instrument_file(path: &Path, market: Market, limits: SourceLimits) -> Result<InstrumentList> {
    let size = std::fs::metadata(path)?.len();
    if size > limits.max_file_bytes {
        return Err(ScannerError::FileTooLarge {
            size,
            limit: limits.max_file_bytes,
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let list = match extension.as_str() {
        "xlsx" => read_xlsx(path, market, limits)?,
        "xls" | "xlsm" | "xlsb" | "ods" => {
            return Err(ScannerError::UnsupportedFormat(extension));
        }
        _ => read_csv(File::open(path)?, market, limits)?,
    };

    info!(
        path = %path.display(),
        count = list.len(),
        dropped = list.dropped,
        truncated = list.truncated,
        "instrument list loaded"
    );
    Ok(list)
}

/// Parse a CSV instrument list from any reader.
pub fn read_csv<R: Read>(reader: R, market: Market, limits: SourceLimits) -> Result<InstrumentList> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    from_rows(&headers, rows, market, limits)
}

fn read_xlsx(path: &Path, market: Market, limits: SourceLimits) -> Result<InstrumentList> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ScannerError::UnsupportedFormat("workbook has no sheets".to_string()))??;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<String>>());
    let headers = rows.next().unwrap_or_default();
    from_rows(&headers, rows, market, limits)
}

/// Map raw header + row cells to an [`InstrumentList`].
pub fn from_rows<I>(headers: &[String], rows: I, market: Market, limits: SourceLimits) -> Result<InstrumentList>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let symbol_col = find_column(headers, SYMBOL_HEADERS).ok_or(ScannerError::MissingSymbolColumn)?;
    let name_col = find_column(headers, NAME_HEADERS);

    let mut list = InstrumentList::default();
    for row in rows {
        let symbol = row.get(symbol_col).map(String::as_str).unwrap_or("");
        let name = name_col
            .and_then(|i| row.get(i))
            .map(String::as_str)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(symbol);

        let Some(instrument) = Instrument::for_market(symbol, name, market) else {
            list.dropped += 1;
            continue;
        };

        if list.instruments.len() >= limits.max_instruments {
            list.truncated = true;
            continue;
        }
        list.instruments.push(instrument);
    }

    if list.truncated {
        warn!(
            limit = limits.max_instruments,
            "instrument list truncated to the first {} entries", limits.max_instruments
        );
    }
    Ok(list)
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| aliases.contains(&h.trim().to_lowercase().as_str()))
}
