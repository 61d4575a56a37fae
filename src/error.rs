// =============================================================================
// Scanner error taxonomy
// =============================================================================
//
// Only caller-facing failures live here: bad instrument lists, bad arguments
// and export problems. Per-instrument data failures never surface as errors;
// the scanner folds them into its unprocessed count.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("instrument list must contain a symbol column (symbol, ticker or stock)")]
    MissingSymbolColumn,

    #[error("unsupported instrument list format: {0}")]
    UnsupportedFormat(String),

    #[error("instrument list is {size} bytes, limit is {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("unknown market: {0}")]
    UnknownMarket(String),

    #[error("unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("nothing to export: result set is empty")]
    EmptyExport,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet read error: {0}")]
    Spreadsheet(#[from] calamine::XlsxError),

    #[error("spreadsheet write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

pub type Result<T> = std::result::Result<T, ScannerError>;
