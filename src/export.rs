// =============================================================================
// Result Export — colour-coded XLSX workbook
// =============================================================================
//
// One sheet, header row first, then one row per result in input order:
//   A Symbol | B Company Name | C Trend | D Status
//
// Bullish rows: bold green font on light green fill across all four columns.
// Bearish rows: bold red font on light red fill.
// Column width = longest rendered value + 2, capped at MAX_COLUMN_WIDTH.
// =============================================================================

use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, Workbook};
use tracing::debug;

use crate::alignment::Classification;
use crate::error::{Result, ScannerError};
use crate::scanner::ScanResult;
use crate::types::{Market, Timeframe};

pub const SHEET_NAME: &str = "EMA Alignment Results";
pub const HEADERS: [&str; 4] = ["Symbol", "Company Name", "Trend", "Status"];
pub const MAX_COLUMN_WIDTH: usize = 50;

const BULLISH_FONT: u32 = 0x008000;
const BULLISH_FILL: u32 = 0xC6EFCE;
const BEARISH_FONT: u32 = 0xFF0000;
const BEARISH_FILL: u32 = 0xFFC7CE;

/// File-name prefixes for the three download variants.
pub const ALL_RESULTS_PREFIX: &str = "ema_alignment_results";
pub const BULLISH_PREFIX: &str = "bullish_stocks";
pub const BEARISH_PREFIX: &str = "bearish_stocks";

/// Render `rows` as an XLSX workbook and return its bytes.
///
/// Fails with [`ScannerError::EmptyExport`] when there is nothing to write.
pub fn export<'a>(rows: impl IntoIterator<Item = &'a ScanResult>) -> Result<Vec<u8>> {
    let rows: Vec<&ScanResult> = rows.into_iter().collect();
    if rows.is_empty() {
        return Err(ScannerError::EmptyExport);
    }

    let header_format = Format::new().set_bold();
    let bullish_format = Format::new()
        .set_bold()
        .set_font_color(Color::RGB(BULLISH_FONT))
        .set_background_color(Color::RGB(BULLISH_FILL));
    let bearish_format = Format::new()
        .set_bold()
        .set_font_color(Color::RGB(BEARISH_FONT))
        .set_background_color(Color::RGB(BEARISH_FILL));

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let mut widths = HEADERS.map(|h| h.chars().count());
    for (col, header) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }

    for (i, result) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        let cells = row_cells(result);
        let format = match result.classification {
            Classification::Bullish => Some(&bullish_format),
            Classification::Bearish => Some(&bearish_format),
            Classification::Unclassified => None,
        };

        for (col, value) in cells.iter().enumerate() {
            widths[col] = widths[col].max(value.chars().count());
            match format {
                Some(f) => sheet.write_string_with_format(row, col as u16, value.as_str(), f)?,
                None => sheet.write_string(row, col as u16, value.as_str())?,
            };
        }
    }

    for (col, width) in widths.iter().enumerate() {
        let width = (width + 2).min(MAX_COLUMN_WIDTH);
        sheet.set_column_width(col as u16, width as f64)?;
    }

    let bytes = workbook.save_to_buffer()?;
    debug!(rows = rows.len(), bytes = bytes.len(), "results workbook rendered");
    Ok(bytes)
}

fn row_cells(result: &ScanResult) -> [String; 4] {
    [
        result.display_symbol.clone(),
        result.display_name.clone(),
        result.classification.to_string(),
        result.status_glyph().to_string(),
    ]
}

/// `<prefix>_<market>_<timeframe>_<YYYYMMDD>.xlsx`
pub fn export_file_name(prefix: &str, market: Market, timeframe: Timeframe, date: NaiveDate) -> String {
    format!(
        "{}_{}_{}_{}.xlsx",
        prefix,
        market.label(),
        timeframe.file_tag(),
        date.format("%Y%m%d")
    )
}
