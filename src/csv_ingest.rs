//! CSV intake for uploaded order exports.
//!
//! The export files arrive with either comma or semicolon separators
//! depending on which system produced them, so the separator is detected
//! from the file content before parsing starts.

use std::path::Path;

use log::{debug, info};

use crate::error::Result;
use crate::models::CsvOrderRow;

/// Picks the field separator: semicolon when the content contains one,
/// comma otherwise. Separator frequency cannot be judged from a prefix, so
/// detection scans the full content.
pub fn detect_delimiter(content: &str) -> u8 {
    if content.contains(';') {
        b';'
    } else {
        b','
    }
}

/// Reads an uploaded order export into raw rows.
pub fn read_order_rows<P: AsRef<Path>>(path: P) -> Result<Vec<CsvOrderRow>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    debug!("Read order export {path:?} ({} bytes)", content.len());
    parse_order_rows(&content)
}

/// Parses order export content, one record per data row with the header
/// row's names as keys. Rows with a wrong column count pass through with
/// the missing fields left empty; cardinality is the transformer's concern.
pub fn parse_order_rows(content: &str) -> Result<Vec<CsvOrderRow>> {
    let delimiter = detect_delimiter(content);
    debug!("Detected delimiter: {:?}", delimiter as char);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: CsvOrderRow = result?;
        rows.push(row);
    }

    info!("Parsed {} order rows", rows.len());
    Ok(rows)
}
