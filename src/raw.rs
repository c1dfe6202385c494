//! Positionally indexed tables as delivered by the upstream exports.
//!
//! Header text is kept only for passthrough display; nothing downstream
//! binds to it. Workbooks are recognised by their ZIP signature and read
//! through `calamine`, everything else is treated as delimited text.

use std::io::Cursor;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};
use encoding_rs::Encoding;
use itertools::Itertools;
use log::debug;

use crate::io_utils;

const ZIP_SIGNATURE: &[u8] = b"PK\x03\x04";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Width of the export, taken from the header row.
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cell at `(row, position)`, empty when the row is short.
    pub fn cell(&self, row: usize, position: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(position))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Returns a copy with exact duplicate rows removed, first occurrence kept.
    pub fn deduplicated(&self) -> RawTable {
        let rows = self.rows.iter().unique().cloned().collect::<Vec<_>>();
        debug!(
            "Dropped {} duplicate row(s)",
            self.rows.len().saturating_sub(rows.len())
        );
        RawTable::new(self.headers.clone(), rows)
    }

    /// Parses a byte source as a workbook or a delimited file. `name` is the
    /// file name or URL, used to pick the delimiter.
    pub fn parse(bytes: &[u8], name: &str, encoding: &'static Encoding) -> Result<RawTable> {
        if bytes.starts_with(ZIP_SIGNATURE) {
            return read_workbook(bytes).with_context(|| format!("Reading workbook {name}"));
        }
        let delimiter = io_utils::delimiter_for_name(name);
        let (headers, rows) = io_utils::read_delimited(bytes, delimiter, encoding)
            .with_context(|| format!("Reading delimited export {name}"))?;
        Ok(RawTable::new(headers, rows))
    }
}

fn read_workbook(bytes: &[u8]) -> Result<RawTable> {
    let mut workbook: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(bytes)).map_err(|e| anyhow!("{e}"))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("Workbook has no worksheets"))?
        .map_err(|e| anyhow!("{e}"))?;
    // The range starts at the first used cell; blank leading columns are
    // restored so positions stay absolute.
    let leading = range.start().map_or(0, |(_, col)| col as usize);
    let mut rows = range.rows().map(|row| {
        std::iter::repeat_n(String::new(), leading)
            .chain(row.iter().map(cell_to_string))
            .collect::<Vec<_>>()
    });
    let headers = rows.next().unwrap_or_default();
    if leading > 0 {
        debug!("Workbook data starts at column {leading}, padding rows");
    }
    Ok(RawTable::new(headers, rows.collect()))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}
