use std::borrow::Cow;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::{Decimal, RoundingStrategy, prelude::FromPrimitive};
use serde::{Serialize, Serializer};

use crate::io_utils;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number { value: f64, decimals: u32 },
    Currency(f64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Counts and day figures.
    pub fn count(value: f64) -> Self {
        Cell::Number { value, decimals: 1 }
    }

    /// Averages and other fractional figures.
    pub fn decimal(value: f64) -> Self {
        Cell::Number { value, decimals: 2 }
    }

    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number { value, decimals } => format_grouped(*value, *decimals),
            Cell::Currency(value) => format_currency(*value),
        }
    }

    fn is_numeric(&self) -> bool {
        !matches!(self, Cell::Text(_))
    }
}

impl Serialize for Cell {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Number { value, .. } | Cell::Currency(value) => serializer.serialize_f64(*value),
        }
    }
}

/// Final, display-ready table of a view evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ViewTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl ViewTable {
    pub fn new<S: Into<String>>(headers: impl IntoIterator<Item = S>) -> Self {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first header equal (case-insensitively) to any alias.
    pub fn column_index(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| {
            let alias = alias.trim();
            self.headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(alias))
        })
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    pub fn truncate(&mut self, limit: usize) {
        self.rows.truncate(limit);
    }

    pub fn render(&self) -> String {
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(Cell::display).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        let numeric = (0..self.headers.len())
            .map(|idx| {
                !self.rows.is_empty()
                    && self
                        .rows
                        .iter()
                        .all(|row| row.get(idx).is_some_and(Cell::is_numeric))
            })
            .collect::<Vec<_>>();
        render_aligned(&self.headers, &rows, &numeric)
    }

    /// Writes headers and formatted cells as CSV; `None` or `-` is stdout.
    pub fn write_csv(&self, path: Option<&Path>) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(path, io_utils::DEFAULT_CSV_DELIMITER)?;
        writer
            .write_record(&self.headers)
            .context("Writing header row")?;
        for (idx, row) in self.rows.iter().enumerate() {
            let cells = row
                .iter()
                .map(|cell| match cell {
                    Cell::Text(s) => s.clone(),
                    Cell::Number { value, decimals } => format!("{value:.*}", *decimals as usize),
                    Cell::Currency(value) => format!("{value:.2}"),
                })
                .collect::<Vec<_>>();
            writer
                .write_record(&cells)
                .with_context(|| format!("Writing row {}", idx + 2))?;
        }
        writer.flush().context("Flushing output")?;
        Ok(())
    }
}

fn render_aligned(headers: &[String], rows: &[Vec<String>], right_align: &[bool]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &[]));

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(
        output,
        "{}",
        format_row(&separator_cells, &separator_widths, &[])
    );

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, right_align));
    }

    output
}

fn format_row(values: &[String], widths: &[usize], right_align: &[bool]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        let Some(width) = widths.get(idx).copied() else {
            break;
        };
        let sanitized = sanitize_cell(value);
        let padding = " ".repeat(width.saturating_sub(display_width(sanitized.as_ref())));
        if right_align.get(idx).copied().unwrap_or(false) {
            cells.push(format!("{padding}{sanitized}"));
        } else {
            cells.push(format!("{sanitized}{padding}"));
        }
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

/// Formats with thousands separators, rounding half away from zero.
pub fn format_grouped(value: f64, decimals: u32) -> String {
    let rounded = Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.*}", decimals as usize, rounded);
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (digits, None),
    };
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (idx, ch) in int_part.chars().enumerate() {
        if idx > 0 && (int_part.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if grouped.chars().all(|c| c == '0' || c == ',')
        && frac_part.is_none_or(|f| f.chars().all(|c| c == '0'))
    {
        ""
    } else {
        sign
    };
    match frac_part {
        Some(frac) => format!("{sign}{grouped}.{frac}"),
        None => format!("{sign}{grouped}"),
    }
}

pub fn format_currency(value: f64) -> String {
    let formatted = format_grouped(value, 2);
    match formatted.strip_prefix('-') {
        Some(rest) => format!("-${rest}"),
        None => format!("${formatted}"),
    }
}
