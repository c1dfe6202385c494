//! Canonical record model shared by every retailer section.
//!
//! A [`CanonicalRecord`] is the typed, named view of one export row. Text
//! fields and numeric fields are addressed through [`Field`]; derived values
//! are held in [`DerivedMetrics`] and reachable through [`Column`] so display
//! and aggregation code never touches raw positions.

use std::{collections::BTreeMap, fmt, sync::LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::retailer::Retailer;

static CODE_ARTIFACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.0*$").expect("code artifact pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Field {
    ProductCode,
    Description,
    Category,
    StoreId,
    StoreName,
    State,
    City,
    Format,
    Restockable,
    Inventory,
    DaysOfInventory,
    SellOut,
    ReportedAverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Code,
    Number,
}

impl Field {
    pub fn kind(&self) -> FieldKind {
        match self {
            Field::ProductCode => FieldKind::Code,
            Field::Inventory | Field::DaysOfInventory | Field::SellOut | Field::ReportedAverage => {
                FieldKind::Number
            }
            _ => FieldKind::Text,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.kind() == FieldKind::Number
    }

    pub fn name(&self) -> &'static str {
        match self {
            Field::ProductCode => "product-code",
            Field::Description => "description",
            Field::Category => "category",
            Field::StoreId => "store-id",
            Field::StoreName => "store-name",
            Field::State => "state",
            Field::City => "city",
            Field::Format => "format",
            Field::Restockable => "restockable",
            Field::Inventory => "inventory",
            Field::DaysOfInventory => "days-of-inventory",
            Field::SellOut => "sell-out",
            Field::ReportedAverage => "reported-average",
        }
    }

    /// Column heading used when the field is shown as a grouping key.
    pub fn header(&self) -> &'static str {
        match self {
            Field::ProductCode => "CODIGO",
            Field::Description => "DESCRIPCION",
            Field::Category => "CATEGORIA",
            Field::StoreId => "NO TIENDA",
            Field::StoreName => "TIENDA",
            Field::State => "ESTADO",
            Field::City => "CIUDAD",
            Field::Format => "FORMATO",
            Field::Restockable => "RESURTIBLE",
            Field::Inventory => "EXISTENCIA",
            Field::DaysOfInventory => "DIAS INVENTARIO",
            Field::SellOut => "SELL OUT",
            Field::ReportedAverage => "VTA PROM",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Addressable value of a record: a mapped field or a derived metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Field(Field),
    RollingAverage,
    MonthlyAverage,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub rolling_average: f64,
    pub stockout: bool,
    pub monthly_average: f64,
    /// Names of the bucket rules the description matched.
    pub buckets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRecord {
    text: BTreeMap<Field, String>,
    numbers: BTreeMap<Field, f64>,
    pub period_sales: Vec<f64>,
    pub monthly_pieces: Vec<f64>,
    /// Source cells, retained only for passthrough layouts.
    pub source: Vec<String>,
    pub metrics: DerivedMetrics,
}

impl CanonicalRecord {
    pub fn set_text(&mut self, field: Field, value: String) {
        self.text.insert(field, value);
    }

    pub fn set_number(&mut self, field: Field, value: f64) {
        self.numbers.insert(field, value);
    }

    /// Text value of `field`; unbound fields read as an empty string.
    pub fn text(&self, field: Field) -> &str {
        self.text.get(&field).map(String::as_str).unwrap_or("")
    }

    /// Numeric value of `field`; unbound fields read as zero.
    pub fn number(&self, field: Field) -> f64 {
        self.numbers.get(&field).copied().unwrap_or(0.0)
    }

    /// String representation used for filter membership and grouping.
    pub fn display(&self, field: Field) -> String {
        if field.is_numeric() {
            format_plain(self.number(field))
        } else {
            self.text(field).to_string()
        }
    }

    pub fn value(&self, column: Column) -> f64 {
        match column {
            Column::Field(field) => self.number(field),
            Column::RollingAverage => self.metrics.rolling_average,
            Column::MonthlyAverage => self.metrics.monthly_average,
        }
    }

    pub fn in_bucket(&self, bucket: &str) -> bool {
        self.metrics.buckets.iter().any(|b| b == bucket)
    }
}

/// A normalized export for one retailer, as stored in the source cache.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub retailer: Retailer,
    pub origin: String,
    pub loaded_at: DateTime<Utc>,
    pub source_headers: Vec<String>,
    pub records: Vec<CanonicalRecord>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Coerces a spreadsheet cell into a number. Anything that does not parse
/// as a finite float becomes zero.
pub fn coerce_number(raw: &str) -> f64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Strips the `.0` suffix that spreadsheet numeric formatting appends to
/// identifiers. Only an all-zero fraction is removed.
pub fn normalize_code(raw: &str) -> String {
    let trimmed = raw.trim();
    CODE_ARTIFACT.replace(trimmed, "").into_owned()
}

/// Uppercases and collapses whitespace runs so descriptions with uneven
/// spacing compare equal.
pub fn normalize_description(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn format_plain(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
