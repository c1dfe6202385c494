//! Positional column contracts and the mapping of raw exports onto them.
//!
//! Each retailer's export is described once, as data, by a
//! [`RetailerLayout`]: the minimum column count, the `(position, field)`
//! bindings, and the spans of period-sales columns. Header text is never
//! consulted because it changes between export revisions.
//!
//! ## Responsibilities
//!
//! - Reject exports narrower than the retailer's minimum width
//! - Bind cells to [`Field`]s by position and coerce them by field kind
//! - Strip the `.0` artifact from product codes
//! - Drop exact duplicate rows and excluded formats where the layout asks

use std::ops::Range;

use log::{debug, info};
use thiserror::Error;

use crate::{
    data::{CanonicalRecord, Field, FieldKind, coerce_number, normalize_code},
    raw::RawTable,
    retailer::Retailer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnBinding {
    pub position: usize,
    pub field: Field,
}

const fn bind(position: usize, field: Field) -> ColumnBinding {
    ColumnBinding { position, field }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetailerLayout {
    pub retailer: Retailer,
    /// `None` accepts any width.
    pub min_columns: Option<usize>,
    pub bindings: &'static [ColumnBinding],
    /// Period-sales columns behind the rolling average and stockout flag.
    pub sales_span: Range<usize>,
    /// Period columns behind the monthly-piece average.
    pub monthly_span: Option<Range<usize>>,
    pub deduplicate: bool,
    pub keep_source: bool,
}

static SORIANA: RetailerLayout = RetailerLayout {
    retailer: Retailer::Soriana,
    min_columns: Some(22),
    bindings: &[
        bind(0, Field::Restockable),
        bind(2, Field::ProductCode),
        bind(3, Field::Description),
        bind(4, Field::Category),
        bind(5, Field::StoreId),
        bind(6, Field::StoreName),
        bind(7, Field::City),
        bind(8, Field::State),
        bind(9, Field::Format),
        bind(19, Field::Inventory),
        bind(21, Field::DaysOfInventory),
    ],
    sales_span: 15..19,
    monthly_span: None,
    deduplicate: false,
    keep_source: false,
};

static WALMART: RetailerLayout = RetailerLayout {
    retailer: Retailer::Walmart,
    min_columns: Some(97),
    bindings: &[
        bind(0, Field::ProductCode),
        bind(4, Field::Description),
        bind(5, Field::Category),
        bind(7, Field::State),
        bind(15, Field::StoreName),
        bind(16, Field::Format),
        bind(33, Field::DaysOfInventory),
        bind(42, Field::Inventory),
        bind(96, Field::SellOut),
    ],
    sales_span: 73..77,
    monthly_span: Some(73..77),
    deduplicate: true,
    keep_source: false,
};

static CHEDRAUI: RetailerLayout = RetailerLayout {
    retailer: Retailer::Chedraui,
    min_columns: Some(18),
    bindings: &[
        bind(3, Field::State),
        bind(8, Field::StoreId),
        bind(9, Field::StoreName),
        bind(11, Field::Description),
        bind(12, Field::Inventory),
        bind(16, Field::ReportedAverage),
        bind(17, Field::DaysOfInventory),
    ],
    sales_span: 14..15,
    monthly_span: None,
    deduplicate: false,
    keep_source: false,
};

static FRESKO: RetailerLayout = RetailerLayout {
    retailer: Retailer::Fresko,
    min_columns: None,
    bindings: &[],
    sales_span: 0..0,
    monthly_span: None,
    deduplicate: false,
    keep_source: true,
};

impl RetailerLayout {
    pub fn for_retailer(retailer: Retailer) -> &'static RetailerLayout {
        match retailer {
            Retailer::Soriana => &SORIANA,
            Retailer::Walmart => &WALMART,
            Retailer::Chedraui => &CHEDRAUI,
            Retailer::Fresko => &FRESKO,
        }
    }

    /// Highest position the layout reads, plus one.
    pub fn required_width(&self) -> usize {
        self.bindings
            .iter()
            .map(|b| b.position + 1)
            .chain(std::iter::once(self.sales_span.end))
            .chain(self.monthly_span.iter().map(|span| span.end))
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    #[error("{retailer} export has {found} column(s); at least {required} are required")]
    TooFewColumns {
        retailer: Retailer,
        found: usize,
        required: usize,
    },
}

pub struct SchemaMapper<'a> {
    layout: &'static RetailerLayout,
    excluded_formats: &'a [String],
}

impl<'a> SchemaMapper<'a> {
    pub fn new(retailer: Retailer) -> Self {
        Self {
            layout: RetailerLayout::for_retailer(retailer),
            excluded_formats: &[],
        }
    }

    /// Rows whose format cell equals one of `formats` are dropped.
    pub fn excluding_formats(mut self, formats: &'a [String]) -> Self {
        self.excluded_formats = formats;
        self
    }

    pub fn layout(&self) -> &'static RetailerLayout {
        self.layout
    }

    /// Maps every row of `raw` onto the canonical schema. The raw table is
    /// not modified; an undersized export yields no records at all.
    pub fn map(&self, raw: &RawTable) -> Result<Vec<CanonicalRecord>, MapError> {
        let layout = self.layout;
        if let Some(required) = layout.min_columns
            && raw.column_count() < required
        {
            info!(
                "Rejecting {} export: {} column(s), {} required",
                layout.retailer,
                raw.column_count(),
                required
            );
            return Err(MapError::TooFewColumns {
                retailer: layout.retailer,
                found: raw.column_count(),
                required,
            });
        }

        let deduplicated;
        let source = if layout.deduplicate {
            deduplicated = raw.deduplicated();
            &deduplicated
        } else {
            raw
        };

        let mut records = Vec::with_capacity(source.row_count());
        for row_idx in 0..source.row_count() {
            let record = self.map_row(source, row_idx);
            if self.is_excluded(&record) {
                continue;
            }
            records.push(record);
        }
        debug!(
            "Mapped {} of {} row(s) for {}",
            records.len(),
            raw.row_count(),
            layout.retailer
        );
        Ok(records)
    }

    fn map_row(&self, table: &RawTable, row_idx: usize) -> CanonicalRecord {
        let layout = self.layout;
        let mut record = CanonicalRecord::default();
        for binding in layout.bindings {
            let cell = table.cell(row_idx, binding.position);
            match binding.field.kind() {
                FieldKind::Text => record.set_text(binding.field, cell.trim().to_string()),
                FieldKind::Code => record.set_text(binding.field, normalize_code(cell)),
                FieldKind::Number => record.set_number(binding.field, coerce_number(cell)),
            }
        }
        record.period_sales = layout
            .sales_span
            .clone()
            .map(|pos| coerce_number(table.cell(row_idx, pos)))
            .collect();
        if let Some(span) = &layout.monthly_span {
            record.monthly_pieces = span
                .clone()
                .map(|pos| coerce_number(table.cell(row_idx, pos)))
                .collect();
        }
        if layout.keep_source {
            record.source = table.rows.get(row_idx).cloned().unwrap_or_default();
        }
        record
    }

    fn is_excluded(&self, record: &CanonicalRecord) -> bool {
        if self.excluded_formats.is_empty() {
            return false;
        }
        let format = record.text(Field::Format);
        self.excluded_formats.iter().any(|f| f == format)
    }
}
