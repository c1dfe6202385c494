//! One evaluation cycle of a retailer section: filter the canonical
//! records, apply the active view mode and build the display tables.
//!
//! Exactly one of three behaviours drives the main table:
//!
//! - default: filtered records sorted by rolling sales average, descending
//! - predicate: an extra row predicate narrows the filtered records
//! - aggregate: records are grouped, either by a fixed product template
//!   (one output row per template entry) or by a ranking key with a
//!   summed metric
//!
//! Rankings live in their own toggle group and produce a second table.

use std::{collections::BTreeMap, fmt::Write as _};

use anyhow::{Result, anyhow};
use log::debug;
use serde::Serialize;

use crate::{
    config::{RankingConfig, RetailerConfig},
    data::{CanonicalRecord, Column, Dataset, Field, mean, normalize_description},
    filter::{FilterEngine, FilterSelection},
    retailer::Retailer,
    section::{
        CellStyle, DisplayColumn, ModeEffect, RANKING_GROUP, RowPredicate, Section, VIEW_GROUP,
    },
    table::{Cell, ViewTable},
    view::ViewState,
};

const MISSING_CODE: &str = "-";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewKind {
    Default,
    Predicate,
    Aggregate,
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub label: String,
    pub value: Cell,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "kebab-case")]
pub enum Notice {
    /// A narrowing view is on.
    ActiveView(String),
    /// An aggregate found nothing to aggregate.
    EmptyResult(String),
}

impl Notice {
    pub fn message(&self) -> &str {
        match self {
            Notice::ActiveView(msg) | Notice::EmptyResult(msg) => msg,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewOutput {
    pub title: String,
    pub kind: ViewKind,
    pub kpis: Vec<Kpi>,
    pub notices: Vec<Notice>,
    pub table: ViewTable,
}

impl ViewOutput {
    fn new(title: impl Into<String>, kind: ViewKind, table: ViewTable) -> Self {
        Self {
            title: title.into(),
            kind,
            kpis: Vec::new(),
            notices: Vec::new(),
            table,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub retailer: Retailer,
    pub active: Vec<String>,
    pub filtered_records: usize,
    pub main: ViewOutput,
    pub ranking: Option<ViewOutput>,
}

impl Evaluation {
    /// Text rendering: KPIs, notices and tables, each table capped at
    /// `limit` rows when given.
    pub fn render(&self, limit: Option<usize>) -> String {
        let mut out = String::new();
        render_output(&mut out, &self.main, limit);
        if let Some(ranking) = &self.ranking {
            out.push('\n');
            render_output(&mut out, ranking, limit);
        }
        out
    }
}

fn render_output(out: &mut String, output: &ViewOutput, limit: Option<usize>) {
    let _ = writeln!(out, "== {} ({} rows) ==", output.title, output.table.len());
    for kpi in &output.kpis {
        let _ = writeln!(out, "{}: {}", kpi.label, kpi.value.display());
    }
    for notice in &output.notices {
        let _ = writeln!(out, "! {}", notice.message());
    }
    if output.table.is_empty() {
        out.push_str("(no rows)\n");
        return;
    }
    match limit {
        Some(limit) if limit < output.table.len() => {
            let mut shown = output.table.clone();
            shown.truncate(limit);
            out.push_str(&shown.render());
            let _ = writeln!(out, "... {} more row(s)", output.table.len() - limit);
        }
        _ => out.push_str(&output.table.render()),
    }
}

pub struct ViewEngine<'a> {
    section: &'a Section,
    config: &'a RetailerConfig,
    sentinels: &'a [String],
}

impl<'a> ViewEngine<'a> {
    pub fn new(section: &'a Section, config: &'a RetailerConfig, sentinels: &'a [String]) -> Self {
        Self {
            section,
            config,
            sentinels,
        }
    }

    pub fn filter_engine(&self) -> FilterEngine<'a> {
        FilterEngine::new(self.section.dimensions, self.sentinels)
    }

    pub fn ranking_filter_engine(&self) -> FilterEngine<'a> {
        FilterEngine::new(self.section.ranking_dimensions, self.sentinels)
    }

    pub fn evaluate(
        &self,
        dataset: &Dataset,
        state: &ViewState,
        selection: &FilterSelection,
        ranking_selection: &FilterSelection,
    ) -> Result<Evaluation> {
        let engine = self.filter_engine();
        engine.validate(selection)?;
        self.ranking_filter_engine().validate(ranking_selection)?;

        let filtered = engine.apply(&dataset.records, selection);
        let kpi_base = engine.apply_for_kpis(&dataset.records, selection);
        debug!(
            "{}: {} of {} record(s) pass the filters",
            self.section.retailer,
            filtered.len(),
            dataset.len()
        );
        let filtered_records = filtered.len();

        let main = if self.section.passthrough {
            self.passthrough_view(dataset)
        } else {
            match self
                .section
                .active_mode(state, VIEW_GROUP)
                .map(|mode| &mode.effect)
            {
                Some(ModeEffect::Predicate { predicate, notice }) => {
                    self.predicate_view(filtered, predicate, notice)
                }
                Some(ModeEffect::DaysReport) => self.days_report(&filtered, &kpi_base),
                _ => self.default_view(filtered),
            }
        };

        let ranking = match self
            .section
            .active_mode(state, RANKING_GROUP)
            .map(|mode| &mode.effect)
        {
            Some(ModeEffect::Ranking(idx)) => {
                let ranking = self
                    .config
                    .rankings
                    .get(*idx)
                    .ok_or_else(|| anyhow!("Ranking #{idx} is not configured"))?;
                Some(self.ranking_view(dataset, ranking, ranking_selection))
            }
            _ => None,
        };

        Ok(Evaluation {
            retailer: self.section.retailer,
            active: state
                .groups()
                .iter()
                .filter_map(|g| g.active().map(str::to_string))
                .collect(),
            filtered_records,
            main,
            ranking,
        })
    }

    fn default_view(&self, mut records: Vec<&CanonicalRecord>) -> ViewOutput {
        sort_by_rolling_average(&mut records);
        let table = build_table(self.section.columns, &records);
        let mut output = ViewOutput::new(self.section.retailer.as_str(), ViewKind::Default, table);
        output.kpis = self.totals(&records);
        output
    }

    /// Totals are taken over the rows on display, product filter and row
    /// predicate included.
    fn totals(&self, records: &[&CanonicalRecord]) -> Vec<Kpi> {
        self.section
            .totals
            .iter()
            .map(|total| {
                let sum = records.iter().map(|r| r.number(total.field)).sum::<f64>();
                Kpi {
                    label: total.label.to_string(),
                    value: styled(total.field, sum),
                }
            })
            .collect()
    }

    fn predicate_view(
        &self,
        records: Vec<&CanonicalRecord>,
        predicate: &RowPredicate,
        notice: &str,
    ) -> ViewOutput {
        let mut narrowed = records
            .into_iter()
            .filter(|record| predicate.matches(record))
            .collect::<Vec<_>>();
        sort_by_rolling_average(&mut narrowed);
        let table = build_table(self.section.columns, &narrowed);
        let title = match notice.split_once(':') {
            Some((_, label)) => format!("{} {}", self.section.retailer, label.trim()),
            None => self.section.retailer.to_string(),
        };
        let mut output = ViewOutput::new(title, ViewKind::Predicate, table);
        output.kpis = self.totals(&narrowed);
        output.notices.push(Notice::ActiveView(notice.to_string()));
        output
    }

    fn days_report(
        &self,
        filtered: &[&CanonicalRecord],
        kpi_base: &[&CanonicalRecord],
    ) -> ViewOutput {
        let title = format!("{} DIAS INVENTARIO", self.section.retailer);
        let mut output = if self.config.days_template.is_empty() {
            let table = build_table(self.section.days_columns, filtered);
            let mut output = ViewOutput::new(title, ViewKind::Aggregate, table);
            if filtered.is_empty() {
                output
                    .notices
                    .push(Notice::EmptyResult("No rows match the current filters".to_string()));
            }
            output
        } else {
            let (table, matched) = template_days_report(
                &self.config.days_template,
                &self.config.code_fallbacks,
                filtered,
            );
            let mut output = ViewOutput::new(title, ViewKind::Aggregate, table);
            if matched == 0 {
                output.notices.push(Notice::EmptyResult(
                    "None of the template products appear in the filtered data".to_string(),
                ));
            }
            output
        };
        output.kpis = self
            .config
            .days_kpis
            .iter()
            .map(|kpi| {
                let days = kpi_base
                    .iter()
                    .filter(|r| r.in_bucket(&kpi.bucket))
                    .map(|r| r.number(Field::DaysOfInventory))
                    .collect::<Vec<_>>();
                Kpi {
                    label: kpi.label.clone(),
                    value: Cell::count(mean(&days)),
                }
            })
            .collect();
        output
    }

    fn ranking_view(
        &self,
        dataset: &Dataset,
        ranking: &RankingConfig,
        selection: &FilterSelection,
    ) -> ViewOutput {
        let base = self.ranking_filter_engine().apply(&dataset.records, selection);
        let table = rank(&base, ranking);
        let mut output = ViewOutput::new(ranking.label.clone(), ViewKind::Aggregate, table);
        if output.table.is_empty() {
            output.notices.push(Notice::EmptyResult(format!(
                "No data found for {}",
                ranking.label
            )));
        }
        output
    }

    fn passthrough_view(&self, dataset: &Dataset) -> ViewOutput {
        let mut table = ViewTable::new(dataset.source_headers.iter().cloned());
        for record in &dataset.records {
            table.push(record.source.iter().cloned().map(Cell::Text).collect());
        }
        ViewOutput::new(
            self.section.retailer.as_str(),
            ViewKind::Passthrough,
            table,
        )
    }
}

fn sort_by_rolling_average(records: &mut [&CanonicalRecord]) {
    records.sort_by(|a, b| {
        b.metrics
            .rolling_average
            .total_cmp(&a.metrics.rolling_average)
    });
}

fn build_table(columns: &[DisplayColumn], records: &[&CanonicalRecord]) -> ViewTable {
    let mut table = ViewTable::new(columns.iter().map(|c| c.header));
    for record in records {
        table.push(columns.iter().map(|c| render_cell(c, record)).collect());
    }
    table
}

fn render_cell(column: &DisplayColumn, record: &CanonicalRecord) -> Cell {
    match (column.style, column.column) {
        (CellStyle::Text, Column::Field(field)) => Cell::text(record.display(field)),
        (CellStyle::Text, other) => Cell::text(record.value(other).to_string()),
        (CellStyle::Count, other) => Cell::count(record.value(other)),
        (CellStyle::Decimal, other) => Cell::decimal(record.value(other)),
        (CellStyle::Currency, other) => Cell::Currency(record.value(other)),
    }
}

fn styled(field: Field, value: f64) -> Cell {
    if field == Field::SellOut {
        Cell::Currency(value)
    } else {
        Cell::count(value)
    }
}

/// Builds the template-driven days-of-inventory table: one row per
/// template entry, in template order, whether or not the product occurs in
/// `records`. Returns the table and how many entries matched.
pub fn template_days_report(
    template: &[String],
    code_fallbacks: &BTreeMap<String, String>,
    records: &[&CanonicalRecord],
) -> (ViewTable, usize) {
    let mut groups: BTreeMap<String, (String, Vec<f64>)> = BTreeMap::new();
    for record in records {
        let key = normalize_description(record.text(Field::Description));
        let entry = groups.entry(key).or_default();
        if entry.0.is_empty() {
            entry.0 = record.text(Field::ProductCode).to_string();
        }
        entry.1.push(record.number(Field::DaysOfInventory));
    }
    let fallbacks = code_fallbacks
        .iter()
        .map(|(desc, code)| (normalize_description(desc), code.as_str()))
        .collect::<BTreeMap<_, _>>();

    let mut table = ViewTable::new(["CODIGO", "DESCRIPCION", "DIAS INV"]);
    let mut matched = 0usize;
    for product in template {
        let key = normalize_description(product);
        let fallback = fallbacks.get(&key).copied().unwrap_or(MISSING_CODE);
        let (code, days) = match groups.get(&key) {
            Some((code, days)) => {
                matched += 1;
                let code = if code.is_empty() {
                    fallback
                } else {
                    code.as_str()
                };
                (code, mean(days))
            }
            None => (fallback, 0.0),
        };
        table.push(vec![
            Cell::text(code),
            Cell::text(product.trim()),
            Cell::count(days),
        ]);
    }
    (table, matched)
}

/// Groups `records` by the ranking key, sums its metric and sorts the
/// groups descending. Records outside the ranking's bucket are skipped.
pub fn rank(records: &[&CanonicalRecord], ranking: &RankingConfig) -> ViewTable {
    let mut sums: BTreeMap<Vec<String>, f64> = BTreeMap::new();
    for record in records {
        if let Some(bucket) = &ranking.bucket
            && !record.in_bucket(bucket)
        {
            continue;
        }
        let key = ranking
            .group_by
            .iter()
            .map(|field| record.display(*field))
            .collect::<Vec<_>>();
        *sums.entry(key).or_default() += record.number(ranking.metric);
    }
    let mut ranked = sums.into_iter().collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    if let Some(top) = ranking.top {
        ranked.truncate(top);
    }

    let headers = ranking
        .group_by
        .iter()
        .map(|f| f.header().to_string())
        .chain(std::iter::once(ranking.label.clone()));
    let mut table = ViewTable::new(headers);
    for (key, total) in ranked {
        let mut row = key.into_iter().map(Cell::Text).collect::<Vec<_>>();
        row.push(styled(ranking.metric, total));
        table.push(row);
    }
    table
}
