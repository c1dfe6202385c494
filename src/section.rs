//! Declarative description of each retailer section: its filter
//! dimensions, exclusive toggle groups and what each toggle does, and the
//! columns shown by each view.

use std::collections::BTreeSet;

use anyhow::{Result, ensure};

use crate::{
    config::RetailerConfig,
    data::{CanonicalRecord, Column, Field},
    filter::Dimension,
    retailer::Retailer,
    view::{ModeGroup, ViewState},
};

pub const VIEW_GROUP: &str = "view";
pub const RANKING_GROUP: &str = "ranking";
pub const DAYS_REPORT: &str = "days-report";
const DEFAULT_HIGH_DAYS: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowPredicate {
    Stockout,
    Below(Field, f64),
    Above(Field, f64),
}

impl RowPredicate {
    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        match self {
            RowPredicate::Stockout => record.metrics.stockout,
            RowPredicate::Below(field, limit) => record.number(*field) < *limit,
            RowPredicate::Above(field, limit) => record.number(*field) > *limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModeEffect {
    /// Narrows the filtered records.
    Predicate { predicate: RowPredicate, notice: String },
    /// Days-of-inventory report with KPI cards.
    DaysReport,
    /// Index into the retailer's configured rankings.
    Ranking(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mode {
    pub flag: String,
    pub effect: ModeEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Text,
    Count,
    Decimal,
    Currency,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayColumn {
    pub header: &'static str,
    pub column: Column,
    pub style: CellStyle,
}

const fn text(header: &'static str, field: Field) -> DisplayColumn {
    DisplayColumn {
        header,
        column: Column::Field(field),
        style: CellStyle::Text,
    }
}

const fn numeric(header: &'static str, column: Column, style: CellStyle) -> DisplayColumn {
    DisplayColumn {
        header,
        column,
        style,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TotalKpi {
    pub label: &'static str,
    pub field: Field,
}

const SORIANA_DIMENSIONS: &[Dimension] = &[
    Dimension::new("restockable", "Resurtible", Field::Restockable).with_all(),
    Dimension::new("store-id", "No Tienda", Field::StoreId),
    Dimension::new("store", "Nombre", Field::StoreName),
    Dimension::new("category", "Categoría", Field::Category),
    Dimension::new("city", "Ciudad", Field::City),
    Dimension::new("state", "Estado", Field::State),
    Dimension::new("format", "Formato", Field::Format),
];

const WALMART_DIMENSIONS: &[Dimension] = &[
    Dimension::new("state", "Estado", Field::State),
    Dimension::new("store", "Tienda", Field::StoreName).cascading_from("state"),
    Dimension::new("format", "Formato", Field::Format),
    Dimension::new("product", "Producto", Field::Description).excluded_from_kpis(),
];

const WALMART_RANKING_DIMENSIONS: &[Dimension] = &[
    Dimension::new("state", "Filtrar Estado (Ranking)", Field::State),
    Dimension::new("format", "Filtrar Formato (Ranking)", Field::Format),
];

const CHEDRAUI_DIMENSIONS: &[Dimension] = &[
    Dimension::new("store-id", "No (#)", Field::StoreId),
    Dimension::new("store", "Tienda", Field::StoreName),
    Dimension::new("state", "Estado", Field::State),
];

const SORIANA_COLUMNS: &[DisplayColumn] = &[
    text("TIENDA", Field::StoreName),
    text("COD", Field::ProductCode),
    text("DESC", Field::Description),
    text("CAT", Field::Category),
    numeric("VTA PROM", Column::RollingAverage, CellStyle::Decimal),
    numeric(
        "DIAS",
        Column::Field(Field::DaysOfInventory),
        CellStyle::Decimal,
    ),
    numeric("CAJAS", Column::Field(Field::Inventory), CellStyle::Decimal),
];

const WALMART_COLUMNS: &[DisplayColumn] = &[
    text("CODIGO", Field::ProductCode),
    text("DESCRIPCION", Field::Description),
    text("TIENDA", Field::StoreName),
    numeric(
        "EXISTENCIA",
        Column::Field(Field::Inventory),
        CellStyle::Count,
    ),
    numeric("SELL OUT", Column::Field(Field::SellOut), CellStyle::Currency),
    numeric("PROM PZS MENSUAL", Column::MonthlyAverage, CellStyle::Decimal),
];

const WALMART_DAYS_COLUMNS: &[DisplayColumn] = &[
    text("TIENDA", Field::StoreName),
    text("CODIGO", Field::ProductCode),
    text("DESCRIPCION", Field::Description),
    numeric(
        "DIAS INVENTARIO",
        Column::Field(Field::DaysOfInventory),
        CellStyle::Count,
    ),
];

const CHEDRAUI_COLUMNS: &[DisplayColumn] = &[
    text("TIENDA", Field::StoreName),
    text("DESC", Field::Description),
    numeric(
        "INV ULT SEM",
        Column::Field(Field::Inventory),
        CellStyle::Decimal,
    ),
    numeric("VTA ULT SEM", Column::RollingAverage, CellStyle::Decimal),
    numeric(
        "VTA PROM",
        Column::Field(Field::ReportedAverage),
        CellStyle::Decimal,
    ),
    numeric(
        "DDI",
        Column::Field(Field::DaysOfInventory),
        CellStyle::Decimal,
    ),
];

const WALMART_TOTALS: &[TotalKpi] = &[TotalKpi {
    label: "Total Sell Out",
    field: Field::SellOut,
}];

#[derive(Debug, Clone)]
pub struct Section {
    pub retailer: Retailer,
    pub dimensions: &'static [Dimension],
    pub ranking_dimensions: &'static [Dimension],
    pub groups: Vec<(String, Vec<Mode>)>,
    pub columns: &'static [DisplayColumn],
    pub days_columns: &'static [DisplayColumn],
    pub totals: &'static [TotalKpi],
    /// Show the source table untouched.
    pub passthrough: bool,
}

impl Section {
    pub fn build(retailer: Retailer, config: &RetailerConfig) -> Result<Section> {
        let predicate = |flag: &str, predicate: RowPredicate, notice: &str| Mode {
            flag: flag.to_string(),
            effect: ModeEffect::Predicate {
                predicate,
                notice: notice.to_string(),
            },
        };
        let days_report = Mode {
            flag: DAYS_REPORT.to_string(),
            effect: ModeEffect::DaysReport,
        };

        let section = match retailer {
            Retailer::Soriana => Section {
                retailer,
                dimensions: SORIANA_DIMENSIONS,
                ranking_dimensions: &[],
                groups: vec![(
                    VIEW_GROUP.to_string(),
                    vec![
                        predicate("stockout", RowPredicate::Stockout, "VISTA: INV SIN VENTA"),
                        days_report,
                    ],
                )],
                columns: SORIANA_COLUMNS,
                days_columns: &[],
                totals: &[],
                passthrough: false,
            },
            Retailer::Walmart => {
                let rankings = config
                    .rankings
                    .iter()
                    .enumerate()
                    .map(|(idx, ranking)| Mode {
                        flag: ranking.name.clone(),
                        effect: ModeEffect::Ranking(idx),
                    })
                    .collect::<Vec<_>>();
                let mut groups = vec![(
                    VIEW_GROUP.to_string(),
                    vec![
                        predicate(
                            "negatives",
                            RowPredicate::Below(Field::Inventory, 0.0),
                            "VISTA: NEGATIVOS",
                        ),
                        predicate(
                            "no-sale-4w",
                            RowPredicate::Stockout,
                            "VISTA: SIN VENTA 4 SEMANAS",
                        ),
                        days_report,
                    ],
                )];
                if !rankings.is_empty() {
                    groups.push((RANKING_GROUP.to_string(), rankings));
                }
                Section {
                    retailer,
                    dimensions: WALMART_DIMENSIONS,
                    ranking_dimensions: WALMART_RANKING_DIMENSIONS,
                    groups,
                    columns: WALMART_COLUMNS,
                    days_columns: WALMART_DAYS_COLUMNS,
                    totals: WALMART_TOTALS,
                    passthrough: false,
                }
            }
            Retailer::Chedraui => {
                let threshold = config.high_days_threshold.unwrap_or(DEFAULT_HIGH_DAYS);
                Section {
                    retailer,
                    dimensions: CHEDRAUI_DIMENSIONS,
                    ranking_dimensions: &[],
                    groups: vec![(
                        VIEW_GROUP.to_string(),
                        vec![
                            predicate(
                                "high-days",
                                RowPredicate::Above(Field::DaysOfInventory, threshold),
                                "VISTA: DDI ALTOS",
                            ),
                            predicate(
                                "negative-days",
                                RowPredicate::Below(Field::DaysOfInventory, 0.0),
                                "VISTA: DDI NEGATIVOS",
                            ),
                        ],
                    )],
                    columns: CHEDRAUI_COLUMNS,
                    days_columns: &[],
                    totals: &[],
                    passthrough: false,
                }
            }
            Retailer::Fresko => Section {
                retailer,
                dimensions: &[],
                ranking_dimensions: &[],
                groups: Vec::new(),
                columns: &[],
                days_columns: &[],
                totals: &[],
                passthrough: true,
            },
        };
        section.validate()?;
        Ok(section)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for (_, modes) in &self.groups {
            for mode in modes {
                ensure!(
                    seen.insert(mode.flag.to_ascii_lowercase()),
                    "Toggle '{}' is defined twice in the {} section",
                    mode.flag,
                    self.retailer
                );
            }
        }
        Ok(())
    }

    /// Fresh, all-off toggle state for this section.
    pub fn initial_state(&self) -> ViewState {
        ViewState::new(
            self.groups
                .iter()
                .map(|(name, modes)| ModeGroup::new(name, modes.iter().map(|m| m.flag.clone())))
                .collect(),
        )
    }

    pub fn mode(&self, flag: &str) -> Option<&Mode> {
        self.groups
            .iter()
            .flat_map(|(_, modes)| modes.iter())
            .find(|m| m.flag == flag)
    }

    /// Active mode of `group` in `state`, if any.
    pub fn active_mode(&self, state: &ViewState, group: &str) -> Option<&Mode> {
        state.active(group).and_then(|flag| self.mode(flag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn every_retailer_builds_from_builtin_config() {
        let config = Config::builtin().unwrap();
        for retailer in Retailer::ALL {
            let section = Section::build(retailer, config.retailer(retailer)).unwrap();
            assert_eq!(section.retailer, retailer);
        }
    }

    #[test]
    fn walmart_has_view_and_ranking_groups() {
        let config = Config::builtin().unwrap();
        let section = Section::build(Retailer::Walmart, config.retailer(Retailer::Walmart)).unwrap();
        let state = section.initial_state();
        let names = state.groups().iter().map(|g| g.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec![VIEW_GROUP, RANKING_GROUP]);
        assert_eq!(
            state.all_flags().collect::<Vec<_>>(),
            vec!["negatives", "no-sale-4w", "days-report", "overall", "pastas", "olivas", "nutrioli"]
        );
    }

    #[test]
    fn ranking_named_like_a_view_flag_is_rejected() {
        let yaml = "rankings:\n  - { name: negatives, label: X }\n";
        let config: RetailerConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(Section::build(Retailer::Walmart, &config).is_err());
    }

    #[test]
    fn predicates_compare_strictly() {
        let mut record = CanonicalRecord::default();
        record.set_number(Field::DaysOfInventory, 30.0);
        assert!(!RowPredicate::Above(Field::DaysOfInventory, 30.0).matches(&record));
        record.set_number(Field::DaysOfInventory, 30.5);
        assert!(RowPredicate::Above(Field::DaysOfInventory, 30.0).matches(&record));
        assert!(!RowPredicate::Below(Field::DaysOfInventory, 0.0).matches(&record));
    }
}
