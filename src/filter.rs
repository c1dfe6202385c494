use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, anyhow};
use itertools::Itertools;
use serde::Serialize;

use crate::data::{CanonicalRecord, Field};

/// One multi-valued filter control of a retailer section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    pub name: &'static str,
    pub label: &'static str,
    pub field: Field,
    /// Candidate values are limited to records matching this dimension.
    pub cascade_from: Option<&'static str>,
    /// Offer the "all" sentinel as the first candidate.
    pub offers_all: bool,
    /// Whether KPI cards honour this dimension.
    pub affects_kpis: bool,
}

impl Dimension {
    pub const fn new(name: &'static str, label: &'static str, field: Field) -> Self {
        Self {
            name,
            label,
            field,
            cascade_from: None,
            offers_all: false,
            affects_kpis: true,
        }
    }

    pub const fn cascading_from(mut self, parent: &'static str) -> Self {
        self.cascade_from = Some(parent);
        self
    }

    pub const fn with_all(mut self) -> Self {
        self.offers_all = true;
        self
    }

    pub const fn excluded_from_kpis(mut self) -> Self {
        self.affects_kpis = false;
        self
    }
}

/// Accepted values per dimension name. A missing or empty set means the
/// dimension is unrestricted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSelection {
    values: BTreeMap<String, BTreeSet<String>>,
}

impl FilterSelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<I, S>(mut self, dimension: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(dimension, values);
        self
    }

    pub fn set<I, S>(&mut self, dimension: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = values.into_iter().map(Into::into).collect::<BTreeSet<_>>();
        if set.is_empty() {
            self.values.remove(dimension);
        } else {
            self.values.insert(dimension.to_string(), set);
        }
    }

    pub fn clear_dimension(&mut self, dimension: &str) {
        self.values.remove(dimension);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn get(&self, dimension: &str) -> Option<&BTreeSet<String>> {
        self.values.get(dimension)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Parses `dimension=value[,value...]` directives into a selection.
/// Repeated dimensions accumulate.
pub fn parse_selection(directives: &[String]) -> Result<FilterSelection> {
    let mut selection = FilterSelection::new();
    for directive in directives {
        let (dimension, values) = parse_directive(directive)?;
        let mut merged = selection.get(&dimension).cloned().unwrap_or_default();
        merged.extend(values);
        selection.set(&dimension, merged);
    }
    Ok(selection)
}

fn parse_directive(directive: &str) -> Result<(String, Vec<String>)> {
    let trimmed = directive.trim();
    let (left, right) = trimmed
        .split_once('=')
        .ok_or_else(|| anyhow!("Failed to parse filter '{trimmed}', expected dimension=value"))?;
    let dimension = left.trim().to_ascii_lowercase();
    if dimension.is_empty() {
        return Err(anyhow!("Filter '{trimmed}' is missing a dimension"));
    }
    let values = right
        .split(',')
        .map(|v| unquote(v.trim()).to_string())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>();
    Ok((dimension, values))
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Applies ANDed set-membership predicates over canonical records.
pub struct FilterEngine<'a> {
    dimensions: &'a [Dimension],
    sentinels: &'a [String],
}

impl<'a> FilterEngine<'a> {
    pub fn new(dimensions: &'a [Dimension], sentinels: &'a [String]) -> Self {
        Self {
            dimensions,
            sentinels,
        }
    }

    pub fn dimension(&self, name: &str) -> Option<&'a Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Fails on dimension names the section does not define.
    pub fn validate(&self, selection: &FilterSelection) -> Result<()> {
        for name in selection.dimensions() {
            if self.dimension(name).is_none() {
                let known = self.dimensions.iter().map(|d| d.name).join(", ");
                return Err(anyhow!(
                    "Unknown filter dimension '{name}' (available: {known})"
                ));
            }
        }
        Ok(())
    }

    pub fn apply<'r>(
        &self,
        records: &'r [CanonicalRecord],
        selection: &FilterSelection,
    ) -> Vec<&'r CanonicalRecord> {
        self.apply_where(records, selection, |_| true)
    }

    /// Applies only the dimensions that feed KPI cards.
    pub fn apply_for_kpis<'r>(
        &self,
        records: &'r [CanonicalRecord],
        selection: &FilterSelection,
    ) -> Vec<&'r CanonicalRecord> {
        self.apply_where(records, selection, |d| d.affects_kpis)
    }

    fn apply_where<'r, P>(
        &self,
        records: &'r [CanonicalRecord],
        selection: &FilterSelection,
        include: P,
    ) -> Vec<&'r CanonicalRecord>
    where
        P: Fn(&Dimension) -> bool,
    {
        let active = self
            .dimensions
            .iter()
            .filter(|d| include(d))
            .filter_map(|d| self.restriction(d.name, selection).map(|set| (d.field, set)))
            .collect::<Vec<_>>();
        records
            .iter()
            .filter(|record| {
                active
                    .iter()
                    .all(|(field, accepted)| accepted.contains(&record.display(*field)))
            })
            .collect()
    }

    /// Accepted values for `dimension`, or `None` when unrestricted. The
    /// "all" sentinel anywhere in the set lifts the restriction.
    pub fn restriction<'s>(
        &self,
        dimension: &str,
        selection: &'s FilterSelection,
    ) -> Option<&'s BTreeSet<String>> {
        let set = selection.get(dimension)?;
        if set.is_empty() || set.iter().any(|v| self.is_sentinel(v)) {
            None
        } else {
            Some(set)
        }
    }

    /// Sorted distinct values offered for `dimension`. A cascading
    /// dimension only offers values occurring in records that match its
    /// parent's current selection.
    pub fn candidates(
        &self,
        records: &[CanonicalRecord],
        dimension: &str,
        selection: &FilterSelection,
    ) -> Result<Vec<String>> {
        let dim = self
            .dimension(dimension)
            .ok_or_else(|| anyhow!("Unknown filter dimension '{dimension}'"))?;
        let parent = dim.cascade_from.and_then(|name| {
            let parent = self.dimension(name)?;
            self.restriction(name, selection).map(|set| (parent.field, set))
        });
        let mut values = records
            .iter()
            .filter(|record| match &parent {
                Some((field, accepted)) => accepted.contains(&record.display(*field)),
                None => true,
            })
            .map(|record| record.display(dim.field))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        if dim.offers_all
            && let Some(sentinel) = self.sentinels.first()
        {
            values.insert(0, sentinel.clone());
        }
        Ok(values)
    }

    fn is_sentinel(&self, value: &str) -> bool {
        let trimmed = value.trim();
        self.sentinels
            .iter()
            .any(|s| s.trim().eq_ignore_ascii_case(trimmed))
    }
}
