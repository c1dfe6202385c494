use log::debug;

use crate::{
    config::{BucketRule, MatchMode},
    data::{CanonicalRecord, mean, normalize_description},
};

struct CompiledRule<'a> {
    rule: &'a BucketRule,
    terms: Vec<String>,
}

impl CompiledRule<'_> {
    fn matches(&self, record: &CanonicalRecord) -> bool {
        let value = normalize_for_rule(record.text(self.rule.field), self.rule.ignore_spaces);
        if value.is_empty() {
            return false;
        }
        match self.rule.matching {
            MatchMode::Contains => self.terms.iter().any(|term| value.contains(term.as_str())),
            MatchMode::Exact => self.terms.iter().any(|term| *term == value),
        }
    }
}

fn normalize_for_rule(value: &str, ignore_spaces: bool) -> String {
    if ignore_spaces {
        value
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase()
    } else {
        normalize_description(value)
    }
}

/// Computes rolling averages, stockout flags, monthly averages and bucket
/// membership for canonical records.
pub struct MetricDeriver<'a> {
    rules: Vec<CompiledRule<'a>>,
}

impl<'a> MetricDeriver<'a> {
    pub fn new(rules: &'a [BucketRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| CompiledRule {
                rule,
                terms: rule
                    .terms
                    .iter()
                    .map(|term| normalize_for_rule(term, rule.ignore_spaces))
                    .filter(|term| !term.is_empty())
                    .collect(),
            })
            .collect();
        Self { rules }
    }

    pub fn derive(&self, records: &mut [CanonicalRecord]) {
        for record in records.iter_mut() {
            self.derive_record(record);
        }
        debug!(
            "Derived metrics for {} record(s) with {} bucket rule(s)",
            records.len(),
            self.rules.len()
        );
    }

    pub fn derive_record(&self, record: &mut CanonicalRecord) {
        record.metrics.rolling_average = mean(&record.period_sales);
        record.metrics.stockout = is_stockout(&record.period_sales);
        record.metrics.monthly_average = mean(&record.monthly_pieces);
        let buckets = self
            .rules
            .iter()
            .filter(|compiled| compiled.matches(record))
            .map(|compiled| compiled.rule.name.clone())
            .collect();
        record.metrics.buckets = buckets;
    }
}

/// True iff the span is non-empty and every period sold exactly zero.
pub fn is_stockout(period_sales: &[f64]) -> bool {
    !period_sales.is_empty() && period_sales.iter().all(|v| *v == 0.0)
}
