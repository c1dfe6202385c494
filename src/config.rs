//! Deployment configuration: source locations, cache bounds, and the
//! per-retailer catalogue data (bucket rules, report templates, rankings).
//!
//! Loaded from YAML. The built-in default is embedded from
//! `config/retail-manager.yml`.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::BufReader,
    path::Path,
    sync::LazyLock,
    time::Duration,
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{data::Field, retailer::Retailer};

const BUILTIN_CONFIG: &str = include_str!("../config/retail-manager.yml");
pub const MAX_CACHE_ENTRIES: usize = 10;

static EMPTY_RETAILER: LazyLock<RetailerConfig> = LazyLock::new(RetailerConfig::default);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sources: BTreeMap<Retailer, String>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default)]
    pub input_encoding: Option<String>,
    #[serde(default = "default_all_sentinels")]
    pub all_sentinels: Vec<String>,
    #[serde(default = "default_report_cap")]
    pub report_cap: usize,
    #[serde(default)]
    pub retailers: BTreeMap<Retailer, RetailerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// `None` keeps entries until evicted or cleared.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            ttl_seconds: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    #[serde(default = "default_probe_url")]
    pub probe_url: String,
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_url: default_probe_url(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMode {
    #[default]
    Contains,
    Exact,
}

/// Assigns records to a named bucket by matching one text field against a
/// list of product names or substrings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRule {
    pub name: String,
    #[serde(default = "default_bucket_field")]
    pub field: Field,
    #[serde(default)]
    pub matching: MatchMode,
    pub terms: Vec<String>,
    /// Compare with every space removed instead of collapsed.
    #[serde(default)]
    pub ignore_spaces: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiConfig {
    pub label: String,
    pub bucket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Toggle name of the ranking mode.
    pub name: String,
    /// Header of the summed column.
    pub label: String,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_ranking_group")]
    pub group_by: Vec<Field>,
    #[serde(default = "default_ranking_metric")]
    pub metric: Field,
    #[serde(default)]
    pub top: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Entry lines; `{A|B}` is replaced by the first column named A or B.
    #[serde(default)]
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetailerConfig {
    #[serde(default)]
    pub excluded_formats: Vec<String>,
    #[serde(default)]
    pub buckets: Vec<BucketRule>,
    #[serde(default)]
    pub days_kpis: Vec<KpiConfig>,
    #[serde(default)]
    pub days_template: Vec<String>,
    #[serde(default)]
    pub code_fallbacks: BTreeMap<String, String>,
    #[serde(default)]
    pub rankings: Vec<RankingConfig>,
    #[serde(default)]
    pub high_days_threshold: Option<f64>,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    pub fn builtin() -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(BUILTIN_CONFIG).context("Parsing built-in configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config {path:?}"))?;
        let config: Config = serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing config {path:?}"))?;
        config
            .validate()
            .with_context(|| format!("Validating config {path:?}"))?;
        Ok(config)
    }

    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Config::load(p),
            None => Config::builtin(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (1..=MAX_CACHE_ENTRIES).contains(&self.cache.max_entries),
            "cache.max_entries must be between 1 and {MAX_CACHE_ENTRIES}, got {}",
            self.cache.max_entries
        );
        ensure!(self.report_cap > 0, "report_cap must be positive");
        for (retailer, section) in &self.retailers {
            section
                .validate()
                .with_context(|| format!("Retailer section {retailer}"))?;
        }
        Ok(())
    }

    pub fn retailer(&self, retailer: Retailer) -> &RetailerConfig {
        self.retailers.get(&retailer).unwrap_or(&EMPTY_RETAILER)
    }

    pub fn source_url(&self, retailer: Retailer) -> Option<&str> {
        if retailer.manual_only() {
            return None;
        }
        self.sources
            .get(&retailer)
            .map(String::as_str)
            .filter(|url| !url.trim().is_empty())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.connectivity.timeout_ms)
    }
}

impl RetailerConfig {
    fn validate(&self) -> Result<()> {
        let mut names = BTreeSet::new();
        for rule in &self.buckets {
            ensure!(
                names.insert(rule.name.as_str()),
                "Duplicate bucket '{}'",
                rule.name
            );
            ensure!(!rule.terms.is_empty(), "Bucket '{}' has no terms", rule.name);
        }
        for kpi in &self.days_kpis {
            ensure!(
                names.contains(kpi.bucket.as_str()),
                "KPI '{}' references unknown bucket '{}'",
                kpi.label,
                kpi.bucket
            );
        }
        let mut ranking_names = BTreeSet::new();
        for ranking in &self.rankings {
            ensure!(
                ranking_names.insert(ranking.name.as_str()),
                "Duplicate ranking '{}'",
                ranking.name
            );
            if let Some(bucket) = &ranking.bucket {
                ensure!(
                    names.contains(bucket.as_str()),
                    "Ranking '{}' references unknown bucket '{bucket}'",
                    ranking.name
                );
            }
            ensure!(
                ranking.metric.is_numeric(),
                "Ranking '{}' must sum a numeric field, got '{}'",
                ranking.name,
                ranking.metric
            );
            ensure!(
                !ranking.group_by.is_empty(),
                "Ranking '{}' needs at least one group_by field",
                ranking.name
            );
        }
        Ok(())
    }
}

fn default_fetch_timeout_ms() -> u64 {
    3000
}

fn default_probe_timeout_ms() -> u64 {
    1000
}

fn default_probe_url() -> String {
    "https://github.com".to_string()
}

fn default_max_entries() -> usize {
    5
}

fn default_all_sentinels() -> Vec<String> {
    vec!["ALL".to_string(), "TODOS".to_string()]
}

fn default_report_cap() -> usize {
    40
}

fn default_bucket_field() -> Field {
    Field::Description
}

fn default_ranking_group() -> Vec<Field> {
    vec![Field::StoreName]
}

fn default_ranking_metric() -> Field {
    Field::SellOut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_is_valid() {
        let config = Config::builtin().expect("builtin config");
        assert_eq!(config.cache.max_entries, 5);
        assert_eq!(config.cache.ttl(), None);
        assert_eq!(config.report_cap, 40);
        assert_eq!(config.retailer(Retailer::Soriana).days_template.len(), 27);
        assert_eq!(config.retailer(Retailer::Walmart).rankings.len(), 4);
        assert!(config.source_url(Retailer::Fresko).is_none());
        assert!(config.source_url(Retailer::Walmart).is_some());
    }

    #[test]
    fn rejects_cache_bound_out_of_range() {
        let config: Config = serde_yaml::from_str("cache:\n  max_entries: 11\n").unwrap();
        assert!(config.validate().is_err());
        let config: Config = serde_yaml::from_str("cache:\n  max_entries: 0\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_kpi_with_unknown_bucket() {
        let yaml = "retailers:\n  SORIANA:\n    days_kpis:\n      - { label: X, bucket: missing }\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(format!("{err:#}").contains("unknown bucket"));
    }

    #[test]
    fn missing_sentinels_fall_back_to_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.all_sentinels, vec!["ALL", "TODOS"]);
    }
}
