//! Session-scoped state: configuration, connectivity, the active retailer
//! with its toggle state, and the source cache shared across cycles.

use std::{path::Path, sync::Arc};

use anyhow::Result;
use log::{debug, info};

use crate::{
    cache::SourceCache,
    config::Config,
    data::Dataset,
    filter::FilterSelection,
    process::{Evaluation, ViewEngine},
    report::ReportFormatter,
    retailer::Retailer,
    section::Section,
    source::{self, SourceLoader},
    view::ViewState,
};

pub const DEFAULT_RETAILER: Retailer = Retailer::Walmart;

#[derive(Debug, Clone)]
pub enum LoadOutcome {
    Loaded(Arc<Dataset>),
    /// No usable data: the caller must supply a local file.
    ManualFileRequired { reason: String },
}

pub struct Session {
    config: Config,
    online: bool,
    retailer: Retailer,
    section: Section,
    state: ViewState,
    cache: SourceCache<Dataset>,
}

impl Session {
    pub fn new(config: Config, online: bool) -> Result<Self> {
        let section = Section::build(DEFAULT_RETAILER, config.retailer(DEFAULT_RETAILER))?;
        let state = section.initial_state();
        let cache = SourceCache::from_config(&config.cache);
        Ok(Self {
            config,
            online,
            retailer: DEFAULT_RETAILER,
            section,
            state,
            cache,
        })
    }

    /// Probes connectivity once and opens a session.
    pub fn connect(config: Config) -> Result<Self> {
        let online = source::probe(&config.connectivity.probe_url, config.probe_timeout());
        info!(
            "Connectivity: {}",
            if online { "online" } else { "offline" }
        );
        Self::new(config, online)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn online(&self) -> bool {
        self.online
    }

    pub fn retailer(&self) -> Retailer {
        self.retailer
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn cache(&self) -> &SourceCache<Dataset> {
        &self.cache
    }

    /// Makes `retailer` active with every toggle off, even when it already
    /// was the active one.
    pub fn switch_retailer(&mut self, retailer: Retailer) -> Result<()> {
        self.section = Section::build(retailer, self.config.retailer(retailer))?;
        self.state = self.section.initial_state();
        self.retailer = retailer;
        debug!("Active retailer is now {retailer}");
        Ok(())
    }

    pub fn toggle(&mut self, flag: &str) -> Result<()> {
        self.state.toggle(flag)?;
        debug!("Toggled '{flag}' for {}", self.retailer);
        Ok(())
    }

    /// Loads the active retailer's data: the remote export when online and
    /// configured, otherwise (or when that fails) `manual_file`.
    pub fn load(&mut self, manual_file: Option<&Path>) -> Result<LoadOutcome> {
        let retailer = self.retailer;
        let loader = SourceLoader::new(&self.config)?;
        let mut reasons = Vec::new();

        if !self.online {
            reasons.push("offline".to_string());
        } else if self.config.source_url(retailer).is_some() {
            let mut failure = None;
            let loaded = self.cache.get_or_load(retailer.as_str(), || {
                loader
                    .load_remote(retailer)
                    .inspect_err(|err| failure = Some(err.to_string()))
            });
            if let Some(dataset) = loaded {
                return Ok(LoadOutcome::Loaded(dataset));
            }
            reasons.extend(failure);
        } else {
            reasons.push(format!("no remote source for {retailer}"));
        }

        let Some(path) = manual_file else {
            return Ok(LoadOutcome::ManualFileRequired {
                reason: reasons.join("; "),
            });
        };
        let key = format!("{retailer}:{}", path.display());
        let mut failure = None;
        let loaded = self.cache.get_or_load(&key, || {
            loader
                .load_file(retailer, path)
                .inspect_err(|err| failure = Some(err.to_string()))
        });
        match loaded {
            Some(dataset) => Ok(LoadOutcome::Loaded(dataset)),
            None => {
                reasons.extend(failure);
                Ok(LoadOutcome::ManualFileRequired {
                    reason: reasons.join("; "),
                })
            }
        }
    }

    pub fn engine(&self) -> ViewEngine<'_> {
        ViewEngine::new(
            &self.section,
            self.config.retailer(self.retailer),
            &self.config.all_sentinels,
        )
    }

    pub fn evaluate(
        &self,
        dataset: &Dataset,
        selection: &FilterSelection,
        ranking_selection: &FilterSelection,
    ) -> Result<Evaluation> {
        self.engine()
            .evaluate(dataset, &self.state, selection, ranking_selection)
    }

    pub fn candidates(
        &self,
        dataset: &Dataset,
        dimension: &str,
        selection: &FilterSelection,
    ) -> Result<Vec<String>> {
        self.engine()
            .filter_engine()
            .candidates(&dataset.records, dimension, selection)
    }

    pub fn ranking_candidates(
        &self,
        dataset: &Dataset,
        dimension: &str,
        selection: &FilterSelection,
    ) -> Result<Vec<String>> {
        self.engine()
            .ranking_filter_engine()
            .candidates(&dataset.records, dimension, selection)
    }

    /// Shareable text of the evaluation's main table.
    pub fn report(&self, evaluation: &Evaluation) -> String {
        let lines = &self.config.retailer(self.retailer).report.lines;
        ReportFormatter::new(lines).format(
            &evaluation.main.table,
            &evaluation.main.title,
            self.config.report_cap,
        )
    }

    /// Drops every cached source and turns every toggle off in one step.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.state.reset();
        info!("Session reset: cache and view state cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn chedraui_file(rows: &[Vec<String>]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        let header = (0..18).map(|i| format!("H{i}")).collect::<Vec<_>>().join(",");
        writeln!(file, "{header}").unwrap();
        for row in rows {
            writeln!(file, "{}", row.join(",")).unwrap();
        }
        file
    }

    fn row(store: &str, days: &str) -> Vec<String> {
        let mut row = vec![String::new(); 18];
        row[9] = store.to_string();
        row[17] = days.to_string();
        row
    }

    #[test]
    fn offline_without_file_requires_manual_input() {
        let mut session = Session::new(Config::builtin().unwrap(), false).unwrap();
        match session.load(None).unwrap() {
            LoadOutcome::ManualFileRequired { reason } => assert!(reason.contains("offline")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn manual_file_is_cached_and_reset_clears_everything() {
        let mut session = Session::new(Config::builtin().unwrap(), false).unwrap();
        session.switch_retailer(Retailer::Chedraui).unwrap();
        let file = chedraui_file(&[row("A", "45"), row("B", "-1")]);

        let LoadOutcome::Loaded(first) = session.load(Some(file.path())).unwrap() else {
            panic!("expected data");
        };
        let LoadOutcome::Loaded(second) = session.load(Some(file.path())).unwrap() else {
            panic!("expected data");
        };
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(session.cache().len(), 1);

        session.toggle("high-days").unwrap();
        let none = FilterSelection::new();
        let result = session.evaluate(&first, &none, &none).unwrap();
        assert_eq!(result.main.table.len(), 1);

        session.reset();
        assert!(session.cache().is_empty());
        assert_eq!(session.state().active("view"), None);
    }

    #[test]
    fn switching_retailer_resets_toggles() {
        let mut session = Session::new(Config::builtin().unwrap(), false).unwrap();
        session.toggle("pastas").unwrap();
        session.toggle("negatives").unwrap();
        session.switch_retailer(Retailer::Soriana).unwrap();
        session.switch_retailer(Retailer::Walmart).unwrap();
        assert!(session.state().all_flags().all(|f| !session.state().is_active(f)));
    }

    #[test]
    fn rejected_manual_file_asks_again() {
        let mut session = Session::new(Config::builtin().unwrap(), false).unwrap();
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "a,b\n1,2").unwrap();
        match session.load(Some(file.path())).unwrap() {
            LoadOutcome::ManualFileRequired { reason } => {
                assert!(reason.contains("at least 97"), "{reason}")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(session.cache().is_empty());
    }
}
