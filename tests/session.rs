mod common;

use std::sync::Arc;

use common::{
    CHEDRAUI_WIDTH, ChedrauiRow, SORIANA_WIDTH, SorianaRow, TestWorkspace, WALMART_WIDTH,
    walmart_rows,
};
use retail_manager::{
    config::Config,
    filter::FilterSelection,
    retailer::Retailer,
    session::{LoadOutcome, Session},
};

fn loaded(outcome: LoadOutcome) -> Arc<retail_manager::data::Dataset> {
    match outcome {
        LoadOutcome::Loaded(dataset) => dataset,
        LoadOutcome::ManualFileRequired { reason } => panic!("expected data, got: {reason}"),
    }
}

#[test]
fn shared_cache_evicts_oldest_insertion_across_retailers() {
    let workspace = TestWorkspace::new();
    let config_path = workspace.write("small.yml", "cache:\n  max_entries: 2\n");
    let config = Config::load(&config_path).unwrap();
    let mut session = Session::new(config, false).unwrap();

    let walmart = workspace.write_export("walmart.csv", WALMART_WIDTH, &walmart_rows());
    let soriana = workspace.write_export(
        "soriana.csv",
        SORIANA_WIDTH,
        &[SorianaRow::default().cells()],
    );
    let chedraui = workspace.write_export(
        "chedraui.csv",
        CHEDRAUI_WIDTH,
        &[ChedrauiRow::default().cells()],
    );

    let first_walmart = loaded(session.load(Some(&walmart)).unwrap());
    session.switch_retailer(Retailer::Soriana).unwrap();
    loaded(session.load(Some(&soriana)).unwrap());
    session.switch_retailer(Retailer::Chedraui).unwrap();
    loaded(session.load(Some(&chedraui)).unwrap());

    let keys = session.cache().keys();
    assert_eq!(keys.len(), 2);
    assert!(keys[0].starts_with("SORIANA:"));
    assert!(keys[1].starts_with("CHEDRAUI:"));

    session.switch_retailer(Retailer::Walmart).unwrap();
    let reloaded = loaded(session.load(Some(&walmart)).unwrap());
    assert!(!Arc::ptr_eq(&first_walmart, &reloaded));
    assert_eq!(reloaded.len(), first_walmart.len());
    assert!(session.cache().keys()[1].starts_with("WALMART:"));
}

#[test]
fn rejected_export_leaves_previous_entry_untouched() {
    let workspace = TestWorkspace::new();
    let mut session = Session::new(Config::builtin().unwrap(), false).unwrap();
    session.switch_retailer(Retailer::Chedraui).unwrap();
    let good = workspace.write_export(
        "chedraui.csv",
        CHEDRAUI_WIDTH,
        &[ChedrauiRow::default().cells()],
    );
    loaded(session.load(Some(&good)).unwrap());

    let narrow = workspace.write("narrow.csv", "a,b,c\n1,2,3\n");
    match session.load(Some(&narrow)).unwrap() {
        LoadOutcome::ManualFileRequired { reason } => assert!(reason.contains("at least 18")),
        LoadOutcome::Loaded(_) => panic!("narrow export must be rejected"),
    }
    assert_eq!(session.cache().len(), 1);
    assert!(session.cache().keys()[0].ends_with("chedraui.csv"));
}

#[test]
fn reset_clears_cache_and_toggles_together() {
    let workspace = TestWorkspace::new();
    let mut session = Session::new(Config::builtin().unwrap(), false).unwrap();
    let walmart = workspace.write_export("walmart.csv", WALMART_WIDTH, &walmart_rows());
    let dataset = loaded(session.load(Some(&walmart)).unwrap());
    session.toggle("negatives").unwrap();
    session.toggle("overall").unwrap();

    let none = FilterSelection::new();
    let before = session.evaluate(&dataset, &none, &none).unwrap();
    assert!(before.ranking.is_some());

    session.reset();
    assert!(session.cache().is_empty());
    let after = session.evaluate(&dataset, &none, &none).unwrap();
    assert!(after.active.is_empty());
    assert!(after.ranking.is_none());
    assert_eq!(after.main.table.len(), 3);
}

#[test]
fn offline_session_without_file_asks_for_one() {
    let mut session = Session::new(Config::builtin().unwrap(), false).unwrap();
    session.switch_retailer(Retailer::Fresko).unwrap();
    assert!(matches!(
        session.load(None).unwrap(),
        LoadOutcome::ManualFileRequired { .. }
    ));
}

#[test]
fn report_uses_configured_templates_and_cap() {
    let workspace = TestWorkspace::new();
    let mut session = Session::new(Config::builtin().unwrap(), false).unwrap();
    session.switch_retailer(Retailer::Soriana).unwrap();
    let rows = (0..45)
        .map(|_| SorianaRow::default().cells())
        .collect::<Vec<_>>();
    let path = workspace.write_export("soriana.csv", SORIANA_WIDTH, &rows);
    let dataset = loaded(session.load(Some(&path)).unwrap());
    let none = FilterSelection::new();
    let evaluation = session.evaluate(&dataset, &none, &none).unwrap();
    let text = session.report(&evaluation);

    let lines = text.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "*SORIANA (45)*");
    assert_eq!(lines[1], "🏢 SORIANA CENTRO");
    assert_eq!(lines[2], "📦 ACEITE COMESTIBLE NUTRIOLI 400 ML");
    assert_eq!(lines[3], "📊 Inv:10.00 | Dias:12.00");
    assert_eq!(lines[4], "-");
    assert_eq!(text.matches("🏢").count(), 40);
    assert_eq!(lines.last(), Some(&"..."));
}
