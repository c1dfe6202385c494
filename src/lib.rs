pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod derive;
pub mod filter;
pub mod io_utils;
pub mod process;
pub mod raw;
pub mod report;
pub mod retailer;
pub mod schema;
pub mod section;
pub mod session;
pub mod shell;
pub mod source;
pub mod table;
pub mod view;

use std::{
    env,
    io::Write,
    path::Path,
    sync::{Arc, OnceLock},
};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, SelectionArgs, SourceArgs},
    config::Config,
    data::Dataset,
    filter::parse_selection,
    process::Evaluation,
    session::{LoadOutcome, Session},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("retail_manager", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::View(args) => handle_view(&args),
        Commands::Report(args) => handle_report(&args),
        Commands::Options(args) => handle_options(&args),
        Commands::Shell(args) => shell::execute(&args),
    }
}

fn handle_view(args: &cli::ViewArgs) -> Result<()> {
    let (_, evaluation) = evaluate(&args.source, &args.selection)?;
    if let Some(path) = &args.output {
        evaluation
            .main
            .table
            .write_csv(Some(path))
            .with_context(|| format!("Writing view to {path:?}"))?;
        if !io_utils::is_dash(path) {
            info!(
                "Wrote {} row(s) of '{}' to {path:?}",
                evaluation.main.table.len(),
                evaluation.main.title
            );
        }
        return Ok(());
    }
    let mut stdout = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &evaluation)
            .context("Serializing evaluation")?;
        writeln!(stdout)?;
    } else {
        write!(stdout, "{}", evaluation.render(args.limit))?;
    }
    Ok(())
}

fn handle_report(args: &cli::ReportArgs) -> Result<()> {
    let (session, evaluation) = evaluate(&args.source, &args.selection)?;
    let text = match args.cap {
        Some(cap) => {
            let lines = &session.config().retailer(session.retailer()).report.lines;
            report::ReportFormatter::new(lines).format(
                &evaluation.main.table,
                &evaluation.main.title,
                cap,
            )
        }
        None => session.report(&evaluation),
    };
    println!("{text}");
    Ok(())
}

fn handle_options(args: &cli::OptionsArgs) -> Result<()> {
    let mut session = open_session(&args.source)?;
    let dataset = require_dataset(&mut session, args.source.input.as_deref())?;
    let selection = parse_selection(&args.filters)?;
    let dimension = args.dimension.trim().to_ascii_lowercase();
    let values = if args.ranking {
        session.ranking_candidates(&dataset, &dimension, &selection)?
    } else {
        session.candidates(&dataset, &dimension, &selection)?
    };
    let mut stdout = std::io::stdout().lock();
    for value in values {
        writeln!(stdout, "{value}")?;
    }
    Ok(())
}

/// Opens a session on the requested retailer, probing connectivity unless
/// `--offline` was given.
pub fn open_session(args: &SourceArgs) -> Result<Session> {
    let config = Config::load_or_builtin(args.config.as_deref())?;
    let mut session = if args.offline {
        Session::new(config, false)?
    } else {
        Session::connect(config)?
    };
    session.switch_retailer(args.retailer)?;
    Ok(session)
}

/// Loads the active retailer's data or explains why a manual file is needed.
pub fn require_dataset(session: &mut Session, input: Option<&Path>) -> Result<Arc<Dataset>> {
    match session.load(input)? {
        LoadOutcome::Loaded(dataset) => {
            debug!("Using {} record(s) from {}", dataset.len(), dataset.origin);
            Ok(dataset)
        }
        LoadOutcome::ManualFileRequired { reason } => Err(anyhow!(
            "No {} data available ({reason}); supply a local export with --input",
            session.retailer()
        )),
    }
}

fn evaluate(source: &SourceArgs, selection: &SelectionArgs) -> Result<(Session, Evaluation)> {
    let mut session = open_session(source)?;
    let dataset = require_dataset(&mut session, source.input.as_deref())?;
    for flag in &selection.toggles {
        session.toggle(flag)?;
    }
    let filters = parse_selection(&selection.filters)?;
    let ranking_filters = parse_selection(&selection.rank_filters)?;
    let evaluation = session.evaluate(&dataset, &filters, &ranking_filters)?;
    Ok((session, evaluation))
}
