//! Line-oriented interactive session. Each command runs one full,
//! synchronous cycle before the next line is read.

use std::{
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, anyhow, bail};
use itertools::Itertools;
use log::debug;

use crate::{
    cli::ShellArgs,
    data::Dataset,
    filter::{FilterSelection, parse_selection},
    retailer::Retailer,
    session::{LoadOutcome, Session},
};

const HELP: &str = "\
commands:
  retailer NAME            switch section (resets toggles and filters)
  load [PATH]              load remote data, or PATH when remote is unavailable
  filter DIM=V1,V2         restrict a dimension (DIM= clears it)
  rank-filter DIM=V1,V2    restrict a ranking dimension
  clear                    drop every filter
  toggle FLAG              flip a view mode
  show [LIMIT]             evaluate and print the current view
  report                   print the shareable text report
  options DIM              list candidate values of a dimension
  status                   show session state
  reset                    clear cached data and every toggle
  quit                     leave the shell";

pub fn execute(args: &ShellArgs) -> Result<()> {
    let session = crate::open_session(&args.source)?;
    let mut shell = Shell::new(session, args.source.input.clone());
    let stdin = io::stdin();
    let stdout = io::stdout();
    shell.run(stdin.lock(), stdout.lock())
}

/// A manual export is only ever offered to the retailer it was given for.
struct ManualInput {
    retailer: Retailer,
    path: PathBuf,
}

pub struct Shell {
    session: Session,
    /// `--input` given at startup; survives `reset`.
    startup_input: Option<ManualInput>,
    /// Last `load PATH`; dropped on retailer switch and `reset`.
    loaded_input: Option<ManualInput>,
    dataset: Option<Arc<Dataset>>,
    selection: FilterSelection,
    ranking_selection: FilterSelection,
}

enum Flow {
    Continue,
    Quit,
}

impl Shell {
    pub fn new(session: Session, input: Option<PathBuf>) -> Self {
        let startup_input = input.map(|path| ManualInput {
            retailer: session.retailer(),
            path,
        });
        Self {
            session,
            startup_input,
            loaded_input: None,
            dataset: None,
            selection: FilterSelection::new(),
            ranking_selection: FilterSelection::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Reads commands until `quit` or end of input. Command failures are
    /// printed and the loop goes on.
    pub fn run<R: BufRead, W: Write>(&mut self, reader: R, mut writer: W) -> Result<()> {
        writeln!(
            writer,
            "{} ({}) - type 'help' for commands",
            self.session.retailer(),
            if self.session.online() { "online" } else { "offline" }
        )?;
        for line in reader.lines() {
            let line = line.context("Reading command")?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            debug!("shell> {line}");
            match self.dispatch(line, &mut writer) {
                Ok(Flow::Quit) => break,
                Ok(Flow::Continue) => {}
                Err(err) => writeln!(writer, "error: {err:#}")?,
            }
            writer.flush()?;
        }
        Ok(())
    }

    fn dispatch<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };
        match command.to_ascii_lowercase().as_str() {
            "help" | "?" => writeln!(out, "{HELP}")?,
            "quit" | "exit" => return Ok(Flow::Quit),
            "retailer" => {
                let retailer = rest.parse::<Retailer>()?;
                self.session.switch_retailer(retailer)?;
                self.loaded_input = None;
                self.dataset = None;
                self.selection.clear();
                self.ranking_selection.clear();
                writeln!(out, "active retailer: {retailer}")?;
            }
            "load" => {
                if !rest.is_empty() {
                    self.loaded_input = Some(ManualInput {
                        retailer: self.session.retailer(),
                        path: PathBuf::from(rest),
                    });
                }
                let dataset = self.load()?;
                writeln!(
                    out,
                    "loaded {} record(s) from {}",
                    dataset.len(),
                    dataset.origin
                )?;
            }
            "filter" => {
                let mut next = self.selection.clone();
                let dimension = apply_directive(&mut next, rest)?;
                self.session.engine().filter_engine().validate(&next)?;
                self.selection = next;
                writeln!(out, "filter {dimension}: {}", describe(&self.selection, &dimension))?;
            }
            "rank-filter" => {
                let mut next = self.ranking_selection.clone();
                let dimension = apply_directive(&mut next, rest)?;
                self.session
                    .engine()
                    .ranking_filter_engine()
                    .validate(&next)?;
                self.ranking_selection = next;
                writeln!(
                    out,
                    "rank-filter {dimension}: {}",
                    describe(&self.ranking_selection, &dimension)
                )?;
            }
            "clear" => {
                self.selection.clear();
                self.ranking_selection.clear();
                writeln!(out, "filters cleared")?;
            }
            "toggle" => {
                if rest.is_empty() {
                    bail!("toggle needs a flag name");
                }
                self.session.toggle(rest)?;
                let active = self.active_flags();
                writeln!(
                    out,
                    "active: {}",
                    if active.is_empty() { "none".to_string() } else { active }
                )?;
            }
            "show" => {
                let limit = if rest.is_empty() {
                    None
                } else {
                    Some(
                        rest.parse::<usize>()
                            .with_context(|| format!("Invalid row limit '{rest}'"))?,
                    )
                };
                let dataset = self.current()?;
                let evaluation =
                    self.session
                        .evaluate(&dataset, &self.selection, &self.ranking_selection)?;
                write!(out, "{}", evaluation.render(limit))?;
            }
            "report" => {
                let dataset = self.current()?;
                let evaluation =
                    self.session
                        .evaluate(&dataset, &self.selection, &self.ranking_selection)?;
                writeln!(out, "{}", self.session.report(&evaluation))?;
            }
            "options" => {
                if rest.is_empty() {
                    bail!("options needs a dimension name");
                }
                let dataset = self.current()?;
                let dimension = rest.to_ascii_lowercase();
                let values = match self.session.candidates(&dataset, &dimension, &self.selection) {
                    Ok(values) => values,
                    Err(_) => self.session.ranking_candidates(
                        &dataset,
                        &dimension,
                        &self.ranking_selection,
                    )?,
                };
                writeln!(out, "{}", values.join("\n"))?;
            }
            "status" => self.status(out)?,
            "reset" => {
                self.session.reset();
                self.loaded_input = None;
                self.dataset = None;
                self.selection.clear();
                self.ranking_selection.clear();
                writeln!(out, "cache and view state cleared")?;
            }
            other => bail!("Unknown command '{other}' (type 'help')"),
        }
        Ok(Flow::Continue)
    }

    fn manual_file(&self) -> Option<&Path> {
        let retailer = self.session.retailer();
        self.loaded_input
            .iter()
            .chain(self.startup_input.iter())
            .find(|input| input.retailer == retailer)
            .map(|input| input.path.as_path())
    }

    fn load(&mut self) -> Result<Arc<Dataset>> {
        let manual_file = self.manual_file().map(Path::to_path_buf);
        match self.session.load(manual_file.as_deref())? {
            LoadOutcome::Loaded(dataset) => {
                self.dataset = Some(Arc::clone(&dataset));
                Ok(dataset)
            }
            LoadOutcome::ManualFileRequired { reason } => Err(anyhow!(
                "No {} data available ({reason}); use 'load PATH'",
                self.session.retailer()
            )),
        }
    }

    /// Dataset of the current cycle, loading it on first use.
    fn current(&mut self) -> Result<Arc<Dataset>> {
        match &self.dataset {
            Some(dataset) => Ok(Arc::clone(dataset)),
            None => self.load(),
        }
    }

    fn active_flags(&self) -> String {
        self.session
            .state()
            .groups()
            .iter()
            .filter_map(|g| g.active().map(|flag| format!("{}={flag}", g.name)))
            .join(", ")
    }

    fn status<W: Write>(&self, out: &mut W) -> Result<()> {
        let session = &self.session;
        writeln!(out, "retailer: {}", session.retailer())?;
        writeln!(
            out,
            "connectivity: {}",
            if session.online() { "online" } else { "offline" }
        )?;
        let toggles = session.state().all_flags().join(", ");
        writeln!(
            out,
            "toggles: {}",
            if toggles.is_empty() { "none" } else { toggles.as_str() }
        )?;
        let active = self.active_flags();
        writeln!(
            out,
            "active: {}",
            if active.is_empty() { "none" } else { active.as_str() }
        )?;
        let dimensions = session
            .section()
            .dimensions
            .iter()
            .map(|d| format!("{} ({})", d.name, d.label))
            .join(", ");
        writeln!(out, "dimensions: {dimensions}")?;
        writeln!(
            out,
            "cache: {}/{} [{}]",
            session.cache().len(),
            session.cache().capacity(),
            session.cache().keys().join(", ")
        )?;
        match &self.dataset {
            Some(dataset) => writeln!(
                out,
                "data: {} record(s) from {} at {}",
                dataset.len(),
                dataset.origin,
                dataset.loaded_at.format("%Y-%m-%d %H:%M:%S UTC")
            )?,
            None => writeln!(out, "data: not loaded")?,
        }
        Ok(())
    }
}

/// Replaces one dimension of `selection`; `dim=` clears it. Returns the
/// dimension name.
fn apply_directive(selection: &mut FilterSelection, directive: &str) -> Result<String> {
    let (dimension, values) = directive
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected DIMENSION=VALUE[,VALUE...], got '{directive}'"))?;
    let dimension = dimension.trim().to_ascii_lowercase();
    if dimension.is_empty() {
        bail!("Filter '{directive}' is missing a dimension");
    }
    if values.trim().is_empty() {
        selection.clear_dimension(&dimension);
        return Ok(dimension);
    }
    let parsed = parse_selection(&[directive.to_string()])?;
    let values = parsed.get(&dimension).cloned().unwrap_or_default();
    selection.set(&dimension, values);
    Ok(dimension)
}

fn describe(selection: &FilterSelection, dimension: &str) -> String {
    match selection.get(dimension) {
        Some(values) => values.iter().join(", "),
        None => "any".to_string(),
    }
}
