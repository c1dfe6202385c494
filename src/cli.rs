use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::retailer::Retailer;

#[derive(Debug, Parser)]
#[command(author, version, about = "Inventory views over retailer spreadsheet exports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Evaluate one view of a retailer export and print KPIs and tables
    View(ViewArgs),
    /// Print the capped, shareable text report of a view
    Report(ReportArgs),
    /// List the candidate values of a filter dimension
    Options(OptionsArgs),
    /// Run an interactive session reading commands from stdin
    Shell(ShellArgs),
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Retailer section to work on
    #[arg(short, long, value_enum, ignore_case = true, default_value_t = Retailer::Walmart)]
    pub retailer: Retailer,
    /// Local export (.xlsx, .csv or .tsv) used when the remote source is unavailable
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,
    /// YAML configuration overriding the built-in deployment defaults
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Skip the connectivity probe and never download
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, Args)]
pub struct SelectionArgs {
    /// Filter directives of the form `dimension=value[,value...]`
    #[arg(short = 'f', long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Ranking filter directives of the form `dimension=value[,value...]`
    #[arg(long = "rank-filter", action = clap::ArgAction::Append)]
    pub rank_filters: Vec<String>,
    /// Toggle a view mode on (repeatable; later toggles win within a group)
    #[arg(short = 't', long = "toggle", action = clap::ArgAction::Append)]
    pub toggles: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ViewArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub selection: SelectionArgs,
    /// Emit the evaluation as JSON instead of text tables
    #[arg(long)]
    pub json: bool,
    /// Write the main table as CSV to this path (`-` for stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Limit the number of rows printed per table
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[command(flatten)]
    pub selection: SelectionArgs,
    /// Maximum number of entries (defaults to the configured report cap)
    #[arg(long)]
    pub cap: Option<usize>,
}

#[derive(Debug, Args)]
pub struct OptionsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Dimension whose candidate values are listed
    pub dimension: String,
    /// Current filter directives, used for cascading dimensions
    #[arg(short = 'f', long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// List values of a ranking filter dimension instead
    #[arg(long)]
    pub ranking: bool,
}

#[derive(Debug, Args)]
pub struct ShellArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}
