use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

#[derive(Debug, Parser)]
#[command(
    name = "invoice-registry",
    about = "Import and query snapshots of the qualified invoice issuer registry"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Maximum mutations per atomic commit
    #[arg(long, global = true)]
    pub commit_limit: Option<usize>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Import a snapshot CSV file or a directory of them
    Import(ImportArgs),
    /// Look up records by registration id or exact name
    Find(FindArgs),
    /// Find records whose name contains a fragment
    Search(SearchArgs),
    /// Print the number of stored records
    Count,
    /// Delete one record by registration id
    Delete {
        /// Registration id (e.g. T1000000000001)
        id: String,
    },
    /// Delete every stored record and index entry
    Reset,
    /// Show store location and statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Import --

#[derive(Debug, Parser)]
pub struct ImportArgs {
    /// CSV file or directory containing CSV files
    pub path: PathBuf,

    /// As-of date of the snapshot (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub snapshot_date: Option<NaiveDate>,

    /// Records per save batch
    #[arg(long, default_value = "1000")]
    pub batch_size: usize,
}

// -- Find --

#[derive(Debug, Parser)]
pub struct FindArgs {
    /// Registration ids to look up
    #[arg(
        short = 'i',
        long = "id",
        num_args = 1..,
        conflicts_with = "name",
        required_unless_present = "name"
    )]
    pub ids: Vec<String>,

    /// Exact name to look up
    #[arg(short = 'n', long)]
    pub name: Option<String>,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Name fragment; half-width letters and digits are widened first
    pub fragment: String,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "invoice-registry",
            &mut std::io::stdout(),
        );
    }
}
