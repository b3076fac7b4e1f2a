use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "smart-pick",
    version,
    about = "Dependency-aware cherry-picking between git lines of history",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Commits to cherry-pick, in order
    pub commits: Vec<String>,

    /// Cherry-pick every commit from START to END, both included
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    pub range: Option<Vec<String>>,

    /// Remote whose history the commits come from
    #[arg(short, long)]
    pub remote: Option<String>,

    /// Commits to leave out (repeatable or comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Take the default answer to every question
    #[arg(long)]
    pub auto: bool,

    /// Mirror debug logging to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Plan only: nothing is cherry-picked or recorded as applied
    #[arg(long)]
    pub dry_run: bool,

    /// Do not append to stats.csv
    #[arg(long)]
    pub no_stats: bool,

    /// Cherry-pick the list saved by a previous run
    #[arg(long, conflicts_with_all = ["commits", "range"])]
    pub apply_saved: bool,

    /// Set a configuration key and save it (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to configuration file
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

impl Cli {
    /// Anything to do besides printing help.
    pub fn has_action(&self) -> bool {
        self.command.is_some()
            || !self.commits.is_empty()
            || self.range.is_some()
            || self.apply_saved
            || !self.set.is_empty()
    }

    /// `--range` as a pair.
    pub fn range_pair(&self) -> Option<(String, String)> {
        match self.range.as_deref() {
            Some([start, end]) => Some((start.clone(), end.clone())),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List previously applied commits
    History,

    /// Generate a default configuration file
    Init {
        /// Output path (default: <repo>/.git/smart-pick/config.toml)
        #[arg(short, long)]
        path: Option<std::path::PathBuf>,
    },

    /// Check git, repository state and symbol grammars
    Doctor,
}
