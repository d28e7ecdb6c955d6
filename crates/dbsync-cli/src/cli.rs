use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use dbsync_core::BuiltinPolicy;

#[derive(Parser)]
#[command(name = "dbsync")]
#[command(about = "Bidirectionally synchronize SQLite databases")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Analytics database holding the event and conflict log
    #[arg(long, global = true, value_name = "PATH")]
    pub analytics_db: Option<PathBuf>,

    /// JSON config file (defaults to <config dir>/dbsync/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one synchronization pass between two databases
    Sync {
        /// First database
        db_a: PathBuf,
        /// Second database
        db_b: PathBuf,
        /// Conflict policy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
        /// Output the pass report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Watch database pairs and sync whenever either side changes
    Watch {
        /// Pair to watch as A:B (repeatable; falls back to the config file).
        /// Windows drive letters such as C:\a.db:D:\b.db are accepted.
        #[arg(long = "pair", value_name = "A:B")]
        pairs: Vec<String>,
        /// Polling interval in seconds
        #[arg(long, value_name = "SECONDS")]
        interval: Option<f64>,
        /// Conflict policy
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },
    /// List recent sync events
    Events {
        /// Number of events to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recently resolved conflicts
    Conflicts {
        /// Number of conflicts to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PolicyArg {
    #[value(name = "last-write-wins", alias = "timestamp")]
    LastWriteWins,
    Merge,
}

impl From<PolicyArg> for BuiltinPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::LastWriteWins => Self::LastWriteWins,
            PolicyArg::Merge => Self::Merge,
        }
    }
}
