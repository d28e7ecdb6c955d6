use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] dbsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid pair {0:?}: expected A:B")]
    InvalidPair(String),
    #[error("No pairs to watch. Pass --pair A:B or list pairs in the config file.")]
    NoPairs,
    #[error("Configuration error: {0}")]
    Config(String),
}
