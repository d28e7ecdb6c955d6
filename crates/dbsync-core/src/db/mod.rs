//! Database layer for dbsync

mod connection;
mod migrations;

pub use connection::{run_pragma, ConnectionOptions, Database};
pub use migrations::run as run_analytics_migrations;
