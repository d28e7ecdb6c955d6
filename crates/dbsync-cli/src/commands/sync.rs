use std::path::Path;

use dbsync_core::{BuiltinPolicy, SyncManager, SyncOptions};

use crate::commands::common::format_report_lines;
use crate::error::CliError;

pub async fn run_sync(
    db_a: &Path,
    db_b: &Path,
    policy: Option<BuiltinPolicy>,
    as_json: bool,
    analytics_db: &Path,
) -> Result<(), CliError> {
    let manager = SyncManager::new(analytics_db);
    let options = SyncOptions::builtin(policy.unwrap_or_default());
    let report = manager.sync(db_a, db_b, &options).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in format_report_lines(&report) {
        println!("{line}");
    }
    Ok(())
}
