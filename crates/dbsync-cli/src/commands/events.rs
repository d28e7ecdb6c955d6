use std::path::Path;

use dbsync_core::{list_conflicts, list_events};

use crate::commands::common::{
    conflict_to_item, event_to_item, format_conflict_lines, format_event_lines, ConflictItem,
    EventItem,
};
use crate::error::CliError;

pub async fn run_events(limit: usize, as_json: bool, analytics_db: &Path) -> Result<(), CliError> {
    let events = list_events(analytics_db, limit).await?;

    if as_json {
        let json_items = events.iter().map(event_to_item).collect::<Vec<EventItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("No sync events recorded.");
        return Ok(());
    }

    for line in format_event_lines(&events) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_conflicts(
    limit: usize,
    as_json: bool,
    analytics_db: &Path,
) -> Result<(), CliError> {
    let conflicts = list_conflicts(analytics_db, limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(conflict_to_item)
            .collect::<Vec<ConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}
