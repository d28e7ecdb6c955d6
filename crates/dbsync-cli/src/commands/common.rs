use std::path::{Path, PathBuf};

use dbsync_core::config::SyncConfig;
use dbsync_core::{ConflictEntry, EventRecord, SyncReport};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct EventItem {
    pub id: i64,
    pub source_db: String,
    pub target_db: String,
    pub action: String,
    pub status: String,
    pub timestamp: i64,
    pub timestamp_iso: String,
}

#[derive(Debug, Serialize)]
pub struct ConflictItem {
    pub id: i64,
    pub source_db: String,
    pub target_db: String,
    pub table_name: String,
    pub row_id: String,
    pub decision: String,
    pub timestamp: i64,
    pub timestamp_iso: String,
}

/// Load `explicit` if given (it must exist), else the default config file.
pub fn load_config(explicit: Option<&Path>) -> Result<SyncConfig, CliError> {
    match explicit {
        Some(path) if !path.exists() => Err(CliError::Config(format!(
            "config file {} does not exist",
            path.display()
        ))),
        Some(path) => Ok(SyncConfig::load_from_path(path)?),
        None => Ok(SyncConfig::load()?),
    }
}

/// Parse an `A:B` pair argument, resolving both sides against `root`.
///
/// Drive-letter colons (`C:\a.db`, `D:/b.db`) are part of a path, not the
/// separator, so exactly one other colon must remain.
pub fn parse_pair(value: &str, root: &Path) -> Result<(PathBuf, PathBuf), CliError> {
    let bytes = value.as_bytes();
    let is_drive_colon = |idx: usize| {
        idx >= 1
            && bytes[idx - 1].is_ascii_alphabetic()
            && (idx == 1 || bytes[idx - 2] == b':')
            && matches!(bytes.get(idx + 1), Some(b'\\' | b'/'))
    };
    let separators = value
        .match_indices(':')
        .map(|(idx, _)| idx)
        .filter(|idx| !is_drive_colon(*idx))
        .collect::<Vec<_>>();

    let (a, b) = match separators.as_slice() {
        [idx] => (value[..*idx].trim(), value[*idx + 1..].trim()),
        _ => return Err(CliError::InvalidPair(value.to_string())),
    };
    if a.is_empty() || b.is_empty() {
        return Err(CliError::InvalidPair(value.to_string()));
    }

    Ok((
        dbsync_core::util::resolve_path(root, Path::new(a)),
        dbsync_core::util::resolve_path(root, Path::new(b)),
    ))
}

pub fn event_to_item(event: &EventRecord) -> EventItem {
    EventItem {
        id: event.id,
        source_db: event.source_db.clone(),
        target_db: event.target_db.clone(),
        action: event.action.clone(),
        status: event.status.as_str().to_string(),
        timestamp: event.timestamp,
        timestamp_iso: format_sync_timestamp(event.timestamp),
    }
}

pub fn conflict_to_item(conflict: &ConflictEntry) -> ConflictItem {
    ConflictItem {
        id: conflict.id,
        source_db: conflict.source_db.clone(),
        target_db: conflict.target_db.clone(),
        table_name: conflict.table_name.clone(),
        row_id: conflict.row_id.clone(),
        decision: conflict.decision.clone(),
        timestamp: conflict.timestamp,
        timestamp_iso: format_sync_timestamp(conflict.timestamp),
    }
}

pub fn format_event_lines(events: &[EventRecord]) -> Vec<String> {
    events
        .iter()
        .map(|event| {
            format!(
                "{}  {:<7}  {} <-> {}",
                format_sync_timestamp(event.timestamp),
                event.status.as_str(),
                event.source_db,
                event.target_db
            )
        })
        .collect()
}

pub fn format_conflict_lines(conflicts: &[ConflictEntry]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<6}  {}[{}]",
                format_sync_timestamp(conflict.timestamp),
                conflict.decision,
                conflict.table_name,
                conflict.row_id
            )
        })
        .collect()
}

pub fn format_report_lines(report: &SyncReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Synced {} table(s): {} row(s) to A, {} row(s) to B, {} conflict(s)",
        report.tables_synced.len(),
        report.rows_to_a,
        report.rows_to_b,
        report.conflicts.len()
    )];
    if !report.tables_created.is_empty() {
        lines.push(format!("Created: {}", report.tables_created.join(", ")));
    }
    if !report.tables_skipped.is_empty() {
        lines.push(format!(
            "Skipped (no primary key): {}",
            report.tables_skipped.join(", ")
        ));
    }
    lines.extend(report.conflicts.iter().map(|conflict| {
        format!(
            "  {}[{}] -> {}",
            conflict.table_name, conflict.row_id, conflict.decision
        )
    }));
    lines
}

pub fn format_sync_timestamp(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0).map_or_else(
        || timestamp.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
