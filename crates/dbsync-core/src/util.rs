//! Shared utility functions used across multiple modules.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Environment variable overriding the workspace root.
pub const WORKSPACE_ROOT_ENV: &str = "DBSYNC_WORKSPACE_ROOT";

static SAFE_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid regex")
});

/// Return `name` if it is a safe table identifier.
///
/// Only ASCII letters, digits and underscores are accepted and the name may
/// not start with a digit. Anything else (quotes, semicolons, whitespace) is
/// rejected before the name can reach an interpolated SQL statement.
pub fn sanitize_table_name(name: &str) -> Result<&str> {
    if SAFE_IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(Error::InvalidIdentifier(name.to_string()))
    }
}

/// Whether `name` is one of `SQLite`'s internal tables (`sqlite_sequence`, ...).
pub fn is_internal_table(name: &str) -> bool {
    name.get(..7)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("sqlite_"))
}

/// Quote an identifier for use in SQL, doubling any embedded `"`.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Normalize optional text by trimming whitespace and removing empties.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Base directory for relative database paths.
///
/// `DBSYNC_WORKSPACE_ROOT` wins when set; otherwise the current directory.
pub fn workspace_root() -> PathBuf {
    normalize_text_option(std::env::var(WORKSPACE_ROOT_ENV).ok())
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve `path` against `root` unless it is already absolute.
pub fn resolve_path(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Current Unix timestamp in seconds.
pub fn unix_timestamp_now() -> i64 {
    chrono::Utc::now().timestamp()
}
