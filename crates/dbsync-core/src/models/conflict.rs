//! Sync conflict model

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which version survived a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictDecision {
    /// The first database's row won
    Source,
    /// The second database's row won
    Target,
    /// The policy synthesized a new row
    Merged,
}

impl ConflictDecision {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Target => "target",
            Self::Merged => "merged",
        }
    }
}

impl fmt::Display for ConflictDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conflict resolved during a pass, pending write to the analytics database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub table_name: String,
    /// Primary key rendered as text
    pub row_id: String,
    pub decision: ConflictDecision,
    /// Unix epoch seconds
    pub timestamp: i64,
}

/// A stored row of `synchronization_conflicts`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictEntry {
    pub id: i64,
    pub source_db: String,
    pub target_db: String,
    pub table_name: String,
    pub row_id: String,
    pub decision: String,
    pub timestamp: i64,
}
