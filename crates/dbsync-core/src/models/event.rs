//! Synchronization event model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Outcome recorded for one sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Sync,
    SyncFailed,
}

impl SyncAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::SyncFailed => "sync_failed",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(Self::Sync),
            "sync_failed" => Ok(Self::SyncFailed),
            other => Err(format!("unknown sync action: {other}")),
        }
    }
}

/// Status derived from a stored action string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Success,
    Failure,
    Unknown,
}

impl EventStatus {
    /// `sync` maps to success, `sync_failed` to failure; anything else written
    /// by other tools is reported as unknown.
    pub fn from_action(action: &str) -> Self {
        match action.parse::<SyncAction>() {
            Ok(SyncAction::Sync) => Self::Success,
            Ok(SyncAction::SyncFailed) => Self::Failure,
            Err(_) => Self::Unknown,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Unknown => "unknown",
        }
    }
}

/// A stored row of `synchronization_events`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event row identifier
    pub id: i64,
    /// First database of the pair
    pub source_db: String,
    /// Second database of the pair
    pub target_db: String,
    /// Raw action string (`sync` or `sync_failed`)
    pub action: String,
    /// Status derived from `action`
    pub status: EventStatus,
    /// Unix epoch seconds
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_derived_from_action() {
        assert_eq!(EventStatus::from_action("sync"), EventStatus::Success);
        assert_eq!(EventStatus::from_action("sync_failed"), EventStatus::Failure);
        assert_eq!(EventStatus::from_action("vacuum"), EventStatus::Unknown);
    }

    #[test]
    fn action_round_trips_through_str() {
        for action in [SyncAction::Sync, SyncAction::SyncFailed] {
            assert_eq!(action.as_str().parse::<SyncAction>().unwrap(), action);
        }
    }
}
