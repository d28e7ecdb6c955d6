//! Options and results of a sync pass

use std::sync::Arc;

use serde::Serialize;

use crate::models::ConflictRecord;
use crate::policy::{BuiltinPolicy, ConflictPolicy, ResolverRegistry, TimestampPolicy};

/// How conflicts are resolved during a pass
#[derive(Clone, Debug)]
pub struct SyncOptions {
    /// Pass-wide policy
    pub policy: Arc<dyn ConflictPolicy>,
    /// Per-table overrides, consulted before `policy`
    pub registry: Option<ResolverRegistry>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::new(Arc::new(TimestampPolicy))
    }
}

impl SyncOptions {
    pub fn new(policy: Arc<dyn ConflictPolicy>) -> Self {
        Self {
            policy,
            registry: None,
        }
    }

    /// Options for one of the named built-in policies
    pub fn builtin(policy: BuiltinPolicy) -> Self {
        Self::new(policy.into_policy())
    }

    #[must_use]
    pub fn with_registry(mut self, registry: ResolverRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// The policy that applies to `table`
    pub fn policy_for(&self, table: &str) -> &dyn ConflictPolicy {
        match &self.registry {
            Some(registry) => registry.policy_for(table, self.policy.as_ref()),
            None => self.policy.as_ref(),
        }
    }
}

/// What a committed pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Tables created by schema mapping, on either side
    pub tables_created: Vec<String>,
    /// Tables whose rows were reconciled
    pub tables_synced: Vec<String>,
    /// Tables without a usable primary key
    pub tables_skipped: Vec<String>,
    /// Rows copied from the second database into the first
    pub rows_to_a: usize,
    /// Rows copied from the first database into the second
    pub rows_to_b: usize,
    /// Conflicts resolved, in table then key order
    pub conflicts: Vec<ConflictRecord>,
}

impl SyncReport {
    /// True when the pass changed nothing on either side
    pub fn is_noop(&self) -> bool {
        self.tables_created.is_empty()
            && self.rows_to_a == 0
            && self.rows_to_b == 0
            && self.conflicts.is_empty()
    }
}
