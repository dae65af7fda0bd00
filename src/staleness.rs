//! Per-file memory of when each dirty file was last formatted.
//!
//! Entries are keyed by the normalized (absolute, lower-cased) path. The cache
//! only grows during a branch's lifetime and is reset wholesale when the
//! tracked branch changes; there is no eviction and nothing is persisted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

/// Recorded for a path seen but never formatted.
pub const NEVER_FORMATTED: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

#[derive(Debug, Default)]
pub struct StalenessCache {
    /// Last-formatted time per normalized path.
    formatted_at: HashMap<String, DateTime<Utc>>,
    /// Lower-cased name of the branch the entries belong to.
    branch: Option<String>,
}

impl StalenessCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` needs formatting given its on-disk last-write time.
    ///
    /// A key seen for the first time is recorded as never formatted and
    /// reported stale.
    pub fn is_stale(&mut self, key: &str, last_write: DateTime<Utc>) -> bool {
        match self.formatted_at.get(key) {
            Some(formatted) => last_write > *formatted,
            None => {
                self.formatted_at.insert(key.to_string(), NEVER_FORMATTED);
                true
            }
        }
    }

    pub fn mark_formatted(&mut self, key: &str, at: DateTime<Utc>) {
        debug!(key, %at, "Marked formatted");
        self.formatted_at.insert(key.to_string(), at);
    }

    /// Track `name` as the current branch, clearing every entry if it differs
    /// from the previous one.
    pub fn set_branch(&mut self, name: &str) {
        let name = name.to_lowercase();
        if self.branch.as_deref() == Some(name.as_str()) {
            return;
        }

        if let Some(previous) = &self.branch {
            info!(
                from = %previous,
                to = %name,
                dropped = self.formatted_at.len(),
                "Branch changed, resetting staleness cache"
            );
        }
        self.formatted_at.clear();
        self.branch = Some(name);
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn len(&self) -> usize {
        self.formatted_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formatted_at.is_empty()
    }
}
