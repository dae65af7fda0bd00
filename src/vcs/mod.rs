//! Version-control status and candidate file sets.

pub mod git;
pub mod status;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub use git::GitCli;
pub use status::{collect_candidates, Classification, StatusEntry, StatusSnapshot};

/// View of a version-controlled working tree.
pub trait VersionControl {
    fn is_valid_working_tree(&self, root: &Path) -> bool;

    /// Dirty entries, paths relative to `root`.
    fn status(&self, root: &Path) -> Result<Vec<StatusEntry>, Error>;

    fn current_branch_name(&self, root: &Path) -> Result<String, Error>;

    /// Copy the working-tree content of `paths` into the index.
    fn stage(&self, root: &Path, paths: &[PathBuf]) -> Result<(), Error>;
}

/// A dirty file eligible for cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    /// Absolute path as reported, used for file access.
    pub path: PathBuf,
    /// Absolute, lower-cased path used for comparison and cache lookups.
    pub key: String,
    /// All changes are in the index; the worktree matches it.
    pub staged_only: bool,
}

impl CandidateFile {
    pub fn new(root: &Path, relative: &Path, classification: Classification) -> Self {
        let path = root.join(relative);
        let key = normalize_key(&path);
        Self {
            path,
            key,
            staged_only: classification.is_index_only(),
        }
    }
}

/// Comparison key for a path: lower-cased, forward slashes.
pub fn normalize_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

/// De-duplicated set of dirty files.
#[derive(Debug, Clone, Default)]
pub struct CandidateFileSet {
    files: BTreeMap<String, CandidateFile>,
}

impl CandidateFileSet {
    /// Add `relative` anchored at `root`. Returns false if the normalized path
    /// was already present; its classifications are merged.
    pub fn insert(
        &mut self,
        root: &Path,
        relative: &Path,
        classification: Classification,
    ) -> bool {
        let file = CandidateFile::new(root, relative, classification);
        if let Some(existing) = self.files.get_mut(&file.key) {
            existing.staged_only &= file.staged_only;
            return false;
        }
        self.files.insert(file.key.clone(), file);
        true
    }

    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&CandidateFile> {
        self.files.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateFile> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
