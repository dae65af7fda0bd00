//! Status normalization: raw status entries to a candidate file set.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CandidateFileSet, VersionControl};
use crate::error::Error;

/// Why a file shows up in status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Staged,
    Untracked,
    Added,
    Modified,
}

impl Classification {
    /// The change lives in the index only.
    pub fn is_index_only(self) -> bool {
        matches!(self, Classification::Staged | Classification::Added)
    }
}

/// One status classification for one path (relative to the working tree).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub path: PathBuf,
    pub classification: Classification,
}

impl StatusEntry {
    pub fn new(path: impl Into<PathBuf>, classification: Classification) -> Self {
        Self {
            path: path.into(),
            classification,
        }
    }
}

/// Result of one status query.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    /// Lower-cased friendly branch name.
    pub branch: String,
    pub candidates: CandidateFileSet,
}

/// Query `vcs` for dirty files under `root`.
///
/// Fails with [`Error::NotARepository`] when `root` is not a working tree.
pub fn collect_candidates<V>(vcs: &V, root: &Path) -> Result<StatusSnapshot, Error>
where
    V: VersionControl + ?Sized,
{
    if !vcs.is_valid_working_tree(root) {
        return Err(Error::NotARepository(root.to_path_buf()));
    }

    let branch = vcs.current_branch_name(root)?.to_lowercase();
    let entries = vcs.status(root)?;

    let mut candidates = CandidateFileSet::default();
    if entries.is_empty() {
        return Ok(StatusSnapshot { branch, candidates });
    }

    for entry in &entries {
        if !candidates.insert(root, &entry.path, entry.classification) {
            debug!(
                path = %entry.path.display(),
                classification = ?entry.classification,
                "Duplicate status entry"
            );
        }
    }

    debug!(
        entries = entries.len(),
        candidates = candidates.len(),
        branch = %branch,
        "Collected dirty files"
    );

    Ok(StatusSnapshot { branch, candidates })
}

/// Parse `git status --porcelain=v2 -z` output.
///
/// A path may produce more than one entry (e.g. added in the index and
/// modified in the worktree). Deletions, ignored files and unmerged paths are
/// not reported. `#` header lines are skipped.
pub fn parse_porcelain_v2(output: &str) -> Vec<StatusEntry> {
    let mut entries = Vec::new();
    let mut records = output.split('\0').filter(|r| !r.is_empty());

    while let Some(record) = records.next() {
        match record.as_bytes()[0] {
            b'1' => {
                if let Some((xy, path)) = split_changed(record, 9) {
                    push_xy(&mut entries, xy, path);
                }
            }
            b'2' => {
                if let Some((xy, path)) = split_changed(record, 10) {
                    push_xy(&mut entries, xy, path);
                }
                // Rename source follows as its own record.
                records.next();
            }
            b'?' => {
                if let Some(path) = record.strip_prefix("? ") {
                    entries.push(StatusEntry::new(path, Classification::Untracked));
                }
            }
            _ => {}
        }
    }

    entries
}

/// Branch from the `# branch.head` header of `git status --porcelain=v2 --branch`.
///
/// Git reports `(detached)` when HEAD is not on a branch.
pub fn parse_branch_head(output: &str) -> Option<String> {
    output
        .split(['\0', '\n'])
        .find_map(|record| record.strip_prefix("# branch.head "))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Split a changed-entry record into its XY field and path.
fn split_changed(record: &str, fields: usize) -> Option<(&str, &str)> {
    let mut parts = record.splitn(fields, ' ');
    let _kind = parts.next()?;
    let xy = parts.next()?;
    let path = parts.nth(fields - 3)?;
    Some((xy, path))
}

fn push_xy(entries: &mut Vec<StatusEntry>, xy: &str, path: &str) {
    let mut chars = xy.chars();
    let index = chars.next().unwrap_or('.');
    let worktree = chars.next().unwrap_or('.');

    match index {
        'A' => entries.push(StatusEntry::new(path, Classification::Added)),
        'M' | 'T' | 'R' | 'C' => entries.push(StatusEntry::new(path, Classification::Staged)),
        _ => {}
    }

    match worktree {
        'M' | 'T' => entries.push(StatusEntry::new(path, Classification::Modified)),
        // Intent-to-add: the content exists only in the worktree.
        'A' => entries.push(StatusEntry::new(path, Classification::Modified)),
        _ => {}
    }
}
