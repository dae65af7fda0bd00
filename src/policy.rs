//! Include/exclude suffix rules for cleanup candidates.

use serde::{Deserialize, Serialize};

use crate::vcs::{CandidateFile, CandidateFileSet};

/// Suffix rules deciding which dirty files get cleaned up.
///
/// Exclude rules are checked first, so a narrow exclusion such as
/// `.designer.cs` overrides a broad include such as `.cs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterPolicy {
    #[serde(default = "default_include_suffixes")]
    pub include_suffixes: Vec<String>,

    #[serde(default = "default_exclude_suffixes")]
    pub exclude_suffixes: Vec<String>,
}

fn default_include_suffixes() -> Vec<String> {
    [".cs", ".xaml", ".resx", ".xml", ".config"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclude_suffixes() -> Vec<String> {
    vec![".designer.cs".to_string()]
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            include_suffixes: default_include_suffixes(),
            exclude_suffixes: default_exclude_suffixes(),
        }
    }
}

impl FilterPolicy {
    /// Whether a single path is eligible. Matching ignores case.
    pub fn accepts(&self, path: &str) -> bool {
        let path = path.to_lowercase();

        if self
            .exclude_suffixes
            .iter()
            .any(|suffix| path.ends_with(&suffix.to_lowercase()))
        {
            return false;
        }

        self.include_suffixes
            .iter()
            .any(|suffix| path.ends_with(&suffix.to_lowercase()))
    }

    /// Eligible candidates, ordered by normalized key.
    pub fn filter(&self, candidates: &CandidateFileSet) -> Vec<CandidateFile> {
        candidates
            .iter()
            .filter(|file| self.accepts(&file.key))
            .cloned()
            .collect()
    }
}
