//! Cleanup orchestration on a commit-intent trigger.
//!
//! A run never fails: a missing working tree or a clean tree ends it early, and
//! per-file problems are logged, recorded in the report and skipped.

use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::host::{FormatOutcome, Host};
use crate::policy::FilterPolicy;
use crate::staleness::StalenessCache;
use crate::vcs::{collect_candidates, CandidateFile, VersionControl};

/// Why a run stopped before touching any file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The host has no solution/repository loaded.
    NoWorkingTree,
    NotARepository,
    NoPendingChanges,
    /// Status could not be read.
    StatusFailed(String),
}

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub root: Option<PathBuf>,
    pub branch: Option<String>,
    pub skipped: Option<SkipReason>,
    /// Formatted successfully.
    pub formatted: Vec<PathBuf>,
    /// Formatter or save failed; still counted as attempted.
    pub failed: Vec<PathBuf>,
    /// Could not be opened.
    pub unresolved: Vec<PathBuf>,
    /// Formatted files whose changes were all staged, added to the index
    /// again so the commit picks up the formatted content.
    #[serde(default)]
    pub restaged: Vec<PathBuf>,
    /// Eligible but unchanged since last formatted.
    pub fresh: usize,
}

impl CleanupReport {
    fn skip(mut self, reason: SkipReason) -> Self {
        debug!(?reason, "Cleanup skipped");
        self.skipped = Some(reason);
        self
    }
}

impl std::fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(reason) = &self.skipped {
            return match reason {
                SkipReason::NoWorkingTree => write!(f, "No working tree, nothing to clean up"),
                SkipReason::NotARepository => {
                    write!(f, "Not a git working tree, nothing to clean up")
                }
                SkipReason::NoPendingChanges => write!(f, "No pending changes"),
                SkipReason::StatusFailed(e) => write!(f, "Could not read status: {}", e),
            };
        }

        write!(
            f,
            "Cleaned up {} file(s), {} failed, {} unresolved, {} already clean",
            self.formatted.len(),
            self.failed.len(),
            self.unresolved.len(),
            self.fresh
        )?;
        for path in &self.formatted {
            write!(f, "\n  formatted  {}", path.display())?;
        }
        for path in &self.restaged {
            write!(f, "\n  restaged   {}", path.display())?;
        }
        for path in &self.failed {
            write!(f, "\n  failed     {}", path.display())?;
        }
        for path in &self.unresolved {
            write!(f, "\n  unresolved {}", path.display())?;
        }
        Ok(())
    }
}

/// Drives cleanup for one working tree, owning its staleness cache.
pub struct CleanupOrchestrator<H, V> {
    host: H,
    vcs: V,
    policy: FilterPolicy,
    cache: StalenessCache,
}

impl<H: Host, V: VersionControl> CleanupOrchestrator<H, V> {
    pub fn new(host: H, vcs: V, policy: FilterPolicy, cache: StalenessCache) -> Self {
        Self {
            host,
            vcs,
            policy,
            cache,
        }
    }

    #[cfg(test)]
    pub(crate) fn host(&self) -> &H {
        &self.host
    }

    #[cfg(test)]
    pub(crate) fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    #[cfg(test)]
    pub(crate) fn vcs_mut(&mut self) -> &mut V {
        &mut self.vcs
    }

    pub fn cache(&self) -> &StalenessCache {
        &self.cache
    }

    /// Clean up every stale, eligible dirty file.
    pub fn run(&mut self) -> CleanupReport {
        let report = CleanupReport::default();

        let Some(root) = self.host.working_tree_root() else {
            return report.skip(SkipReason::NoWorkingTree);
        };
        let mut report = CleanupReport {
            root: Some(root.clone()),
            ..report
        };
        if !self.vcs.is_valid_working_tree(&root) {
            return report.skip(SkipReason::NotARepository);
        }

        // Status must reflect what's on disk.
        if let Err(e) = self.host.save_all_open_documents() {
            warn!(error = %e, "Failed to save open documents");
        }

        let snapshot = match collect_candidates(&self.vcs, &root) {
            Ok(snapshot) => snapshot,
            Err(Error::NotARepository(_)) => return report.skip(SkipReason::NotARepository),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Failed to read status");
                return report.skip(SkipReason::StatusFailed(e.to_string()));
            }
        };
        if snapshot.candidates.is_empty() {
            return report.skip(SkipReason::NoPendingChanges);
        }

        self.cache.set_branch(&snapshot.branch);
        report.branch = Some(snapshot.branch.clone());

        let mut pending = Vec::new();
        for file in self.policy.filter(&snapshot.candidates) {
            match self.host.file_last_write_time(&file.path) {
                Ok(written) if self.cache.is_stale(&file.key, written) => pending.push(file),
                Ok(_) => report.fresh += 1,
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Skipping unresolvable file");
                    report.unresolved.push(file.path);
                }
            }
        }

        if pending.is_empty() {
            info!(fresh = report.fresh, "All eligible files already clean");
            return report;
        }

        let previous = self.host.active_document();

        let mut restage = Vec::new();
        for file in &pending {
            if self.process(file, &mut report) && file.staged_only {
                restage.push(file.path.clone());
            }
        }

        if !restage.is_empty() {
            match self.vcs.stage(&root, &restage) {
                Ok(()) => report.restaged = restage,
                Err(e) => warn!(error = %e, "Failed to restage formatted files"),
            }
        }

        if let Some(previous) = previous {
            if let Some(doc) = self.host.get_open_document(&previous.path) {
                if let Err(e) = self.host.activate_document(&doc) {
                    warn!(path = %doc.path.display(), error = %e, "Failed to restore focus");
                }
            }
        }

        info!(
            branch = %snapshot.branch,
            formatted = report.formatted.len(),
            restaged = report.restaged.len(),
            failed = report.failed.len(),
            unresolved = report.unresolved.len(),
            fresh = report.fresh,
            "Cleanup finished"
        );
        report
    }

    /// Open, focus, format, save and close one file, then mark it attempted.
    /// Returns true if the file was formatted and saved.
    fn process(&mut self, file: &CandidateFile, report: &mut CleanupReport) -> bool {
        let (doc, opened_here) = match self.host.get_open_document(&file.path) {
            Some(doc) => (doc, false),
            None => match self.host.open_document(&file.path) {
                Ok(doc) => (doc, true),
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Failed to open document");
                    report.unresolved.push(file.path.clone());
                    return false;
                }
            },
        };

        let outcome = match self.host.activate_document(&doc) {
            Ok(()) => self.host.run_formatting_action(),
            Err(e) => FormatOutcome::Failure(e.to_string()),
        };

        let formatted = match outcome {
            FormatOutcome::Success => match self.host.save_document_if_dirty(&doc) {
                Ok(saved) => {
                    debug!(path = %file.path.display(), saved, "Formatted");
                    report.formatted.push(file.path.clone());
                    true
                }
                Err(e) => {
                    warn!(path = %file.path.display(), error = %e, "Failed to save document");
                    report.failed.push(file.path.clone());
                    false
                }
            },
            FormatOutcome::Failure(reason) => {
                warn!(path = %file.path.display(), %reason, "Formatting failed, not saving");
                report.failed.push(file.path.clone());
                false
            }
        };

        if opened_here {
            self.host.close_document(doc);
        }

        self.cache.mark_formatted(&file.key, Utc::now());
        formatted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::DocumentHandle;
    use crate::vcs::{normalize_key, Classification, StatusEntry};
    use chrono::{DateTime, Duration};
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashSet};
    use std::path::Path;

    struct FakeVcs {
        valid: bool,
        branch: String,
        entries: Vec<StatusEntry>,
        staged: RefCell<Vec<PathBuf>>,
    }

    impl VersionControl for FakeVcs {
        fn is_valid_working_tree(&self, _root: &Path) -> bool {
            self.valid
        }

        fn status(&self, _root: &Path) -> Result<Vec<StatusEntry>, Error> {
            Ok(self.entries.clone())
        }

        fn current_branch_name(&self, _root: &Path) -> Result<String, Error> {
            Ok(self.branch.clone())
        }

        fn stage(&self, _root: &Path, paths: &[PathBuf]) -> Result<(), Error> {
            self.staged.borrow_mut().extend_from_slice(paths);
            Ok(())
        }
    }

    /// In-memory host recording every editor operation.
    #[derive(Default)]
    struct FakeHost {
        root: Option<PathBuf>,
        /// Existing files and their last-write times, by key.
        files: BTreeMap<String, DateTime<Utc>>,
        open: BTreeMap<u64, PathBuf>,
        active: Option<u64>,
        next_id: u64,
        failing: HashSet<String>,
        formatted: Vec<PathBuf>,
        saved: Vec<PathBuf>,
        closed: Vec<PathBuf>,
        save_all_calls: usize,
    }

    impl FakeHost {
        fn new(files: &[&str]) -> Self {
            let mut host = Self {
                root: Some(PathBuf::from("/repo")),
                next_id: 1,
                ..Self::default()
            };
            for file in files {
                host.touch(file, Utc::now() - Duration::hours(1));
            }
            host
        }

        fn touch(&mut self, name: &str, at: DateTime<Utc>) {
            self.files.insert(normalize_key(&Path::new("/repo").join(name)), at);
        }

        fn open_existing(&mut self, name: &str) -> DocumentHandle {
            let doc = self.open_document(&Path::new("/repo").join(name)).unwrap();
            self.activate_document(&doc).unwrap();
            doc
        }

        fn formatted_names(&self) -> Vec<String> {
            self.formatted
                .iter()
                .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                .collect()
        }
    }

    impl Host for FakeHost {
        fn working_tree_root(&self) -> Option<PathBuf> {
            self.root.clone()
        }

        fn file_last_write_time(&self, path: &Path) -> Result<DateTime<Utc>, Error> {
            self.files
                .get(&normalize_key(path))
                .copied()
                .ok_or_else(|| Error::resolution(path, "missing"))
        }

        fn save_all_open_documents(&mut self) -> Result<(), Error> {
            self.save_all_calls += 1;
            Ok(())
        }

        fn is_document_open(&self, path: &Path) -> bool {
            self.get_open_document(path).is_some()
        }

        fn open_document(&mut self, path: &Path) -> Result<DocumentHandle, Error> {
            if !self.files.contains_key(&normalize_key(path)) {
                return Err(Error::resolution(path, "missing"));
            }
            let id = self.next_id;
            self.next_id += 1;
            self.open.insert(id, path.to_path_buf());
            Ok(DocumentHandle {
                id,
                path: path.to_path_buf(),
            })
        }

        fn get_open_document(&self, path: &Path) -> Option<DocumentHandle> {
            let key = normalize_key(path);
            self.open
                .iter()
                .find(|(_, p)| normalize_key(p) == key)
                .map(|(id, p)| DocumentHandle {
                    id: *id,
                    path: p.clone(),
                })
        }

        fn activate_document(&mut self, doc: &DocumentHandle) -> Result<(), Error> {
            if !self.open.contains_key(&doc.id) {
                return Err(Error::resolution(&doc.path, "not open"));
            }
            self.active = Some(doc.id);
            Ok(())
        }

        fn close_document(&mut self, doc: DocumentHandle) {
            self.open.remove(&doc.id);
            if self.active == Some(doc.id) {
                self.active = None;
            }
            self.closed.push(doc.path);
        }

        fn save_document_if_dirty(&mut self, doc: &DocumentHandle) -> Result<bool, Error> {
            self.saved.push(doc.path.clone());
            Ok(true)
        }

        fn run_formatting_action(&mut self) -> FormatOutcome {
            let Some(path) = self.active.and_then(|id| self.open.get(&id)).cloned() else {
                return FormatOutcome::Failure("nothing focused".to_string());
            };
            self.formatted.push(path.clone());
            if self.failing.contains(&normalize_key(&path)) {
                FormatOutcome::Failure("formatter crashed".to_string())
            } else {
                FormatOutcome::Success
            }
        }

        fn active_document(&self) -> Option<DocumentHandle> {
            let id = self.active?;
            self.open.get(&id).map(|path| DocumentHandle {
                id,
                path: path.clone(),
            })
        }
    }

    fn modified(names: &[&str]) -> Vec<StatusEntry> {
        names
            .iter()
            .map(|name| StatusEntry::new(*name, Classification::Modified))
            .collect()
    }

    fn orchestrator(
        host: FakeHost,
        entries: Vec<StatusEntry>,
    ) -> CleanupOrchestrator<FakeHost, FakeVcs> {
        let vcs = FakeVcs {
            valid: true,
            branch: "main".to_string(),
            entries,
            staged: RefCell::new(Vec::new()),
        };
        CleanupOrchestrator::new(host, vcs, FilterPolicy::default(), StalenessCache::new())
    }

    #[test]
    fn test_second_run_skips_unchanged_files() {
        let host = FakeHost::new(&["A.cs", "B.xaml"]);
        let mut orch = orchestrator(host, modified(&["A.cs", "B.xaml"]));

        let first = orch.run();
        assert_eq!(first.formatted.len(), 2);

        let second = orch.run();
        assert!(second.formatted.is_empty());
        assert_eq!(second.fresh, 2);
        assert_eq!(orch.host().formatted.len(), 2);
    }

    #[test]
    fn test_file_changed_after_format_is_reformatted() {
        let host = FakeHost::new(&["A.cs", "B.cs"]);
        let mut orch = orchestrator(host, modified(&["A.cs", "B.cs"]));
        orch.run();

        orch.host_mut().touch("A.cs", Utc::now() + Duration::hours(1));
        let report = orch.run();

        assert_eq!(report.formatted, vec![PathBuf::from("/repo/A.cs")]);
        assert_eq!(report.fresh, 1);
    }

    #[test]
    fn test_branch_switch_reformats_everything() {
        let host = FakeHost::new(&["A.cs"]);
        let mut orch = orchestrator(host, modified(&["A.cs"]));
        orch.run();
        assert!(orch.run().formatted.is_empty());

        orch.vcs_mut().branch = "Feature".to_string();
        let report = orch.run();

        assert_eq!(report.branch.as_deref(), Some("feature"));
        assert_eq!(report.formatted.len(), 1);
        assert_eq!(orch.cache().branch(), Some("feature"));
    }

    #[test]
    fn test_added_and_modified_processed_once() {
        let host = FakeHost::new(&["New.cs"]);
        let entries = vec![
            StatusEntry::new("New.cs", Classification::Added),
            StatusEntry::new("New.cs", Classification::Modified),
        ];
        let mut orch = orchestrator(host, entries);

        let report = orch.run();
        assert_eq!(report.formatted.len(), 1);
        assert_eq!(orch.host().formatted_names(), vec!["New.cs"]);
    }

    #[test]
    fn test_designer_files_never_formatted() {
        let host = FakeHost::new(&["Foo.cs", "Foo.designer.cs", "readme.txt"]);
        let mut orch = orchestrator(
            host,
            modified(&["Foo.cs", "Foo.designer.cs", "readme.txt"]),
        );

        orch.run();
        assert_eq!(orch.host().formatted_names(), vec!["Foo.cs"]);
    }

    #[test]
    fn test_focus_restored_to_previous_document() {
        let mut host = FakeHost::new(&["X.cs", "Y.cs", "Z.cs"]);
        let x = host.open_existing("X.cs");
        let mut orch = orchestrator(host, modified(&["Y.cs", "Z.cs"]));

        let report = orch.run();
        assert_eq!(report.formatted.len(), 2);
        assert_eq!(orch.host().active_document(), Some(x));
    }

    #[test]
    fn test_failure_does_not_stop_other_files() {
        let mut host = FakeHost::new(&["Y.cs", "Z.cs"]);
        host.failing.insert("/repo/y.cs".to_string());
        let mut orch = orchestrator(host, modified(&["Y.cs", "Z.cs"]));

        let report = orch.run();
        assert_eq!(report.failed, vec![PathBuf::from("/repo/Y.cs")]);
        assert_eq!(report.formatted, vec![PathBuf::from("/repo/Z.cs")]);
        assert_eq!(orch.host().saved, vec![PathBuf::from("/repo/Z.cs")]);

        // Both were opened just for the run and closed again.
        assert_eq!(orch.host().closed.len(), 2);
        assert!(orch.host().open.is_empty());
    }

    #[test]
    fn test_failed_file_not_retried_until_changed() {
        let mut host = FakeHost::new(&["Y.cs"]);
        host.failing.insert("/repo/y.cs".to_string());
        let mut orch = orchestrator(host, modified(&["Y.cs"]));

        orch.run();
        let report = orch.run();
        assert!(report.failed.is_empty());
        assert_eq!(report.fresh, 1);
        assert_eq!(orch.host().formatted.len(), 1);
    }

    #[test]
    fn test_already_open_document_stays_open() {
        let mut host = FakeHost::new(&["A.cs", "B.cs"]);
        let a = host.open_existing("A.cs");
        let mut orch = orchestrator(host, modified(&["A.cs", "B.cs"]));

        orch.run();
        assert!(orch.host().open.contains_key(&a.id));
        assert_eq!(orch.host().closed, vec![PathBuf::from("/repo/B.cs")]);
        assert_eq!(orch.host().active_document(), Some(a));
    }

    #[test]
    fn test_deleted_file_is_skipped() {
        let host = FakeHost::new(&["A.cs"]);
        let mut orch = orchestrator(host, modified(&["A.cs", "Gone.cs"]));

        let report = orch.run();
        assert_eq!(report.formatted, vec![PathBuf::from("/repo/A.cs")]);
        assert_eq!(report.unresolved, vec![PathBuf::from("/repo/Gone.cs")]);
        assert!(report.skipped.is_none());
    }

    #[test]
    fn test_no_working_tree_is_silent_noop() {
        let mut host = FakeHost::new(&["A.cs"]);
        host.root = None;
        let mut orch = orchestrator(host, modified(&["A.cs"]));

        let report = orch.run();
        assert_eq!(report.skipped, Some(SkipReason::NoWorkingTree));
        assert_eq!(orch.host().save_all_calls, 0);
    }

    #[test]
    fn test_invalid_repository_has_no_side_effects() {
        let host = FakeHost::new(&["A.cs"]);
        let mut orch = orchestrator(host, modified(&["A.cs"]));
        orch.vcs_mut().valid = false;

        let report = orch.run();
        assert_eq!(report.skipped, Some(SkipReason::NotARepository));
        assert_eq!(orch.host().save_all_calls, 0);
        assert!(orch.host().formatted.is_empty());
    }

    #[test]
    fn test_clean_tree_is_silent_noop() {
        let host = FakeHost::new(&["A.cs"]);
        let mut orch = orchestrator(host, vec![]);

        let report = orch.run();
        assert_eq!(report.skipped, Some(SkipReason::NoPendingChanges));
        assert_eq!(orch.host().save_all_calls, 1);
        assert!(orch.host().formatted.is_empty());
        assert!(orch.cache().is_empty());
    }

    #[test]
    fn test_fully_staged_files_are_restaged() {
        let mut host = FakeHost::new(&["Staged.cs", "New.cs", "Mixed.cs", "Local.cs", "Bad.cs"]);
        host.failing.insert("/repo/bad.cs".to_string());
        let entries = vec![
            StatusEntry::new("Staged.cs", Classification::Staged),
            StatusEntry::new("New.cs", Classification::Added),
            StatusEntry::new("Mixed.cs", Classification::Staged),
            StatusEntry::new("Mixed.cs", Classification::Modified),
            StatusEntry::new("Local.cs", Classification::Untracked),
            StatusEntry::new("Bad.cs", Classification::Staged),
        ];
        let mut orch = orchestrator(host, entries);

        let report = orch.run();
        let expected = vec![
            PathBuf::from("/repo/New.cs"),
            PathBuf::from("/repo/Staged.cs"),
        ];
        assert_eq!(report.restaged, expected);
        assert_eq!(*orch.vcs.staged.borrow(), expected);
        assert_eq!(report.failed, vec![PathBuf::from("/repo/Bad.cs")]);
    }

    #[test]
    fn test_nothing_restaged_when_files_are_fresh() {
        let host = FakeHost::new(&["Staged.cs"]);
        let entries = vec![StatusEntry::new("Staged.cs", Classification::Staged)];
        let mut orch = orchestrator(host, entries);

        orch.run();
        let second = orch.run();
        assert!(second.restaged.is_empty());
        assert_eq!(orch.vcs.staged.borrow().len(), 1);
    }
}
