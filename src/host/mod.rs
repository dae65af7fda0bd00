//! Host collaborator: the editor-like environment cleanup runs inside.

pub mod fs;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub use fs::FsHost;

/// An open document buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentHandle {
    pub id: u64,
    pub path: PathBuf,
}

/// Result of running the external formatter on the focused document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatOutcome {
    Success,
    Failure(String),
}

/// Operations the cleanup orchestrator needs from its host.
pub trait Host {
    /// Root of the solution/repository currently loaded, if any.
    fn working_tree_root(&self) -> Option<PathBuf>;

    fn file_last_write_time(&self, path: &Path) -> Result<DateTime<Utc>, Error>;

    fn save_all_open_documents(&mut self) -> Result<(), Error>;

    fn is_document_open(&self, path: &Path) -> bool;

    /// Open `path`; fails with [`Error::DocumentResolution`] if it cannot be
    /// loaded.
    fn open_document(&mut self, path: &Path) -> Result<DocumentHandle, Error>;

    fn get_open_document(&self, path: &Path) -> Option<DocumentHandle>;

    fn activate_document(&mut self, doc: &DocumentHandle) -> Result<(), Error>;

    fn close_document(&mut self, doc: DocumentHandle);

    /// Returns whether anything was written.
    fn save_document_if_dirty(&mut self, doc: &DocumentHandle) -> Result<bool, Error>;

    /// Format whichever document has focus.
    fn run_formatting_action(&mut self) -> FormatOutcome;

    fn active_document(&self) -> Option<DocumentHandle>;
}
