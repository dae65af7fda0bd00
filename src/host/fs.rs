//! File-backed host for command-line and daemon use.
//!
//! Documents are in-memory copies of files under the working tree. The
//! formatting action pipes the focused buffer through the configured formatter
//! command. In `stdout` mode its stdout becomes the new buffer content, unless
//! the command rewrote the file on disk itself, in which case the disk wins.
//! In `in_place` mode the buffer is always reloaded from disk and stdout is
//! only logged.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{DocumentHandle, FormatOutcome, Host};
use crate::config::{FormatterConfig, FormatterMode};
use crate::error::Error;
use crate::vcs::normalize_key;

#[derive(Debug)]
struct Buffer {
    path: PathBuf,
    key: String,
    content: Vec<u8>,
    dirty: bool,
}

/// Host whose documents are plain files.
#[derive(Debug)]
pub struct FsHost {
    root: Option<PathBuf>,
    formatter: FormatterConfig,
    buffers: BTreeMap<u64, Buffer>,
    next_id: u64,
    active: Option<u64>,
}

impl FsHost {
    pub fn new(root: Option<PathBuf>, formatter: FormatterConfig) -> Self {
        Self {
            root,
            formatter,
            buffers: BTreeMap::new(),
            next_id: 1,
            active: None,
        }
    }

    fn find(&self, path: &Path) -> Option<(u64, &Buffer)> {
        let key = normalize_key(path);
        self.buffers
            .iter()
            .find(|(_, buffer)| buffer.key == key)
            .map(|(id, buffer)| (*id, buffer))
    }

    fn write_buffer(buffer: &mut Buffer) -> Result<bool, Error> {
        if !buffer.dirty {
            return Ok(false);
        }
        fs::write(&buffer.path, &buffer.content)?;
        buffer.dirty = false;
        debug!(path = %buffer.path.display(), "Saved document");
        Ok(true)
    }
}

impl Host for FsHost {
    fn working_tree_root(&self) -> Option<PathBuf> {
        self.root.clone()
    }

    fn file_last_write_time(&self, path: &Path) -> Result<DateTime<Utc>, Error> {
        let modified = fs::metadata(path)
            .and_then(|meta| meta.modified())
            .map_err(|e| Error::resolution(path, e))?;
        Ok(DateTime::<Utc>::from(modified))
    }

    fn save_all_open_documents(&mut self) -> Result<(), Error> {
        for buffer in self.buffers.values_mut() {
            Self::write_buffer(buffer)?;
        }
        Ok(())
    }

    fn is_document_open(&self, path: &Path) -> bool {
        self.find(path).is_some()
    }

    fn open_document(&mut self, path: &Path) -> Result<DocumentHandle, Error> {
        if let Some(doc) = self.get_open_document(path) {
            return Ok(doc);
        }

        let content = fs::read(path).map_err(|e| Error::resolution(path, e))?;
        let id = self.next_id;
        self.next_id += 1;
        self.buffers.insert(
            id,
            Buffer {
                path: path.to_path_buf(),
                key: normalize_key(path),
                content,
                dirty: false,
            },
        );

        debug!(id, path = %path.display(), "Opened document");
        Ok(DocumentHandle {
            id,
            path: path.to_path_buf(),
        })
    }

    fn get_open_document(&self, path: &Path) -> Option<DocumentHandle> {
        self.find(path).map(|(id, buffer)| DocumentHandle {
            id,
            path: buffer.path.clone(),
        })
    }

    fn activate_document(&mut self, doc: &DocumentHandle) -> Result<(), Error> {
        if !self.buffers.contains_key(&doc.id) {
            return Err(Error::resolution(&doc.path, "document is not open"));
        }
        self.active = Some(doc.id);
        Ok(())
    }

    fn close_document(&mut self, doc: DocumentHandle) {
        if self.buffers.remove(&doc.id).is_some() {
            debug!(id = doc.id, path = %doc.path.display(), "Closed document");
        }
        if self.active == Some(doc.id) {
            self.active = None;
        }
    }

    fn save_document_if_dirty(&mut self, doc: &DocumentHandle) -> Result<bool, Error> {
        let buffer = self
            .buffers
            .get_mut(&doc.id)
            .ok_or_else(|| Error::resolution(&doc.path, "document is not open"))?;
        Self::write_buffer(buffer)
    }

    fn run_formatting_action(&mut self) -> FormatOutcome {
        let Some(id) = self.active else {
            return FormatOutcome::Failure("no active document".to_string());
        };
        if !self.formatter.is_configured() {
            return FormatOutcome::Failure("no formatter command configured".to_string());
        }

        let formatter = &self.formatter;
        let Some(buffer) = self.buffers.get_mut(&id) else {
            return FormatOutcome::Failure("active document is not open".to_string());
        };

        let before = fs::read(&buffer.path).ok();
        let output = match run_formatter(formatter, &buffer.path, &buffer.content) {
            Ok(output) => output,
            Err(e) => {
                warn!(path = %buffer.path.display(), error = %e, "Formatter failed");
                return FormatOutcome::Failure(e.to_string());
            }
        };

        let on_disk = match fs::read(&buffer.path) {
            Ok(content) => content,
            Err(e) => return FormatOutcome::Failure(e.to_string()),
        };
        let rewritten = before.as_deref() != Some(on_disk.as_slice());

        if formatter.mode == FormatterMode::InPlace || rewritten {
            if !output.is_empty() {
                debug!(
                    path = %buffer.path.display(),
                    output = %String::from_utf8_lossy(&output).trim(),
                    "Formatter rewrote file, ignoring stdout"
                );
            }
            buffer.content = on_disk;
            buffer.dirty = false;
        } else if !output.is_empty() && output != buffer.content {
            buffer.content = output;
            buffer.dirty = true;
        }

        FormatOutcome::Success
    }

    fn active_document(&self) -> Option<DocumentHandle> {
        let id = self.active?;
        self.buffers.get(&id).map(|buffer| DocumentHandle {
            id,
            path: buffer.path.clone(),
        })
    }
}

/// Pipe `input` through the formatter and return its stdout.
fn run_formatter(
    formatter: &FormatterConfig,
    path: &Path,
    input: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut command = Command::new(&formatter.command);
    command
        .args(formatter.args_for(path))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = path.parent() {
        command.current_dir(dir);
    }

    let mut child = command.spawn()?;
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::other("formatter stdin unavailable"))?;

    // Feed stdin from another thread so a large stdout can't deadlock us.
    let input = input.to_vec();
    let writer = std::thread::spawn(move || stdin.write_all(&input));

    let output = child.wait_with_output()?;
    // Formatters that ignore stdin close it early; a broken pipe is fine.
    let _ = writer.join();

    if !output.status.success() {
        return Err(Error::other(format!(
            "{} exited with {}: {}",
            formatter.command,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(output.stdout)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn formatter(command: &str, args: &[&str]) -> FormatterConfig {
        FormatterConfig {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            mode: FormatterMode::Stdout,
        }
    }

    fn upper_case() -> FormatterConfig {
        formatter("tr", &["a-z", "A-Z"])
    }

    #[test]
    fn test_open_format_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("App.cs");
        fs::write(&path, "class app {}\n").unwrap();

        let mut host = FsHost::new(Some(dir.path().to_path_buf()), upper_case());
        let doc = host.open_document(&path).unwrap();
        assert!(host.is_document_open(&path));

        host.activate_document(&doc).unwrap();
        assert_eq!(host.run_formatting_action(), FormatOutcome::Success);

        // Nothing hits disk until saved.
        assert_eq!(fs::read_to_string(&path).unwrap(), "class app {}\n");
        assert!(host.save_document_if_dirty(&doc).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "CLASS APP {}\n");
        assert!(!host.save_document_if_dirty(&doc).unwrap());
    }

    #[test]
    fn test_lookup_ignores_case() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("App.cs");
        fs::write(&path, "x").unwrap();

        let mut host = FsHost::new(None, upper_case());
        let doc = host.open_document(&path).unwrap();

        let upper = dir.path().join("APP.CS");
        assert_eq!(host.get_open_document(&upper), Some(doc));
    }

    #[test]
    fn test_failing_formatter_leaves_buffer_clean() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("App.cs");
        fs::write(&path, "class app {}\n").unwrap();

        let mut host = FsHost::new(None, formatter("false", &[]));
        let doc = host.open_document(&path).unwrap();
        host.activate_document(&doc).unwrap();

        assert!(matches!(
            host.run_formatting_action(),
            FormatOutcome::Failure(_)
        ));
        assert!(!host.save_document_if_dirty(&doc).unwrap());
    }

    #[test]
    fn test_in_place_formatter_reloads_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("App.cs");
        fs::write(&path, "before").unwrap();

        let mut host = FsHost::new(
            None,
            formatter("sh", &["-c", "printf after > \"$0\"", "{path}"]),
        );
        let doc = host.open_document(&path).unwrap();
        host.activate_document(&doc).unwrap();

        assert_eq!(host.run_formatting_action(), FormatOutcome::Success);
        assert!(!host.save_document_if_dirty(&doc).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "after");
    }

    #[test]
    fn test_in_place_formatter_progress_output_is_not_saved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("App.cs");
        fs::write(&path, "class  App{}\n").unwrap();

        // Rewrites the file and prints a summary, as csharpier does.
        let mut host = FsHost::new(
            None,
            formatter(
                "sh",
                &[
                    "-c",
                    "printf 'class App {}\\n' > \"$0\"; echo 'Formatted 1 files in 12ms.'",
                    "{path}",
                ],
            ),
        );
        let doc = host.open_document(&path).unwrap();
        host.activate_document(&doc).unwrap();

        assert_eq!(host.run_formatting_action(), FormatOutcome::Success);
        assert!(!host.save_document_if_dirty(&doc).unwrap());
        host.save_all_open_documents().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "class App {}\n");
    }

    #[test]
    fn test_in_place_mode_ignores_stdout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("App.cs");
        fs::write(&path, "class App {}\n").unwrap();

        // Already formatted: nothing changes on disk, only a summary line.
        let mut config = formatter("echo", &["Formatted 0 files."]);
        config.mode = FormatterMode::InPlace;
        let mut host = FsHost::new(None, config);
        let doc = host.open_document(&path).unwrap();
        host.activate_document(&doc).unwrap();

        assert_eq!(host.run_formatting_action(), FormatOutcome::Success);
        assert!(!host.save_document_if_dirty(&doc).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "class App {}\n");
    }

    #[test]
    fn test_missing_file_fails_to_resolve() {
        let dir = TempDir::new().unwrap();
        let mut host = FsHost::new(None, upper_case());

        let err = host.open_document(&dir.path().join("Gone.cs")).unwrap_err();
        assert!(matches!(err, Error::DocumentResolution { .. }));
        assert!(host.file_last_write_time(&dir.path().join("Gone.cs")).is_err());
    }

    #[test]
    fn test_close_clears_focus() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("App.cs");
        fs::write(&path, "x").unwrap();

        let mut host = FsHost::new(None, upper_case());
        let doc = host.open_document(&path).unwrap();
        host.activate_document(&doc).unwrap();
        assert_eq!(host.active_document(), Some(doc.clone()));

        host.close_document(doc);
        assert!(host.active_document().is_none());
        assert!(!host.is_document_open(&path));
        assert!(matches!(
            host.run_formatting_action(),
            FormatOutcome::Failure(_)
        ));
    }

    #[test]
    fn test_no_formatter_configured() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("App.cs");
        fs::write(&path, "x").unwrap();

        let mut host = FsHost::new(None, FormatterConfig::default());
        let doc = host.open_document(&path).unwrap();
        host.activate_document(&doc).unwrap();
        assert!(matches!(
            host.run_formatting_action(),
            FormatOutcome::Failure(_)
        ));
    }
}
