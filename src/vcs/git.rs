//! `git` command-line backend.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use super::status::{parse_branch_head, parse_porcelain_v2, StatusEntry};
use super::VersionControl;
use crate::error::Error;

/// Branch name reported when HEAD is not on a branch.
pub const DETACHED_HEAD: &str = "(detached)";

/// Runs the `git` binary found on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    /// Top-level directory of the working tree containing `dir`.
    pub fn discover_root(&self, dir: &Path) -> Option<PathBuf> {
        let output = self.git(dir, &["rev-parse", "--show-toplevel"]).ok()?;
        if !output.status.success() {
            return None;
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if root.is_empty() {
            None
        } else {
            Some(PathBuf::from(root))
        }
    }

    /// Hooks directory of the repository at `root`. Honors worktrees and
    /// `core.hooksPath`.
    pub fn hooks_dir(&self, root: &Path) -> Result<PathBuf, Error> {
        let out = self.git_stdout(root, &["rev-parse", "--git-path", "hooks"])?;
        let dir = PathBuf::from(out.trim());
        Ok(if dir.is_absolute() { dir } else { root.join(dir) })
    }

    fn git(&self, root: &Path, args: &[&str]) -> Result<Output, Error> {
        debug!(root = %root.display(), ?args, "Running git");
        Command::new("git")
            .args(args)
            .current_dir(root)
            .output()
            .map_err(|e| Error::Git(format!("failed to run git {}: {}", args.join(" "), e)))
    }

    fn git_stdout(&self, root: &Path, args: &[&str]) -> Result<String, Error> {
        let output = self.git(root, args)?;
        if !output.status.success() {
            return Err(Error::Git(format!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl VersionControl for GitCli {
    fn is_valid_working_tree(&self, root: &Path) -> bool {
        if !root.is_dir() {
            return false;
        }
        self.git_stdout(root, &["rev-parse", "--is-inside-work-tree"])
            .map(|out| out.trim() == "true")
            .unwrap_or(false)
    }

    fn status(&self, root: &Path) -> Result<Vec<StatusEntry>, Error> {
        let output = self.git_stdout(
            root,
            &[
                "status",
                "--porcelain=v2",
                "--branch",
                "--untracked-files=all",
                "-z",
            ],
        )?;
        Ok(parse_porcelain_v2(&output))
    }

    fn current_branch_name(&self, root: &Path) -> Result<String, Error> {
        // `# branch.head` is also set on unborn branches.
        let output = self.git_stdout(
            root,
            &[
                "status",
                "--porcelain=v2",
                "--branch",
                "--untracked-files=no",
                "-z",
            ],
        )?;
        Ok(parse_branch_head(&output).unwrap_or_else(|| DETACHED_HEAD.to_string()))
    }

    fn stage(&self, root: &Path, paths: &[PathBuf]) -> Result<(), Error> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["add".to_string(), "--".to_string()];
        args.extend(
            paths
                .iter()
                .map(|p| p.strip_prefix(root).unwrap_or(p).to_string_lossy().into_owned()),
        );
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.git_stdout(root, &args)?;
        debug!(root = %root.display(), count = paths.len(), "Staged files");
        Ok(())
    }
}
