//! Pre-commit hook installation and removal.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::Error;

const HOOK_COMMENT: &str = "# tidyup pre-commit cleanup (auto-installed)";

/// Never fails the commit.
const HOOK_COMMAND: &str = "tidyup run || true";

fn is_ours(line: &str) -> bool {
    let line = line.trim();
    line == HOOK_COMMENT || line == HOOK_COMMAND
}

fn contains_ours(content: &str) -> bool {
    content.lines().any(|line| line.trim() == HOOK_COMMAND)
}

/// Check if our pre-commit hook is installed.
pub fn hook_installed(hooks_dir: &Path) -> bool {
    fs::read_to_string(hooks_dir.join("pre-commit"))
        .map(|content| contains_ours(&content))
        .unwrap_or(false)
}

/// Install the pre-commit hook, appending to an existing hook if present.
///
/// Returns false if it was already installed.
pub fn install(hooks_dir: &Path) -> Result<bool, Error> {
    fs::create_dir_all(hooks_dir)?;
    let path = hooks_dir.join("pre-commit");

    let content = if path.exists() {
        let existing = fs::read_to_string(&path)?;
        if contains_ours(&existing) {
            return Ok(false);
        }
        format!("{}\n\n{}\n{}\n", existing.trim_end(), HOOK_COMMENT, HOOK_COMMAND)
    } else {
        format!("#!/bin/sh\n{}\n{}\n", HOOK_COMMENT, HOOK_COMMAND)
    };

    fs::write(&path, content)?;
    make_executable(&path)?;
    info!(path = %path.display(), "Installed pre-commit hook");
    Ok(true)
}

/// Remove our lines from the pre-commit hook, deleting the file if nothing
/// else is left. Returns false if there was nothing to remove.
pub fn uninstall(hooks_dir: &Path) -> Result<bool, Error> {
    let path = hooks_dir.join("pre-commit");
    if !path.exists() {
        return Ok(false);
    }

    let content = fs::read_to_string(&path)?;
    if !content.lines().any(is_ours) {
        return Ok(false);
    }

    let cleaned = remove_section(&content);
    if cleaned.trim().is_empty() || cleaned.trim() == "#!/bin/sh" {
        fs::remove_file(&path)?;
    } else {
        fs::write(&path, format!("{}\n", cleaned.trim_end()))?;
    }
    info!(path = %path.display(), "Removed pre-commit hook");
    Ok(true)
}

fn remove_section(content: &str) -> String {
    content
        .lines()
        .filter(|line| !is_ours(line))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), Error> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), Error> {
    Ok(())
}
