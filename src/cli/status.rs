//! Show what a cleanup run would consider, without formatting anything.

use std::path::PathBuf;

use crate::cli::hooks::hook_installed;
use crate::config::Config;
use crate::error::Error;
use crate::vcs::{collect_candidates, GitCli};

pub fn run(root: Option<PathBuf>, config: &Config) -> Result<(), Error> {
    let Some(root) = root else {
        println!("Not inside a git working tree.");
        return Ok(());
    };

    let git = GitCli::new();
    let snapshot = collect_candidates(&git, &root)?;

    println!("Working tree: {}", root.display());
    println!("Branch: {}", snapshot.branch);

    if config.formatter.is_configured() {
        println!(
            "Formatter: {} {}",
            config.formatter.command,
            config.formatter.args.join(" ")
        );
    } else {
        println!("Formatter: (not configured, set [formatter].command)");
    }

    match git.hooks_dir(&root) {
        Ok(dir) if hook_installed(&dir) => println!("Pre-commit hook: installed"),
        Ok(_) => println!("Pre-commit hook: not installed (run `tidyup init`)"),
        Err(e) => println!("Pre-commit hook: unknown ({})", e),
    }

    if snapshot.candidates.is_empty() {
        println!("No pending changes.");
        return Ok(());
    }

    let eligible = config.policy.filter(&snapshot.candidates);
    println!(
        "{} dirty file(s), {} eligible for cleanup:",
        snapshot.candidates.len(),
        eligible.len()
    );
    for file in &eligible {
        let shown = file.path.strip_prefix(&root).unwrap_or(&file.path);
        println!("  {}", shown.display());
    }

    Ok(())
}
