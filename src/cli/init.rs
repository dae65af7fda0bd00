//! Initialize tidyup for a repository.

use std::path::PathBuf;

use tracing::info;

use crate::cli::hooks;
use crate::config::Config;
use crate::error::Error;
use crate::vcs::GitCli;

/// Write the project config and install the pre-commit hook.
pub fn run(root: Option<PathBuf>, force: bool) -> Result<(), Error> {
    let root = match root {
        Some(root) => root,
        None => return Err(Error::NotARepository(std::env::current_dir()?)),
    };

    let config_path = Config::project_path(&root);
    let config = if config_path.exists() && !force {
        println!("Config already exists: {}", config_path.display());
        Config::load_from(&config_path)?
    } else {
        let config = Config::default();
        config.save(&root)?;
        info!(path = %config_path.display(), "Created config");
        println!("Created {}", config_path.display());
        config
    };

    if config.hooks.auto_install {
        let hooks_dir = GitCli::new().hooks_dir(&root)?;
        if hooks::install(&hooks_dir)? {
            println!("Pre-commit hook installed.");
        } else {
            println!("Pre-commit hook already installed.");
        }
    }

    if !config.formatter.is_configured() {
        println!();
        println!("Set [formatter].command in {} to enable cleanup.", config_path.display());
    }

    Ok(())
}

/// Remove the pre-commit hook.
pub fn uninstall(root: Option<PathBuf>) -> Result<(), Error> {
    let root = match root {
        Some(root) => root,
        None => return Err(Error::NotARepository(std::env::current_dir()?)),
    };

    let hooks_dir = GitCli::new().hooks_dir(&root)?;
    if hooks::uninstall(&hooks_dir)? {
        println!("Pre-commit hook removed.");
    } else {
        println!("No tidyup pre-commit hook found.");
    }
    Ok(())
}
