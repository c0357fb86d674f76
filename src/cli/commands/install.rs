use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use super::EXIT_SUCCESS;
use crate::cli::Output;
use crate::git::GitOperations;

/// Git hook hookguard installs itself as
pub const HOOK_NAME: &str = "pre-commit";

/// Identifies scripts written by hookguard
pub const HOOK_MARKER: &str = "# installed by hookguard";

#[derive(Args, Debug, Default)]
pub struct InstallArgs {
    /// Overwrite an existing pre-commit hook
    #[arg(long)]
    pub force: bool,
}

/// Contents of the installed pre-commit script
pub fn hook_script() -> String {
    format!(
        "#!/bin/sh\n{HOOK_MARKER} {}\nexec hookguard run \"$@\"\n",
        env!("CARGO_PKG_VERSION")
    )
}

pub async fn execute(args: InstallArgs, output: &Output) -> Result<ExitCode> {
    let git = GitOperations::discover(".")?;

    if let Some(existing) = git.read_hook(HOOK_NAME) {
        if existing.contains(HOOK_MARKER) {
            tracing::debug!("Replacing previous hookguard script");
        } else if !args.force {
            output.warning(&format!(
                "A '{HOOK_NAME}' hook already exists at {}",
                git.hook_path(HOOK_NAME).display()
            ));
            output.info("Use --force to overwrite it");
            return Ok(ExitCode::from(super::EXIT_FAILURE));
        } else {
            output.warning(&format!("Overwriting existing '{HOOK_NAME}' hook"));
        }
    }

    git.install_hook(HOOK_NAME, &hook_script())?;
    output.success(&format!(
        "Installed '{HOOK_NAME}' hook at {}",
        git.hook_path(HOOK_NAME).display()
    ));
    Ok(ExitCode::from(EXIT_SUCCESS))
}
