use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use super::EXIT_SUCCESS;
use super::install::{HOOK_MARKER, HOOK_NAME};
use crate::cli::Output;
use crate::git::GitOperations;

#[derive(Args, Debug, Default)]
pub struct UninstallArgs {}

pub async fn execute(_args: UninstallArgs, output: &Output) -> Result<ExitCode> {
    let git = GitOperations::discover(".")?;

    match git.read_hook(HOOK_NAME) {
        None => output.info("No pre-commit hook installed"),
        Some(content) if !content.contains(HOOK_MARKER) => {
            output.warning(&format!(
                "The '{HOOK_NAME}' hook was not installed by hookguard, leaving it in place"
            ));
        }
        Some(_) => {
            git.remove_hook(HOOK_NAME)?;
            output.success(&format!("Removed '{HOOK_NAME}' hook"));
        }
    }

    Ok(ExitCode::from(EXIT_SUCCESS))
}
