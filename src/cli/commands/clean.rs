use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;

use super::EXIT_SUCCESS;
use crate::cli::Output;
use crate::git::remote::RemoteCache;

#[derive(Args, Debug, Default)]
pub struct CleanArgs {
    /// Cache directory to remove (defaults to the user cache)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

pub async fn execute(args: CleanArgs, output: &Output) -> Result<ExitCode> {
    let cache = RemoteCache::new(args.cache_dir.unwrap_or_else(RemoteCache::default_dir), 0);

    if !cache.cache_dir().exists() {
        output.info(&format!("Nothing to clean at {}", cache.cache_dir().display()));
        return Ok(ExitCode::from(EXIT_SUCCESS));
    }

    cache.clean()?;
    output.success(&format!("Removed {}", cache.cache_dir().display()));
    Ok(ExitCode::from(EXIT_SUCCESS))
}
