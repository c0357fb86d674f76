use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::cli::Output;
use crate::config::{ConfigOverrides, HookguardConfig, load_sources};
use crate::git::GitOperations;
use crate::git::remote::RemoteCache;
use crate::hooks::{BuiltinRegistry, Plan, Resolver};

#[derive(Args, Debug, Default)]
pub struct ValidateArgs {
    /// Where remote hook repositories are cached
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

pub async fn execute(args: ValidateArgs, config: Option<&Path>, output: &Output) -> Result<ExitCode> {
    let root = GitOperations::discover(".")?.root()?;
    let loaded = HookguardConfig::load(&root, config, &ConfigOverrides::default())?;
    let sources = load_sources(&loaded)?;

    let registry = BuiltinRegistry::standard();
    let cache = RemoteCache::new(
        args.cache_dir.unwrap_or_else(RemoteCache::default_dir),
        loaded.fetch_retries,
    );
    let resolver = Resolver::new(
        &registry,
        &cache,
        &root,
        &loaded.exclude,
        loaded.default_timeout(),
    );

    let plans = resolver.resolve_all(&sources, None);
    let mut unresolved = 0;
    for plan in &plans {
        match plan {
            Plan::Ready(hook) => output.success(&format!("{} ({})", hook.id, hook.source)),
            Plan::Unresolved { error, .. } => {
                unresolved += 1;
                output.error(&error.to_string());
            }
        }
    }

    if unresolved > 0 {
        output.error(&format!("{unresolved} of {} hooks could not be resolved", plans.len()));
        return Ok(ExitCode::from(EXIT_FAILURE));
    }

    output.success(&format!("Configuration valid: {} hooks", plans.len()));
    Ok(ExitCode::from(EXIT_SUCCESS))
}
