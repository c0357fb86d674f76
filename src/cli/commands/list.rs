use anyhow::Result;
use clap::Args;
use std::path::Path;
use std::process::ExitCode;

use super::EXIT_SUCCESS;
use crate::cli::Output;
use crate::config::{ConfigOverrides, HookguardConfig, SourceKind, load_sources};
use crate::git::GitOperations;
use crate::hooks::BuiltinRegistry;

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Also list every available builtin check
    #[arg(long)]
    pub builtins: bool,
}

pub async fn execute(args: ListArgs, config: Option<&Path>, output: &Output) -> Result<ExitCode> {
    let root = GitOperations::discover(".")?.root()?;
    let loaded = HookguardConfig::load(&root, config, &ConfigOverrides::default())?;
    let sources = load_sources(&loaded)?;
    let registry = BuiltinRegistry::standard();

    if sources.iter().all(|s| s.hooks.is_empty()) {
        output.info("No hooks configured");
    }

    for source in &sources {
        output.header(&source.kind.to_string());
        for hook in &source.hooks {
            let detail = match (&source.kind, &hook.entry) {
                (SourceKind::Builtin, _) => registry.description(&hook.id).unwrap_or("unknown builtin"),
                (_, Some(entry)) => entry.as_str(),
                (_, None) => "",
            };
            let label = if hook.enabled {
                hook.display_name().to_string()
            } else {
                format!("{} (disabled)", hook.display_name())
            };
            output.key_value(&label, detail, hook.enabled);
        }
    }

    if args.builtins {
        output.header("available builtins");
        for id in registry.ids() {
            output.key_value(id, registry.description(id).unwrap_or(""), false);
        }
    }

    Ok(ExitCode::from(EXIT_SUCCESS))
}
