use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::cli::Output;

pub mod clean;
pub mod install;
pub mod list;
pub mod run;
pub mod uninstall;
pub mod validate;

/// Every hook passed (or there was nothing to run)
pub const EXIT_SUCCESS: u8 = 0;
/// A hook failed, errored or timed out, or the run was cancelled
pub const EXIT_FAILURE: u8 = 1;
/// Configuration or internal error; no hook was run
pub const EXIT_ERROR: u8 = 2;

#[derive(Parser)]
#[command(
    name = "hookguard",
    version = env!("CARGO_PKG_VERSION"),
    about = "Declarative pre-commit hook runner",
    long_about = "hookguard runs the checks declared in .hookguard.yaml against staged files. \
                  Hooks come from built-in checks, local commands, or git repositories \
                  pinned to an immutable revision."
)]
pub struct Cli {
    /// Run as if started in <DIR> instead of current working directory
    #[arg(short = 'C', long = "directory", global = true)]
    pub directory: Option<PathBuf>,

    /// Increase verbosity (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Use custom configuration file
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run hooks against staged files (default)
    Run(run::RunArgs),
    /// Install the git pre-commit hook into the current repository
    Install(install::InstallArgs),
    /// Remove the git pre-commit hook installed by hookguard
    Uninstall(uninstall::UninstallArgs),
    /// List configured hooks
    List(list::ListArgs),
    /// Load and resolve the configuration without running anything
    Validate(validate::ValidateArgs),
    /// Remove cached hook repositories
    Clean(clean::CleanArgs),
}

impl Cli {
    pub async fn run(self) -> Result<ExitCode> {
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)
                .with_context(|| format!("Cannot change directory to {}", dir.display()))?;
        }

        setup_logging(self.verbose, self.quiet);

        let output = Output::new(self.verbose > 0, self.quiet);
        let config = self.config.as_deref();

        match self.command {
            Some(Commands::Run(args)) => run::execute(args, config, &output).await,
            Some(Commands::Install(args)) => install::execute(args, &output).await,
            Some(Commands::Uninstall(args)) => uninstall::execute(args, &output).await,
            Some(Commands::List(args)) => list::execute(args, config, &output).await,
            Some(Commands::Validate(args)) => validate::execute(args, config, &output).await,
            Some(Commands::Clean(args)) => clean::execute(args, &output).await,
            None => run::execute(run::RunArgs::default(), config, &output).await,
        }
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match verbose {
            0 => tracing_subscriber::EnvFilter::new("warn"),
            1 => tracing_subscriber::EnvFilter::new("info,globset=warn"),
            2 => tracing_subscriber::EnvFilter::new("debug,globset=warn"),
            _ => tracing_subscriber::EnvFilter::new("trace"),
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
