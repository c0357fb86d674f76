use anyhow::Result;
use clap::{Args, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use crate::cli::Output;
use crate::config::ConfigOverrides;
use crate::files::SnapshotSource;
use crate::hooks::BuiltinRegistry;
use crate::runner::{RunOptions, Runner};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Run on all tracked files instead of the staged ones
    #[arg(long, conflicts_with = "files")]
    pub all_files: bool,

    /// Run on these files only
    #[arg(long, num_args = 1.., value_name = "FILE")]
    pub files: Vec<String>,

    /// Run only the hook with this id
    #[arg(long, value_name = "ID")]
    pub hook: Option<String>,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Maximum hooks running at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Default per-hook timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Skip remaining hooks after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Where remote hook repositories are cached
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

impl RunArgs {
    fn options(self, config: Option<&Path>) -> RunOptions {
        let source = if self.all_files {
            SnapshotSource::AllFiles
        } else if !self.files.is_empty() {
            SnapshotSource::Explicit(self.files)
        } else {
            SnapshotSource::Staged
        };

        RunOptions {
            directory: PathBuf::from("."),
            config_file: config.map(Path::to_path_buf),
            overrides: ConfigOverrides {
                concurrency: self.concurrency,
                timeout_secs: self.timeout,
                fail_fast: self.fail_fast.then_some(true),
            },
            source,
            only: self.hook,
            cache_dir: self.cache_dir,
        }
    }
}

pub async fn execute(args: RunArgs, config: Option<&Path>, output: &Output) -> Result<ExitCode> {
    let format = args.format;
    let options = args.options(config);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling outstanding hooks");
            on_interrupt.cancel();
        }
    });

    let spinner = match format {
        OutputFormat::Text => output.spinner("Running hooks"),
        OutputFormat::Json => indicatif::ProgressBar::hidden(),
    };

    let mut runner = Runner::new(BuiltinRegistry::standard()).with_cancellation(cancel);
    let result = runner.run(&options).await;
    spinner.finish_and_clear();
    interrupt.abort();

    let summary = result?;
    match format {
        OutputFormat::Json => println!("{}", summary.to_json()?),
        OutputFormat::Text => {
            if summary.results.is_empty() {
                output.info("No hooks to run");
            } else {
                output.print(&summary.render_text(output.is_verbose()));
            }
        }
    }

    Ok(ExitCode::from(summary.exit_code() as u8))
}
