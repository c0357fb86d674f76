//! # hookguard - declarative pre-commit hooks
//!
//! hookguard reads a list of hook sources from `.hookguard.yaml`, resolves
//! each declared hook to an executable action, selects the files it applies
//! to, runs the hooks concurrently and reports a single verdict.
//!
//! ## Features
//!
//! - **Pinned sources**: remote hook repositories must name an immutable
//!   revision (tag or commit SHA) and are fetched once into a local cache
//! - **Builtin checks**: whitespace, end-of-file, merge markers, JSON, YAML,
//!   TOML and XML syntax, line length, large files, protected branches
//! - **Isolation**: a failing, erroring or hanging hook never takes down
//!   the others; timeouts and Ctrl-C kill the hook's subprocess
//!
//! ## Quick Start
//!
//! ```bash
//! # Install the git hook
//! hookguard install
//!
//! # Run every hook against all tracked files
//! hookguard run --all-files
//! ```
//!
//! ## Library use
//!
//! ```no_run
//! use hookguard::hooks::BuiltinRegistry;
//! use hookguard::runner::{RunOptions, Runner};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut runner = Runner::new(BuiltinRegistry::standard());
//! let summary = runner.run(&RunOptions::default()).await?;
//! println!("{}", summary.render_text(false));
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod files;
pub mod git;
pub mod hooks;
pub mod report;
pub mod runner;
pub mod shared;

pub use cli::{Cli, Output};
pub use config::HookguardConfig;
pub use report::{HookStatus, ReportSummary};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
