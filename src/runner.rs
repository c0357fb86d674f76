//! One complete pass: load, resolve, select, execute, aggregate

use crate::config::{ConfigOverrides, HookguardConfig, load_sources};
use crate::engine::{Engine, Job};
use crate::error::ConfigError;
use crate::files::{Snapshot, SnapshotSource};
use crate::git::GitOperations;
use crate::git::remote::RemoteCache;
use crate::hooks::{BuiltinRegistry, CheckContext, Plan, Resolver, selected_hooks};
use crate::report::{HookStatus, ReportSummary, RunResult};
use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Stages of a run. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Loading,
    Resolving,
    Selecting,
    Executing,
    Aggregating,
    Done { success: bool },
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Done { success: true } => write!(f, "Done (success)"),
            RunPhase::Done { success: false } => write!(f, "Done (failure)"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Inputs for a run
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Any directory inside the repository
    pub directory: PathBuf,
    pub config_file: Option<PathBuf>,
    pub overrides: ConfigOverrides,
    pub source: SnapshotSource,
    /// Run a single hook by id
    pub only: Option<String>,
    pub cache_dir: Option<PathBuf>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            config_file: None,
            overrides: ConfigOverrides::default(),
            source: SnapshotSource::Staged,
            only: None,
            cache_dir: None,
        }
    }
}

/// Drives one run through its phases
pub struct Runner {
    builtins: Arc<BuiltinRegistry>,
    cancel: CancellationToken,
    phase: RunPhase,
}

impl Runner {
    pub fn new(builtins: BuiltinRegistry) -> Self {
        Self {
            builtins: Arc::new(builtins),
            cancel: CancellationToken::new(),
            phase: RunPhase::Idle,
        }
    }

    /// Cancelling this token aborts remote fetches and outstanding hooks
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn enter(&mut self, phase: RunPhase) {
        tracing::debug!("Run phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Execute every enabled hook.
    ///
    /// Configuration errors abort before any hook runs. Per-hook problems
    /// only show up in the returned summary.
    pub async fn run(&mut self, options: &RunOptions) -> Result<ReportSummary> {
        let started = Instant::now();

        self.enter(RunPhase::Loading);
        let git = GitOperations::discover(&options.directory)?;
        let root = git.root()?;
        let config = HookguardConfig::load(&root, options.config_file.as_deref(), &options.overrides)?;
        let sources = load_sources(&config)?;

        if let Some(only) = &options.only
            && !sources.iter().flat_map(|s| &s.hooks).any(|h| &h.id == only)
        {
            return Err(ConfigError::InvalidValue {
                field: "hook".into(),
                reason: format!("no hook with id '{only}' is configured"),
            }
            .into());
        }

        self.enter(RunPhase::Resolving);
        let cache = RemoteCache::new(
            options.cache_dir.clone().unwrap_or_else(RemoteCache::default_dir),
            config.fetch_retries,
        )
        .with_cancellation(self.cancel.clone());
        // git2 fetches block, so resolution runs off the async workers
        let resolving = {
            let builtins = Arc::clone(&self.builtins);
            let sources = sources.clone();
            let root = root.clone();
            let exclude = config.exclude.clone();
            let timeout = config.default_timeout();
            let only = options.only.clone();
            tokio::task::spawn_blocking(move || {
                Resolver::new(&builtins, &cache, &root, &exclude, timeout)
                    .resolve_all(&sources, only.as_deref())
            })
        };
        let cancel = self.cancel.clone();
        let plans = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Run cancelled while resolving hooks");
                let results: Vec<RunResult> = selected_hooks(&sources, options.only.as_deref())
                    .enumerate()
                    .map(|(index, spec)| {
                        RunResult::not_run(
                            index,
                            &spec.id,
                            spec.display_name(),
                            HookStatus::Cancelled,
                            "cancelled before execution",
                        )
                    })
                    .collect();
                let total = results.len();
                return self.finish(results, total, true, started);
            }
            joined = resolving => joined.context("Hook resolution task aborted")?,
        };

        self.enter(RunPhase::Selecting);
        let snapshot = Snapshot::collect(&git, &root, &options.source)?;
        let total = plans.len();
        let jobs = schedule(plans, &snapshot);

        self.enter(RunPhase::Executing);
        let ctx = Arc::new(CheckContext {
            root,
            branch: git.current_branch(),
        });
        let engine = Engine::new(config.worker_count())
            .with_fail_fast(config.fail_fast)
            .with_cancellation(self.cancel.clone());
        let execution = engine.execute(jobs, ctx).await;

        self.finish(execution.results, total, execution.incomplete, started)
    }

    fn finish(
        &mut self,
        results: Vec<RunResult>,
        total: usize,
        incomplete: bool,
        started: Instant,
    ) -> Result<ReportSummary> {
        self.enter(RunPhase::Aggregating);
        let summary = ReportSummary::aggregate(results, total, incomplete, started.elapsed())
            .context("Internal error while aggregating results")?;

        self.enter(RunPhase::Done {
            success: summary.is_success(),
        });
        Ok(summary)
    }
}

/// Turn plans into jobs, settling the ones that cannot or need not run
pub fn schedule(plans: Vec<Plan>, snapshot: &Snapshot) -> Vec<Job> {
    plans
        .into_iter()
        .map(|plan| match plan {
            Plan::Unresolved {
                index,
                id,
                name,
                error,
            } => Job::Settled(RunResult::not_run(
                index,
                &id,
                &name,
                HookStatus::Error,
                error.to_string(),
            )),
            Plan::Ready(hook) => {
                let files = hook.filter.select(snapshot);
                if files.is_empty() && !hook.always_run {
                    tracing::debug!("No files for '{}', skipping", hook.id);
                    Job::Settled(RunResult::not_run(
                        hook.index,
                        &hook.id,
                        &hook.name,
                        HookStatus::Skipped,
                        "no files to check",
                    ))
                } else {
                    Job::Run { hook, files }
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_support::init_repo_with;
    use tempfile::TempDir;

    fn options(dir: &TempDir) -> RunOptions {
        RunOptions {
            directory: dir.path().to_path_buf(),
            cache_dir: Some(dir.path().join(".cache-test")),
            ..Default::default()
        }
    }

    async fn run_once(options: &RunOptions) -> Result<ReportSummary> {
        Runner::new(BuiltinRegistry::standard()).run(options).await
    }

    #[tokio::test]
    async fn test_long_line_fails_run() {
        let dir = TempDir::new().unwrap();
        let long = "x".repeat(120);
        init_repo_with(
            dir.path(),
            &[
                (
                    ".hookguard.yaml",
                    "repos:\n  - repo: builtin\n    hooks:\n      - id: max-line-length\n        args: [\"--max-line-length=100\"]\n        files: [\"*.py\"]\n",
                ),
                ("app.py", format!("print(1)\n{long}\n").as_str()),
            ],
        );

        let summary = run_once(&options(&dir)).await.unwrap();
        assert_eq!(summary.results.len(), 1);
        assert_eq!(summary.results[0].status, HookStatus::Failed);
        assert!(summary.results[0].output.contains("app.py:2"));
        assert!(!summary.is_success());
        assert_ne!(summary.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_no_enabled_hooks_succeeds() {
        let dir = TempDir::new().unwrap();
        init_repo_with(
            dir.path(),
            &[(
                ".hookguard.yaml",
                "repos:\n  - repo: builtin\n    hooks:\n      - id: check-json\n        enabled: false\n",
            )],
        );

        let summary = run_once(&options(&dir)).await.unwrap();
        assert!(summary.results.is_empty());
        assert!(summary.is_success());
        assert_eq!(summary.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_missing_repo_aborts_before_execution() {
        let dir = TempDir::new().unwrap();
        init_repo_with(
            dir.path(),
            &[(
                ".hookguard.yaml",
                "repos:\n  - rev: v1.0.0\n    hooks:\n      - id: lint\n",
            )],
        );

        let mut runner = Runner::new(BuiltinRegistry::standard());
        let err = runner.run(&options(&dir)).await.unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
        assert_eq!(runner.phase(), RunPhase::Loading);
    }

    #[tokio::test]
    async fn test_empty_fileset_skips_and_errors_are_isolated() {
        let dir = TempDir::new().unwrap();
        init_repo_with(
            dir.path(),
            &[
                (
                    ".hookguard.yaml",
                    r#"
repos:
  - repo: builtin
    hooks:
      - id: check-json
        files: ["*.json"]
      - id: trailing-whitespace
  - repo: local
    hooks:
      - id: missing-tool
        entry: definitely-not-a-real-program-xyz
"#,
                ),
                ("notes.txt", "clean\n"),
            ],
        );

        let summary = run_once(&options(&dir)).await.unwrap();
        let statuses: Vec<_> = summary.results.iter().map(|r| r.status).collect();
        assert_eq!(
            statuses,
            [HookStatus::Skipped, HookStatus::Passed, HookStatus::Error]
        );
        assert!(summary.results[2].output.contains("not found"));
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn test_unknown_only_hook_is_config_error() {
        let dir = TempDir::new().unwrap();
        init_repo_with(dir.path(), &[(".hookguard.yaml", "repos: []\n")]);

        let mut opts = options(&dir);
        opts.only = Some("nope".into());
        let err = run_once(&opts).await.unwrap_err();
        assert!(err.downcast_ref::<ConfigError>().is_some());
    }

    /// Hook repository publishing `count-files`, tagged `v1.0.0`
    fn hook_repository(dir: &std::path::Path) {
        use std::os::unix::fs::PermissionsExt;

        let repo = init_repo_with(
            dir,
            &[
                (
                    ".hookguard-hooks.yaml",
                    "- id: count-files\n  name: Count files\n  entry: ./check.sh\n  files: [\"*.txt\"]\n",
                ),
                ("check.sh", "#!/bin/sh\necho \"checked $#\"\n"),
            ],
        );
        let script = dir.join("check.sh");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(std::path::Path::new("check.sh")).unwrap();
        index.write().unwrap();
        crate::git::test_support::commit_all(&repo, "hooks");

        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.tag_lightweight("v1.0.0", head.as_object(), false).unwrap();
    }

    #[tokio::test]
    async fn test_remote_hook_runs_from_checkout() {
        let upstream = TempDir::new().unwrap();
        hook_repository(upstream.path());

        let dir = TempDir::new().unwrap();
        let config = format!(
            "repos:\n  - repo: \"{}\"\n    rev: v1.0.0\n    hooks:\n      - id: count-files\n",
            upstream.path().display()
        );
        init_repo_with(
            dir.path(),
            &[
                (".hookguard.yaml", config.as_str()),
                ("a.txt", "a\n"),
                ("b.rs", "fn b() {}\n"),
            ],
        );

        let summary = run_once(&options(&dir)).await.unwrap();
        let result = &summary.results[0];
        assert_eq!(result.status, HookStatus::Passed, "{}", result.output);
        assert_eq!(result.name, "Count files");
        assert_eq!(result.output.trim(), "checked 1");
        assert_eq!(result.file_count, 1);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical() {
        let dir = TempDir::new().unwrap();
        init_repo_with(
            dir.path(),
            &[
                (
                    ".hookguard.yaml",
                    "repos:\n  - repo: builtin\n    hooks:\n      - id: trailing-whitespace\n      - id: end-of-file\n",
                ),
                ("a.txt", "trailing \n"),
                ("b.txt", "no newline"),
            ],
        );

        let first = run_once(&options(&dir)).await.unwrap();
        let second = run_once(&options(&dir)).await.unwrap();
        let statuses = |s: &ReportSummary| s.results.iter().map(|r| r.status).collect::<Vec<_>>();
        assert_eq!(statuses(&first), statuses(&second));
        assert_eq!(statuses(&first), [HookStatus::Failed, HookStatus::Failed]);
    }

    #[tokio::test]
    async fn test_cancel_during_resolution_marks_every_hook_cancelled() {
        let dir = TempDir::new().unwrap();
        init_repo_with(
            dir.path(),
            &[
                (
                    ".hookguard.yaml",
                    r#"
repos:
  - repo: https://example.invalid/hooks.git
    rev: v1.0.0
    hooks:
      - id: lint
  - repo: builtin
    hooks:
      - id: trailing-whitespace
      - id: check-json
        enabled: false
"#,
                ),
                ("a.txt", "clean\n"),
            ],
        );

        let token = CancellationToken::new();
        token.cancel();
        let mut runner = Runner::new(BuiltinRegistry::standard()).with_cancellation(token);
        let summary = runner.run(&options(&dir)).await.unwrap();

        assert!(summary.incomplete);
        let statuses: Vec<_> = summary.results.iter().map(|r| r.status).collect();
        assert_eq!(statuses, [HookStatus::Cancelled, HookStatus::Cancelled]);
        assert_eq!(summary.results[1].id, "trailing-whitespace");
        assert_eq!(runner.phase(), RunPhase::Done { success: false });
    }

    #[tokio::test]
    async fn test_reaches_done_phase() {
        let dir = TempDir::new().unwrap();
        init_repo_with(dir.path(), &[(".hookguard.yaml", "repos: []\n")]);

        let mut runner = Runner::new(BuiltinRegistry::standard());
        runner.run(&options(&dir)).await.unwrap();
        assert_eq!(runner.phase(), RunPhase::Done { success: true });
    }
}
