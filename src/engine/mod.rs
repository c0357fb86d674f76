//! Execution engine
//!
//! Runs resolved hooks against their FileSets. Hooks are independent: up to
//! `concurrency` run at once, a failing hook never stops the others (unless
//! fail-fast is on), and each hook owns its subprocess for exactly the
//! duration of its run. Results come back in declaration order.

mod process;

use crate::error::ExecutionError;
use crate::files::FileSet;
use crate::hooks::{CheckContext, HookAction, ResolvedHook};
use crate::report::{HookStatus, RunResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// One unit of work for the engine
#[derive(Debug)]
pub enum Job {
    /// Execute `hook` against `files`
    Run { hook: ResolvedHook, files: FileSet },
    /// Outcome already known (resolution error, empty FileSet)
    Settled(RunResult),
}

impl Job {
    fn index(&self) -> usize {
        match self {
            Job::Run { hook, .. } => hook.index,
            Job::Settled(result) => result.index,
        }
    }
}

/// Results of one execution pass
#[derive(Debug)]
pub struct Execution {
    /// One result per job, in declaration order
    pub results: Vec<RunResult>,
    /// Cancelled before every job finished
    pub incomplete: bool,
}

#[derive(Debug, Clone)]
pub struct Engine {
    concurrency: usize,
    fail_fast: bool,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            fail_fast: false,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Abort outstanding hooks when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub async fn execute(&self, jobs: Vec<Job>, ctx: Arc<CheckContext>) -> Execution {
        let total = jobs.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let tripped = Arc::new(AtomicBool::new(false));
        let mut slots: Vec<Option<RunResult>> = (0..total).map(|_| None).collect();
        let mut pending: Vec<(usize, String, String)> = Vec::new();
        let mut tasks = JoinSet::new();

        tracing::debug!("Executing {} hooks with concurrency {}", total, self.concurrency);

        for job in jobs {
            let index = job.index();
            match job {
                Job::Settled(result) => {
                    if result.status.is_failure() {
                        self.trip(&tripped);
                    }
                    slots[index] = Some(result);
                }
                Job::Run { hook, files } => {
                    pending.push((index, hook.id.clone(), hook.name.clone()));
                    let worker = Worker {
                        semaphore: semaphore.clone(),
                        tripped: tripped.clone(),
                        fail_fast: self.fail_fast,
                        cancel: self.cancel.clone(),
                        ctx: ctx.clone(),
                    };
                    tasks.spawn(worker.run(hook, files));
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    if result.status.is_failure() {
                        self.trip(&tripped);
                    }
                    tracing::debug!("Hook '{}' finished: {:?}", result.id, result.status);
                    let index = result.index;
                    slots[index] = Some(result);
                }
                Err(e) => tracing::error!("Hook task panicked: {}", e),
            }
        }

        let cancelled = self.cancel.is_cancelled();
        // Anything without a result was lost to a panic or never got to finish
        for (index, id, name) in pending {
            if slots[index].is_none() {
                let (status, output) = if cancelled {
                    (HookStatus::Cancelled, "cancelled before completion")
                } else {
                    (HookStatus::Error, "hook task aborted unexpectedly")
                };
                slots[index] = Some(RunResult::not_run(index, &id, &name, status, output));
            }
        }

        let results: Vec<RunResult> = slots.into_iter().flatten().collect();
        let incomplete = results.iter().any(|r| r.status == HookStatus::Cancelled);
        if incomplete {
            tracing::warn!("Run cancelled before every hook finished");
        }
        Execution { results, incomplete }
    }

    fn trip(&self, tripped: &AtomicBool) {
        if self.fail_fast {
            tripped.store(true, Ordering::SeqCst);
        }
    }
}

/// Per-hook state moved into its task
struct Worker {
    semaphore: Arc<Semaphore>,
    tripped: Arc<AtomicBool>,
    fail_fast: bool,
    cancel: CancellationToken,
    ctx: Arc<CheckContext>,
}

impl Worker {
    async fn run(self, hook: ResolvedHook, files: FileSet) -> RunResult {
        let not_run = |status, output: &str| RunResult::not_run(hook.index, &hook.id, &hook.name, status, output);

        let _permit = tokio::select! {
            permit = self.semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return not_run(HookStatus::Error, "scheduler closed"),
            },
            _ = self.cancel.cancelled() => {
                return not_run(HookStatus::Cancelled, "cancelled before start");
            }
        };

        if self.fail_fast && self.tripped.load(Ordering::SeqCst) {
            return not_run(HookStatus::Skipped, "skipped after an earlier failure (fail-fast)");
        }

        tracing::info!("Running '{}' on {} files", hook.id, files.len());
        let started = Instant::now();
        let (status, output) = self.invoke(&hook, &files).await;

        // Trip while the permit is still held so no queued hook slips in
        if self.fail_fast && status.is_failure() {
            self.tripped.store(true, Ordering::SeqCst);
        }

        RunResult {
            index: hook.index,
            id: hook.id.clone(),
            name: hook.name.clone(),
            status,
            output,
            duration: started.elapsed(),
            file_count: files.len(),
        }
    }

    async fn invoke(&self, hook: &ResolvedHook, files: &FileSet) -> (HookStatus, String) {
        let work = async {
            match &hook.action {
                HookAction::Command(spec) => process::run_command(spec, files, &self.ctx.root).await,
                HookAction::Builtin(check) => {
                    let check = check.clone();
                    let ctx = self.ctx.clone();
                    let files = files.clone();
                    match tokio::task::spawn_blocking(move || check.run(&ctx, &files)).await {
                        Ok(Ok(outcome)) if outcome.passed() => (HookStatus::Passed, String::new()),
                        Ok(Ok(outcome)) => (HookStatus::Failed, outcome.findings.join("\n")),
                        Ok(Err(e)) => (HookStatus::Error, e.to_string()),
                        Err(e) => (HookStatus::Error, ExecutionError::Join(e.to_string()).to_string()),
                    }
                }
            }
        };

        tokio::select! {
            outcome = tokio::time::timeout(hook.timeout, work) => match outcome {
                Ok(result) => result,
                Err(_) => (HookStatus::TimedOut, format!("timed out after {}", format_timeout(hook.timeout))),
            },
            _ = self.cancel.cancelled() => (HookStatus::Cancelled, "cancelled".to_string()),
        }
    }
}

fn format_timeout(timeout: Duration) -> String {
    if timeout.subsec_millis() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{:.1}s", timeout.as_secs_f64())
    }
}
