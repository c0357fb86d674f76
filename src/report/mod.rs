//! Result aggregation and reporting
//!
//! Per-hook [`RunResult`]s are folded into a [`ReportSummary`] that always
//! lists hooks in declaration order, whatever order they finished in.

use crate::error::AggregationError;
use console::style;
use serde::{Serialize, Serializer};
use std::fmt::Write as _;
use std::time::Duration;

/// Width of the dotted leader between hook name and status
const NAME_COLUMN: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Passed,
    Failed,
    /// Could not be resolved or executed
    Error,
    /// Empty FileSet or fail-fast
    Skipped,
    TimedOut,
    Cancelled,
}

impl HookStatus {
    /// Whether this status makes the run fail
    pub fn is_failure(self) -> bool {
        matches!(self, HookStatus::Failed | HookStatus::Error | HookStatus::TimedOut)
    }

    pub fn label(self) -> &'static str {
        match self {
            HookStatus::Passed => "Passed",
            HookStatus::Failed => "Failed",
            HookStatus::Error => "Error",
            HookStatus::Skipped => "Skipped",
            HookStatus::TimedOut => "Timed out",
            HookStatus::Cancelled => "Cancelled",
        }
    }
}

/// Outcome of one hook in one run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub status: HookStatus,
    pub output: String,
    #[serde(rename = "duration_secs", serialize_with = "as_secs")]
    pub duration: Duration,
    pub file_count: usize,
}

impl RunResult {
    /// A result that never started running
    pub fn not_run(index: usize, id: &str, name: &str, status: HookStatus, output: impl Into<String>) -> Self {
        Self {
            index,
            id: id.to_string(),
            name: name.to_string(),
            status,
            output: output.into(),
            duration: Duration::ZERO,
            file_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Success,
    Failure,
}

/// Aggregated outcome of a run
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub status: OverallStatus,
    /// The run was aborted before every hook finished
    pub incomplete: bool,
    #[serde(rename = "duration_secs", serialize_with = "as_secs")]
    pub duration: Duration,
    pub results: Vec<RunResult>,
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl ReportSummary {
    /// Fold `results` for a run of `total` hooks into declaration order.
    ///
    /// Every index in `0..total` must be reported exactly once.
    pub fn aggregate(
        results: Vec<RunResult>,
        total: usize,
        incomplete: bool,
        duration: Duration,
    ) -> Result<Self, AggregationError> {
        let mut slots: Vec<Option<RunResult>> = (0..total).map(|_| None).collect();
        for result in results {
            let index = result.index;
            let slot = slots
                .get_mut(index)
                .ok_or(AggregationError::OutOfRange { index, total })?;
            if slot.replace(result).is_some() {
                return Err(AggregationError::DuplicateResult(index));
            }
        }

        let results = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(AggregationError::Missing(index)))
            .collect::<Result<Vec<_>, _>>()?;

        let failed = incomplete || results.iter().any(|r| r.status.is_failure());
        Ok(Self {
            status: if failed {
                OverallStatus::Failure
            } else {
                OverallStatus::Success
            },
            incomplete,
            duration,
            results,
        })
    }

    pub fn is_success(&self) -> bool {
        self.status == OverallStatus::Success
    }

    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn count(&self, status: HookStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RunResult> {
        self.results.iter().filter(|r| r.status.is_failure())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable report
    pub fn render_text(&self, verbose: bool) -> String {
        let mut out = String::new();

        for result in &self.results {
            let name = &result.name;
            let dots = NAME_COLUMN.saturating_sub(name.chars().count() + 1).max(3);
            let status = match result.status {
                HookStatus::Passed => style(result.status.label()).green(),
                HookStatus::Skipped => style(result.status.label()).cyan(),
                HookStatus::Cancelled => style(result.status.label()).yellow(),
                _ => style(result.status.label()).red().bold(),
            };
            let files = match result.file_count {
                1 => "1 file".to_string(),
                n => format!("{n} files"),
            };
            let _ = writeln!(
                out,
                "{} {} {} {}",
                name,
                style(".".repeat(dots)).dim(),
                status,
                style(format!("({:.2}s, {})", result.duration.as_secs_f64(), files)).dim()
            );

            let show_output = result.status.is_failure()
                || (verbose && !result.output.trim().is_empty());
            if show_output {
                for line in result.output.trim_end().lines() {
                    let _ = writeln!(out, "    {line}");
                }
            }
        }

        let _ = writeln!(out, "{}", style("─".repeat(50)).dim());

        let failed = self.failures().count();
        let summary = if self.incomplete {
            style(format!(
                "⚠ Run incomplete: {} of {} hooks cancelled",
                self.count(HookStatus::Cancelled),
                self.results.len()
            ))
            .yellow()
            .bold()
        } else if failed > 0 {
            style(format!("✖ {} of {} hooks failed", failed, self.results.len()))
                .red()
                .bold()
        } else {
            style(format!(
                "✔ {} passed, {} skipped",
                self.count(HookStatus::Passed),
                self.count(HookStatus::Skipped)
            ))
            .green()
            .bold()
        };
        let _ = writeln!(out, "{summary} {}", style(format!("in {:.2}s", self.duration.as_secs_f64())).dim());
        out
    }
}
