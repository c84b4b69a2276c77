//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Results go to stdout and respect the quiet flag. Warnings and errors go
//! to stderr. Structured diagnostics are emitted through `tracing`, not here.

use std::fmt::Display;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::core::plan::{Operation, OperationPlan};
use crate::engine::{PlannedCommit, RecoveryInfo, RunPlan, RunReport};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Format a timestamp the way git shows ISO dates.
pub fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn format_operation(plan: &OperationPlan, op: Operation) -> String {
    format!("{} {}", op.kind, plan.pair(op).file_path.display())
}

fn summary_line(message: &str) -> &str {
    message.lines().next().unwrap_or_default()
}

/// Render one planned commit as a short block.
pub fn format_planned_commit(plan: &OperationPlan, index: usize, commit: &PlannedCommit) -> String {
    let mut out = format!(
        "{:>3}. {}  {}",
        index + 1,
        format_time(commit.timestamp),
        summary_line(&commit.message)
    );
    for op in &commit.operations {
        out.push_str("\n       ");
        out.push_str(&format_operation(plan, *op));
    }
    out
}

/// Render a full preview.
pub fn format_run_plan(plan: &OperationPlan, run: &RunPlan) -> String {
    let mut lines = vec![
        format!(
            "Branch {} at {}",
            run.original_branch,
            run.original_head.short(12)
        ),
        format!("Window {}", run.window),
    ];
    if run.start_point != run.original_head {
        lines.push(format!("Inserting after {}", run.start_point.short(12)));
    }
    lines.push(String::new());
    lines.extend(
        run.commits
            .iter()
            .enumerate()
            .map(|(i, c)| format_planned_commit(plan, i, c)),
    );
    lines.join("\n")
}

/// Render the result of a successful run.
pub fn format_report(report: &RunReport) -> String {
    let mut lines = vec![format!(
        "Created {} commit(s) on {} ({} -> {})",
        report.commits.len(),
        report.original_branch,
        report.original_head.short(7),
        report.new_tip.short(7)
    )];
    if report.rebased {
        lines.push(format!("Rebased later commits of {}", report.original_branch));
    }
    if let Some(bytes) = report.folded_residual {
        lines.push(format!("Folded a {bytes}-byte residual into the last commit"));
    }
    lines.push(if report.net_zero {
        "Tree unchanged".to_string()
    } else {
        "Tree differs from before the run".to_string()
    });
    lines.join("\n")
}

/// Print recovery instructions to stderr (always shown).
pub fn recovery(info: &RecoveryInfo) {
    eprintln!("{}", info.instructions());
}
