//! recover command - Inspect or clean up after a failed run
//!
//! The engine never deletes a scratch branch it could not prove merged.
//! This command is the explicit, operator-driven way to do so.

use std::path::Path;

use anyhow::{bail, Context as _, Result};

use super::Session;
use crate::core::ops::lock::RepoLock;
use crate::core::ops::recovery::RecoveryRecord;
use crate::git::RepoAdapter;
use crate::ui::output::{self, Verbosity};

/// Show the recovery record, and optionally restore or discard.
pub fn recover(repo: &Path, restore: bool, discard: bool, verbosity: Verbosity) -> Result<()> {
    let session = Session::open(repo)?;
    let _lock = RepoLock::acquire(&session.paths).context("cannot recover")?;

    let Some(record) = RecoveryRecord::read(&session.paths)? else {
        output::print("No failed run to recover from.", verbosity);
        return Ok(());
    };

    output::print(describe(&record), verbosity);

    if restore {
        if session.git.is_dirty()? {
            bail!("working tree has uncommitted changes; commit or stash them before restoring");
        }
        session
            .git
            .checkout(&record.original_branch)
            .with_context(|| format!("failed to check out '{}'", record.original_branch))?;
        output::print(format!("Checked out {}", record.original_branch), verbosity);
    }

    if discard {
        if let Some(branch) = &record.disposable_branch {
            if session.git.current_branch()?.as_ref() == Some(branch) {
                bail!("'{branch}' is checked out; run with --restore first");
            }
            if session.git.branch_exists(branch) {
                session.git.delete_branch(branch)?;
                output::print(format!("Deleted {branch}"), verbosity);
            }
        }
        RecoveryRecord::remove(&session.paths)?;
        output::print("Recovery record removed.", verbosity);
    } else if !restore {
        output::print("\nRun with --restore and/or --discard to clean up.", verbosity);
    }

    Ok(())
}

fn describe(record: &RecoveryRecord) -> String {
    let mut lines = vec![
        format!(
            "Run {} failed during {} at {}",
            record.run_id,
            record.phase,
            output::format_time(*record.recorded_at.as_datetime())
        ),
        format!("  error:    {}", record.error),
        format!(
            "  original: {} at {}",
            record.original_branch,
            record.original_head.short(12)
        ),
    ];
    if let Some(branch) = &record.disposable_branch {
        lines.push(format!("  scratch:  {branch}"));
    }
    if let Some(commit) = &record.last_commit {
        lines.push(format!("  last:     {}", commit.short(12)));
    }
    lines.push(format!("  plan:     {}", record.plan_digest));
    lines.join("\n")
}
