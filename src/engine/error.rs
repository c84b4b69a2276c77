//! engine::error
//!
//! Errors from a transaction run, and what the user needs to recover.
//!
//! Precondition errors (dirty tree, bad window, bad plan, bad commit count,
//! detached HEAD, unknown insertion point) are raised before the repository
//! is touched. Everything after carries a [`RecoveryInfo`] naming the
//! branches and commits involved. Nothing here is retried.

use thiserror::Error;

use super::transaction::Phase;
use crate::core::interleave::InterleaveError;
use crate::core::schedule::ScheduleError;
use crate::core::types::{BranchName, Oid};
use crate::git::GitError;

/// Process exit codes used by the CLI.
pub mod exit_code {
    /// The transaction failed after mutating the repository.
    pub const FAILURE: i32 = 1;
    /// The working tree had uncommitted changes.
    pub const DIRTY: i32 = 3;
    /// Invalid input: window, plan, commit count or insertion point.
    pub const PRECONDITION: i32 = 4;
}

/// Where a failed run left things.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryInfo {
    /// Phase the run was in when it failed.
    pub phase: Phase,
    /// Branch that was checked out before the run.
    pub original_branch: BranchName,
    /// Tip of the original branch before the run.
    pub original_head: Oid,
    /// Scratch branch holding the generated history.
    pub disposable_branch: BranchName,
    /// Last commit created on the scratch branch.
    pub last_commit: Option<Oid>,
}

impl RecoveryInfo {
    /// Shell steps that return the repository to its pre-run state.
    pub fn instructions(&self) -> String {
        let mut steps = vec![
            format!(
                "The generated history is on '{}'{}.",
                self.disposable_branch,
                self.last_commit
                    .as_ref()
                    .map(|c| format!(" (last commit {})", c.short(12)))
                    .unwrap_or_default()
            ),
            format!(
                "'{}' was at {} before the run.",
                self.original_branch,
                self.original_head.short(12)
            ),
            "To restore:".to_string(),
        ];
        match self.phase {
            Phase::Rebasing => {
                steps.push("  git rebase --abort   # only if a rebase is still in progress".into());
            }
            Phase::Committing => {
                steps.push(format!(
                    "  git reset --hard   # only if still on {} with uncommitted changes",
                    self.disposable_branch
                ));
            }
            _ => {}
        }
        steps.push(format!("  git checkout {}", self.original_branch));
        steps.push(format!(
            "  git reset --hard {}   # only if the branch moved",
            self.original_head.short(12)
        ));
        steps.push(format!("  git branch -D {}", self.disposable_branch));
        steps.join("\n")
    }
}

/// Errors from the transaction orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The schedule window is inverted or no timestamps were requested.
    #[error("invalid window: {0}")]
    InvalidWindow(#[from] ScheduleError),

    /// The repository has uncommitted changes.
    #[error("working tree has uncommitted changes; commit or stash them first")]
    DirtyWorkingTree,

    /// More commits requested than operations available.
    #[error("{requested} commits requested but the plan only has {available} operations")]
    InsufficientOperations { requested: usize, available: usize },

    /// Fewer than two commits requested.
    #[error("commit count must be at least 2, got {requested}")]
    InvalidCommitCount { requested: usize },

    /// The plan cannot be executed.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// HEAD is not on a branch.
    #[error("HEAD is detached; check out a branch first")]
    DetachedHead,

    /// The insertion point is not in the current branch's history.
    #[error("{commit} is not an ancestor of '{branch}'")]
    NotAnAncestor { commit: Oid, branch: BranchName },

    /// A repository operation failed.
    #[error("git operation failed during {phase}: {source}")]
    AdapterCommandFailure {
        phase: Phase,
        source: GitError,
        recovery: Option<Box<RecoveryInfo>>,
    },

    /// The generated history does not cancel out.
    #[error("generated history leaves a {residual_bytes}-byte residual diff")]
    ReconciliationMismatch {
        residual_bytes: usize,
        recovery: Box<RecoveryInfo>,
    },

    /// Replaying the original branch onto the new history conflicted.
    #[error("rebase conflict: {details}")]
    RebaseConflict {
        details: String,
        recovery: Box<RecoveryInfo>,
    },
}

impl EngineError {
    /// Wrap an adapter failure that happened before any mutation.
    pub(crate) fn guard(source: GitError) -> Self {
        EngineError::AdapterCommandFailure {
            phase: Phase::Guarding,
            source,
            recovery: None,
        }
    }

    /// Recovery details, for errors raised after the scratch branch exists.
    pub fn recovery(&self) -> Option<&RecoveryInfo> {
        match self {
            EngineError::AdapterCommandFailure { recovery, .. } => recovery.as_deref(),
            EngineError::ReconciliationMismatch { recovery, .. }
            | EngineError::RebaseConflict { recovery, .. } => Some(&**recovery),
            _ => None,
        }
    }

    /// Whether the error was raised before the repository was touched.
    pub fn is_precondition(&self) -> bool {
        match self {
            EngineError::AdapterCommandFailure { recovery, .. } => recovery.is_none(),
            EngineError::ReconciliationMismatch { .. } | EngineError::RebaseConflict { .. } => {
                false
            }
            _ => true,
        }
    }

    /// Exit code the CLI reports for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::DirtyWorkingTree => exit_code::DIRTY,
            EngineError::InvalidWindow(_)
            | EngineError::InsufficientOperations { .. }
            | EngineError::InvalidCommitCount { .. }
            | EngineError::InvalidPlan(_)
            | EngineError::DetachedHead
            | EngineError::NotAnAncestor { .. } => exit_code::PRECONDITION,
            EngineError::AdapterCommandFailure { .. }
            | EngineError::ReconciliationMismatch { .. }
            | EngineError::RebaseConflict { .. } => exit_code::FAILURE,
        }
    }
}

impl From<InterleaveError> for EngineError {
    fn from(err: InterleaveError) -> Self {
        match err {
            InterleaveError::EmptyPlan => EngineError::InvalidPlan(err.to_string()),
            InterleaveError::InvalidCommitCount { requested } => {
                EngineError::InvalidCommitCount { requested }
            }
            InterleaveError::InsufficientOperations {
                requested,
                available,
                ..
            } => EngineError::InsufficientOperations {
                requested,
                available,
            },
        }
    }
}
