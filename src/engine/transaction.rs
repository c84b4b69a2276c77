//! engine::transaction
//!
//! The disposable-branch transaction.
//!
//! A [`Transaction`] owns everything a run creates: the scratch branch, the
//! commits on it, and the knowledge of where the user started. The
//! orchestrator moves it through its phases:
//!
//! ```text
//! begin -> commit_bucket* -> reconcile -> finish
//!                  \             \
//!                   +-------------+--> rollback
//! ```
//!
//! # Invariants
//!
//! - The original branch ref is not written before `finish`
//! - `finish` deletes the scratch branch only after proving its tip is
//!   contained in the original branch
//! - `rollback` never deletes anything

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::error::{EngineError, RecoveryInfo};
use crate::core::config::ResidualPolicy;
use crate::core::types::{BranchName, Oid};
use crate::git::{GitError, RepoAdapter};

/// Transaction phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Guarding,
    Branching,
    Committing,
    Reconciling,
    Rebasing,
    Restoring,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Guarding => "guarding",
            Phase::Branching => "branching",
            Phase::Committing => "committing",
            Phase::Reconciling => "reconciling",
            Phase::Rebasing => "rebasing",
            Phase::Restoring => "restoring",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a transaction knows about the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionState {
    pub phase: Phase,
    /// Branch checked out when the run started.
    pub original_branch: BranchName,
    /// Tip of the original branch when the run started.
    pub original_head: Oid,
    /// Commit the scratch branch was created at.
    pub start_point: Oid,
    /// The scratch branch.
    pub disposable_branch: BranchName,
    /// Commits created so far, oldest first.
    pub created_commits: Vec<Oid>,
    /// Timestamp of the newest created commit.
    last_time: Option<DateTime<Utc>>,
    /// Paths written for a bucket that has not been committed yet.
    pending: Vec<PathBuf>,
}

impl TransactionState {
    /// Whether the new history is appended at the tip of the original branch.
    pub fn is_tip_mode(&self) -> bool {
        self.start_point == self.original_head
    }

    pub fn last_commit(&self) -> Option<&Oid> {
        self.created_commits.last()
    }
}

/// Result of the reconciliation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The history already cancelled out.
    Clean,
    /// A residual of this many patch bytes was folded into the last commit.
    Folded { residual_bytes: usize },
}

/// Result of a finished transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    /// Whether the original branch was rebased onto the new history.
    pub rebased: bool,
    /// Tip of the original branch after the run.
    pub new_tip: Oid,
    /// Whether the tip's tree equals the tree before the run.
    pub net_zero: bool,
}

/// A scratch-branch transaction against a repository.
pub struct Transaction<'a, A: RepoAdapter + ?Sized> {
    adapter: &'a A,
    state: TransactionState,
}

impl<'a, A: RepoAdapter + ?Sized> Transaction<'a, A> {
    /// Create the scratch branch at `start_point` and check it out.
    ///
    /// Fails with the branch left untouched if creation fails. If checkout
    /// fails the branch exists but the user is still on `original_branch`.
    pub fn begin(
        adapter: &'a A,
        original_branch: BranchName,
        original_head: Oid,
        start_point: Oid,
        disposable_branch: BranchName,
    ) -> Result<Self, EngineError> {
        let mut tx = Self {
            adapter,
            state: TransactionState {
                phase: Phase::Branching,
                original_branch,
                original_head,
                start_point,
                disposable_branch,
                created_commits: Vec::new(),
                last_time: None,
                pending: Vec::new(),
            },
        };

        adapter
            .create_branch(&tx.state.disposable_branch, &tx.state.start_point)
            .map_err(|source| EngineError::AdapterCommandFailure {
                phase: Phase::Branching,
                source,
                recovery: None,
            })?;
        if let Err(source) = adapter.checkout(&tx.state.disposable_branch) {
            return Err(tx.fail(source));
        }

        tracing::info!(
            branch = %tx.state.disposable_branch,
            start = %tx.state.start_point.short(7),
            "transaction started"
        );
        tx.state.phase = Phase::Committing;
        Ok(tx)
    }

    pub fn state(&self) -> &TransactionState {
        &self.state
    }

    /// Recovery details for the current state.
    pub fn recovery_info(&self) -> RecoveryInfo {
        RecoveryInfo {
            phase: self.state.phase,
            original_branch: self.state.original_branch.clone(),
            original_head: self.state.original_head.clone(),
            disposable_branch: self.state.disposable_branch.clone(),
            last_commit: self.state.last_commit().cloned(),
        }
    }

    fn fail(&mut self, source: GitError) -> EngineError {
        let err = EngineError::AdapterCommandFailure {
            phase: self.state.phase,
            source,
            recovery: Some(Box::new(self.recovery_info())),
        };
        self.state.phase = Phase::Failed;
        err
    }

    /// Write the files and create one backdated commit.
    pub fn commit_bucket(
        &mut self,
        writes: &[(&Path, &[u8])],
        message: &str,
        time: DateTime<Utc>,
    ) -> Result<Oid, EngineError> {
        debug_assert_eq!(self.state.phase, Phase::Committing);

        self.state.pending = writes.iter().map(|(p, _)| p.to_path_buf()).collect();
        let result = writes
            .iter()
            .try_for_each(|(path, content)| self.adapter.write_file(path, content))
            .and_then(|()| {
                let paths: Vec<&Path> = writes.iter().map(|(p, _)| *p).collect();
                self.adapter.stage_and_commit(&paths, message, time)
            });

        match result {
            Ok(oid) => {
                tracing::debug!(commit = %oid.short(7), %time, "bucket committed");
                self.state.created_commits.push(oid.clone());
                self.state.last_time = Some(time);
                self.state.pending.clear();
                Ok(oid)
            }
            Err(source) => Err(self.fail(source)),
        }
    }

    /// Make the scratch branch's net effect on the start point empty.
    pub fn reconcile(&mut self, policy: ResidualPolicy) -> Result<Reconciliation, EngineError> {
        self.state.phase = Phase::Reconciling;

        let Some(last) = self.state.last_commit().cloned() else {
            return Ok(Reconciliation::Clean);
        };

        let residual = match self.adapter.diff_between(&self.state.start_point, &last) {
            Ok(patch) => patch,
            Err(source) => return Err(self.fail(source)),
        };
        if residual.is_empty() {
            tracing::debug!("history cancels out");
            return Ok(Reconciliation::Clean);
        }

        let residual_bytes = residual.len();
        tracing::warn!(residual_bytes, %policy, "generated history leaves a residual");

        if policy == ResidualPolicy::Reject {
            return Err(self.mismatch(residual_bytes));
        }

        let time = self.state.last_time.unwrap_or_else(Utc::now);
        let amended = self
            .adapter
            .reverse_apply(&residual)
            .and_then(|()| self.adapter.amend_commit_timestamp(time));
        let amended = match amended {
            Ok(oid) => oid,
            Err(source) => return Err(self.fail(source)),
        };
        if let Some(slot) = self.state.created_commits.last_mut() {
            *slot = amended.clone();
        }

        match self.adapter.diff_between(&self.state.start_point, &amended) {
            Ok(patch) if patch.is_empty() => {
                tracing::info!(residual_bytes, "residual folded into final commit");
                Ok(Reconciliation::Folded { residual_bytes })
            }
            Ok(patch) => Err(self.mismatch(patch.len())),
            Err(source) => Err(self.fail(source)),
        }
    }

    fn mismatch(&mut self, residual_bytes: usize) -> EngineError {
        let recovery = Box::new(self.recovery_info());
        self.state.phase = Phase::Failed;
        EngineError::ReconciliationMismatch {
            residual_bytes,
            recovery,
        }
    }

    /// Move the original branch onto the new history and drop the scratch branch.
    ///
    /// Tip mode fast-forwards the original branch. Ancestor mode rebases the
    /// original branch's later commits onto the scratch branch.
    pub fn finish(mut self) -> Result<Finished, EngineError> {
        let original = self.state.original_branch.clone();
        let disposable = self.state.disposable_branch.clone();
        let rebased = !self.state.is_tip_mode();

        if rebased {
            self.state.phase = Phase::Rebasing;
            match self.adapter.rebase_onto(&disposable, &original) {
                Ok(()) => {}
                Err(GitError::Conflict { details, .. }) => {
                    let recovery = Box::new(self.recovery_info());
                    self.state.phase = Phase::Failed;
                    return Err(EngineError::RebaseConflict { details, recovery });
                }
                Err(source) => return Err(self.fail(source)),
            }
            self.state.phase = Phase::Restoring;
        } else {
            self.state.phase = Phase::Restoring;
            if let Err(source) = self
                .adapter
                .checkout(&original)
                .and_then(|()| self.adapter.fast_forward(&disposable))
            {
                return Err(self.fail(source));
            }
        }

        let proven = self
            .adapter
            .branch_tip(&disposable)
            .and_then(|scratch| {
                let tip = self.adapter.branch_tip(&original)?;
                Ok((self.adapter.is_ancestor(&scratch, &tip)?, tip))
            });
        let new_tip = match proven {
            Ok((true, tip)) => tip,
            Ok((false, _)) => {
                return Err(self.fail(GitError::Internal {
                    message: format!("'{disposable}' is not contained in '{original}'"),
                }))
            }
            Err(source) => return Err(self.fail(source)),
        };

        if let Err(source) = self.adapter.delete_branch(&disposable) {
            return Err(self.fail(source));
        }

        let net_zero = match self
            .adapter
            .diff_between(&self.state.original_head, &new_tip)
        {
            Ok(patch) => patch.is_empty(),
            Err(source) => return Err(self.fail(source)),
        };
        if !net_zero {
            tracing::warn!(branch = %original, "tree differs from before the run");
        }

        self.state.phase = Phase::Done;
        tracing::info!(branch = %original, tip = %new_tip.short(7), rebased, "transaction finished");
        Ok(Finished {
            rebased,
            new_tip,
            net_zero,
        })
    }

    /// Return to the original branch if that is safe; keep the scratch branch.
    ///
    /// Files written for a bucket that never got committed hold nothing but
    /// plan content, so they are reset to the scratch branch's HEAD first.
    /// Returns whether the original branch is checked out afterwards.
    pub fn rollback(&mut self) -> bool {
        self.state.phase = Phase::Failed;

        if !self.state.pending.is_empty() {
            let paths: Vec<&Path> = self.state.pending.iter().map(PathBuf::as_path).collect();
            match self.adapter.restore_paths(&paths) {
                Ok(()) => {
                    tracing::debug!(paths = paths.len(), "discarded uncommitted bucket");
                    self.state.pending.clear();
                }
                Err(e) => {
                    tracing::warn!(error = %e, "could not discard uncommitted bucket");
                }
            }
        }

        match self.adapter.is_dirty() {
            Ok(false) => {}
            Ok(true) => {
                tracing::warn!(
                    branch = %self.state.disposable_branch,
                    "working tree is dirty; staying on the scratch branch"
                );
                return false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not check working tree during rollback");
                return false;
            }
        }

        match self.adapter.checkout(&self.state.original_branch) {
            Ok(()) => {
                tracing::info!(branch = %self.state.original_branch, "rolled back");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not return to the original branch");
                false
            }
        }
    }
}
