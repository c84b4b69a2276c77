//! engine::orchestrator
//!
//! Drives one run from precondition checks to a restored branch.
//!
//! # Lifecycle
//!
//! ```text
//! Idle -> Guarding -> Branching -> Committing -> Reconciling
//!      -> [Rebasing] -> Restoring -> Done
//! ```
//!
//! Any failure moves to `Failed`. Guarding is read-only: the dirty check
//! comes before any other adapter call, and interleaving and scheduling are
//! pure. Failures while committing or reconciling roll back to the original
//! branch when the tree allows it. The scratch branch is always kept for
//! inspection.
//!
//! # Example
//!
//! ```no_run
//! use commit_mirage::core::plan::{OperationPair, OperationPlan};
//! use commit_mirage::engine::{EngineConfig, Orchestrator, RunRequest};
//! use commit_mirage::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let plan = OperationPlan::new(vec![
//!     OperationPair::new("a.txt", "A2", "A1", "Expand a", "Restore a"),
//! ])?;
//!
//! let report = Orchestrator::new(&git, EngineConfig::default())
//!     .run(&RunRequest::new(&plan, 2), &mut rand::rng())?;
//! assert!(report.net_zero);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use rand::Rng;

use super::error::EngineError;
use super::transaction::{Phase, Reconciliation, Transaction};
use super::EngineConfig;
use crate::core::interleave::{interleave, CommitBucket};
use crate::core::plan::{Operation, OperationPlan};
use crate::core::schedule::{schedule, TimeWindow};
use crate::core::types::{BranchName, Oid};
use crate::git::RepoAdapter;

/// Inputs for one run.
#[derive(Debug, Clone)]
pub struct RunRequest<'p> {
    pub plan: &'p OperationPlan,
    pub commit_count: usize,
    /// Timestamp window. Defaults to the start point's time through now.
    pub window: Option<TimeWindow>,
    /// Insert after this revision instead of at the branch tip.
    pub insert_after: Option<String>,
}

impl<'p> RunRequest<'p> {
    pub fn new(plan: &'p OperationPlan, commit_count: usize) -> Self {
        Self {
            plan,
            commit_count,
            window: None,
            insert_after: None,
        }
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn insert_after(mut self, rev: impl Into<String>) -> Self {
        self.insert_after = Some(rev.into());
        self
    }
}

/// One commit the run will create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommit {
    pub timestamp: DateTime<Utc>,
    pub operations: Vec<Operation>,
    pub message: String,
}

/// Everything decided before the repository is touched.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub original_branch: BranchName,
    pub original_head: Oid,
    pub start_point: Oid,
    pub window: TimeWindow,
    pub commits: Vec<PlannedCommit>,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub original_branch: BranchName,
    pub original_head: Oid,
    pub new_tip: Oid,
    /// Created commits, oldest first, as they were on the scratch branch.
    pub commits: Vec<Oid>,
    /// Bytes of residual diff folded into the final commit, if any.
    pub folded_residual: Option<usize>,
    pub rebased: bool,
    pub net_zero: bool,
}

/// The transaction orchestrator.
pub struct Orchestrator<'a, A: RepoAdapter + ?Sized> {
    adapter: &'a A,
    config: EngineConfig,
}

impl<'a, A: RepoAdapter + ?Sized> Orchestrator<'a, A> {
    pub fn new(adapter: &'a A, config: EngineConfig) -> Self {
        Self { adapter, config }
    }

    /// Run the guard checks and decide every commit without mutating anything.
    ///
    /// # Errors
    ///
    /// Only precondition errors: dirty tree, detached HEAD, unknown or
    /// unrelated insertion point, invalid commit count or window.
    pub fn prepare<R: Rng + ?Sized>(
        &self,
        request: &RunRequest<'_>,
        rng: &mut R,
    ) -> Result<RunPlan, EngineError> {
        if self.adapter.is_dirty().map_err(EngineError::guard)? {
            return Err(EngineError::DirtyWorkingTree);
        }
        self.plan_commits(request, rng)
    }

    /// Like [`prepare`](Self::prepare) but without the dirty check.
    pub fn preview<R: Rng + ?Sized>(
        &self,
        request: &RunRequest<'_>,
        rng: &mut R,
    ) -> Result<RunPlan, EngineError> {
        self.plan_commits(request, rng)
    }

    fn plan_commits<R: Rng + ?Sized>(
        &self,
        request: &RunRequest<'_>,
        rng: &mut R,
    ) -> Result<RunPlan, EngineError> {
        let original_branch = self
            .adapter
            .current_branch()
            .map_err(EngineError::guard)?
            .ok_or(EngineError::DetachedHead)?;
        let original_head = self.adapter.head_oid().map_err(EngineError::guard)?;

        let start_point = match &request.insert_after {
            None => original_head.clone(),
            Some(rev) => {
                let commit = self
                    .adapter
                    .resolve_commit(rev)
                    .map_err(EngineError::guard)?;
                let related = self
                    .adapter
                    .is_ancestor(&commit, &original_head)
                    .map_err(EngineError::guard)?;
                if !related {
                    return Err(EngineError::NotAnAncestor {
                        commit,
                        branch: original_branch,
                    });
                }
                commit
            }
        };

        let buckets = interleave(request.plan, request.commit_count)?;

        let window = match request.window {
            Some(window) => window,
            None => {
                let since = self
                    .adapter
                    .commit_timestamp(&start_point)
                    .map_err(EngineError::guard)?;
                TimeWindow::new(since, Utc::now())?
            }
        };
        let times = schedule(&window, buckets.len(), rng)?;

        let commits = buckets
            .iter()
            .zip(times)
            .map(|(bucket, timestamp)| PlannedCommit {
                timestamp,
                operations: bucket.operations().to_vec(),
                message: compose_message(request.plan, bucket),
            })
            .collect();

        Ok(RunPlan {
            original_branch,
            original_head,
            start_point,
            window,
            commits,
        })
    }

    /// Execute a full run.
    ///
    /// On success the original branch contains the new history (at its tip,
    /// or after `insert_after`) and the scratch branch is gone.
    pub fn run<R: Rng + ?Sized>(
        &self,
        request: &RunRequest<'_>,
        rng: &mut R,
    ) -> Result<RunReport, EngineError> {
        let plan = self.prepare(request, rng)?;
        tracing::info!(
            branch = %plan.original_branch,
            commits = plan.commits.len(),
            window = %plan.window,
            "plan ready"
        );

        let disposable = self.disposable_branch_name()?;
        let mut tx = Transaction::begin(
            self.adapter,
            plan.original_branch.clone(),
            plan.original_head.clone(),
            plan.start_point.clone(),
            disposable,
        )?;

        let reconciliation = match self.build_history(&mut tx, request.plan, &plan.commits) {
            Ok(r) => r,
            Err(err) => {
                tx.rollback();
                return Err(err);
            }
        };

        let commits = tx.state().created_commits.clone();
        let finished = tx.finish()?;

        Ok(RunReport {
            original_branch: plan.original_branch,
            original_head: plan.original_head,
            new_tip: finished.new_tip,
            commits,
            folded_residual: match reconciliation {
                Reconciliation::Clean => None,
                Reconciliation::Folded { residual_bytes } => Some(residual_bytes),
            },
            rebased: finished.rebased,
            net_zero: finished.net_zero,
        })
    }

    fn build_history(
        &self,
        tx: &mut Transaction<'_, A>,
        plan: &OperationPlan,
        commits: &[PlannedCommit],
    ) -> Result<Reconciliation, EngineError> {
        for commit in commits {
            let writes: Vec<(&Path, &[u8])> = commit
                .operations
                .iter()
                .map(|op| (plan.pair(*op).file_path.as_path(), plan.content(*op)))
                .collect();
            tx.commit_bucket(&writes, &commit.message, commit.timestamp)?;
        }
        tx.reconcile(self.config.residual_policy)
    }

    /// A fresh `<prefix>/<8 hex>` branch name.
    fn disposable_branch_name(&self) -> Result<BranchName, EngineError> {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{}/{}", self.config.branch_prefix, &suffix[..8]);
        BranchName::new(name).map_err(|e| EngineError::AdapterCommandFailure {
            phase: Phase::Branching,
            source: e.into(),
            recovery: None,
        })
    }
}

/// Commit message for a bucket.
///
/// The first operation's message is the summary. Further operations are
/// listed in the body, and descriptions follow as paragraphs.
pub fn compose_message(plan: &OperationPlan, bucket: &CommitBucket) -> String {
    let ops = bucket.operations();
    let Some((first, rest)) = ops.split_first() else {
        return String::new();
    };

    let mut message = plan.message(*first).to_string();

    if !rest.is_empty() {
        message.push_str("\n\n");
        let lines: Vec<String> = rest
            .iter()
            .map(|op| format!("- {}", plan.message(*op)))
            .collect();
        message.push_str(&lines.join("\n"));
    }

    for description in ops.iter().filter_map(|op| plan.description(*op)) {
        message.push_str("\n\n");
        message.push_str(description);
    }

    message.push('\n');
    message
}
