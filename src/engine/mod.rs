//! engine
//!
//! Runs the commit transaction: Guard -> Branch -> Commit -> Reconcile ->
//! Rebase -> Restore.
//!
//! # Architecture
//!
//! - [`orchestrator`] - Precondition checks, commit planning, phase sequencing
//! - [`transaction`] - The scratch-branch scope and its phases
//! - [`error`] - Engine errors, recovery info and exit codes
//!
//! The engine sees the repository only through
//! [`RepoAdapter`](crate::git::RepoAdapter). It takes all settings as an
//! explicit [`EngineConfig`], holds no lock and never exits the process.
//!
//! # Invariants
//!
//! - Nothing is mutated until every precondition has passed
//! - The original branch ref moves only in the final phase
//! - The scratch branch is deleted only once its history is contained in
//!   the original branch

pub mod error;
pub mod orchestrator;
pub mod transaction;

pub use error::{exit_code, EngineError, RecoveryInfo};
pub use orchestrator::{
    compose_message, Orchestrator, PlannedCommit, RunPlan, RunReport, RunRequest,
};
pub use transaction::{Finished, Phase, Reconciliation, Transaction, TransactionState};

use crate::core::config::{Config, ResidualPolicy, DEFAULT_BRANCH_PREFIX};

/// Settings the engine needs for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// What to do with a non-empty net diff.
    pub residual_policy: ResidualPolicy,
    /// Prefix for scratch branch names.
    pub branch_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            residual_policy: ResidualPolicy::Fold,
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
        }
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            residual_policy: config.residual(),
            branch_prefix: config.branch_prefix(),
        }
    }
}
