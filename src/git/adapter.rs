//! git::adapter
//!
//! The primitive repository operations the engine is allowed to use.
//!
//! The orchestrator only ever talks to a [`RepoAdapter`]. [`Git`](super::Git)
//! is the production implementation; tests substitute recording or
//! failure-injecting adapters.

use std::path::Path;

use chrono::{DateTime, Utc};

use super::GitError;
use crate::core::types::{BranchName, Oid};

/// Repository operations used by the transaction orchestrator.
pub trait RepoAdapter {
    /// Whether the working tree or index has changes.
    fn is_dirty(&self) -> Result<bool, GitError>;

    /// Checked-out branch, or `None` when HEAD is detached.
    fn current_branch(&self) -> Result<Option<BranchName>, GitError>;

    /// Commit HEAD points at.
    fn head_oid(&self) -> Result<Oid, GitError>;

    /// Resolve any revision expression to a commit.
    fn resolve_commit(&self, rev: &str) -> Result<Oid, GitError>;

    /// Commit a local branch points at.
    fn branch_tip(&self, branch: &BranchName) -> Result<Oid, GitError>;

    /// Author time of a commit.
    fn commit_timestamp(&self, commit: &Oid) -> Result<DateTime<Utc>, GitError>;

    /// Whether `ancestor` is reachable from `descendant` (or equal to it).
    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError>;

    /// Create a local branch at `at`. Fails if it exists.
    fn create_branch(&self, name: &BranchName, at: &Oid) -> Result<(), GitError>;

    /// Switch the working tree to `branch`.
    fn checkout(&self, branch: &BranchName) -> Result<(), GitError>;

    /// Write bytes to a path relative to the working tree.
    fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), GitError>;

    /// Stage `paths` and commit with `time` as author and committer date.
    fn stage_and_commit(
        &self,
        paths: &[&Path],
        message: &str,
        time: DateTime<Utc>,
    ) -> Result<Oid, GitError>;

    /// Reset `paths` in the index and working tree to HEAD. Paths HEAD does
    /// not have are removed.
    fn restore_paths(&self, paths: &[&Path]) -> Result<(), GitError>;

    /// Replace HEAD with a commit of the current index, same message, dated `time`.
    fn amend_commit_timestamp(&self, time: DateTime<Utc>) -> Result<Oid, GitError>;

    /// Binary-safe patch from `old` to `new`. Empty when the trees match.
    fn diff_between(&self, old: &Oid, new: &Oid) -> Result<Vec<u8>, GitError>;

    /// Reverse-apply a patch to the working tree and index.
    fn reverse_apply(&self, patch: &[u8]) -> Result<(), GitError>;

    /// Replay `branch` onto `upstream`. Aborts and fails on conflict.
    fn rebase_onto(&self, upstream: &BranchName, branch: &BranchName) -> Result<(), GitError>;

    /// Fast-forward the checked-out branch to `target`.
    fn fast_forward(&self, target: &BranchName) -> Result<(), GitError>;

    /// Delete a local branch.
    fn delete_branch(&self, name: &BranchName) -> Result<(), GitError>;
}
