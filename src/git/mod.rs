//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the only doorway to Git. The engine sees the repository
//! through the [`RepoAdapter`] trait; [`Git`] implements it. No other module
//! imports `git2` or spawns `git`.
//!
//! # Responsibilities
//!
//! - Repository discovery and opening
//! - Status, branch and ancestry queries
//! - Backdated commit creation and amendment
//! - Patch generation and reverse application
//! - Rebase, checkout and fast-forward through the `git` binary, with deadlines
//!
//! # Invariants
//!
//! - All operations return strong types (Oid, BranchName)
//! - Every `git` subprocess is bounded by a timeout
//! - A rebase that stops on conflicts is aborted before the error is returned

mod adapter;
mod command;
mod interface;

pub use adapter::RepoAdapter;
pub use interface::{Git, GitError, DEFAULT_TIMEOUT};
