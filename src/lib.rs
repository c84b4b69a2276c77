//! Mirage - backdated commit history that cancels itself out
//!
//! Mirage takes a plan of per-file changes, each paired with the content it
//! replaces, and turns it into a series of backdated commits that change
//! files and later restore them. After a run the branch has more history
//! but the same tracked tree.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Runs the Guard → Branch → Commit → Reconcile → Rebase →
//!   Restore transaction
//! - [`core`] - Domain types, plan, scheduler, interleaver, config, lock
//! - [`git`] - Single interface for all Git operations
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! 1. Nothing is mutated until every precondition has passed
//! 2. The original branch moves only after the new history is complete
//! 3. A failed run leaves a named scratch branch and recovery instructions
//! 4. The scratch branch is deleted only once it is merged

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod ui;
