//! core
//!
//! Domain types, pure algorithms and on-disk bookkeeping.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, PlanDigest
//! - [`plan`] - Operation pairs and the validated plan
//! - [`schedule`] - Commit timestamp scheduling
//! - [`interleave`] - Distribution of operations into commit buckets
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Storage locations inside the git directory
//! - [`ops`] - Repository lock and recovery record
//!
//! Nothing in `schedule` or `interleave` touches the repository.

pub mod config;
pub mod interleave;
pub mod ops;
pub mod paths;
pub mod plan;
pub mod schedule;
pub mod types;
