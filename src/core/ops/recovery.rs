//! core::ops::recovery
//!
//! Persisted record of a failed transaction.
//!
//! When a run fails after creating its disposable branch, the branch is left
//! in place for inspection. The record written here remembers what the
//! repository looked like before the run, so `mirage recover` can put the
//! user back on the original branch and clean up afterwards.
//!
//! # Storage
//!
//! `<common_dir>/mirage/recovery.json`, written with fsync. Only one record
//! is kept; a new failure overwrites the previous one.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::paths::MiragePaths;
use crate::core::types::{BranchName, Oid, PlanDigest, UtcTimestamp};

/// Errors reading or writing the recovery record.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("recovery record i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("recovery record is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// What a failed run left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    /// Run identifier, shared with the disposable branch suffix.
    pub run_id: String,
    /// When the failure was recorded.
    pub recorded_at: UtcTimestamp,
    /// Branch checked out before the run.
    pub original_branch: BranchName,
    /// Tip of `original_branch` before the run.
    pub original_head: Oid,
    /// Scratch branch created by the run, if it got that far.
    pub disposable_branch: Option<BranchName>,
    /// Last commit created on the disposable branch.
    pub last_commit: Option<Oid>,
    /// Phase the transaction was in when it failed.
    pub phase: String,
    /// Rendered error.
    pub error: String,
    /// Digest of the plan that was being applied.
    pub plan_digest: PlanDigest,
    /// Working directory of the repository.
    pub work_dir: PathBuf,
}

impl RecoveryRecord {
    /// Path to the record file.
    pub fn path(paths: &MiragePaths) -> PathBuf {
        paths.recovery_path()
    }

    /// Write the record to disk, replacing any previous one.
    pub fn write(&self, paths: &MiragePaths) -> Result<(), RecoveryError> {
        paths.ensure_dirs()?;

        let content = serde_json::to_string_pretty(self)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(Self::path(paths))?;

        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    /// Read the record, if one exists.
    pub fn read(paths: &MiragePaths) -> Result<Option<Self>, RecoveryError> {
        let path = Self::path(paths);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Remove the record.
    pub fn remove(paths: &MiragePaths) -> Result<(), RecoveryError> {
        let path = Self::path(paths);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
