//! core::plan
//!
//! The operation plan handed to the engine by the content generator.
//!
//! # Overview
//!
//! A plan is an ordered list of [`OperationPair`]s, one per selected file.
//! Each pair carries the "apply" content (the file with a feature added) and
//! the "revert" content (the file exactly as it was before). Writing every
//! apply and then every revert, in plan order, restores the tree.
//!
//! # Plan Files
//!
//! Plans arrive as JSON:
//!
//! ```json
//! {
//!   "pairs": [
//!     {
//!       "file_path": "src/lib.rs",
//!       "apply_content": "...",
//!       "revert_content": "...",
//!       "commit_message_apply": "Add request tracing helper",
//!       "commit_message_revert": "Drop unused tracing helper"
//!     }
//!   ]
//! }
//! ```
//!
//! `revert_content` may be omitted. [`PlanFile::resolve`] then fills it with
//! the file's current bytes. When the commits are inserted after an older
//! commit the caller uses [`PlanFile::resolve_with`] to read the file as it
//! was at that commit instead.
//!
//! # Invariants
//!
//! - A plan is never empty
//! - Paths are repository-relative and stay inside the working tree
//! - No two pairs touch the same file
//! - Commit messages are non-empty

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::PlanDigest;

/// Errors from plan loading and validation.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("plan contains no operation pairs")]
    Empty,

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("'{path}' appears in more than one operation pair")]
    DuplicatePath { path: String },

    #[error("operation pair for '{path}' has an empty {which} commit message")]
    EmptyMessage { path: String, which: &'static str },

    #[error("no revert content for '{path}' and the file does not exist")]
    MissingRevert { path: String },

    #[error("failed to read '{path}' at {rev}: {message}")]
    Baseline {
        path: String,
        rev: String,
        message: String,
    },

    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse plan '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One file's apply/revert pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationPair {
    /// Repository-relative path.
    pub file_path: PathBuf,
    /// File content with the change applied.
    pub apply_content: Vec<u8>,
    /// File content before the change.
    pub revert_content: Vec<u8>,
    /// Commit message for the apply half.
    pub commit_message_apply: String,
    /// Commit message for the revert half.
    pub commit_message_revert: String,
    /// Optional longer description for the apply commit body.
    pub description_apply: Option<String>,
    /// Optional longer description for the revert commit body.
    pub description_revert: Option<String>,
}

impl OperationPair {
    /// Build a pair without descriptions.
    pub fn new(
        file_path: impl Into<PathBuf>,
        apply_content: impl Into<Vec<u8>>,
        revert_content: impl Into<Vec<u8>>,
        commit_message_apply: impl Into<String>,
        commit_message_revert: impl Into<String>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            apply_content: apply_content.into(),
            revert_content: revert_content.into(),
            commit_message_apply: commit_message_apply.into(),
            commit_message_revert: commit_message_revert.into(),
            description_apply: None,
            description_revert: None,
        }
    }

    /// Whether applying this pair changes nothing.
    pub fn is_noop(&self) -> bool {
        self.apply_content == self.revert_content
    }
}

/// Which half of a pair an operation writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Apply,
    Revert,
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Apply => write!(f, "apply"),
            OpKind::Revert => write!(f, "revert"),
        }
    }
}

/// A single write: one half of the pair at `pair` in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operation {
    /// Index of the pair in the plan.
    pub pair: usize,
    /// Which half.
    pub kind: OpKind,
}

impl Operation {
    pub fn apply(pair: usize) -> Self {
        Self {
            pair,
            kind: OpKind::Apply,
        }
    }

    pub fn revert(pair: usize) -> Self {
        Self {
            pair,
            kind: OpKind::Revert,
        }
    }
}

/// A validated, non-empty, ordered list of operation pairs.
#[derive(Debug, Clone)]
pub struct OperationPlan {
    pairs: Vec<OperationPair>,
}

impl OperationPlan {
    /// Validate and wrap a list of pairs.
    ///
    /// # Errors
    ///
    /// - [`PlanError::Empty`] for an empty list
    /// - [`PlanError::InvalidPath`] for absolute or escaping paths
    ///
    /// Paths are stored without `.` components, so `./a.txt` becomes `a.txt`.
    /// - [`PlanError::DuplicatePath`] when two pairs target the same file
    /// - [`PlanError::EmptyMessage`] for blank commit messages
    pub fn new(mut pairs: Vec<OperationPair>) -> Result<Self, PlanError> {
        if pairs.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut seen = HashSet::new();
        for pair in &mut pairs {
            let display = pair.file_path.display().to_string();
            validate_relative_path(&pair.file_path)?;

            // The index only accepts paths without `.` components.
            pair.file_path = normalize(&pair.file_path);
            if !seen.insert(pair.file_path.clone()) {
                return Err(PlanError::DuplicatePath { path: display });
            }
            if pair.commit_message_apply.trim().is_empty() {
                return Err(PlanError::EmptyMessage {
                    path: display,
                    which: "apply",
                });
            }
            if pair.commit_message_revert.trim().is_empty() {
                return Err(PlanError::EmptyMessage {
                    path: display,
                    which: "revert",
                });
            }
        }

        Ok(Self { pairs })
    }

    /// The pairs in plan order.
    pub fn pairs(&self) -> &[OperationPair] {
        &self.pairs
    }

    /// Look up the pair an operation refers to.
    pub fn pair(&self, op: Operation) -> &OperationPair {
        &self.pairs[op.pair]
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Bytes an operation writes.
    pub fn content(&self, op: Operation) -> &[u8] {
        let pair = self.pair(op);
        match op.kind {
            OpKind::Apply => &pair.apply_content,
            OpKind::Revert => &pair.revert_content,
        }
    }

    /// Commit message summary for an operation.
    pub fn message(&self, op: Operation) -> &str {
        let pair = self.pair(op);
        match op.kind {
            OpKind::Apply => pair.commit_message_apply.trim(),
            OpKind::Revert => pair.commit_message_revert.trim(),
        }
    }

    /// Optional description for an operation.
    pub fn description(&self, op: Operation) -> Option<&str> {
        let pair = self.pair(op);
        match op.kind {
            OpKind::Apply => pair.description_apply.as_deref(),
            OpKind::Revert => pair.description_revert.as_deref(),
        }
        .map(str::trim)
        .filter(|d| !d.is_empty())
    }

    /// Digest over every field of every pair.
    pub fn digest(&self) -> PlanDigest {
        let mut fields: Vec<&[u8]> = Vec::with_capacity(self.pairs.len() * 5);
        for pair in &self.pairs {
            fields.push(pair.file_path.as_os_str().as_encoded_bytes());
            fields.push(&pair.apply_content);
            fields.push(&pair.revert_content);
            fields.push(pair.commit_message_apply.as_bytes());
            fields.push(pair.commit_message_revert.as_bytes());
        }
        PlanDigest::compute(fields)
    }
}

/// Reject paths that would write outside the working tree or into `.git`.
fn validate_relative_path(path: &Path) -> Result<(), PlanError> {
    let invalid = |reason: &str| PlanError::InvalidPath {
        path: path.display().to_string(),
        reason: reason.to_string(),
    };

    if path.as_os_str().is_empty() {
        return Err(invalid("path is empty"));
    }

    let mut first = true;
    for component in path.components() {
        match component {
            Component::Normal(part) => {
                if first && part == ".git" {
                    return Err(invalid("path points into the .git directory"));
                }
                first = false;
            }
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("'..' is not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("path must be relative to the repository root"))
            }
        }
    }

    if first {
        return Err(invalid("path names no file"));
    }
    Ok(())
}

/// Drop `.` components so `./a.txt` and `a.txt` compare equal.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

// =============================================================================
// Plan files
// =============================================================================

/// On-disk plan format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanFile {
    pub pairs: Vec<PlanFileEntry>,
}

/// One entry of a plan file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanFileEntry {
    pub file_path: PathBuf,
    pub apply_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_content: Option<String>,
    pub commit_message_apply: String,
    pub commit_message_revert: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_apply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description_revert: Option<String>,
}

impl PlanFile {
    /// Read and parse a plan file.
    pub fn read(path: &Path) -> Result<Self, PlanError> {
        let contents = fs::read_to_string(path).map_err(|source| PlanError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&contents).map_err(|source| PlanError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Turn the file into a validated plan.
    ///
    /// Missing revert content is read from `work_dir`, i.e. the file as it
    /// stands before the engine touches it.
    pub fn resolve(self, work_dir: &Path) -> Result<OperationPlan, PlanError> {
        self.resolve_with(|path| {
            let on_disk = work_dir.join(path);
            match fs::read(&on_disk) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(source) => Err(PlanError::Read {
                    path: on_disk,
                    source,
                }),
            }
        })
    }

    /// Turn the file into a validated plan, asking `original` for the
    /// pre-change bytes of every pair without revert content.
    ///
    /// `original` gets the normalized repository-relative path and returns
    /// `None` when the file does not exist at the insertion point.
    pub fn resolve_with<F>(self, mut original: F) -> Result<OperationPlan, PlanError>
    where
        F: FnMut(&Path) -> Result<Option<Vec<u8>>, PlanError>,
    {
        let mut pairs = Vec::with_capacity(self.pairs.len());

        for entry in self.pairs {
            validate_relative_path(&entry.file_path)?;

            let revert_content = match entry.revert_content {
                Some(content) => content.into_bytes(),
                None => original(&normalize(&entry.file_path))?.ok_or_else(|| {
                    PlanError::MissingRevert {
                        path: entry.file_path.display().to_string(),
                    }
                })?,
            };

            pairs.push(OperationPair {
                file_path: entry.file_path,
                apply_content: entry.apply_content.into_bytes(),
                revert_content,
                commit_message_apply: entry.commit_message_apply,
                commit_message_revert: entry.commit_message_revert,
                description_apply: entry.description_apply,
                description_revert: entry.description_revert,
            });
        }

        OperationPlan::new(pairs)
    }

    /// Read, parse and resolve in one step.
    pub fn load(path: &Path, work_dir: &Path) -> Result<OperationPlan, PlanError> {
        Self::read(path)?.resolve(work_dir)
    }
}
