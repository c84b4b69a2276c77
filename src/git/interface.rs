//! git::interface
//!
//! The production [`RepoAdapter`]: git2 for reads and commit creation, the
//! `git` binary for patch, rebase, checkout and merge.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested branch or revision does not exist
//! - [`GitError::BranchExists`]: Branch creation would clobber a branch
//! - [`GitError::CommandFailed`]: A `git` subprocess exited non-zero
//! - [`GitError::Conflict`]: A rebase stopped on conflicts and was aborted
//! - [`GitError::Timeout`]: A `git` subprocess exceeded its deadline
//!
//! # Example
//!
//! ```no_run
//! use commit_mirage::git::{Git, RepoAdapter};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let head = git.head_oid()?;
//! println!("HEAD is at {}", head.short(7));
//! # Ok::<(), commit_mirage::git::GitError>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::adapter::RepoAdapter;
use super::command;
use crate::core::paths::MiragePaths;
use crate::core::types::{BranchName, Oid, TypeError};

/// Default deadline for `git` subprocesses.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref or revision does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Branch creation target already exists.
    #[error("branch already exists: {name}")]
    BranchExists {
        /// The existing branch
        name: String,
    },

    /// No `user.name` / `user.email` configured.
    #[error("no git identity configured (set user.name and user.email)")]
    MissingIdentity,

    /// A `git` subprocess exited non-zero.
    #[error("{command} failed (exit {status:?}): {stderr}")]
    CommandFailed {
        /// The command line
        command: String,
        /// Exit code, if the process exited normally
        status: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// A rebase hit conflicts and was aborted.
    #[error("{operation} stopped on conflicts and was aborted: {details}")]
    Conflict {
        /// Which operation conflicted
        operation: String,
        /// Captured stderr
        details: String,
    },

    /// A `git` subprocess exceeded its deadline and was killed.
    #[error("{command} timed out after {after:?}")]
    Timeout {
        /// The command line
        command: String,
        /// The deadline that passed
        after: Duration,
    },

    /// A `git` subprocess could not be started or waited on.
    #[error("failed to run {command}: {source}")]
    Spawn {
        /// The command line
        command: String,
        source: std::io::Error,
    },

    /// Working tree file could not be written.
    #[error("failed to write '{path}': {source}")]
    Write {
        /// The target path
        path: PathBuf,
        source: std::io::Error,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Exists => GitError::BranchExists {
                name: context.to_string(),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidBranchName(msg) => GitError::InvalidRefName { message: msg },
        }
    }
}

/// The Git interface.
///
/// Holds an open repository plus the knobs that shape subprocess calls
/// and dirtiness checks.
pub struct Git {
    repo: git2::Repository,
    work_dir: PathBuf,
    timeout: Duration,
    include_untracked: bool,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        let work_dir = repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();

        Ok(Self {
            repo,
            work_dir,
            timeout: DEFAULT_TIMEOUT,
            include_untracked: true,
        })
    }

    /// Set the deadline for `git` subprocesses.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Choose whether untracked files make the tree dirty.
    pub fn with_untracked(mut self, include: bool) -> Self {
        self.include_untracked = include;
        self
    }

    /// Root of the working tree.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Storage locations for this repository.
    pub fn paths(&self) -> MiragePaths {
        MiragePaths::new(
            self.repo.path().to_path_buf(),
            self.repo.commondir().to_path_buf(),
        )
    }

    /// Whether a local branch exists.
    pub fn branch_exists(&self, name: &BranchName) -> bool {
        self.repo
            .find_branch(name.as_str(), git2::BranchType::Local)
            .is_ok()
    }

    /// Bytes of `path` in the tree of `commit`, or `None` if it has no such file.
    pub fn file_at(&self, commit: &Oid, path: &Path) -> Result<Option<Vec<u8>>, GitError> {
        let tree = self.find_commit(commit)?.tree()?;
        let entry = match tree.get_path(path) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, &path.display().to_string())),
        };
        match entry.to_object(&self.repo)?.into_blob() {
            Ok(blob) => Ok(Some(blob.content().to_vec())),
            Err(_) => Ok(None),
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn find_commit(&self, oid: &Oid) -> Result<git2::Commit<'_>, GitError> {
        let git_oid =
            git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        self.repo
            .find_commit(git_oid)
            .map_err(|_| GitError::ObjectNotFound {
                oid: oid.to_string(),
            })
    }

    fn to_oid(oid: git2::Oid) -> Result<Oid, GitError> {
        Ok(Oid::new(oid.to_string())?)
    }

    /// Configured identity with its time replaced by `time`.
    fn signature_at(&self, time: DateTime<Utc>) -> Result<git2::Signature<'static>, GitError> {
        let configured = self
            .repo
            .signature()
            .map_err(|_| GitError::MissingIdentity)?;
        let name = String::from_utf8_lossy(configured.name_bytes()).into_owned();
        let email = String::from_utf8_lossy(configured.email_bytes()).into_owned();
        git2::Signature::new(&name, &email, &git2::Time::new(time.timestamp(), 0))
            .map_err(GitError::from)
    }

    fn head_commit(&self) -> Result<Option<git2::Commit<'_>>, GitError> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(None),
            Err(e) => Err(GitError::from_git2(e, "HEAD")),
        }
    }

    fn git(&self, args: &[&str]) -> Result<command::GitOutput, GitError> {
        command::run_checked(&self.work_dir, args, None, self.timeout)
    }

    fn rebase_in_progress(&self) -> bool {
        matches!(
            self.repo.state(),
            git2::RepositoryState::Rebase
                | git2::RepositoryState::RebaseInteractive
                | git2::RepositoryState::RebaseMerge
        )
    }
}

/// Error for a rebase that was left in progress and then aborted.
///
/// Only a non-zero exit is a conflict. Timeouts and spawn failures keep
/// their kind.
fn stopped_rebase_error(err: GitError, operation: String) -> GitError {
    match err {
        GitError::CommandFailed { stderr, .. } => GitError::Conflict {
            operation,
            details: stderr,
        },
        other => other,
    }
}

impl RepoAdapter for Git {
    // =========================================================================
    // Reads
    // =========================================================================

    fn is_dirty(&self) -> Result<bool, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(self.include_untracked)
            .recurse_untracked_dirs(false)
            .include_ignored(false)
            .exclude_submodules(true);

        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(statuses.iter().any(|entry| {
            let status = entry.status();
            status != git2::Status::CURRENT && !status.contains(git2::Status::IGNORED)
        }))
    }

    fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None)
    }

    fn head_oid(&self) -> Result<Oid, GitError> {
        match self.head_commit()? {
            Some(commit) => Self::to_oid(commit.id()),
            None => Err(GitError::RefNotFound {
                refname: "HEAD".to_string(),
            }),
        }
    }

    fn resolve_commit(&self, rev: &str) -> Result<Oid, GitError> {
        let object = self
            .repo
            .revparse_single(rev)
            .map_err(|e| GitError::from_git2(e, rev))?;
        let commit = object
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, rev))?;
        Self::to_oid(commit.id())
    }

    fn branch_tip(&self, branch: &BranchName) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(&branch.refname())
            .map_err(|e| GitError::from_git2(e, &branch.refname()))?;
        let commit = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, &branch.refname()))?;
        Self::to_oid(commit.id())
    }

    fn commit_timestamp(&self, commit: &Oid) -> Result<DateTime<Utc>, GitError> {
        let seconds = self.find_commit(commit)?.author().when().seconds();
        DateTime::from_timestamp(seconds, 0).ok_or_else(|| GitError::Internal {
            message: format!("commit {} has an out-of-range timestamp", commit.short(7)),
        })
    }

    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }

        let ancestor_oid = self.find_commit(ancestor)?.id();
        let descendant_oid = self.find_commit(descendant)?.id();

        self.repo
            .graph_descendant_of(descendant_oid, ancestor_oid)
            .map_err(GitError::from)
    }

    // =========================================================================
    // Branches
    // =========================================================================

    fn create_branch(&self, name: &BranchName, at: &Oid) -> Result<(), GitError> {
        let commit = self.find_commit(at)?;
        self.repo
            .branch(name.as_str(), &commit, false)
            .map_err(|e| GitError::from_git2(e, name.as_str()))?;
        tracing::debug!(branch = %name, at = %at.short(7), "created branch");
        Ok(())
    }

    fn checkout(&self, branch: &BranchName) -> Result<(), GitError> {
        self.git(&["checkout", "--quiet", branch.as_str()])?;
        Ok(())
    }

    fn delete_branch(&self, name: &BranchName) -> Result<(), GitError> {
        let mut branch = self
            .repo
            .find_branch(name.as_str(), git2::BranchType::Local)
            .map_err(|e| GitError::from_git2(e, &name.refname()))?;
        branch.delete()?;
        tracing::debug!(branch = %name, "deleted branch");
        Ok(())
    }

    // =========================================================================
    // Commits
    // =========================================================================

    fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), GitError> {
        let target = self.work_dir.join(path);
        let write_err = |source| GitError::Write {
            path: target.clone(),
            source,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(&target, content).map_err(write_err)
    }

    fn stage_and_commit(
        &self,
        paths: &[&Path],
        message: &str,
        time: DateTime<Utc>,
    ) -> Result<Oid, GitError> {
        let mut index = self.repo.index()?;
        // The git binary may have rewritten the index since it was loaded.
        index.read(true)?;
        for path in paths {
            if self.work_dir.join(path).exists() {
                index.add_path(path)?;
            } else {
                index.remove_path(path)?;
            }
        }
        index.write()?;

        let tree = self.repo.find_tree(index.write_tree()?)?;
        let signature = self.signature_at(time)?;
        let parent = self.head_commit()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;
        tracing::debug!(commit = %oid, %time, "created commit");
        Self::to_oid(oid)
    }

    fn restore_paths(&self, paths: &[&Path]) -> Result<(), GitError> {
        if paths.is_empty() {
            return Ok(());
        }
        let head = self.head_commit()?.ok_or_else(|| GitError::RefNotFound {
            refname: "HEAD".to_string(),
        })?;
        let tree = head.tree()?;

        self.repo.index()?.read(true)?;
        // Index entries first; paths missing from HEAD are dropped from the index.
        self.repo.reset_default(Some(head.as_object()), paths.iter().copied())?;

        let mut tracked = Vec::new();
        for path in paths {
            if tree.get_path(path).is_ok() {
                tracked.push(*path);
                continue;
            }
            let target = self.work_dir.join(path);
            match fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(source) => return Err(GitError::Write { path: target, source }),
            }
        }

        if !tracked.is_empty() {
            let mut checkout = git2::build::CheckoutBuilder::new();
            checkout.force();
            for path in &tracked {
                checkout.path(*path);
            }
            self.repo.checkout_head(Some(&mut checkout))?;
        }

        tracing::debug!(paths = paths.len(), "restored paths to HEAD");
        Ok(())
    }

    fn amend_commit_timestamp(&self, time: DateTime<Utc>) -> Result<Oid, GitError> {
        let head = self.head_commit()?.ok_or_else(|| GitError::RefNotFound {
            refname: "HEAD".to_string(),
        })?;

        let mut index = self.repo.index()?;
        index.read(true)?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let when = git2::Time::new(time.timestamp(), 0);
        let author = head.author();
        let author = git2::Signature::new(
            &String::from_utf8_lossy(author.name_bytes()),
            &String::from_utf8_lossy(author.email_bytes()),
            &when,
        )?;
        let committer = self.signature_at(time)?;

        let oid = head.amend(
            Some("HEAD"),
            Some(&author),
            Some(&committer),
            None,
            None,
            Some(&tree),
        )?;
        tracing::debug!(commit = %oid, %time, "amended HEAD");
        Self::to_oid(oid)
    }

    // =========================================================================
    // Patches and history rewriting
    // =========================================================================

    fn diff_between(&self, old: &Oid, new: &Oid) -> Result<Vec<u8>, GitError> {
        let output = self.git(&[
            "diff",
            "--binary",
            "--no-ext-diff",
            "--no-color",
            "--no-renames",
            old.as_str(),
            new.as_str(),
        ])?;
        Ok(output.stdout)
    }

    fn reverse_apply(&self, patch: &[u8]) -> Result<(), GitError> {
        command::run_checked(
            &self.work_dir,
            &["apply", "-R", "--index", "--whitespace=nowarn"],
            Some(patch),
            self.timeout,
        )?;
        Ok(())
    }

    fn rebase_onto(&self, upstream: &BranchName, branch: &BranchName) -> Result<(), GitError> {
        let result = self.git(&["rebase", "--quiet", upstream.as_str(), branch.as_str()]);
        let err = match result {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };

        if !self.rebase_in_progress() {
            return Err(err);
        }

        tracing::warn!(%upstream, %branch, error = %err, "rebase stopped, aborting");
        if let Err(abort) = self.git(&["rebase", "--abort"]) {
            tracing::error!(error = %abort, "rebase --abort failed");
        }

        Err(stopped_rebase_error(
            err,
            format!("rebase of {branch} onto {upstream}"),
        ))
    }

    fn fast_forward(&self, target: &BranchName) -> Result<(), GitError> {
        self.git(&["merge", "--ff-only", "--quiet", target.as_str()])?;
        Ok(())
    }
}
