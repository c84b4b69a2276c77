//! core::ops::lock
//!
//! Exclusive repository lock for mirage runs.
//!
//! Only one run may rewrite a repository at a time. The lock lives at
//! `<common_dir>/mirage/lock`, so all worktrees of a repository share it.
//!
//! # Invariants
//!
//! - Held for the whole transaction, from the dirty check to cleanup
//! - Released on drop
//! - Acquisition never blocks; a held lock fails fast

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::MiragePaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("repository is locked by another mirage process")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),
}

/// An exclusive lock on the repository, released on drop.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    file: Option<File>,
}

impl RepoLock {
    /// Attempt to acquire the repository lock.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &MiragePaths) -> Result<Self, LockError> {
        let dir = paths.mirage_dir();
        fs::create_dir_all(&dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", dir.display(), e))
        })?;

        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_paths(dir: &Path) -> MiragePaths {
        MiragePaths::new(dir.to_path_buf(), dir.to_path_buf())
    }

    #[test]
    fn acquire_creates_directory_and_file() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());
        assert!(!paths.mirage_dir().exists());

        let lock = RepoLock::acquire(&paths).expect("acquire lock");
        assert!(lock.is_held());
        assert_eq!(lock.path(), paths.lock_path());
        assert!(lock.path().exists());
    }

    #[test]
    fn second_acquire_fails_while_held() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        let _lock = RepoLock::acquire(&paths).expect("first acquire");
        assert!(matches!(
            RepoLock::acquire(&paths),
            Err(LockError::AlreadyLocked)
        ));
    }

    #[test]
    fn released_on_drop() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(temp.path());

        drop(RepoLock::acquire(&paths).expect("first acquire"));
        let again = RepoLock::acquire(&paths).expect("second acquire");
        assert!(again.is_held());
    }

    #[test]
    fn worktree_shares_lock_with_parent() {
        let temp = TempDir::new().expect("create temp dir");
        let common = temp.path().to_path_buf();
        let main = MiragePaths::new(common.clone(), common.clone());
        let worktree = MiragePaths::new(common.join("worktrees").join("wt"), common);

        let _lock = RepoLock::acquire(&main).expect("acquire from main");
        assert!(matches!(
            RepoLock::acquire(&worktree),
            Err(LockError::AlreadyLocked)
        ));
    }
}
