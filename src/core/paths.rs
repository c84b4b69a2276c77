//! core::paths
//!
//! Where mirage keeps its files inside a repository.
//!
//! # Storage Layout
//!
//! Everything lives under `<common_dir>/mirage/`:
//! - `config.toml` - Repository configuration
//! - `lock` - Exclusive lock file
//! - `recovery.json` - Record of the last failed transaction
//!
//! `common_dir` is shared by every linked worktree, so a run started from
//! one worktree locks out runs from the others.
//!
//! # Example
//!
//! ```
//! use commit_mirage::core::paths::MiragePaths;
//! use std::path::PathBuf;
//!
//! let paths = MiragePaths::new(
//!     PathBuf::from("/repo/.git"),
//!     PathBuf::from("/repo/.git"),
//! );
//!
//! assert_eq!(
//!     paths.recovery_path(),
//!     PathBuf::from("/repo/.git/mirage/recovery.json")
//! );
//! ```

use std::path::{Path, PathBuf};

/// Storage locations for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiragePaths {
    /// Per-worktree git directory.
    pub git_dir: PathBuf,

    /// Shared git directory. Equals `git_dir` outside linked worktrees.
    pub common_dir: PathBuf,
}

impl MiragePaths {
    pub fn new(git_dir: PathBuf, common_dir: PathBuf) -> Self {
        Self {
            git_dir,
            common_dir,
        }
    }

    /// Root directory for mirage data.
    pub fn mirage_dir(&self) -> PathBuf {
        self.common_dir.join("mirage")
    }

    /// `<common_dir>/mirage/config.toml`
    pub fn repo_config_path(&self) -> PathBuf {
        self.mirage_dir().join("config.toml")
    }

    /// `<common_dir>/mirage/lock`
    pub fn lock_path(&self) -> PathBuf {
        self.mirage_dir().join("lock")
    }

    /// `<common_dir>/mirage/recovery.json`
    pub fn recovery_path(&self) -> PathBuf {
        self.mirage_dir().join("recovery.json")
    }

    /// Check if this is a linked worktree.
    pub fn is_worktree(&self) -> bool {
        self.git_dir != self.common_dir
    }

    pub fn common_dir(&self) -> &Path {
        &self.common_dir
    }

    /// Create `<common_dir>/mirage/` if needed.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.mirage_dir())
    }
}
