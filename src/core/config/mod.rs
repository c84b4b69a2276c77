//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! mirage has two configuration scopes:
//! - **Global**: User-level settings
//! - **Repo**: Repository-level overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$MIRAGE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/mirage/config.toml`
//! 3. `~/.mirage/config.toml`
//!
//! # Repo Config Location
//!
//! `<common_dir>/mirage/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use commit_mirage::core::config::Config;
//!
//! let config = Config::load(None).unwrap();
//! println!("Residual policy: {}", config.residual());
//! println!("Default commits: {}", config.default_commits());
//! ```

pub mod schema;

pub use schema::{ConfigFile, GitSettings, ResidualPolicy};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::paths::MiragePaths;

/// Default prefix for disposable branches.
pub const DEFAULT_BRANCH_PREFIX: &str = "mirage/scratch";

/// Default commit count.
pub const DEFAULT_COMMITS: usize = 3;

/// Default git subprocess timeout.
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 60;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: repo over global over defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: ConfigFile,
    pub repo: Option<ConfigFile>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `paths` is provided, also loads the repository file.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// holds an invalid value. Missing files are not an error.
    pub fn load(paths: Option<&MiragePaths>) -> Result<Self, ConfigError> {
        let global_path = Self::find_global(
            std::env::var_os("MIRAGE_CONFIG").map(PathBuf::from),
            std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
            dirs::home_dir(),
        );
        Self::load_from(global_path, paths.map(MiragePaths::repo_config_path))
    }

    /// Load from explicit file locations. Either file may be absent on disk.
    pub fn load_from(
        global_path: Option<PathBuf>,
        repo_path: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let global_path = global_path.filter(|p| p.exists());
        let repo_path = repo_path.filter(|p| p.exists());

        let global = match &global_path {
            Some(path) => Self::read_file(path)?,
            None => ConfigFile::default(),
        };
        let repo = repo_path.as_deref().map(Self::read_file).transpose()?;

        global.validate()?;
        if let Some(ref r) = repo {
            r.validate()?;
        }

        Ok(Config {
            global,
            repo,
            global_path,
            repo_path,
        })
    }

    /// First existing global config among the standard locations.
    fn find_global(
        explicit: Option<PathBuf>,
        xdg_home: Option<PathBuf>,
        home: Option<PathBuf>,
    ) -> Option<PathBuf> {
        let candidates = [
            explicit,
            xdg_home.map(|d| d.join("mirage/config.toml")),
            home.map(|d| d.join(".mirage/config.toml")),
        ];
        candidates.into_iter().flatten().find(|p| p.exists())
    }

    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Pick the repo value, then the global value.
    fn pick<T>(&self, get: impl Fn(&ConfigFile) -> Option<T>) -> Option<T> {
        self.repo.as_ref().and_then(&get).or_else(|| get(&self.global))
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Residual policy. Defaults to `fold`.
    pub fn residual(&self) -> ResidualPolicy {
        self.pick(|c| c.residual).unwrap_or_default()
    }

    /// Disposable branch prefix. Defaults to `mirage/scratch`.
    pub fn branch_prefix(&self) -> String {
        self.pick(|c| c.branch_prefix.clone())
            .unwrap_or_else(|| DEFAULT_BRANCH_PREFIX.to_string())
    }

    /// Commit count used when none is given. Defaults to 3.
    pub fn default_commits(&self) -> usize {
        self.pick(|c| c.default_commits).unwrap_or(DEFAULT_COMMITS)
    }

    /// Whether untracked files block a run. Defaults to `true`.
    pub fn include_untracked(&self) -> bool {
        self.pick(|c| c.include_untracked).unwrap_or(true)
    }

    /// Timeout for git subprocesses. Defaults to 60 seconds.
    pub fn git_timeout(&self) -> Duration {
        let secs = self
            .pick(|c| c.git.as_ref().and_then(|g| g.timeout_secs))
            .unwrap_or(DEFAULT_GIT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}
