//! core::config::schema
//!
//! Configuration schema types.
//!
//! The global and repository files share one schema. Every key is optional;
//! unset keys fall through to the other scope and then to built-in defaults.
//!
//! # Example
//!
//! ```toml
//! residual = "fold"
//! branch_prefix = "mirage/scratch"
//! default_commits = 5
//! include_untracked = true
//!
//! [git]
//! timeout_secs = 120
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// What to do when the finished history does not cancel out exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidualPolicy {
    /// Reverse-apply the residual and fold it into the final commit.
    #[default]
    Fold,
    /// Fail the run.
    Reject,
}

impl fmt::Display for ResidualPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fold => write!(f, "fold"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for ResidualPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fold" => Ok(Self::Fold),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::InvalidValue(format!(
                "invalid residual policy '{other}', must be one of: fold, reject"
            ))),
        }
    }
}

/// One configuration file (global or repository scope).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Residual handling during reconciliation
    pub residual: Option<ResidualPolicy>,

    /// Prefix for disposable branch names
    pub branch_prefix: Option<String>,

    /// Commit count when `--commits` is not given
    pub default_commits: Option<usize>,

    /// Whether untracked files make the working tree dirty
    pub include_untracked: Option<bool>,

    /// Git invocation settings
    pub git: Option<GitSettings>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(prefix) = &self.branch_prefix {
            // The prefix must still be valid once a suffix is appended.
            BranchName::new(format!("{prefix}/00000000")).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid branch_prefix: {e}"))
            })?;
        }

        if let Some(commits) = self.default_commits {
            if commits < 2 {
                return Err(ConfigError::InvalidValue(format!(
                    "default_commits must be at least 2, got {commits}"
                )));
            }
        }

        if let Some(git) = &self.git {
            git.validate()?;
        }

        Ok(())
    }
}

/// `[git]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GitSettings {
    /// Seconds before a git subprocess is killed
    pub timeout_secs: Option<u64>,
}

impl GitSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "git.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
