//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Opens the repository and loads configuration
//! 2. Validates command-specific arguments
//! 3. Calls the engine (or the adapter, for `recover`)
//! 4. Formats and displays output

mod completion;
mod preview;
mod recover;
mod run;

pub use completion::completion;
pub use preview::preview;
pub use recover::recover;
pub use run::run;

use std::path::Path;

use anyhow::{Context as _, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cli::args::{Command, PlanArgs};
use crate::core::config::Config;
use crate::core::paths::MiragePaths;
use crate::core::plan::{OperationPlan, PlanError, PlanFile};
use crate::core::schedule::TimeWindow;
use crate::engine::{EngineError, RunRequest};
use crate::git::{Git, RepoAdapter};
use crate::ui::output::Verbosity;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, verbosity: Verbosity) -> Result<()> {
    match command {
        Command::Run { plan, residual } => run::run(&plan, residual, verbosity),
        Command::Preview { plan } => preview::preview(&plan, verbosity),
        Command::Recover {
            repo,
            restore,
            discard,
        } => recover::recover(&repo, restore, discard, verbosity),
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// An opened repository with its configuration.
pub(crate) struct Session {
    pub git: Git,
    pub paths: MiragePaths,
    pub config: Config,
}

impl Session {
    pub fn open(repo: &Path) -> Result<Self> {
        let git = Git::open(repo)
            .with_context(|| format!("failed to open repository at {}", repo.display()))?;
        let paths = git.paths();
        let config = Config::load(Some(&paths))?;

        if let Some(path) = config.global_config_loaded_from() {
            tracing::debug!(path = %path.display(), "global config loaded");
        }
        if let Some(path) = config.repo_config_loaded_from() {
            tracing::debug!(path = %path.display(), "repo config loaded");
        }

        let git = git
            .with_timeout(config.git_timeout())
            .with_untracked(config.include_untracked());
        Ok(Self { git, paths, config })
    }

    /// Load the plan file named on the command line.
    ///
    /// Missing revert content comes from the working tree at the branch tip,
    /// or from the insertion commit's tree with `--after`.
    pub fn load_plan(&self, args: &PlanArgs) -> Result<OperationPlan> {
        let file = PlanFile::read(&args.plan)?;
        let plan = match &args.after {
            None => file.resolve(self.git.work_dir())?,
            Some(rev) => {
                let start = self.git.resolve_commit(rev)?;
                file.resolve_with(|path| {
                    self.git
                        .file_at(&start, path)
                        .map_err(|e| PlanError::Baseline {
                            path: path.display().to_string(),
                            rev: rev.clone(),
                            message: e.to_string(),
                        })
                })?
            }
        };
        tracing::debug!(pairs = plan.len(), digest = %plan.digest(), "plan loaded");
        Ok(plan)
    }

    /// Build the engine request from flags and configuration.
    pub fn request<'p>(&self, plan: &'p OperationPlan, args: &PlanArgs) -> Result<RunRequest<'p>> {
        let commits = args.commits.unwrap_or_else(|| self.config.default_commits());
        let mut request = RunRequest::new(plan, commits);

        match (args.since, args.until) {
            (None, None) => {}
            (since, until) => {
                let since = match since {
                    Some(t) => t,
                    None => {
                        let rev = args.after.as_deref().unwrap_or("HEAD");
                        let start = self.git.resolve_commit(rev)?;
                        self.git.commit_timestamp(&start)?
                    }
                };
                let until = until.unwrap_or_else(Utc::now);
                let window = TimeWindow::new(since, until).map_err(EngineError::InvalidWindow)?;
                request = request.with_window(window);
            }
        }

        if let Some(rev) = &args.after {
            request = request.insert_after(rev.clone());
        }
        Ok(request)
    }
}

/// The jitter source: seeded when asked, otherwise from the thread RNG.
pub(crate) fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}
