//! run command - Build and apply the history described by a plan

use anyhow::{bail, Context as _, Result};

use super::{rng_for, Session};
use crate::cli::args::{PlanArgs, ResidualArg};
use crate::core::ops::lock::RepoLock;
use crate::core::ops::recovery::RecoveryRecord;
use crate::core::plan::OperationPlan;
use crate::core::types::UtcTimestamp;
use crate::engine::{EngineConfig, EngineError, Orchestrator, RecoveryInfo};
use crate::ui::output::{self, Verbosity};

/// Run a transaction for the given plan.
pub fn run(args: &PlanArgs, residual: Option<ResidualArg>, verbosity: Verbosity) -> Result<()> {
    let session = Session::open(&args.repo)?;
    let _lock = RepoLock::acquire(&session.paths).context("cannot start a run")?;

    if let Some(record) = RecoveryRecord::read(&session.paths)? {
        let branch = record
            .disposable_branch
            .as_ref()
            .map(|b| format!(" (scratch branch '{b}')"))
            .unwrap_or_default();
        bail!(
            "a previous run failed during {}{}; run 'mirage recover' first",
            record.phase,
            branch
        );
    }

    let plan = session.load_plan(args)?;
    let request = session.request(&plan, args)?;

    let mut config = EngineConfig::from(&session.config);
    if let Some(policy) = residual {
        config.residual_policy = policy.into();
    }

    let mut rng = rng_for(args.seed);
    let orchestrator = Orchestrator::new(&session.git, config);

    match orchestrator.run(&request, &mut rng) {
        Ok(report) => {
            output::print(output::format_report(&report), verbosity);
            if !report.net_zero {
                let message = format!(
                    "{} does not match its tree from before the run",
                    report.original_branch
                );
                output::warn(message, verbosity);
            }
            Ok(())
        }
        Err(err) => {
            if let Some(info) = err.recovery() {
                save_recovery(&session, &plan, info, &err);
                output::recovery(info);
            }
            Err(err.into())
        }
    }
}

fn save_recovery(session: &Session, plan: &OperationPlan, info: &RecoveryInfo, err: &EngineError) {
    let run_id = info
        .disposable_branch
        .as_str()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    let record = RecoveryRecord {
        run_id,
        recorded_at: UtcTimestamp::now(),
        original_branch: info.original_branch.clone(),
        original_head: info.original_head.clone(),
        disposable_branch: Some(info.disposable_branch.clone()),
        last_commit: info.last_commit.clone(),
        phase: info.phase.to_string(),
        error: err.to_string(),
        plan_digest: plan.digest(),
        work_dir: session.git.work_dir().to_path_buf(),
    };

    match record.write(&session.paths) {
        Ok(()) => tracing::info!(
            path = %RecoveryRecord::path(&session.paths).display(),
            "recovery record written"
        ),
        Err(e) => tracing::warn!(error = %e, "could not write recovery record"),
    }
}
