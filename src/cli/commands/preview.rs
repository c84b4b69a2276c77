//! preview command - Show the planned commits without touching the repository

use anyhow::Result;

use super::{rng_for, Session};
use crate::cli::args::PlanArgs;
use crate::engine::{EngineConfig, Orchestrator};
use crate::ui::output::{self, Verbosity};

/// Print the buckets and timestamps a run would use.
///
/// The working tree may be dirty; nothing is written.
pub fn preview(args: &PlanArgs, verbosity: Verbosity) -> Result<()> {
    let session = Session::open(&args.repo)?;
    let plan = session.load_plan(args)?;
    let request = session.request(&plan, args)?;

    let mut rng = rng_for(args.seed);
    let orchestrator = Orchestrator::new(&session.git, EngineConfig::from(&session.config));
    let run_plan = orchestrator.preview(&request, &mut rng)?;

    output::print(output::format_run_plan(&plan, &run_plan), verbosity);
    Ok(())
}
