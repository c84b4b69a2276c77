//! cli
//!
//! Command-line interface layer for Mirage.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration, take the repository lock, read the plan file
//! - Hand the run to the [`crate::engine`] and report the outcome
//! - Map errors to process exit codes
//!
//! # Architecture
//!
//! The CLI layer is thin. Repository mutations during a run happen inside
//! the engine; the CLI only writes the recovery record and performs the
//! explicit clean-up steps of `mirage recover`.

pub mod args;
pub mod commands;

pub use args::{Cli, Command, PlanArgs, ResidualArg, Shell};

use anyhow::Result;

use crate::core::config::ConfigError;
use crate::core::plan::PlanError;
use crate::engine::{exit_code, EngineError};
use crate::ui::output::Verbosity;

/// Run a parsed command line.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    let verbosity = Verbosity::from_flags(cli.quiet, cli.debug);
    commands::dispatch(cli.command, verbosity)
}

/// Exit code for an error returned by [`run`].
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(engine) = err.downcast_ref::<EngineError>() {
        return engine.exit_code();
    }
    if err.downcast_ref::<PlanError>().is_some() || err.downcast_ref::<ConfigError>().is_some() {
        return exit_code::PRECONDITION;
    }
    exit_code::FAILURE
}
