//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::core::config::ResidualPolicy;

/// Mirage - build backdated commit history that cancels itself out
#[derive(Parser, Debug)]
#[command(name = "mirage")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the history described by a plan file
    #[command(
        name = "run",
        long_about = "Build the history described by a plan file.\n\n\
            Each file in the plan is changed and later restored, spread over the \
            requested number of backdated commits. The commits are built on a \
            scratch branch and only then moved onto the current branch. When the \
            run finishes the tracked tree is the same as before.",
        after_help = "\
EXAMPLES:
    # Five commits between the last commit and now
    mirage run --plan plan.json --commits 5

    # A fixed window, reproducible timestamps
    mirage run --plan plan.json --since 2024-01-01 --until 2024-02-01 --seed 7

    # Insert the commits after an older commit
    mirage run --plan plan.json --after HEAD~3

IF A RUN FAILS:
    The scratch branch is kept and a recovery record is written.
        mirage recover             # show what was left behind
        mirage recover --restore   # check the original branch out again"
    )]
    Run {
        #[command(flatten)]
        plan: PlanArgs,

        /// What to do when the history does not cancel out
        #[arg(long, value_enum)]
        residual: Option<ResidualArg>,
    },

    /// Show the commits a run would create without touching the repository
    #[command(name = "preview")]
    Preview {
        #[command(flatten)]
        plan: PlanArgs,
    },

    /// Inspect or clean up after a failed run
    #[command(
        name = "recover",
        long_about = "Inspect or clean up after a failed run.\n\n\
            Without flags, prints the recovery record and the manual steps. \
            --restore checks the original branch out. --discard deletes the \
            scratch branch and the record."
    )]
    Recover {
        /// Repository to operate on
        #[arg(default_value = ".")]
        repo: PathBuf,

        /// Check the original branch out again
        #[arg(long)]
        restore: bool,

        /// Delete the scratch branch and the recovery record
        #[arg(long)]
        discard: bool,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    mirage completion bash > ~/.local/share/bash-completion/completions/mirage
    mirage completion zsh > ~/.zfunc/_mirage
    mirage completion fish > ~/.config/fish/completions/mirage.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments shared by `run` and `preview`.
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Repository to operate on
    #[arg(default_value = ".")]
    pub repo: PathBuf,

    /// JSON plan file with the operation pairs
    #[arg(long, value_name = "FILE")]
    pub plan: PathBuf,

    /// Number of commits to create (default from config, else 3)
    #[arg(short = 'n', long, value_name = "N")]
    pub commits: Option<usize>,

    /// Earliest commit time (RFC 3339, YYYY-MM-DD or unix seconds)
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    pub since: Option<DateTime<Utc>>,

    /// Latest commit time (RFC 3339, YYYY-MM-DD or unix seconds)
    #[arg(long, value_name = "TIME", value_parser = parse_time)]
    pub until: Option<DateTime<Utc>>,

    /// Insert the commits after this commit instead of at the branch tip
    #[arg(long, value_name = "COMMIT")]
    pub after: Option<String>,

    /// Seed for the timestamp jitter
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Residual policy as a CLI value.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualArg {
    /// Reverse-apply the residual into the last commit
    Fold,
    /// Fail the run
    Reject,
}

impl From<ResidualArg> for ResidualPolicy {
    fn from(arg: ResidualArg) -> Self {
        match arg {
            ResidualArg::Fold => ResidualPolicy::Fold,
            ResidualArg::Reject => ResidualPolicy::Reject,
        }
    }
}

/// Supported shells for completion
#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Parse a point in time from the command line.
///
/// Accepts RFC 3339 (`2024-03-09T14:05:00+01:00`), `YYYY-MM-DD HH:MM:SS`
/// and `YYYY-MM-DD` (both UTC), or integer unix seconds.
pub fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    let value = value.trim();

    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&t));
    }
    if let Ok(d) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(t) = d.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&t));
        }
    }
    if let Ok(secs) = value.parse::<i64>() {
        if let Some(t) = Utc.timestamp_opt(secs, 0).single() {
            return Ok(t);
        }
    }

    Err(format!(
        "'{value}' is not a time (use RFC 3339, YYYY-MM-DD or unix seconds)"
    ))
}
