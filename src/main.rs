//! mirage binary entry point.

use commit_mirage::cli::{self, Cli};
use commit_mirage::ui::output;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = Cli::parse_args();
    init_tracing(args.debug);

    if let Err(err) = cli::run(args) {
        output::error(format!("{err:#}"));
        std::process::exit(cli::exit_code_for(&err));
    }
}

/// Diagnostics go to stderr. `RUST_LOG` wins; `--debug` raises the default.
fn init_tracing(debug: bool) {
    let default = if debug {
        "commit_mirage=debug"
    } else {
        "commit_mirage=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
