//! osforge binary entry point.

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    init_logging(&cli.log_directive());
    cli.run()
}

/// Install the stderr subscriber. `RUST_LOG` wins over the directive
/// derived from `--log-level` / `DEBUG_LEVEL`.
fn init_logging(directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))
        .unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
