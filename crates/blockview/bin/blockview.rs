//! blockview binary entry point.
//!
//! Thin wrapper around the library: initializes logging, parses arguments
//! and runs the selected command against stdout.

use anyhow::Result;
use blockview::cli::{Cli, run};
use clap::Parser;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("Parsed arguments: {cli:?}");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(&cli, &mut out)
}
