//! Management CLI for the table metadata store.
//!
//! Resolves configuration from a TOML file, flags and environment variables,
//! opens the store and dispatches the subcommand.

mod cli;
mod commands;

use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use tablemeta_store::MetadataStore;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut stdout = io::stdout().lock();
    if let Command::Sample { output } = &cli.command {
        return commands::write_sample(output, &mut stdout);
    }

    let config = cli.store_config()?;
    let store = MetadataStore::open(&config).with_context(|| {
        format!(
            "opening metadata store at {}",
            config.storage_dir.display()
        )
    })?;

    commands::execute(&cli.command, &store, io::stdin().lock(), &mut stdout)
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
