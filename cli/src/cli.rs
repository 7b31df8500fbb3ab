use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tablemeta_store::StoreConfig;

#[derive(Parser, Debug)]
#[command(
    name = "tablemeta",
    version,
    about = "Manage stored table metadata for data-explainer prompts."
)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true, env = "TABLEMETA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding one metadata file per table.
    #[arg(long, global = true, env = "TABLEMETA_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Time-to-live of cached records, in seconds.
    #[arg(long, global = true, env = "TABLEMETA_CACHE_TTL_SECS")]
    pub cache_ttl_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store field descriptions from a file or from stdin.
    Store(StoreArgs),

    /// Show stored metadata for a table.
    Show {
        #[arg(short, long)]
        table: String,

        /// Only show the table if it is recorded under this schema.
        #[arg(short, long)]
        schema: Option<String>,
    },

    /// List all tables with stored metadata.
    List {
        /// Only list tables recorded under this schema.
        #[arg(short, long)]
        schema: Option<String>,
    },

    /// Delete stored metadata for a table.
    Delete {
        #[arg(short, long)]
        table: String,

        /// Only delete the table if it is recorded under this schema.
        #[arg(short, long)]
        schema: Option<String>,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },

    /// Set the business context of a table.
    Context {
        #[arg(short, long)]
        table: String,

        /// Business context text. Blank text clears it.
        #[arg(long)]
        text: String,
    },

    /// Export metadata to a JSON file.
    Export {
        #[arg(short, long)]
        output: PathBuf,

        /// Export only these tables.
        #[arg(short, long, num_args = 1..)]
        tables: Vec<String>,
    },

    /// Import metadata from a JSON file.
    Import {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write a sample field descriptions file.
    Sample {
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    #[command(flatten)]
    pub source: StoreSource,

    /// Prompt for descriptions line by line; an empty line finishes.
    #[arg(short, long, requires = "table")]
    pub interactive: bool,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct StoreSource {
    /// File with a `TABLE: name` line followed by `field: description` lines.
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Table name; `field: description` lines are read from stdin.
    #[arg(short, long)]
    pub table: Option<String>,
}

impl Cli {
    /// Resolve the store configuration: file first, then flags and env vars.
    pub fn store_config(&self) -> Result<StoreConfig> {
        let mut config = match &self.config {
            Some(path) => StoreConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?,
            None => StoreConfig::default(),
        };

        if let Some(dir) = &self.storage_dir {
            config.storage_dir = dir.clone();
        }
        if let Some(ttl) = self.cache_ttl_secs {
            config.cache_ttl_secs = ttl;
        }

        if config.storage_dir.as_os_str().is_empty() {
            bail!("no storage directory configured; pass --storage-dir or set TABLEMETA_STORAGE_DIR");
        }
        Ok(config)
    }
}
