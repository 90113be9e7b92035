use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use outbox_cli::cli::{init_logging, run, CliConfig, Command};
use outbox_core::Storage;

#[derive(Parser)]
#[command(name = "outbox")]
#[command(about = "Inspect and maintain an offline message store")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short, global = true)]
    pretty: bool,

    /// Path to JSON config file (dataDir, quotaBytes, engine)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Data directory, overrides the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Byte budget for the store, overrides the config file
    #[arg(long, global = true)]
    quota_bytes: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summary of stored data and quota state
    Status,

    /// Storage statistics
    Stats,

    /// List stored messages
    Messages {
        /// Only messages still waiting for delivery
        #[arg(long)]
        pending: bool,
    },

    /// List drafts
    Drafts {
        /// Only drafts for this conversation
        #[arg(long)]
        conversation: Option<String>,
    },

    /// List queued actions
    Queue {
        /// Only actions that ran out of retries
        #[arg(long)]
        exhausted: bool,
    },

    /// Export everything as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(long, short)]
        out: Option<PathBuf>,
    },

    /// Replace stored collections from an export file
    Import {
        file: PathBuf,
    },

    /// Trim collections to their limits and purge old exhausted actions
    Cleanup,

    /// Give an exhausted action a fresh set of retries
    Requeue {
        /// Queue item id
        id: String,
    },

    /// Delete every exhausted action
    DiscardExhausted,

    /// Delete all offline data
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

impl From<Commands> for Command {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Status => Command::Status,
            Commands::Stats => Command::Stats,
            Commands::Messages { pending } => Command::Messages { pending },
            Commands::Drafts { conversation } => Command::Drafts { conversation },
            Commands::Queue { exhausted } => Command::Queue { exhausted },
            Commands::Export { out } => Command::Export { out },
            Commands::Import { file } => Command::Import { file },
            Commands::Cleanup => Command::Cleanup,
            Commands::Requeue { id } => Command::Requeue { id },
            Commands::DiscardExhausted => Command::DiscardExhausted,
            Commands::Clear { yes } => Command::Clear { yes },
        }
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    if let Err(e) = execute(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn execute(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };
    if cli.data_dir.is_some() {
        config.data_dir = cli.data_dir.clone();
    }
    if cli.quota_bytes.is_some() {
        config.quota_bytes = cli.quota_bytes;
    }

    let core = config.core();
    let storage = Storage::open(&core, config.engine, config.quota_bytes)
        .with_context(|| format!("Failed to open data dir: {}", core.data_dir.display()))?;

    let output = run(&storage, cli.command.into())?;
    let text = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", text);
    Ok(())
}
