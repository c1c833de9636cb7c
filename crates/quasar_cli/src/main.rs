//! Quasar CLI
//!
//! Command-line tools for creating and inspecting a Quasar blockstore.
//!
//! # Commands
//!
//! - `makedb` - Create the backing files
//! - `inspect` - Show the frontier of every backing file
//! - `verify` - Check that every backing file carries the magic tag
//! - `put` - Write one record and print its address
//! - `get` - Read the record at an address

mod commands;

use clap::{Parser, Subcommand};
use quasar_blockstore::{Config, DEFAULT_FILE_COUNT};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Quasar blockstore command-line tools.
#[derive(Parser)]
#[command(name = "quasar")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the storage directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Number of backing files
    #[arg(global = true, long, default_value_t = DEFAULT_FILE_COUNT)]
    files: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the backing files for a new database
    Makedb,

    /// Show the frontier of every backing file
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check that every backing file exists and carries the magic tag
    Verify,

    /// Write one record and print its address
    Put {
        /// Record payload
        data: String,

        /// Interpret the payload as hex
        #[arg(long)]
        hex: bool,
    },

    /// Read the record at an address
    Get {
        /// Address, as 0x-prefixed hex or decimal
        address: String,

        /// Print the payload as hex
        #[arg(long)]
        hex: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::new().file_count(cli.files);

    match cli.command {
        Commands::Makedb => {
            let path = cli.path.ok_or("Storage path required for makedb")?;
            commands::makedb::run(&path, &config)?;
        }
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Storage path required for inspect")?;
            commands::inspect::run(&path, config, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Storage path required for verify")?;
            commands::verify::run(&path, &config)?;
        }
        Commands::Put { data, hex } => {
            let path = cli.path.ok_or("Storage path required for put")?;
            commands::record::put(&path, config, &data, hex)?;
        }
        Commands::Get { address, hex } => {
            let path = cli.path.ok_or("Storage path required for get")?;
            commands::record::get(&path, config, &address, hex)?;
        }
        Commands::Version => {
            println!("quasar {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
