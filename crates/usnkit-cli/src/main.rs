//! # usnkit CLI
//!
//! Command-line interface for reading the NTFS change journal.
//!
//! ## Commands
//!
//! - `usnkit info <volume>` - Show journal state, optionally creating one
//! - `usnkit scan <volume>` - Enumerate the master file table with paths
//! - `usnkit journal <volume>` - Dump the journal from its first record
//! - `usnkit monitor <volume>` - Follow new journal records live
//!
//! ## Example Usage
//!
//! ```bash
//! # Journal state of C: (requires admin)
//! usnkit info C:
//!
//! # Every directory under Users
//! usnkit scan C: --dirs --include '^Users\\'
//!
//! # Deletions and renames as JSON lines
//! usnkit journal C: --reasons delete,rename --output json
//! ```

mod app;
mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// usnkit - NTFS change journal and file table reader
#[derive(Parser)]
#[command(name = "usnkit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the change journal state of a volume
    Info {
        /// Volume to open (e.g., "C:")
        volume: String,

        /// Create a journal if none is active
        #[arg(long)]
        create: bool,

        /// Maximum journal size in bytes when creating
        #[arg(long, default_value = "33554432")]
        max_size: u64,

        /// Allocation delta in bytes when creating
        #[arg(long, default_value = "8388608")]
        allocation_delta: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Enumerate the master file table and print resolved paths
    Scan {
        /// Volume to open (e.g., "C:")
        volume: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Only show directories
        #[arg(long, conflicts_with = "files")]
        dirs: bool,

        /// Only show files (not directories)
        #[arg(long)]
        files: bool,

        /// Maximum number of entries to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Read the journal from its first record to the end
    Journal {
        /// Volume to open (e.g., "C:")
        volume: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Reason names to read (e.g., "create,delete"); defaults to the config
        #[arg(short, long)]
        reasons: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },

    /// Print new journal records as they arrive
    Monitor {
        /// Volume to open (e.g., "C:")
        volume: String,

        #[command(flatten)]
        filter: FilterArgs,

        /// Reason names to report; defaults to the config
        #[arg(short, long)]
        reasons: Option<String>,

        /// Poll interval in milliseconds; defaults to the config
        #[arg(short, long)]
        interval: Option<u64>,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        output: OutputFormat,
    },
}

/// Path filters shared by the record-printing commands.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct FilterArgs {
    /// Only paths matching this regex (can be used multiple times)
    #[arg(long)]
    include: Vec<String>,

    /// Skip paths matching this regex (can be used multiple times)
    #[arg(long)]
    exclude: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = app::load_config(cli.config.as_deref())?;

    // Setup logging
    let log_level = if cli.quiet {
        "error".to_string()
    } else {
        match cli.verbose {
            0 => config.general.log_level.clone(),
            1 => "debug".to_string(),
            _ => "trace".to_string(),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)))
        .init();

    // Execute command
    match cli.command {
        Commands::Info {
            volume,
            create,
            max_size,
            allocation_delta,
            output,
        } => commands::info::run(config, &volume, create, max_size, allocation_delta, output),
        Commands::Scan {
            volume,
            filter,
            dirs,
            files,
            limit,
            output,
        } => commands::scan::run(config, &volume, &filter, dirs, files, limit, output),
        Commands::Journal {
            volume,
            filter,
            reasons,
            output,
        } => commands::journal::run(config, &volume, &filter, reasons.as_deref(), output),
        Commands::Monitor {
            volume,
            filter,
            reasons,
            interval,
            duration,
            output,
        } => commands::monitor::run(
            config,
            &volume,
            &filter,
            reasons.as_deref(),
            interval,
            duration,
            output,
        ),
    }
}
