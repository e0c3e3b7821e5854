//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::ident::HashAlgorithm;

/// streamchain - run chained stream pipelines
#[derive(Parser)]
#[command(
    name = "sc",
    about = "Chain readable, writable and duplex stages into streaming pipelines",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a pipeline definition to completion
    Run {
        /// Pipeline definition (YAML or JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Check a pipeline definition without running it
    Validate {
        /// Pipeline definition (YAML or JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the hex digest of a string
    Hash {
        /// Digest algorithm (sha224, sha256, sha384, sha512)
        #[arg(short, long, default_value = "sha256")]
        algorithm: HashAlgorithm,

        /// Data to hash
        data: String,
    },

    /// Print the v1 UUID for an identifier and a Unix timestamp
    Uuid {
        /// Stable identifier, hashed into the node id
        identifier: String,

        /// Unix timestamp in seconds (10 digits) or milliseconds (13 digits)
        timestamp: u64,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("streamchain")
        .join("logs")
        .join("streamchain.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text pointing at the log file
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    format!("Logs are written to: {}\n", get_log_path().display())
}
