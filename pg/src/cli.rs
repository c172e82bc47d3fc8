//! CLI argument parsing for protograph

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pg")]
#[command(author, version, about = "Convert JSON-lines records into graph mutations", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert records into mutation groups
    Convert {
        /// Schema file (YAML list of rules)
        #[arg(required = true)]
        schema: PathBuf,

        /// Newline-delimited JSON input, or - for stdin
        #[arg(required = true)]
        input: PathBuf,

        /// Apply this rule label to every record instead of its #label field
        #[arg(long)]
        label: Option<String>,

        /// Submit groups to this mutation service URL instead of printing them
        #[arg(short, long)]
        server: Option<String>,

        /// Per-request timeout for the mutation service in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Lines buffered between reader and converter
        #[arg(short, long)]
        buffer: Option<usize>,
    },

    /// Load a schema and report its rules and any problems
    Validate {
        /// Schema file (YAML list of rules)
        #[arg(required = true)]
        schema: PathBuf,
    },
}
