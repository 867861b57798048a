//! CLI argument definitions using clap
//!
//! Commands:
//! - reststores init --config <path>
//! - reststores check --config <path>
//! - reststores serve --config <path> [--port <port>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// reststores - schema-validated REST stores over pluggable drivers
#[derive(Parser, Debug)]
#[command(name = "reststores")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a sample configuration file
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./reststores.json")]
        config: PathBuf,
    },

    /// Validate a configuration file and print its resources
    Check {
        /// Path to configuration file
        #[arg(long, default_value = "./reststores.json")]
        config: PathBuf,
    },

    /// Serve every configured resource over HTTP
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./reststores.json")]
        config: PathBuf,

        /// Port to listen on (overrides the configuration)
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
