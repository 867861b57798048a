//! CLI module for reststores
//!
//! Provides command-line interface for:
//! - init: Write a sample configuration
//! - check: Validate a configuration and print its resources
//! - serve: Run the HTTP server

mod args;
mod commands;
mod config;
mod errors;

pub use args::{Cli, Command};
pub use commands::{build_registry, check, init, run, run_command, sample_config, serve};
pub use config::AppConfig;
pub use errors::{CliError, CliErrorCode, CliResult};
