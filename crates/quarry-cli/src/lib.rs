//! Quarry CLI library.
//!
//! Configuration loading, component wiring, command execution and output
//! formatting for the `quarry` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod output;

pub use cli::{Cli, Command};
pub use config::QuarryConfig;
pub use context::Context;
pub use error::{CliError, Result};
pub use output::Formatter;
