//! Quarry CLI - Command-line interface for the Quarry extraction pipeline.

use clap::Parser;
use quarry_cli::commands;
use quarry_cli::{Cli, Command, Context, Formatter, QuarryConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize tracing (log to stderr, RUST_LOG overrides)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> quarry_cli::Result<()> {
    let cli = Cli::parse();

    let mut config = QuarryConfig::load(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint {
        config.service.endpoint = endpoint;
    }
    if let Some(store) = cli.store {
        config.storage.root = Some(store);
    }

    let format = cli.format.map(Into::into).unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let context = Context::new(config, Formatter::new(format, color_enabled))?;

    match cli.command {
        Command::Chunk(args) => commands::execute_chunk(args, &context),
        Command::Submit(args) => commands::execute_submit(args, &context),
        Command::Sweep => commands::execute_sweep(&context),
        Command::Watch(args) => commands::execute_watch(args, &context),
        Command::Decode(args) => commands::execute_decode(args, &context),
    }
}
