//! autoretry - HTTP requests that retry until they succeed
//!
//! This is the main entry point for the autoretry command-line interface.

mod cli;
mod commands;
mod output;

use anyhow::Result;
use autoretry_http::Method;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (required for rustls 0.23+)
    // This must be done before any TLS operations
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Get(args) => commands::request::run(Method::Get, args, config, cli.quiet).await,
        Commands::Head(args) => commands::request::run(Method::Head, args, config, cli.quiet).await,
        Commands::Post(args) => commands::request::run(Method::Post, args, config, cli.quiet).await,
        Commands::Put(args) => commands::request::run(Method::Put, args, config, cli.quiet).await,
        Commands::Patch(args) => {
            commands::request::run(Method::Patch, args, config, cli.quiet).await
        }
        Commands::Delete(args) => {
            commands::request::run(Method::Delete, args, config, cli.quiet).await
        }
        Commands::Upload(args) => commands::request::upload(args, config, cli.quiet).await,
        Commands::Config(cmd) => commands::config::run(cmd, config),
    }
}

/// Initialize tracing with appropriate verbosity
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            // Info shows retry warnings; -v/-vv add attempt and tracker detail
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
