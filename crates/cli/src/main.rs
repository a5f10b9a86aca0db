//! Neonmock CLI - Main Entry Point

use clap::{Parser, Subcommand};

use neonmock_cli::commands::{check, query, serve};
use neonmock_cli::output::{self, print_error};

/// Neonmock - in-memory SQL-over-HTTP endpoint for end-to-end tests
#[derive(Parser)]
#[command(name = "neonmock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a mock spec as an HTTP query endpoint
    Serve(serve::ServeArgs),

    /// Validate specs and list their registered statements
    Check(check::CheckArgs),

    /// Run one statement against a spec and print the encoded result
    Query(query::QueryArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Serve(args) => serve::execute(args).await,
        Commands::Check(args) => check::execute(args, cli.format),
        Commands::Query(args) => query::execute(args, cli.format),
        Commands::Version => {
            println!("neonmock v{}", neonmock_common::VERSION);
            Ok(())
        }
    };

    if let Err(e) = result {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}
