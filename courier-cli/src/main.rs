// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! Courier CLI - issue HTTP requests against a configured API from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Point the CLI at an API
//! courier config set-base-url https://api.example.com
//!
//! # GET a resource
//! courier request GET users
//!
//! # POST JSON with a query item
//! courier request POST items --json '{"name":"widget"}' --query notify=false
//!
//! # Store a bearer token in the keychain
//! courier credential set --token abc123
//!
//! # Upload and download files
//! courier upload photos ./cat.png
//! courier download exports/latest --output latest.csv
//!
//! # JSON output
//! courier --format json --pretty request GET users
//! ```

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use courier_client::{RequestError, TransportError};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{credential, request, transfer};

// ============================================================================
// CLI Definition
// ============================================================================

/// Courier CLI - HTTP requests with stored credentials.
#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "HTTP request client with keychain-backed credentials")]
#[command(long_about = r#"
Courier issues HTTP requests against a configured base URL.

Credentials are kept in the system keychain under an identifier derived from
the base URL and attached to every request as an Authorization header.

Examples:
  courier request GET users               # GET <base>/users
  courier request DELETE users/7          # DELETE with the stored credential
  courier credential set --token abc      # Store a bearer token
  courier --format json request GET me    # JSON output
"#)]
#[command(version)]
#[command(author = "Courier Contributors")]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Base URL, overriding the configuration file.
    #[arg(long, short = 'b', global = true)]
    pub base_url: Option<String>,

    /// Configuration file to use instead of the default location.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (show debug info and response headers).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Send a request and print the response.
    #[command(visible_alias = "r")]
    Request(request::RequestArgs),

    /// Upload a file with POST.
    #[command(visible_alias = "up")]
    Upload(transfer::UploadArgs),

    /// Download a resource to a file.
    #[command(visible_alias = "down")]
    Download(transfer::DownloadArgs),

    /// Manage the stored credential.
    Credential(credential::CredentialArgs),

    /// Manage configuration.
    Config(commands::config::ConfigArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// The server answered with an error status.
    HttpStatus = 2,
    /// The request could not be built.
    InvalidRequest = 3,
    /// Timeout.
    Timeout = 4,
}

impl ExitCode {
    /// Picks the exit code for a failed command.
    pub fn for_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<RequestError>() {
            Some(RequestError::Status { .. }) => Self::HttpStatus,
            Some(RequestError::Transport(TransportError::Timeout)) => Self::Timeout,
            Some(e) if e.is_construction() => Self::InvalidRequest,
            _ => Self::Error,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("courier=debug,courier_client=debug,courier_store=debug,info")
    } else {
        EnvFilter::new("courier=warn,courier_client=warn,courier_store=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Request(args) => request::run(args, &cli).await,
        Commands::Upload(args) => transfer::upload(args, &cli).await,
        Commands::Download(args) => transfer::download(args, &cli).await,
        Commands::Credential(args) => credential::run(args, &cli).await,
        Commands::Config(args) => commands::config::run(args, &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::for_error(&e) as i32);
    }

    Ok(())
}
