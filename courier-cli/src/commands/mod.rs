//! CLI command implementations.

pub mod config;
pub mod credential;
pub mod request;
pub mod transfer;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use courier_client::{RequestController, Response};
use tokio::sync::oneshot;

use crate::config::{CliConfig, default_config_path};
use crate::output::{JsonFormatter, ResponseOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Path of the configuration file in use.
pub fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(default_config_path)
}

/// Builds a controller from the configuration file and command-line overrides.
pub async fn controller(cli: &Cli) -> Result<RequestController> {
    let config = CliConfig::load(&config_path(cli)).await?;
    let base_url = cli
        .base_url
        .clone()
        .or(config.base_url.clone())
        .context("No base URL configured. Pass --base-url or run `courier config set-base-url <url>`")?;

    RequestController::builder(base_url)
        .settings(config.client_settings())
        .build()
        .context("Failed to create request controller")
}

/// Completion closure paired with a receiver for its single result.
pub fn completion_channel<T: Send + 'static>() -> (impl Fn(T) + Send + Sync + 'static, oneshot::Receiver<T>) {
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let completion = move |value: T| {
        if let Some(tx) = tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = tx.send(value);
        }
    };
    (completion, rx)
}

/// Whether text output should carry ANSI colors.
pub fn use_colors(cli: &Cli) -> bool {
    !cli.no_color && std::io::stdout().is_terminal()
}

/// Prints a response in the selected format.
pub fn print_response(response: &Response, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(use_colors(cli));
            if cli.quiet {
                println!("{}", formatter.format_body(response));
            } else {
                println!("{}", formatter.format_response(response, cli.verbose));
            }
        }
        OutputFormat::Json => {
            let output = ResponseOutput::from_response(response);
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }
    Ok(())
}

/// Splits a `key=value` argument.
pub fn parse_pair(raw: &str) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Expected key=value, got '{raw}'"))?;
    Ok((key.to_string(), value.to_string()))
}

/// Splits a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("Expected 'Name: value', got '{raw}'"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}
