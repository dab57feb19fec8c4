//! Config command - manage configuration.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use courier_client::normalize_base_url;
use tracing::info;
use url::Url;

use super::config_path;
use crate::config::CliConfig;
use crate::output::JsonFormatter;
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show the configuration file path.
    Path,

    /// Set the base URL.
    SetBaseUrl {
        /// Absolute http(s) URL.
        url: String,
    },

    /// Set a header sent with every request.
    SetHeader {
        /// Header name.
        name: String,
        /// Header value.
        value: String,
    },

    /// Stop sending a default header.
    UnsetHeader {
        /// Header name.
        name: String,
    },

    /// Set the request timeout.
    SetTimeout {
        /// Timeout in seconds.
        seconds: u64,
    },

    /// Reset to defaults.
    Reset,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    let path = config_path(cli);

    match &args.action {
        ConfigAction::Show => show_config(&path, cli).await,
        ConfigAction::Path => {
            match cli.format {
                OutputFormat::Text => println!("{}", path.display()),
                OutputFormat::Json => {
                    let paths = serde_json::json!({ "config_file": path.display().to_string() });
                    println!("{}", JsonFormatter::new(cli.pretty).format(&paths)?);
                }
            }
            Ok(())
        }
        ConfigAction::Reset => reset_config(&path).await,
        action => {
            let mut config = CliConfig::load(&path).await?;
            apply(&mut config, action)?;
            config.save(&path).await?;
            info!(path = %path.display(), "Configuration updated");
            if !cli.quiet {
                println!("Configuration saved to {}", path.display());
            }
            Ok(())
        }
    }
}

/// Applies an editing action to `config`.
fn apply(config: &mut CliConfig, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::SetBaseUrl { url } => {
            let parsed = Url::parse(url).with_context(|| format!("Invalid base URL: {url}"))?;
            anyhow::ensure!(
                matches!(parsed.scheme(), "http" | "https"),
                "Base URL must use http or https: {url}"
            );
            config.base_url = Some(normalize_base_url(parsed).to_string());
        }
        ConfigAction::SetHeader { name, value } => {
            config.headers.insert(name.clone(), value.clone());
        }
        ConfigAction::UnsetHeader { name } => {
            config.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
        }
        ConfigAction::SetTimeout { seconds } => {
            anyhow::ensure!(*seconds > 0, "Timeout must be at least one second");
            config.timeout_secs = Some(*seconds);
        }
        ConfigAction::Show | ConfigAction::Path | ConfigAction::Reset => {}
    }
    Ok(())
}

async fn show_config(path: &Path, cli: &Cli) -> Result<()> {
    let config = CliConfig::load(path).await?;

    match cli.format {
        OutputFormat::Text => {
            let settings = config.client_settings();
            println!("Courier Configuration");
            println!("{}", "─".repeat(40));
            println!();
            println!("Base URL:   {}", config.base_url.as_deref().unwrap_or("(not set)"));
            println!("Timeout:    {}s", settings.timeout_secs);
            println!("User agent: {}", settings.user_agent);
            if !config.headers.is_empty() {
                println!();
                println!("Default headers:");
                for (name, value) in &config.headers {
                    println!("  {name}: {value}");
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format(&config)?);
        }
    }

    Ok(())
}

async fn reset_config(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        tokio::fs::remove_file(path).await?;
        info!(path = %path.display(), "Settings reset");
        println!("Configuration reset to defaults");
    } else {
        println!("No configuration file to reset");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_base_url_normalizes() {
        let mut config = CliConfig::default();
        apply(
            &mut config,
            &ConfigAction::SetBaseUrl {
                url: "https://api.example.com/v2".into(),
            },
        )
        .unwrap();
        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com/v2/"));
    }

    #[test]
    fn test_rejects_bad_base_urls() {
        let mut config = CliConfig::default();
        for url in ["not a url", "ftp://files.example.com/"] {
            let action = ConfigAction::SetBaseUrl { url: url.into() };
            assert!(apply(&mut config, &action).is_err(), "{url}");
        }
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_header_edits() {
        let mut config = CliConfig::default();
        apply(
            &mut config,
            &ConfigAction::SetHeader {
                name: "Accept".into(),
                value: "application/json".into(),
            },
        )
        .unwrap();
        assert_eq!(config.headers.len(), 1);

        apply(&mut config, &ConfigAction::UnsetHeader { name: "accept".into() }).unwrap();
        assert!(config.headers.is_empty());
    }

    #[test]
    fn test_timeout_must_be_positive() {
        let mut config = CliConfig::default();
        assert!(apply(&mut config, &ConfigAction::SetTimeout { seconds: 0 }).is_err());
        apply(&mut config, &ConfigAction::SetTimeout { seconds: 12 }).unwrap();
        assert_eq!(config.timeout_secs, Some(12));
    }

    #[tokio::test]
    async fn test_reset_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        CliConfig::default().save(&path).await.unwrap();

        reset_config(&path).await.unwrap();
        assert!(!path.exists());
    }
}
