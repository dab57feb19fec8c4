//! Credential command - manage the credential stored for the base URL.

use anyhow::{Result, bail};
use chrono::{Duration, Utc};
use clap::{Args, Subcommand};
use courier_client::default_credential_identifier;
use courier_core::Credential;
use tracing::info;

use super::use_colors;
use crate::output::{CredentialOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the credential command.
#[derive(Args, Debug)]
pub struct CredentialArgs {
    #[command(subcommand)]
    pub action: CredentialAction,
}

/// Credential subcommands.
#[derive(Subcommand, Debug)]
pub enum CredentialAction {
    /// Store a token or username/password in the keychain.
    Set(SetArgs),

    /// Show the stored credential without revealing secrets.
    Show,

    /// Remove the stored credential.
    Clear,
}

/// Arguments for `credential set`.
#[derive(Args, Debug)]
pub struct SetArgs {
    /// Authorization token.
    #[arg(long, conflicts_with_all = ["username", "password"])]
    pub token: Option<String>,

    /// Token type used in the Authorization header.
    #[arg(long, default_value = "Bearer")]
    pub token_type: String,

    /// Refresh token.
    #[arg(long, requires = "token")]
    pub refresh_token: Option<String>,

    /// Seconds until the token expires.
    #[arg(long, requires = "token")]
    pub expires_in: Option<i64>,

    /// Username for basic authentication.
    #[arg(long, requires = "password")]
    pub username: Option<String>,

    /// Password for basic authentication.
    #[arg(long, requires = "username")]
    pub password: Option<String>,
}

/// Runs the credential command.
pub async fn run(args: &CredentialArgs, cli: &Cli) -> Result<()> {
    let controller = super::controller(cli).await?;
    let identifier = default_credential_identifier(controller.base_url());

    match &args.action {
        CredentialAction::Set(set) => {
            let credential = credential_from_args(set)?;
            controller.set_shared_credential(Some(credential), true)?;
            info!(identifier = %identifier, "Credential stored");
            if !cli.quiet {
                println!("Stored credential for {}", controller.base_url());
            }
        }
        CredentialAction::Show => {
            let credential = controller.shared_credential();
            match cli.format {
                OutputFormat::Text => {
                    let formatter = TextFormatter::new(use_colors(cli));
                    println!("{}", formatter.format_credential(&identifier, credential.as_ref()));
                }
                OutputFormat::Json => {
                    let output = CredentialOutput::new(&identifier, credential.as_ref());
                    println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
                }
            }
        }
        CredentialAction::Clear => {
            controller.set_shared_credential(None, true)?;
            info!(identifier = %identifier, "Credential cleared");
            if !cli.quiet {
                println!("Cleared credential for {}", controller.base_url());
            }
        }
    }

    Ok(())
}

/// Builds a credential from `credential set` arguments.
fn credential_from_args(args: &SetArgs) -> Result<Credential> {
    if let Some(token) = &args.token {
        let mut credential = Credential::with_token(token.clone()).token_type(args.token_type.clone());
        credential.refresh_token.clone_from(&args.refresh_token);
        if let Some(seconds) = args.expires_in {
            credential = credential.expires_at(Utc::now() + Duration::seconds(seconds));
        }
        return Ok(credential);
    }

    match (&args.username, &args.password) {
        (Some(username), Some(password)) => Ok(Credential::with_basic(username.clone(), password.clone())),
        _ => bail!("Pass --token, or --username with --password"),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use courier_core::CredentialKind;

    use super::*;
    use crate::Commands;

    fn set_args(argv: &[&str]) -> Result<SetArgs, clap::Error> {
        let mut full = vec!["courier", "credential", "set"];
        full.extend_from_slice(argv);
        let cli = Cli::try_parse_from(full)?;
        match cli.command {
            Commands::Credential(CredentialArgs {
                action: CredentialAction::Set(args),
            }) => Ok(args),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_token_credential() {
        let args = set_args(&["--token", "abc", "--token-type", "Token", "--expires-in", "3600", "--refresh-token", "r"]).unwrap();
        let credential = credential_from_args(&args).unwrap();

        assert_eq!(credential.kind(), CredentialKind::Token);
        assert_eq!(credential.authorization_header().as_deref(), Some("Token abc"));
        assert_eq!(credential.refresh_token.as_deref(), Some("r"));
        assert!(!credential.has_expired());
        assert!(credential.expiration_date.is_some());
    }

    #[test]
    fn test_basic_credential() {
        let args = set_args(&["--username", "amy", "--password", "pw"]).unwrap();
        let credential = credential_from_args(&args).unwrap();
        assert_eq!(credential.kind(), CredentialKind::Basic);
    }

    #[test]
    fn test_conflicting_and_missing_arguments() {
        assert!(set_args(&["--token", "abc", "--username", "amy", "--password", "pw"]).is_err());
        assert!(set_args(&["--username", "amy"]).is_err());

        let empty = set_args(&[]).unwrap();
        assert!(credential_from_args(&empty).is_err());
    }
}
