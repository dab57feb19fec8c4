//! Request command - send one request and print the response.

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use courier_client::body::{DataBody, FormBody, JsonBody};
use courier_client::{Request, RequestController, SessionTier};
use courier_core::HttpMethod;
use tracing::debug;

use super::{parse_header, parse_pair, print_response};
use crate::Cli;

/// Arguments for the request command.
#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS...).
    pub method: HttpMethod,

    /// Path relative to the base URL. May carry a query string.
    pub path: String,

    /// JSON request body.
    #[arg(long, conflicts_with_all = ["form", "data"])]
    pub json: Option<String>,

    /// Form field as key=value. Repeatable.
    #[arg(long, conflicts_with = "data")]
    pub form: Vec<String>,

    /// Raw request body. Prefix with @ to read a file.
    #[arg(long)]
    pub data: Option<String>,

    /// Header as 'Name: value'. Repeatable.
    #[arg(long, short = 'H')]
    pub header: Vec<String>,

    /// Query item as key=value. Repeatable.
    #[arg(long)]
    pub query: Vec<String>,

    /// Content type overriding the body's own.
    #[arg(long)]
    pub content_type: Option<String>,

    /// Transport session to use.
    #[arg(long, value_enum, default_value = "default")]
    pub session: SessionArg,
}

/// Session tier selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum SessionArg {
    /// Shared connection pool.
    #[default]
    Default,
    /// Long-running transfers, no overall timeout.
    Background,
    /// No connection reuse.
    Ephemeral,
}

impl From<SessionArg> for SessionTier {
    fn from(arg: SessionArg) -> Self {
        match arg {
            SessionArg::Default => Self::Default,
            SessionArg::Background => Self::Background,
            SessionArg::Ephemeral => Self::Ephemeral,
        }
    }
}

/// Runs the request command.
pub async fn run(args: &RequestArgs, cli: &Cli) -> Result<()> {
    let controller = super::controller(cli).await?;

    let data = match args.data.as_deref() {
        Some(raw) => Some(read_data(raw).await?),
        None => None,
    };
    let request = build_request(&controller, args, data)?;
    debug!(method = %request.method(), path = request.path().unwrap_or_default(), "Sending request");

    match controller.send(request).await {
        Ok(response) => print_response(&response, cli),
        Err(failure) => {
            if let Some(response) = failure.response() {
                print_response(response, cli)?;
            }
            Err(failure.into_error().into())
        }
    }
}

/// Reads a raw body argument; `@path` loads the file.
async fn read_data(raw: &str) -> Result<Vec<u8>> {
    match raw.strip_prefix('@') {
        Some(path) => tokio::fs::read(Path::new(path))
            .await
            .with_context(|| format!("Failed to read body from {path}")),
        None => Ok(raw.as_bytes().to_vec()),
    }
}

/// Turns command-line arguments into a request.
pub fn build_request(controller: &RequestController, args: &RequestArgs, data: Option<Vec<u8>>) -> Result<Request> {
    let mut builder = controller
        .new_request(args.method, args.path.clone())
        .tier(args.session.into());

    if let Some(json) = &args.json {
        let value: serde_json::Value = serde_json::from_str(json).context("Invalid JSON body")?;
        builder = builder.body(JsonBody::new(value));
    } else if !args.form.is_empty() {
        let fields = args
            .form
            .iter()
            .map(|raw| parse_pair(raw))
            .collect::<Result<FormBody>>()?;
        builder = builder.body(fields);
    } else if let Some(data) = data {
        builder = builder.body(DataBody::new(data));
    }

    for raw in &args.header {
        let (name, value) = parse_header(raw)?;
        builder = builder.header(name, value);
    }
    for raw in &args.query {
        let (key, value) = parse_pair(raw)?;
        builder = builder.query(key, value);
    }
    if let Some(content_type) = &args.content_type {
        builder = builder.content_type(content_type.clone());
    }

    Ok(builder.build())
}
