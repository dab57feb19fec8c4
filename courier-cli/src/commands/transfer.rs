//! Upload and download commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use courier_client::{Download, Progress, ProgressHandler, RequestFailure, Response};
use tracing::{debug, info};

use super::{completion_channel, print_response, use_colors};
use crate::output::{DownloadOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the upload command.
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Path relative to the base URL.
    pub path: String,

    /// File to upload.
    pub file: PathBuf,

    /// Do not print progress.
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the download command.
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Path relative to the base URL.
    pub path: String,

    /// Where to save the file. Defaults to the last path segment in the current directory.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Do not print progress.
    #[arg(long)]
    pub no_progress: bool,
}

/// Runs the upload command.
pub async fn upload(args: &UploadArgs, cli: &Cli) -> Result<()> {
    anyhow::ensure!(args.file.is_file(), "No such file: {}", args.file.display());
    let controller = super::controller(cli).await?;

    let (completion, rx) = completion_channel::<Result<Response, RequestFailure>>();
    controller.upload_file(&args.path, &args.file, progress_printer(cli, args.no_progress), completion);
    let result = rx.await.context("Upload was dropped before completing")?;
    finish_progress(cli, args.no_progress);

    match result {
        Ok(response) => {
            info!(file = %args.file.display(), status = response.status(), "Upload finished");
            print_response(&response, cli)
        }
        Err(failure) => fail(failure, cli),
    }
}

/// Runs the download command.
pub async fn download(args: &DownloadArgs, cli: &Cli) -> Result<()> {
    let controller = super::controller(cli).await?;

    let (completion, rx) = completion_channel::<Result<Download, RequestFailure>>();
    controller.download(&args.path, progress_printer(cli, args.no_progress), completion);
    let result = rx.await.context("Download was dropped before completing")?;
    finish_progress(cli, args.no_progress);

    let download = match result {
        Ok(download) => download,
        Err(failure) => return fail(failure, cli),
    };

    let destination = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(file_name_for(&args.path)));
    move_file(download.location(), &destination).await?;
    let bytes = tokio::fs::metadata(&destination).await?.len();
    debug!(destination = %destination.display(), bytes, "Download saved");

    match cli.format {
        OutputFormat::Text if cli.quiet => {}
        OutputFormat::Text => {
            let formatter = TextFormatter::new(use_colors(cli));
            println!("{}", formatter.format_download(&download.response, &destination, bytes));
        }
        OutputFormat::Json => {
            let output = DownloadOutput::new(&download.response, &destination, bytes);
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
    }
    Ok(())
}

fn fail(failure: RequestFailure, cli: &Cli) -> Result<()> {
    if let Some(response) = failure.response() {
        print_response(response, cli)?;
    }
    Err(failure.into_error().into())
}

fn shows_progress(cli: &Cli, disabled: bool) -> bool {
    !disabled && !cli.quiet && cli.format == OutputFormat::Text
}

/// Progress handler drawing a bar on stderr.
fn progress_printer(cli: &Cli, disabled: bool) -> Option<ProgressHandler> {
    if !shows_progress(cli, disabled) {
        return None;
    }
    let formatter = TextFormatter::new(use_colors(cli));
    Some(Arc::new(move |progress: Progress| {
        eprint!("\r{}", formatter.format_progress(&progress));
    }))
}

fn finish_progress(cli: &Cli, disabled: bool) {
    if shows_progress(cli, disabled) {
        eprintln!();
    }
}

/// Local file name for a downloaded path: its last non-empty segment.
fn file_name_for(path: &str) -> String {
    path.split('?')
        .next()
        .unwrap_or_default()
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("download")
        .to_string()
}

/// Moves a file, copying when a rename crosses filesystems.
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .with_context(|| format!("Failed to save download to {}", to.display()))?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}
