//! Output formatting for CLI.

mod json;
mod text;

pub use json::{CredentialOutput, DownloadOutput, JsonFormatter, ResponseOutput};
pub use text::TextFormatter;
