//! Text output formatting with colors.

use std::path::Path;

use chrono::Local;
use courier_client::{Progress, Response};
use courier_core::{Credential, StatusClass};

use super::json::kind_name;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 20,
        }
    }

    /// Formats a response: status line, optional headers, then the body.
    pub fn format_response(&self, response: &Response, show_headers: bool) -> String {
        let mut lines = vec![self.status_line(response)];

        if let Some(original) = response.redirected_from() {
            lines.push(self.dim(&format!("redirected from {original}")));
        }

        if show_headers {
            for (name, value) in response.headers() {
                lines.push(format!(
                    "{}: {}",
                    self.colored(name.as_str(), CYAN),
                    value.to_str().unwrap_or("<binary>")
                ));
            }
        }

        let body = self.format_body(response);
        if !body.is_empty() {
            lines.push(String::new());
            lines.push(body);
        }

        lines.join("\n")
    }

    /// Formats the status line, colored by status class.
    pub fn status_line(&self, response: &Response) -> String {
        let color = match response.status_class() {
            StatusClass::Success => GREEN,
            StatusClass::Informational | StatusClass::Redirection => YELLOW,
            StatusClass::ClientError | StatusClass::ServerError | StatusClass::Unknown => RED,
        };
        let status = format!("HTTP {} {}", response.status(), response.reason());
        format!("{}  {}", self.colored(&status, color), self.dim(response.url().as_str()))
    }

    /// Formats the body: pretty JSON, text, or a byte count.
    pub fn format_body(&self, response: &Response) -> String {
        if let Some(value) = response.json_value() {
            return serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        }
        if let Some(text) = response.text() {
            return text.to_string();
        }
        self.dim(&format!("<{} bytes of binary data>", response.data().len()))
    }

    /// Formats the stored credential without revealing secrets.
    pub fn format_credential(&self, identifier: &str, credential: Option<&Credential>) -> String {
        let mut lines = vec![format!("{} {}", self.bold("Credential"), self.dim(identifier))];

        let Some(credential) = credential else {
            lines.push("  none stored".to_string());
            return lines.join("\n");
        };

        lines.push(format!("  kind:       {}", kind_name(credential.kind())));
        if credential.authorization_token.is_some() {
            lines.push(format!("  token type: {}", credential.token_type));
        }
        if let Some(username) = &credential.username {
            lines.push(format!("  username:   {username}"));
        }
        match credential.expiration_date {
            Some(expiry) if credential.has_expired() => lines.push(format!(
                "  expires:    {}",
                self.colored(&format!("{} (expired)", expiry.with_timezone(&Local).format("%Y-%m-%d %H:%M")), RED)
            )),
            Some(expiry) => lines.push(format!(
                "  expires:    {}",
                expiry.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            )),
            None => lines.push("  expires:    never".to_string()),
        }
        if credential.refresh_token.is_some() {
            lines.push("  refreshable".to_string());
        }

        lines.join("\n")
    }

    /// Formats a finished download.
    pub fn format_download(&self, response: &Response, location: &Path, bytes: u64) -> String {
        format!(
            "{}\nSaved {} bytes to {}",
            self.status_line(response),
            bytes,
            self.bold(&location.display().to_string())
        )
    }

    /// Renders a transfer progress line.
    pub fn format_progress(&self, progress: &Progress) -> String {
        let total = progress
            .total_bytes
            .map_or_else(|| "?".to_string(), |total| total.to_string());
        format!(
            "{} {:>3}% {}/{} bytes",
            self.progress_bar(progress.fraction),
            percent(progress.fraction),
            progress.transferred_bytes,
            total
        )
    }

    /// Renders a progress bar for a fraction between 0 and 1.
    pub fn progress_bar(&self, fraction: f64) -> String {
        let filled = filled_cells(fraction, self.bar_width);
        let bar = format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(self.bar_width - filled)
        );
        if filled == self.bar_width {
            self.colored(&bar, GREEN)
        } else {
            self.colored(&bar, CYAN)
        }
    }

    // ========================================================================
    // Styling helpers
    // ========================================================================

    fn colored(&self, text: &str, color: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.colored(text, BOLD)
    }

    fn dim(&self, text: &str) -> String {
        self.colored(text, DIM)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn filled_cells(fraction: f64, width: usize) -> usize {
    ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(fraction: f64) -> u32 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u32
}
