//! # Output Formatting
//!
//! Colored, emoji-prefixed messages and the formatting helpers shared by the
//! command tables.

use chrono::{DateTime, Local, Utc};
use mergetrace_core::MergeStatus;
use owo_colors::OwoColorize;

/// When colored output is used
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
  /// Enable colored output
  Yes,
  /// Enable colored output (alias for Yes)
  Always,
  /// Automatically detect if colors should be used based on terminal
  /// capabilities
  Auto,
  /// Disable colored output
  No,
  /// Disable colored output (alias for No)
  Never,
}

impl ColorMode {
  /// Apply the mode to `owo_colors`' global override.
  pub fn apply(self) {
    match self {
      Self::Always | Self::Yes => owo_colors::set_override(true),
      Self::Never | Self::No => owo_colors::set_override(false),
      // Leave detection to owo_colors.
      Self::Auto => {}
    }
  }
}

/// Output format for data-producing commands
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

fn get_emoji_or_default(name: &str, default: &str) -> String {
  match emojis::get_by_shortcode(name) {
    Some(emoji) => emoji.to_string(),
    None => default.to_string(),
  }
}

pub fn print_success(message: &str) {
  let check = get_emoji_or_default("check_mark", "✓");
  println!("{} {}", check.green().bold(), message);
}

pub fn print_warning(message: &str) {
  let warning = get_emoji_or_default("warning", "⚠");
  println!("{} {}", warning.yellow().bold(), message);
}

pub fn print_info(message: &str) {
  let info = get_emoji_or_default("information", "ℹ");
  println!("{} {}", info.blue().bold(), message);
}

/// Print a section header
pub fn print_header(header: &str) {
  println!("\n{}", header.bold().underline());
}

/// Merge status in one of three distinct colors.
pub fn format_status(status: &MergeStatus) -> String {
  match status {
    MergeStatus::Merged(_) => status.label().green().bold().to_string(),
    MergeStatus::NotMerged => status.label().yellow().to_string(),
    MergeStatus::Unknown { .. } => status.label().red().bold().to_string(),
  }
}

/// Local time as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
  timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// A link, or a dash when absent.
pub fn format_link(link: Option<&str>) -> String {
  match link {
    Some(link) => link.cyan().underline().to_string(),
    None => "-".dimmed().to_string(),
  }
}

/// Format a repository name
pub fn format_repo_name(name: &str) -> String {
  name.bright_cyan().bold().to_string()
}

/// Shorten `text` to `max` characters, ending with an ellipsis.
pub fn truncate(text: &str, max: usize) -> String {
  if text.chars().count() <= max {
    return text.to_string();
  }
  let kept: String = text.chars().take(max.saturating_sub(1)).collect();
  format!("{kept}…")
}
