//! # Command Line Interface
//!
//! Defines the CLI structure and command handlers for mergetrace.

mod branches;
mod check;
mod init;
mod repos;

use std::path::PathBuf;

use anyhow::Result;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{ArgAction, Parser, Subcommand};
use mergetrace_core::{ConfigDirs, RepositoryLocation, Settings};
use tracing::debug;

use crate::acquire;
use crate::output::ColorMode;

/// Top-level CLI command for mergetrace
#[derive(Parser)]
#[command(name = "mergetrace")]
#[command(display_name = "🔀 Mergetrace")]
#[command(about = "Find out which branches have been merged, with links into the hosting platform")]
#[command(
  long_about = "Mergetrace checks every branch whose name contains a keyword against a target branch\n\
        and reports whether it has been merged, when, by whom, and through which merge request.\n\n\
        Repositories can be local paths, SSH or HTTPS URLs, or presets saved in the configuration file."
)]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
#[command(subcommand_required(true))]
#[command(disable_help_subcommand = true)]
#[command(max_term_width = 120)]
#[command(styles = Styles::styled()
    .header(AnsiColor::BrightGreen.on_default().bold().underline())
    .usage(AnsiColor::Green.on_default().bold())
    .literal(AnsiColor::BrightGreen.on_default().bold())
    .placeholder(AnsiColor::BrightWhite.on_default().italic())
    .valid(AnsiColor::Green.on_default())
    .invalid(AnsiColor::BrightRed.on_default().bold())
)]
pub struct Cli {
  /// Sets the level of verbosity (can be used multiple times)
  #[arg(
    short = 'v',
    long = "verbose",
    action = ArgAction::Count,
    global = true,
    long_help = "Sets the level of verbosity for tracing and logging output.\n\n\
             -v: Show info level messages\n\
             -vv: Show debug level messages\n\
             -vvv: Show trace level messages"
  )]
  pub verbose: u8,

  /// Configuration file to use instead of the default location
  #[arg(long, global = true, value_name = "PATH", env = "MERGETRACE_CONFIG")]
  pub config: Option<PathBuf>,

  /// Controls when colored output is used
  #[arg(
    long,
    value_enum,
    global = true,
    ignore_case = true,
    default_value_t = ColorMode::Auto,
  )]
  pub colors: ColorMode,

  /// Subcommands
  #[command(subcommand)]
  pub command: Commands,
}

/// Subcommands for mergetrace
#[derive(Subcommand)]
pub enum Commands {
  /// List branches of a repository, newest first
  #[command(long_about = "Lists every branch of a repository with its tip commit, newest first.\n\n\
            Use this to find the keyword and target branch names before running 'check'.")]
  #[command(alias = "br")]
  Branches(branches::BranchesArgs),

  /// Check which branches matching a keyword are merged into a target
  #[command(
    long_about = "Checks every branch whose name contains KEYWORD (case-insensitive) against the\n\
            target branch.\n\n\
            Each branch is reported as merged (with the integrating commit, its date and committer,\n\
            and a link to the merge request or commit when the platform is recognized), not merged,\n\
            or unknown when history is insufficient or the check timed out."
  )]
  #[command(alias = "c")]
  Check(check::CheckArgs),

  /// Initialize mergetrace configuration
  #[command(long_about = "Writes the default configuration file, including the built-in platform table.\n\n\
            Edit the file to add saved repositories or platforms. Existing files are only\n\
            replaced with --force.")]
  Init(init::InitArgs),

  /// List saved repositories
  #[command(long_about = "Lists the repositories saved in the configuration file and the platform\n\
            each one resolves to.")]
  Repos,
}

pub fn handle_cli(cli: Cli) -> Result<()> {
  cli.colors.apply();

  let config = cli.config.as_deref();
  match cli.command {
    Commands::Init(init) => init::handle_init_command(init, config),
    Commands::Branches(branches) => branches::handle_branches_command(branches, &Settings::load(config)?),
    Commands::Check(check) => check::handle_check_command(check, &Settings::load(config)?),
    Commands::Repos => repos::handle_repos_command(&Settings::load(config)?),
  }
}

/// Location and local history for `--repo`, defaulting to the repository
/// around the current directory.
fn locate_repository(settings: &Settings, repo: Option<&str>) -> Result<(RepositoryLocation, PathBuf)> {
  let location = match repo {
    Some(input) => settings.locate(input),
    None => RepositoryLocation::local(acquire::current_repository()?),
  };
  debug!(location = %location, "Resolved repository location");

  let path = match location.local_path() {
    Some(path) => path.to_path_buf(),
    None => acquire::acquire(&location, &ConfigDirs::new()?)?,
  };
  Ok((location, path))
}

/// Name to show for a repository in headers.
fn repository_label(location: &RepositoryLocation) -> String {
  location.name.clone().unwrap_or_else(|| location.to_string())
}
