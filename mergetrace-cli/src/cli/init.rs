//! # Init Command
//!
//! Writes the default configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use clap::Args;
use mergetrace_core::{ConfigDirs, Settings};

use crate::output::{print_info, print_success};

/// Command for writing the default configuration
#[derive(Args)]
pub struct InitArgs {
  /// Overwrite an existing configuration file
  #[arg(long)]
  pub force: bool,
}

pub(crate) fn handle_init_command(args: InitArgs, config: Option<&Path>) -> Result<()> {
  let path = match config {
    Some(path) => path.to_path_buf(),
    None => default_config_path()?,
  };

  if path.exists() && !args.force {
    bail!(
      "Configuration file {} already exists; use --force to overwrite it",
      path.display()
    );
  }

  Settings::default().save(&path)?;
  print_success(&format!("Wrote configuration to {}", path.display()));
  print_info("Add [[repositories]] entries to save repositories by name");
  Ok(())
}

fn default_config_path() -> Result<PathBuf> {
  let dirs = ConfigDirs::new()?;
  dirs.init()?;
  Ok(dirs.config_path())
}
