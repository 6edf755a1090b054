//! # Repos Command
//!
//! Lists saved repository presets.

use anyhow::Result;
use mergetrace_core::{RepositoryPreset, Settings};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::output::{print_header, print_info};

#[derive(Tabled)]
struct PresetRow {
  #[tabled(rename = "Name")]
  name: String,
  #[tabled(rename = "Location")]
  location: String,
  #[tabled(rename = "Platform")]
  platform: String,
}

pub(crate) fn handle_repos_command(settings: &Settings) -> Result<()> {
  print_header("Saved repositories");
  if settings.repositories.is_empty() {
    print_info("No saved repositories. Add [[repositories]] entries to the configuration file.");
    return Ok(());
  }

  let rows: Vec<PresetRow> = settings
    .repositories
    .iter()
    .map(|preset| preset_row(settings, preset))
    .collect();
  println!("{}", Table::new(rows).with(Style::sharp()));
  Ok(())
}

fn preset_row(settings: &Settings, preset: &RepositoryPreset) -> PresetRow {
  let platform = settings
    .resolver()
    .resolve_location(&preset.location(), None)
    .map_or_else(|| "-".to_string(), |resolved| resolved.name().to_string());

  PresetRow {
    name: preset.name.clone(),
    location: preset.url.clone(),
    platform,
  }
}
