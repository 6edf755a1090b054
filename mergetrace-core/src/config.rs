//! # Configuration Management
//!
//! Loads the platform table, saved repository presets and analysis limits
//! from a TOML file, and locates the XDG directories used for the config
//! file and the clone cache.
//!
//! The loaded [`Settings`] value is read-only and passed explicitly to the
//! resolver and the CLI.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::location::RepositoryLocation;
use crate::merge::checker::DEFAULT_MAX_WALK;
use crate::platform::{PlatformConfig, PlatformResolver, PlatformTable, ReferenceStyle};

/// Environment variable overriding the configuration file path.
pub const ENV_CONFIG_PATH: &str = "MERGETRACE_CONFIG";

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration and cache directories for mergetrace.
#[derive(Debug, Clone)]
pub struct ConfigDirs {
  pub config_dir: PathBuf,
  pub cache_dir: PathBuf,
}

impl ConfigDirs {
  pub fn new() -> Result<Self> {
    let proj_dirs = ProjectDirs::from("", "", "mergetrace").context("Failed to determine project directories")?;

    Ok(Self {
      config_dir: proj_dirs.config_dir().to_path_buf(),
      cache_dir: proj_dirs.cache_dir().to_path_buf(),
    })
  }

  pub fn config_dir(&self) -> &Path {
    &self.config_dir
  }

  pub fn cache_dir(&self) -> &Path {
    &self.cache_dir
  }

  /// Default path of the configuration file.
  pub fn config_path(&self) -> PathBuf {
    self.config_dir.join(CONFIG_FILE_NAME)
  }

  /// Directory holding cached clones of remote repositories.
  pub fn repo_cache_dir(&self) -> PathBuf {
    self.cache_dir.join("repos")
  }

  /// Create the configuration and cache directories.
  pub fn init(&self) -> Result<()> {
    fs::create_dir_all(&self.config_dir).context("Failed to create config directory")?;
    fs::create_dir_all(self.repo_cache_dir()).context("Failed to create cache directory")?;
    Ok(())
  }
}

/// Limits for one analysis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
  /// Per-branch time budget in seconds; 0 disables the limit.
  pub timeout_secs: u64,
  /// Branch checks run concurrently.
  pub jobs: usize,
  /// Enumerate remote-tracking branches as well as local ones.
  pub include_remote: bool,
  /// Commits visited while locating a merge commit before giving up.
  pub max_walk: usize,
}

impl Default for AnalysisSettings {
  fn default() -> Self {
    Self {
      timeout_secs: 30,
      jobs: 4,
      include_remote: true,
      max_walk: DEFAULT_MAX_WALK,
    }
  }
}

impl AnalysisSettings {
  pub fn timeout(&self) -> Option<Duration> {
    (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
  }
}

/// A saved repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryPreset {
  pub name: String,
  /// Remote URL or local path.
  pub url: String,
  /// Platform key to use instead of matching by URL.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub platform: Option<String>,
}

impl RepositoryPreset {
  pub fn location(&self) -> RepositoryLocation {
    RepositoryLocation::parse(&self.url)
      .with_name(&self.name)
      .with_platform(self.platform.clone())
  }
}

/// Everything read from the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
  #[serde(default)]
  pub analysis: AnalysisSettings,
  #[serde(default = "default_platforms")]
  pub platforms: PlatformTable,
  #[serde(default)]
  pub repositories: Vec<RepositoryPreset>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      analysis: AnalysisSettings::default(),
      platforms: default_platforms(),
      repositories: Vec::new(),
    }
  }
}

impl Settings {
  /// Load settings.
  ///
  /// The path is taken from `explicit`, then from [`ENV_CONFIG_PATH`], then
  /// the default location. A missing file at the default location yields the
  /// built-in defaults; a missing file that was asked for by name is an
  /// error.
  pub fn load(explicit: Option<&Path>) -> Result<Self> {
    let requested = explicit
      .map(Path::to_path_buf)
      .or_else(|| std::env::var_os(ENV_CONFIG_PATH).map(PathBuf::from));

    match requested {
      Some(path) => {
        if !path.exists() {
          bail!("Configuration file {} does not exist", path.display());
        }
        Self::load_from(&path)
      }
      None => {
        let path = ConfigDirs::new()?.config_path();
        if path.exists() {
          Self::load_from(&path)
        } else {
          debug!(path = %path.display(), "No configuration file, using defaults");
          Ok(Self::default())
        }
      }
    }
  }

  /// Parse and validate the file at `path`.
  pub fn load_from(path: &Path) -> Result<Self> {
    let content =
      fs::read_to_string(path).with_context(|| format!("Failed to read configuration from {}", path.display()))?;
    let settings: Self =
      toml::from_str(&content).with_context(|| format!("Failed to parse configuration from {}", path.display()))?;
    settings
      .validate()
      .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    debug!(
      path = %path.display(),
      platforms = settings.platforms.len(),
      repositories = settings.repositories.len(),
      "Loaded configuration"
    );
    Ok(settings)
  }

  /// Write the settings as TOML, creating parent directories.
  pub fn save(&self, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;
    fs::write(path, content).with_context(|| format!("Failed to write configuration to {}", path.display()))?;
    Ok(())
  }

  pub fn validate(&self) -> Result<()> {
    if self.analysis.jobs == 0 {
      bail!("analysis.jobs must be at least 1");
    }

    for (key, platform) in &self.platforms {
      let url = Url::parse(&platform.base_url)
        .with_context(|| format!("Platform '{key}' has an invalid base_url '{}'", platform.base_url))?;
      if !matches!(url.scheme(), "http" | "https") {
        bail!("Platform '{key}' base_url must use http or https");
      }
      if platform.ssh_prefix.is_empty() && platform.https_prefix.is_empty() {
        warn!(platform = %key, "Platform has no URL prefixes and will only match pinned repositories");
      }
    }

    let mut names = HashSet::new();
    for preset in &self.repositories {
      if !names.insert(preset.name.as_str()) {
        bail!("Repository '{}' is defined more than once", preset.name);
      }
      if let Some(platform) = &preset.platform
        && !self.platforms.contains_key(platform)
      {
        warn!(repository = %preset.name, platform = %platform, "Repository refers to an unknown platform");
      }
    }

    Ok(())
  }

  pub fn resolver(&self) -> PlatformResolver<'_> {
    PlatformResolver::new(&self.platforms)
  }

  pub fn preset(&self, name: &str) -> Option<&RepositoryPreset> {
    self.repositories.iter().find(|preset| preset.name == name)
  }

  /// Turn user input into a location: a saved preset name first, otherwise a
  /// URL or path.
  pub fn locate(&self, input: &str) -> RepositoryLocation {
    match self.preset(input) {
      Some(preset) => preset.location(),
      None => RepositoryLocation::parse(input),
    }
  }
}

/// Built-in platform table.
pub fn default_platforms() -> PlatformTable {
  let mut platforms = PlatformTable::new();
  platforms.insert(
    "github".to_string(),
    PlatformConfig {
      name: "GitHub".to_string(),
      base_url: "https://github.com".to_string(),
      merge_request_path: "/{project}/pull/".to_string(),
      commit_path: "/{project}/commit/".to_string(),
      ssh_prefix: "git@github.com:".to_string(),
      https_prefix: "https://github.com/".to_string(),
      reference_style: ReferenceStyle::GitHub,
    },
  );
  platforms.insert(
    "gitlab".to_string(),
    PlatformConfig {
      name: "GitLab".to_string(),
      base_url: "https://gitlab.com".to_string(),
      merge_request_path: "/{project}/-/merge_requests/".to_string(),
      commit_path: "/{project}/-/commit/".to_string(),
      ssh_prefix: "git@gitlab.com:".to_string(),
      https_prefix: "https://gitlab.com/".to_string(),
      reference_style: ReferenceStyle::GitLab,
    },
  );
  platforms.insert(
    "aliyun".to_string(),
    PlatformConfig {
      name: "Aliyun Code".to_string(),
      base_url: "https://code.aliyun.com".to_string(),
      merge_request_path: "/{project}/-/merge_requests/".to_string(),
      commit_path: "/{project}/-/commit/".to_string(),
      ssh_prefix: "git@code.aliyun.com:".to_string(),
      https_prefix: "https://code.aliyun.com/".to_string(),
      reference_style: ReferenceStyle::Auto,
    },
  );
  platforms
}
