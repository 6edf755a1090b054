//! Environment variable management for testing
//!
//! Overrides the XDG base directories and the config-path override so tests
//! resolve configuration and clone caches inside a throwaway directory.

use std::env;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use tempfile::TempDir;

/// Process environment is global; guards are serialized through this lock.
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// A test environment that points the XDG directories at a per-test temporary
/// directory and clears `MERGETRACE_CONFIG`.
///
/// Only one guard is alive at a time; constructing a second one blocks until
/// the first is dropped.
pub struct EnvTestGuard {
  /// The temporary directory that will be used for XDG directories
  pub temp_dir: TempDir,
  saved: Vec<(&'static str, Option<String>)>,
  _lock: MutexGuard<'static, ()>,
}

impl Default for EnvTestGuard {
  fn default() -> Self {
    Self::new()
  }
}

impl EnvTestGuard {
  pub const XDG_CONFIG_HOME: &'static str = "XDG_CONFIG_HOME";
  pub const XDG_CACHE_HOME: &'static str = "XDG_CACHE_HOME";
  pub const MERGETRACE_CONFIG: &'static str = "MERGETRACE_CONFIG";

  /// Create a new test environment with overridden XDG directories
  pub fn new() -> Self {
    let lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let temp_path = temp_dir.path().to_path_buf();

    let saved = [Self::XDG_CONFIG_HOME, Self::XDG_CACHE_HOME, Self::MERGETRACE_CONFIG]
      .into_iter()
      .map(|key| (key, env::var(key).ok()))
      .collect();

    unsafe {
      env::set_var(Self::XDG_CONFIG_HOME, temp_path.join("config"));
      env::set_var(Self::XDG_CACHE_HOME, temp_path.join("cache"));
      env::remove_var(Self::MERGETRACE_CONFIG);
    }

    std::fs::create_dir_all(temp_path.join("config")).expect("Failed to create config directory");
    std::fs::create_dir_all(temp_path.join("cache")).expect("Failed to create cache directory");

    Self {
      temp_dir,
      saved,
      _lock: lock,
    }
  }

  /// Point `MERGETRACE_CONFIG` at a file for the lifetime of the guard.
  pub fn set_config_path(&self, path: impl Into<PathBuf>) {
    unsafe {
      env::set_var(Self::MERGETRACE_CONFIG, path.into());
    }
  }

  /// Get the path to the XDG config directory
  pub fn config_dir(&self) -> PathBuf {
    self.temp_dir.path().join("config")
  }

  /// Get the path to the XDG cache directory
  pub fn cache_dir(&self) -> PathBuf {
    self.temp_dir.path().join("cache")
  }
}

impl Drop for EnvTestGuard {
  fn drop(&mut self) {
    for (key, value) in &self.saved {
      match value {
        Some(val) => unsafe {
          env::set_var(key, val);
        },
        None => unsafe {
          env::remove_var(key);
        },
      }
    }
  }
}
