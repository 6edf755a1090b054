//! Repository acquisition.
//!
//! Local locations are used in place. Remote locations are mirrored into a
//! bare clone in the cache directory on first use and fetched on later runs; a
//! failed fetch falls back to the cached copy with a warning. The mirror keeps
//! upstream branches as local `refs/heads/*`, so every fetch moves them.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use git2::build::RepoBuilder;
use git2::{Cred, CredentialType, FetchOptions, RemoteCallbacks, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use mergetrace_core::git::DEFAULT_REMOTE;
use mergetrace_core::{ConfigDirs, LocationSource, RemoteScheme, RepositoryLocation};
use tracing::{debug, info, warn};

/// Credential attempts per operation before giving up.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Upstream branches map straight onto the cached clone's branches.
const MIRROR_REFSPEC: &str = "+refs/heads/*:refs/heads/*";

/// Local history for `location`, cloning or fetching remote repositories.
pub fn acquire(location: &RepositoryLocation, dirs: &ConfigDirs) -> Result<PathBuf> {
  match &location.source {
    LocationSource::Local { path } => Ok(path.clone()),
    LocationSource::Remote { url, scheme } => {
      let cache_root = dirs.repo_cache_dir();
      std::fs::create_dir_all(&cache_root)
        .with_context(|| format!("Failed to create cache directory {}", cache_root.display()))?;
      let destination = cache_root.join(location.cache_key());
      sync_remote(url, *scheme, &destination)?;
      Ok(destination)
    }
  }
}

/// Repository containing the current directory, or the current directory
/// itself when it is not inside one (the analysis then reports it as
/// unreadable).
pub fn current_repository() -> Result<PathBuf> {
  let cwd = env::current_dir().context("Failed to determine current directory")?;
  Ok(discover(&cwd).unwrap_or(cwd))
}

fn discover(path: &Path) -> Option<PathBuf> {
  let repo = Repository::discover(path).ok()?;
  Some(repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf())
}

fn sync_remote(url: &str, scheme: RemoteScheme, destination: &Path) -> Result<()> {
  let spinner = spinner();

  if destination.exists() {
    spinner.set_message(format!("Fetching {url}..."));
    let repo = Repository::open(destination)
      .with_context(|| format!("Cached clone at {} is not a repository", destination.display()))?;
    match fetch(&repo, scheme) {
      Ok(()) => {
        spinner.finish_and_clear();
        info!(url, path = %destination.display(), "Fetched cached clone");
      }
      Err(e) => {
        spinner.finish_and_clear();
        warn!(url, error = %e, "Fetch failed; using cached clone");
      }
    }
    return Ok(());
  }

  spinner.set_message(format!("Cloning {url}..."));
  let mut builder = RepoBuilder::new();
  builder
    .bare(true)
    .remote_create(|repo, name, url| repo.remote_with_fetch(name, url, MIRROR_REFSPEC))
    .fetch_options(fetch_options(scheme));
  let result = builder.clone(url, destination);
  spinner.finish_and_clear();

  result.with_context(|| clone_failure_message(url, scheme))?;
  info!(url, path = %destination.display(), "Cloned repository");
  Ok(())
}

fn fetch(repo: &Repository, scheme: RemoteScheme) -> Result<()> {
  let mut remote = repo
    .find_remote(DEFAULT_REMOTE)
    .with_context(|| format!("Cached clone has no '{DEFAULT_REMOTE}' remote"))?;
  let mut options = fetch_options(scheme);
  remote
    .fetch(&[MIRROR_REFSPEC], Some(&mut options), None)
    .with_context(|| format!("Failed to fetch from '{DEFAULT_REMOTE}'"))?;
  Ok(())
}

fn fetch_options(scheme: RemoteScheme) -> FetchOptions<'static> {
  let mut attempts = 0usize;
  let mut callbacks = RemoteCallbacks::new();
  callbacks.credentials(move |url, username, allowed| {
    attempts += 1;
    if attempts > MAX_CREDENTIAL_ATTEMPTS {
      return Err(git2::Error::from_str("authentication failed"));
    }
    debug!(url, ?allowed, attempts, "Credentials requested");

    if allowed.contains(CredentialType::SSH_KEY) {
      return Cred::ssh_key_from_agent(username.unwrap_or("git"));
    }
    if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
      let config = git2::Config::open_default()?;
      return Cred::credential_helper(&config, url, username);
    }
    if allowed.contains(CredentialType::DEFAULT) {
      return Cred::default();
    }
    Err(git2::Error::from_str("no supported credential type"))
  });

  let mut options = FetchOptions::new();
  options.remote_callbacks(callbacks);
  if scheme.uses_ssh() {
    debug!("Using ssh-agent for credentials");
  }
  options
}

fn clone_failure_message(url: &str, scheme: RemoteScheme) -> String {
  if scheme.uses_ssh() {
    format!("Failed to clone {url}; make sure your SSH key is loaded in ssh-agent and has access")
  } else {
    format!("Failed to clone {url}")
  }
}

fn spinner() -> ProgressBar {
  let spinner = ProgressBar::new_spinner();
  spinner.set_style(
    ProgressStyle::with_template("{spinner:.cyan} {msg}").unwrap_or_else(|_err| ProgressStyle::default_spinner()),
  );
  spinner.enable_steady_tick(Duration::from_millis(80));
  spinner
}
