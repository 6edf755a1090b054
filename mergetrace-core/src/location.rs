//! Where a repository to analyse lives.
//!
//! A location is either a local path or a remote URL. Remote URLs are later
//! acquired into a local cache by the CLI; the core only needs the URL for
//! platform matching.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Transport of a remote repository URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteScheme {
  /// `ssh://` or SCP-style `git@host:path`
  Ssh,
  Https,
  /// Plain HTTP (insecure)
  Http,
  /// `git://`
  Git,
}

impl RemoteScheme {
  /// Detect the transport of `url`, or `None` when it names a local path.
  pub fn detect(url: &str) -> Option<Self> {
    if url.starts_with("https://") {
      Some(Self::Https)
    } else if url.starts_with("http://") {
      Some(Self::Http)
    } else if url.starts_with("git://") {
      Some(Self::Git)
    } else if url.starts_with("ssh://") || is_scp_style(url) {
      Some(Self::Ssh)
    } else {
      None
    }
  }

  /// Whether credentials should come from the SSH agent.
  pub fn uses_ssh(self) -> bool {
    matches!(self, Self::Ssh)
  }
}

/// `user@host:path`, where the colon does not start a `://` scheme separator.
fn is_scp_style(url: &str) -> bool {
  let Some(at) = url.find('@') else {
    return false;
  };
  // A slash before the '@' means a path that happens to contain one.
  if url[..at].contains('/') {
    return false;
  }
  match url[at..].find(':') {
    Some(offset) => !url[at + offset + 1..].starts_with("//"),
    None => false,
  }
}

/// Physical source of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LocationSource {
  Local { path: PathBuf },
  Remote { url: String, scheme: RemoteScheme },
}

/// A repository to analyse plus the platform key it is pinned to, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryLocation {
  /// Preset name when the location came from saved configuration.
  pub name: Option<String>,
  pub source: LocationSource,
  /// Explicit platform key; when absent the platform is matched by URL.
  pub platform: Option<String>,
}

impl RepositoryLocation {
  /// Classify a raw user input as a remote URL or a local path.
  pub fn parse(input: &str) -> Self {
    let input = input.trim();
    let source = match RemoteScheme::detect(input) {
      Some(scheme) => LocationSource::Remote {
        url: input.to_string(),
        scheme,
      },
      None => LocationSource::Local {
        path: PathBuf::from(input.strip_prefix("file://").unwrap_or(input)),
      },
    };

    Self {
      name: None,
      source,
      platform: None,
    }
  }

  pub fn local(path: impl Into<PathBuf>) -> Self {
    Self {
      name: None,
      source: LocationSource::Local { path: path.into() },
      platform: None,
    }
  }

  /// Pin the location to a platform key.
  pub fn with_platform(mut self, platform: Option<String>) -> Self {
    self.platform = platform;
    self
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Remote URL, for remote locations.
  pub fn url(&self) -> Option<&str> {
    match &self.source {
      LocationSource::Remote { url, .. } => Some(url),
      LocationSource::Local { .. } => None,
    }
  }

  pub fn local_path(&self) -> Option<&Path> {
    match &self.source {
      LocationSource::Local { path } => Some(path),
      LocationSource::Remote { .. } => None,
    }
  }

  /// Directory name used when caching a clone of a remote location.
  ///
  /// Preset names are used as-is; otherwise the host and path of the URL are
  /// flattened into a single file-system-safe component.
  pub fn cache_key(&self) -> String {
    if let Some(name) = &self.name {
      return sanitize(name);
    }
    match &self.source {
      LocationSource::Remote { url, .. } => sanitize(&strip_transport(url)),
      LocationSource::Local { path } => sanitize(&path.to_string_lossy()),
    }
  }
}

impl fmt::Display for RepositoryLocation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.source {
      LocationSource::Local { path } => write!(f, "{}", path.display()),
      LocationSource::Remote { url, .. } => f.write_str(url),
    }
  }
}

/// `git@gitlab.com:team/app.git` -> `gitlab.com/team/app`
fn strip_transport(url: &str) -> String {
  let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
  let rest = match rest.find('@') {
    Some(at) if !rest[..at].contains('/') => &rest[at + 1..],
    _ => rest,
  };
  let rest = rest.trim_end_matches('/');
  let rest = rest.strip_suffix(".git").unwrap_or(rest);
  rest.replacen(':', "/", 1)
}

fn sanitize(raw: &str) -> String {
  let cleaned: String = raw
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
    .collect();
  cleaned.trim_matches('_').to_string()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn detects_remote_schemes() {
    assert_eq!(RemoteScheme::detect("https://github.com/o/r.git"), Some(RemoteScheme::Https));
    assert_eq!(RemoteScheme::detect("http://git.local/o/r"), Some(RemoteScheme::Http));
    assert_eq!(RemoteScheme::detect("ssh://git@host/o/r"), Some(RemoteScheme::Ssh));
    assert_eq!(RemoteScheme::detect("git@gitlab.com:team/app.git"), Some(RemoteScheme::Ssh));
    assert_eq!(RemoteScheme::detect("git://host/o/r"), Some(RemoteScheme::Git));
  }

  #[test]
  fn paths_are_local() {
    assert_eq!(RemoteScheme::detect("/srv/repos/app"), None);
    assert_eq!(RemoteScheme::detect("../app"), None);
    assert_eq!(RemoteScheme::detect("./odd/dir@v2:1"), None);

    let location = RepositoryLocation::parse("file:///srv/repos/app");
    assert_eq!(location.local_path(), Some(Path::new("/srv/repos/app")));
    assert!(location.url().is_none());
  }

  #[test]
  fn parse_keeps_remote_url() {
    let location = RepositoryLocation::parse("  git@gitlab.com:team/app.git ");
    assert_eq!(location.url(), Some("git@gitlab.com:team/app.git"));
    assert_eq!(location.platform, None);
    assert_eq!(location.to_string(), "git@gitlab.com:team/app.git");
  }

  #[test]
  fn cache_key_flattens_host_and_path() {
    assert_eq!(
      RepositoryLocation::parse("git@gitlab.com:team/app.git").cache_key(),
      "gitlab.com_team_app"
    );
    assert_eq!(
      RepositoryLocation::parse("https://github.com/owner/repo.git/").cache_key(),
      "github.com_owner_repo"
    );
    assert_eq!(
      RepositoryLocation::parse("https://github.com/owner/repo").with_name("my app").cache_key(),
      "my_app"
    );
  }
}
