//! Hosting platform resolution and link synthesis.
//!
//! A remote URL is matched against the configured platform table by literal
//! prefix. The longest matching prefix wins, so a specific entry such as
//! `https://gitlab.com/internal/` is never shadowed by a generic
//! `https://gitlab.com/`. Remaining ties are broken by platform key order.
//! No match is a normal outcome: links are simply omitted.

pub mod reference;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

pub use self::reference::{MergeRequestRef, ReferenceStyle};
use crate::location::RepositoryLocation;

/// Placeholder in link templates replaced by the `group/project` path.
pub const PROJECT_PLACEHOLDER: &str = "{project}";

/// One hosting platform's URL conventions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
  /// Display name (`GitLab`).
  pub name: String,
  /// Web root, e.g. `https://gitlab.com`.
  pub base_url: String,
  /// Path template for merge/pull requests; the identifier is appended.
  pub merge_request_path: String,
  /// Path template for commits; the hash is appended.
  pub commit_path: String,
  #[serde(default)]
  pub ssh_prefix: String,
  #[serde(default)]
  pub https_prefix: String,
  #[serde(default)]
  pub reference_style: ReferenceStyle,
}

impl PlatformConfig {
  /// Non-empty prefixes of this platform that `url` starts with.
  fn matching_prefixes<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    [self.ssh_prefix.as_str(), self.https_prefix.as_str()]
      .into_iter()
      .filter(move |prefix| !prefix.is_empty() && url.starts_with(prefix))
  }
}

/// Platform table keyed by platform key.
pub type PlatformTable = BTreeMap<String, PlatformConfig>;

/// Matches remote URLs against a platform table.
#[derive(Debug, Clone, Copy)]
pub struct PlatformResolver<'a> {
  platforms: &'a PlatformTable,
}

impl<'a> PlatformResolver<'a> {
  pub fn new(platforms: &'a PlatformTable) -> Self {
    Self { platforms }
  }

  /// Resolve a raw remote URL (SSH or HTTPS form).
  ///
  /// Returns `None` for an unrecognized platform.
  pub fn resolve(&self, remote_url: &str) -> Option<ResolvedPlatform> {
    let url = remote_url.trim();
    let mut best: Option<(&str, &PlatformConfig, &str)> = None;

    for (key, config) in self.platforms {
      for prefix in config.matching_prefixes(url) {
        trace!(platform = %key, prefix, "Prefix matches remote URL");
        if best.is_none_or(|(_, _, current)| prefix.len() > current.len()) {
          best = Some((key.as_str(), config, prefix));
        }
      }
    }

    let Some((key, config, prefix)) = best else {
      debug!(url, "No configured platform matches remote URL");
      return None;
    };

    let resolved = ResolvedPlatform {
      key: key.to_string(),
      config: config.clone(),
      project_path: project_path(&url[prefix.len()..]),
    };
    debug!(url, platform = %resolved.key, project = %resolved.project_path, "Resolved platform");
    Some(resolved)
  }

  /// Resolve the platform for a repository location.
  ///
  /// An explicit platform key on the location takes precedence over URL
  /// matching. `remote_url` is used when the location itself has no URL
  /// (local checkouts report their `origin` URL).
  pub fn resolve_location(&self, location: &RepositoryLocation, remote_url: Option<&str>) -> Option<ResolvedPlatform> {
    let url = location.url().or(remote_url);

    if let Some(key) = &location.platform {
      if let Some(config) = self.platforms.get(key) {
        let project_path = url
          .and_then(|url| {
            let url = url.trim();
            config
              .matching_prefixes(url)
              .max_by_key(|prefix| prefix.len())
              .map(|prefix| project_path(&url[prefix.len()..]))
          })
          .unwrap_or_default();
        return Some(ResolvedPlatform {
          key: key.clone(),
          config: config.clone(),
          project_path,
        });
      }
      debug!(platform = %key, "Pinned platform is not configured; matching by URL");
    }

    url.and_then(|url| self.resolve(url))
  }
}

/// Strip `.git` and surrounding slashes from the remainder of a URL.
fn project_path(rest: &str) -> String {
  let rest = rest.trim_matches('/');
  rest.strip_suffix(".git").unwrap_or(rest).trim_end_matches('/').to_string()
}

/// A platform matched for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPlatform {
  pub key: String,
  pub config: PlatformConfig,
  /// `group/project` path of the repository on the platform.
  pub project_path: String,
}

impl ResolvedPlatform {
  pub fn name(&self) -> &str {
    &self.config.name
  }

  /// Web link to a commit page.
  ///
  /// `None` when the template needs the project path and none was resolved.
  pub fn commit_link(&self, hash: &str) -> Option<String> {
    self.link(&self.config.commit_path, hash)
  }

  /// Web link to a merge/pull-request page.
  pub fn merge_request_link(&self, id: &str) -> Option<String> {
    self.link(&self.config.merge_request_path, id)
  }

  /// Merge/pull-request reference in a commit message, using this platform's
  /// convention.
  pub fn extract_reference(&self, message: &str) -> Option<MergeRequestRef> {
    self.config.reference_style.extract(message)
  }

  fn link(&self, template: &str, id: &str) -> Option<String> {
    if template.contains(PROJECT_PLACEHOLDER) && self.project_path.is_empty() {
      return None;
    }
    let path = template.replace(PROJECT_PLACEHOLDER, &self.project_path);
    let base = self.config.base_url.trim_end_matches('/');
    if path.is_empty() {
      return Some(format!("{base}/{id}"));
    }
    let path = path.trim_start_matches('/');
    Some(format!("{base}/{path}{id}"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn platform(name: &str, base: &str, ssh: &str, https: &str) -> PlatformConfig {
    PlatformConfig {
      name: name.into(),
      base_url: base.into(),
      merge_request_path: "/merge_requests/".into(),
      commit_path: "/commit/".into(),
      ssh_prefix: ssh.into(),
      https_prefix: https.into(),
      reference_style: ReferenceStyle::Auto,
    }
  }

  fn table() -> PlatformTable {
    let mut table = PlatformTable::new();
    table.insert(
      "gitlab".into(),
      platform("GitLab", "https://gitlab.com", "git@gitlab.com:", "https://gitlab.com/"),
    );
    table.insert(
      "gitlab-internal".into(),
      platform(
        "GitLab Internal",
        "https://gitlab.com/internal",
        "git@gitlab.com:internal/",
        "https://gitlab.com/internal/",
      ),
    );
    table
  }

  #[test]
  fn ssh_url_resolves_project_and_links() {
    let mut table = PlatformTable::new();
    table.insert(
      "gitlab".into(),
      platform("GitLab", "https://gitlab.com", "git@gitlab.com:", "https://gitlab.com/"),
    );
    let resolved = PlatformResolver::new(&table).resolve("git@gitlab.com:team/app.git").unwrap();

    assert_eq!(resolved.project_path, "team/app");
    assert_eq!(resolved.commit_link("abcd123").unwrap(), "https://gitlab.com/commit/abcd123");
    assert_eq!(resolved.merge_request_link("42").unwrap(), "https://gitlab.com/merge_requests/42");
  }

  #[test]
  fn longest_prefix_wins() {
    let table = table();
    let resolver = PlatformResolver::new(&table);

    let specific = resolver.resolve("https://gitlab.com/internal/tools/ci.git").unwrap();
    assert_eq!(specific.key, "gitlab-internal");
    assert_eq!(specific.project_path, "tools/ci");

    let generic = resolver.resolve("https://gitlab.com/team/app").unwrap();
    assert_eq!(generic.key, "gitlab");
    assert_eq!(generic.project_path, "team/app");
  }

  #[test]
  fn resolution_is_deterministic_on_equal_prefixes() {
    let mut table = PlatformTable::new();
    table.insert("b-mirror".into(), platform("B", "https://b.example", "git@host:", ""));
    table.insert("a-primary".into(), platform("A", "https://a.example", "git@host:", ""));
    let resolver = PlatformResolver::new(&table);

    for _ in 0..3 {
      assert_eq!(resolver.resolve("git@host:x/y.git").unwrap().key, "a-primary");
    }
  }

  #[test]
  fn unknown_host_is_unrecognized() {
    let table = table();
    assert!(PlatformResolver::new(&table).resolve("git@unknown.internal:x/y.git").is_none());
  }

  #[test]
  fn empty_prefixes_never_match() {
    let mut table = PlatformTable::new();
    table.insert("blank".into(), platform("Blank", "https://blank.example", "", ""));
    assert!(PlatformResolver::new(&table).resolve("git@anything:x/y.git").is_none());
  }

  #[test]
  fn project_placeholder_is_expanded() {
    let mut config = platform("GitHub", "https://github.com/", "git@github.com:", "https://github.com/");
    config.merge_request_path = "/{project}/pull/".into();
    config.commit_path = "{project}/commit/".into();
    let mut table = PlatformTable::new();
    table.insert("github".into(), config);

    let resolved = PlatformResolver::new(&table)
      .resolve("https://github.com/owner/repo.git")
      .unwrap();
    assert_eq!(resolved.merge_request_link("7").unwrap(), "https://github.com/owner/repo/pull/7");
    assert_eq!(
      resolved.commit_link("0123abcd").unwrap(),
      "https://github.com/owner/repo/commit/0123abcd"
    );
  }

  #[test]
  fn pinned_platform_without_project_path_omits_project_links() {
    let mut config = platform("GitLab", "https://gitlab.com", "git@gitlab.com:", "https://gitlab.com/");
    config.merge_request_path = "/{project}/-/merge_requests/".into();
    let mut table = PlatformTable::new();
    table.insert("gitlab".into(), config);

    let location = RepositoryLocation::parse("https://git.example.com/team/app.git").with_platform(Some("gitlab".into()));
    let resolved = PlatformResolver::new(&table).resolve_location(&location, None).unwrap();
    assert_eq!(resolved.project_path, "");
    assert!(resolved.merge_request_link("42").is_none());
    assert_eq!(resolved.commit_link("abcd123").unwrap(), "https://gitlab.com/commit/abcd123");
  }

  #[test]
  fn pinned_platform_overrides_url_matching() {
    let table = table();
    let resolver = PlatformResolver::new(&table);

    let location =
      RepositoryLocation::parse("https://gitlab.com/internal/tools/ci.git").with_platform(Some("gitlab".into()));
    let resolved = resolver.resolve_location(&location, None).unwrap();
    assert_eq!(resolved.key, "gitlab");
    assert_eq!(resolved.project_path, "internal/tools/ci");

    let unknown_pin =
      RepositoryLocation::parse("git@gitlab.com:team/app.git").with_platform(Some("nope".into()));
    assert_eq!(resolver.resolve_location(&unknown_pin, None).unwrap().key, "gitlab");
  }

  #[test]
  fn local_location_uses_remote_url() {
    let table = table();
    let resolver = PlatformResolver::new(&table);
    let location = RepositoryLocation::local("/srv/app");

    assert!(resolver.resolve_location(&location, None).is_none());
    let resolved = resolver
      .resolve_location(&location, Some("git@gitlab.com:team/app.git"))
      .unwrap();
    assert_eq!(resolved.project_path, "team/app");
  }
}
