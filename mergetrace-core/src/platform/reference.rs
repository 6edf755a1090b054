//! Merge/pull-request references embedded in merge commit messages.
//!
//! Each hosting convention is one [`ReferenceStyle`] variant with its own
//! ordered pattern set, so adding a platform means adding a variant rather
//! than another branch in a chain of string checks.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static MERGE_REQUEST_PHRASE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)merge request !(\d+)").expect("Failed to compile merge request regex"));

static BANG_NUMBER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"!(\d+)").expect("Failed to compile !N reference regex"));

static PULL_REQUEST_PHRASE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)pull request #(\d+)").expect("Failed to compile pull request regex"));

static HASH_NUMBER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"#(\d+)").expect("Failed to compile #N reference regex"));

static AZURE_PR: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)\b(?:PR|pull request) (\d+)").expect("Failed to compile Azure PR regex"));

static GERRIT_CHANGE_ID: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?m)^Change-Id:\s*(I[0-9a-fA-F]{40})\s*$").expect("Failed to compile Gerrit Change-Id regex")
});

/// How the captured identifier is rendered for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notation {
  /// `!42`
  Bang,
  /// `#42`
  Hash,
  /// `PR 42`
  Azure,
  /// The raw token (Gerrit change ids).
  Token,
}

impl Notation {
  fn label(self, id: &str) -> String {
    match self {
      Self::Bang => format!("!{id}"),
      Self::Hash => format!("#{id}"),
      Self::Azure => format!("PR {id}"),
      Self::Token => id.to_string(),
    }
  }
}

/// Commit-message convention used to recognise merge/pull-request references.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceStyle {
  /// Try every known convention in a fixed order.
  #[default]
  Auto,
  /// `See merge request group/project!42`
  GitLab,
  /// `Merge pull request #42 from ...` or squash titles ending in `(#42)`
  GitHub,
  /// `Merged PR 42: ...`
  Azure,
  /// `Change-Id: I<40 hex>` trailer
  Gerrit,
}

impl ReferenceStyle {
  fn patterns(self) -> Vec<(&'static Regex, Notation)> {
    match self {
      Self::Auto => vec![
        (&*MERGE_REQUEST_PHRASE, Notation::Bang),
        (&*BANG_NUMBER, Notation::Bang),
        (&*PULL_REQUEST_PHRASE, Notation::Hash),
        (&*HASH_NUMBER, Notation::Hash),
        (&*AZURE_PR, Notation::Azure),
      ],
      Self::GitLab => vec![(&*MERGE_REQUEST_PHRASE, Notation::Bang), (&*BANG_NUMBER, Notation::Bang)],
      Self::GitHub => vec![(&*PULL_REQUEST_PHRASE, Notation::Hash), (&*HASH_NUMBER, Notation::Hash)],
      Self::Azure => vec![(&*AZURE_PR, Notation::Azure)],
      Self::Gerrit => vec![(&*GERRIT_CHANGE_ID, Notation::Token)],
    }
  }

  /// Find the first reference in `message`, trying patterns in priority
  /// order.
  pub fn extract(self, message: &str) -> Option<MergeRequestRef> {
    self.patterns().into_iter().find_map(|(regex, notation)| {
      let id = regex.captures(message)?.get(1)?.as_str().to_string();
      Some(MergeRequestRef {
        label: notation.label(&id),
        id,
      })
    })
  }
}

impl fmt::Display for ReferenceStyle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Auto => "auto",
      Self::GitLab => "gitlab",
      Self::GitHub => "github",
      Self::Azure => "azure",
      Self::Gerrit => "gerrit",
    };
    f.write_str(name)
  }
}

/// A merge/pull-request reference extracted from a commit message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeRequestRef {
  /// Identifier used in links (`42`, or a change token).
  pub id: String,
  /// Human form in the platform's notation (`!42`, `#42`, `PR 42`).
  pub label: String,
}
