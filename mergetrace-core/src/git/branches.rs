//! Branch records and keyword selection.

use std::fmt;

use serde::Serialize;

use super::commit::CommitRef;

/// Where a branch lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BranchKind {
  /// A branch under `refs/heads`.
  Local,
  /// A remote-tracking branch under `refs/remotes/<remote>`.
  Remote { remote: String },
}

impl fmt::Display for BranchKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Local => f.write_str("local"),
      Self::Remote { remote } => write!(f, "remote ({remote})"),
    }
  }
}

/// A branch and the commit it points at, enumerated fresh per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
  /// Short name with any remote prefix removed (`feature/login`).
  pub name: String,
  pub kind: BranchKind,
  /// Full reference name (`refs/remotes/origin/feature/login`).
  pub refname: String,
  pub tip: CommitRef,
}

impl Branch {
  /// Name as a user would type it: `origin/feature/login` for remote
  /// branches, the short name otherwise.
  pub fn display_name(&self) -> String {
    match &self.kind {
      BranchKind::Local => self.name.clone(),
      BranchKind::Remote { remote } => format!("{remote}/{}", self.name),
    }
  }
}

/// Case-insensitive substring filter over branch names.
///
/// An empty keyword matches every branch. Selection keeps the enumeration
/// order of the input.
#[derive(Debug, Clone)]
pub struct BranchMatcher {
  needle: String,
}

impl BranchMatcher {
  pub fn new(keyword: &str) -> Self {
    Self {
      needle: keyword.trim().to_lowercase(),
    }
  }

  pub fn matches(&self, branch_name: &str) -> bool {
    self.needle.is_empty() || branch_name.to_lowercase().contains(&self.needle)
  }

  /// Matching branches, in input order.
  pub fn select<'a, I>(&self, branches: I) -> Vec<Branch>
  where
    I: IntoIterator<Item = &'a Branch>,
  {
    branches
      .into_iter()
      .filter(|branch| self.matches(&branch.name))
      .cloned()
      .collect()
  }
}
