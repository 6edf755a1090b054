//! Commit records read from history.
//!
//! Commits form an immutable DAG. Parent links are stored as [`CommitId`] keys
//! rather than references so records can sit in a flat cache owned by the
//! reader without ownership cycles.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Object id of a commit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommitId(git2::Oid);

impl CommitId {
  /// Length of the abbreviated form used for display.
  pub const SHORT_LEN: usize = 8;

  pub fn new(oid: git2::Oid) -> Self {
    Self(oid)
  }

  /// Parse a full hexadecimal object id.
  pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
    git2::Oid::from_str(hex).map(Self)
  }

  pub fn oid(&self) -> git2::Oid {
    self.0
  }

  /// Abbreviated hash, as shown next to merge results.
  pub fn short(&self) -> String {
    let mut hex = self.0.to_string();
    hex.truncate(Self::SHORT_LEN);
    hex
  }
}

impl From<git2::Oid> for CommitId {
  fn from(oid: git2::Oid) -> Self {
    Self(oid)
  }
}

impl fmt::Debug for CommitId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("CommitId").field(&self.short()).finish()
  }
}

impl fmt::Display for CommitId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&self.0, f)
  }
}

impl Serialize for CommitId {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&self.0)
  }
}

/// Name and email of a commit author or committer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
  pub name: String,
  pub email: String,
}

impl Identity {
  pub(crate) fn from_signature(signature: &git2::Signature<'_>) -> Self {
    Self {
      name: String::from_utf8_lossy(signature.name_bytes()).into_owned(),
      email: String::from_utf8_lossy(signature.email_bytes()).into_owned(),
    }
  }
}

impl fmt::Display for Identity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} <{}>", self.name, self.email)
  }
}

/// A commit as read from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRef {
  pub id: CommitId,
  pub author: Identity,
  pub committer: Identity,
  /// When the change was authored.
  pub authored_at: DateTime<Utc>,
  /// When the commit was written; used as the merge date.
  pub committed_at: DateTime<Utc>,
  /// Full commit message.
  pub message: String,
  /// Parent ids in recorded order; the first parent is the mainline.
  pub parents: Vec<CommitId>,
}

impl CommitRef {
  pub(crate) fn from_git(commit: &git2::Commit<'_>) -> Self {
    Self {
      id: CommitId::new(commit.id()),
      author: Identity::from_signature(&commit.author()),
      committer: Identity::from_signature(&commit.committer()),
      authored_at: to_utc(commit.author().when()),
      committed_at: to_utc(commit.time()),
      message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
      parents: commit.parent_ids().map(CommitId::new).collect(),
    }
  }

  /// First line of the message.
  pub fn summary(&self) -> &str {
    self.message.lines().next().unwrap_or("").trim()
  }

  /// Whether the commit has more than one parent.
  pub fn is_merge(&self) -> bool {
    self.parents.len() > 1
  }

  pub fn first_parent(&self) -> Option<CommitId> {
    self.parents.first().copied()
  }
}

fn to_utc(time: git2::Time) -> DateTime<Utc> {
  DateTime::from_timestamp(time.seconds(), 0).unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn short_id_is_eight_hex_chars() {
    let id = CommitId::from_hex("abcd1234abcd1234abcd1234abcd1234abcd1234").unwrap();
    assert_eq!(id.short(), "abcd1234");
    assert_eq!(id.to_string().len(), 40);
  }

  #[test]
  fn commit_id_serializes_as_full_hex() {
    let id = CommitId::from_hex("0123456789abcdef0123456789abcdef01234567").unwrap();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"0123456789abcdef0123456789abcdef01234567\"");
  }

  #[test]
  fn summary_is_first_line() {
    let commit = CommitRef {
      id: CommitId::new(git2::Oid::zero()),
      author: Identity {
        name: "a".into(),
        email: "a@example.com".into(),
      },
      committer: Identity {
        name: "c".into(),
        email: "c@example.com".into(),
      },
      authored_at: DateTime::UNIX_EPOCH,
      committed_at: DateTime::UNIX_EPOCH,
      message: "Merge branch 'feature/login' into 'main'\n\nSee merge request !42\n".into(),
      parents: vec![],
    };
    assert_eq!(commit.summary(), "Merge branch 'feature/login' into 'main'");
    assert!(!commit.is_merge());
    assert_eq!(commit.first_parent(), None);
  }
}
