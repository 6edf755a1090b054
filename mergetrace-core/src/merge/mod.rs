//! Merge status of branches against a target branch.
//!
//! [`MergeStatusChecker`] classifies one (source, target) pair at a time and
//! embeds any per-branch failure in the result as [`MergeStatus::Unknown`].
//! [`analyze_repository`] runs a whole keyword request concurrently.

pub mod batch;
pub mod checker;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use self::batch::{AnalysisReport, AnalysisRequest, BatchOptions, analyze_repository};
pub use self::checker::{CheckOptions, MergeStatusChecker};
use crate::git::{Branch, CommitRef, Identity};
use crate::links::LinkSet;
use crate::platform::MergeRequestRef;

/// How the source branch reached the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeKind {
  /// Integrated by a merge commit.
  Merge,
  /// Fast-forward or direct push; no merge commit integrated the source.
  Direct,
}

/// Facts about a merged branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeDetails {
  /// The integration point: the merge commit, or the source tip for
  /// [`MergeKind::Direct`].
  pub commit: CommitRef,
  pub kind: MergeKind,
  /// Commit timestamp of [`Self::commit`].
  pub merged_at: DateTime<Utc>,
  /// Committer of [`Self::commit`].
  pub merged_by: Identity,
  /// Merge/pull-request reference found in the merge commit message.
  pub request: Option<MergeRequestRef>,
}

impl MergeDetails {
  pub(crate) fn new(commit: CommitRef, kind: MergeKind) -> Self {
    Self {
      merged_at: commit.committed_at,
      merged_by: commit.committer.clone(),
      commit,
      kind,
      request: None,
    }
  }
}

/// Outcome of one merge check. `Unknown` means "could not determine" and is
/// never a negative answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MergeStatus {
  Merged(MergeDetails),
  NotMerged,
  Unknown { reason: String },
}

impl MergeStatus {
  pub fn label(&self) -> &'static str {
    match self {
      Self::Merged(_) => "merged",
      Self::NotMerged => "not merged",
      Self::Unknown { .. } => "unknown",
    }
  }
}

/// Result record for one (source branch, target branch) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeCheckResult {
  pub source_branch: String,
  pub target_branch: String,
  /// Tip of the source branch at check time.
  pub source_tip: CommitRef,
  pub status: MergeStatus,
  /// Platform links; `None` until enriched, or when the platform is
  /// unrecognized.
  pub links: Option<LinkSet>,
}

impl MergeCheckResult {
  pub(crate) fn new(source: &Branch, target: &Branch, status: MergeStatus) -> Self {
    Self {
      source_branch: source.display_name(),
      target_branch: target.display_name(),
      source_tip: source.tip.clone(),
      status,
      links: None,
    }
  }

  pub fn is_merged(&self) -> bool {
    matches!(self.status, MergeStatus::Merged(_))
  }

  pub fn details(&self) -> Option<&MergeDetails> {
    match &self.status {
      MergeStatus::Merged(details) => Some(details),
      _ => None,
    }
  }

  /// The integration commit, present only for merged results.
  pub fn merge_commit(&self) -> Option<&CommitRef> {
    self.details().map(|details| &details.commit)
  }

  pub fn merged_at(&self) -> Option<DateTime<Utc>> {
    self.details().map(|details| details.merged_at)
  }
}

/// Shared flag telling in-flight checks to stop at their next walk step.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}
