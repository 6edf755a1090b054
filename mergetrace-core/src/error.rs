//! Error taxonomy for repository analysis.
//!
//! Only [`AnalysisError::RepositoryUnreadable`] and
//! [`AnalysisError::BranchNotFound`] abort an analysis call. The remaining
//! variants are raised inside a single branch check and end up embedded in that
//! branch's result as [`MergeStatus::Unknown`](crate::merge::MergeStatus).

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while reading history or classifying branches.
#[derive(Debug, Error)]
pub enum AnalysisError {
  /// The handle does not point at a readable git history (absent or corrupt
  /// `.git` structure).
  #[error("repository at {} is unreadable: {source}", path.display())]
  RepositoryUnreadable {
    path: PathBuf,
    #[source]
    source: git2::Error,
  },

  /// The requested branch exists neither locally nor on any remote.
  #[error("branch '{name}' was not found locally or on any remote")]
  BranchNotFound { name: String },

  /// History needed to answer an ancestry question is missing or unreadable.
  #[error("ancestry unavailable: {reason}")]
  AncestryUnavailable { reason: String },

  /// The surrounding batch was cancelled before this check finished.
  #[error("check cancelled")]
  Cancelled,

  /// The check exceeded its time budget.
  #[error("check timed out after {seconds:.1}s")]
  TimedOut { seconds: f64 },

  /// A worker running the check died before reporting.
  #[error("check worker failed: {reason}")]
  TaskFailed { reason: String },
}

impl AnalysisError {
  /// Wrap a git error raised while walking history.
  pub fn ancestry(context: impl std::fmt::Display, source: &git2::Error) -> Self {
    Self::AncestryUnavailable {
      reason: format!("{context}: {}", source.message()),
    }
  }

  /// Whether the error aborts the whole analysis rather than one branch.
  pub fn is_fatal(&self) -> bool {
    matches!(self, Self::RepositoryUnreadable { .. } | Self::BranchNotFound { .. })
  }
}

/// Result alias used throughout the analysis modules.
pub type Result<T, E = AnalysisError> = std::result::Result<T, E>;
