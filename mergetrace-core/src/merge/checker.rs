//! Classification of a single (source, target) branch pair.
//!
//! The lowest common ancestor of the two tips decides containment: the source
//! is merged exactly when that ancestor is the source tip itself. For merged
//! branches the target history is then searched, breadth first from the
//! target tip, for the merge commit that actually integrated the source. That
//! is the closest merge whose first parent does not yet contain the source,
//! so a later merge that only re-merges history already holding the source is
//! never reported. If that search cannot finish, the branch is still merged
//! and the source tip stands in as a direct merge.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use super::{CancellationFlag, MergeCheckResult, MergeDetails, MergeKind, MergeStatus};
use crate::error::{AnalysisError, Result};
use crate::git::{Branch, CommitGraphReader, CommitId, CommitRef};

/// Default bound on commits visited while locating the integration point.
pub const DEFAULT_MAX_WALK: usize = 5000;

/// Limits applied to each check.
#[derive(Debug, Clone)]
pub struct CheckOptions {
  /// Commits the integration-point walk may visit before giving up.
  pub max_walk: usize,
  /// Time budget per check; `None` means unbounded.
  pub timeout: Option<Duration>,
  pub cancel: CancellationFlag,
}

impl Default for CheckOptions {
  fn default() -> Self {
    Self {
      max_walk: DEFAULT_MAX_WALK,
      timeout: None,
      cancel: CancellationFlag::new(),
    }
  }
}

/// Classifies branches against a target over one reader.
pub struct MergeStatusChecker<'r> {
  reader: &'r CommitGraphReader,
  options: CheckOptions,
}

impl<'r> MergeStatusChecker<'r> {
  pub fn new(reader: &'r CommitGraphReader, options: CheckOptions) -> Self {
    Self { reader, options }
  }

  /// Check one source branch against `target`.
  ///
  /// Never fails: anything that prevents an answer becomes
  /// [`MergeStatus::Unknown`] with the reason.
  pub fn check(&self, source: &Branch, target: &Branch) -> MergeCheckResult {
    let deadline = self.options.timeout.map(|timeout| Instant::now() + timeout);

    let status = match self.classify(&source.tip, target.tip.id, deadline) {
      Ok(status) => status,
      Err(e) => {
        warn!(
          branch = %source.display_name(),
          target = %target.display_name(),
          error = %e,
          "Could not determine merge status"
        );
        MergeStatus::Unknown { reason: e.to_string() }
      }
    };
    debug!(branch = %source.display_name(), status = status.label(), "Checked branch");

    MergeCheckResult::new(source, target, status)
  }

  /// Check every source branch against `target`, in input order.
  pub fn check_all(&self, sources: &[Branch], target: &Branch) -> Vec<MergeCheckResult> {
    sources.iter().map(|source| self.check(source, target)).collect()
  }

  fn classify(&self, source: &CommitRef, target: CommitId, deadline: Option<Instant>) -> Result<MergeStatus> {
    self.checkpoint(deadline)?;

    let base = self.reader.merge_base(source.id, target)?;
    if base == Some(source.id) {
      let details = self.integration_point(source.id, target, deadline).unwrap_or_else(|e| {
        warn!(source = %source.id.short(), error = %e, "Integration point not located; reporting the source tip");
        MergeDetails::new(source.clone(), MergeKind::Direct)
      });
      return Ok(MergeStatus::Merged(details));
    }

    if self.reader.is_shallow() {
      // Missing history could hide the path to the source tip.
      return Ok(MergeStatus::Unknown {
        reason: "history is shallow; the source tip was not found in the available target history".to_string(),
      });
    }

    Ok(MergeStatus::NotMerged)
  }

  /// Locate the commit that integrated `source` into `target`.
  ///
  /// One walk over `source..target` marks every commit that contains the
  /// source tip. The breadth-first search from the target tip then stays
  /// inside that set, so it never descends below the common ancestor.
  fn integration_point(&self, source: CommitId, target: CommitId, deadline: Option<Instant>) -> Result<MergeDetails> {
    let range = self.reader.commits_since(source, target, self.options.max_walk)?;

    let mut containing = HashSet::from([source]);
    for &id in range.iter().rev() {
      self.checkpoint(deadline)?;
      let commit = self.reader.commit(id)?;
      if commit.parents.iter().any(|parent| containing.contains(parent)) {
        containing.insert(id);
      }
    }

    let mut queue = VecDeque::from([target]);
    let mut seen = HashSet::from([target]);
    let mut visited = 0usize;

    while let Some(id) = queue.pop_front() {
      self.checkpoint(deadline)?;
      if id == source {
        continue;
      }
      visited += 1;

      let commit = self.reader.commit(id)?;
      if let Some(first) = commit.first_parent()
        && commit.is_merge()
        && !containing.contains(&first)
      {
        trace!(commit = %id.short(), visited, "Found integrating merge commit");
        return Ok(MergeDetails::new(commit, MergeKind::Merge));
      }

      for &parent in &commit.parents {
        if containing.contains(&parent) && seen.insert(parent) {
          queue.push_back(parent);
        }
      }
    }

    trace!(source = %source.short(), visited, "No merge commit integrated the source");
    let tip = self.reader.commit(source)?;
    Ok(MergeDetails::new(tip, MergeKind::Direct))
  }

  fn checkpoint(&self, deadline: Option<Instant>) -> Result<()> {
    if self.options.cancel.is_cancelled() {
      return Err(AnalysisError::Cancelled);
    }
    if let Some(deadline) = deadline
      && Instant::now() >= deadline
    {
      let seconds = self.options.timeout.unwrap_or_default().as_secs_f64();
      return Err(AnalysisError::TimedOut { seconds });
    }
    Ok(())
  }
}
