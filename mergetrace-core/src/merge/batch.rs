//! Concurrent analysis of every branch matching a keyword.
//!
//! Git handles are not thread-safe, so each branch check runs on the blocking
//! pool with its own read-only [`CommitGraphReader`]. A semaphore bounds how
//! many run at once, counting workers whose check already timed out. Each
//! check has a timeout; when it expires the result is `Unknown` and the worker
//! stops at its next walk step.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::checker::{CheckOptions, DEFAULT_MAX_WALK, MergeStatusChecker};
use super::{CancellationFlag, MergeCheckResult, MergeStatus};
use crate::config::AnalysisSettings;
use crate::error::{AnalysisError, Result};
use crate::git::{Branch, BranchMatcher, CommitGraphReader};
use crate::links::LinkEnricher;
use crate::location::RepositoryLocation;
use crate::platform::{PlatformResolver, PlatformTable, ResolvedPlatform};

/// What to analyse.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
  /// Case-insensitive substring of branch names; empty matches all.
  pub keyword: String,
  /// Branch the sources are checked against.
  pub target: String,
  /// Where the history came from, used for platform matching.
  pub location: RepositoryLocation,
}

/// Limits for a batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
  pub timeout: Option<Duration>,
  pub jobs: usize,
  pub include_remote: bool,
  pub max_walk: usize,
  /// Cancelling this flag abandons unfinished checks.
  pub cancel: CancellationFlag,
}

impl Default for BatchOptions {
  fn default() -> Self {
    Self {
      timeout: None,
      jobs: 4,
      include_remote: true,
      max_walk: DEFAULT_MAX_WALK,
      cancel: CancellationFlag::new(),
    }
  }
}

impl From<&AnalysisSettings> for BatchOptions {
  fn from(settings: &AnalysisSettings) -> Self {
    Self {
      timeout: settings.timeout(),
      jobs: settings.jobs,
      include_remote: settings.include_remote,
      max_walk: settings.max_walk,
      cancel: CancellationFlag::new(),
    }
  }
}

/// Results of one analysis call, in branch enumeration order.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
  /// The analysed repository as the user named it.
  pub repository: String,
  pub target: String,
  /// Matched platform; `None` when unrecognized.
  pub platform: Option<ResolvedPlatform>,
  pub shallow: bool,
  pub results: Vec<MergeCheckResult>,
}

/// Cancels the batch if the analysis future is dropped before finishing.
struct CancelOnDrop {
  flag: CancellationFlag,
  armed: bool,
}

impl Drop for CancelOnDrop {
  fn drop(&mut self) {
    if self.armed {
      debug!("Analysis dropped before completion; cancelling outstanding checks");
      self.flag.cancel();
    }
  }
}

/// Branch list and target read up front for one analysis.
struct Plan {
  sources: Vec<Branch>,
  target: Branch,
  remote_url: Option<String>,
  shallow: bool,
}

/// Check every branch matching `request.keyword` against `request.target`.
///
/// `path` is the local history to read. Fails only when the repository is
/// unreadable or the target branch does not exist; every per-branch problem
/// becomes an `Unknown` result.
pub async fn analyze_repository(
  path: &Path,
  request: &AnalysisRequest,
  platforms: &PlatformTable,
  options: &BatchOptions,
) -> Result<AnalysisReport> {
  let mut guard = CancelOnDrop {
    flag: options.cancel.clone(),
    armed: true,
  };

  let plan = {
    let path = path.to_path_buf();
    let keyword = request.keyword.clone();
    let target = request.target.clone();
    let include_remote = options.include_remote;
    tokio::task::spawn_blocking(move || plan(&path, &keyword, &target, include_remote))
      .await
      .map_err(|e| AnalysisError::TaskFailed { reason: e.to_string() })??
  };

  let platform = PlatformResolver::new(platforms).resolve_location(&request.location, plan.remote_url.as_deref());
  info!(
    repository = %request.location,
    target = %plan.target.display_name(),
    matched = plan.sources.len(),
    platform = platform.as_ref().map_or("unrecognized", |p| p.name()),
    "Checking branches"
  );

  let results = check_concurrently(path, &plan, options).await;
  let results = LinkEnricher::new(platform.as_ref()).enrich_all(results);
  guard.armed = false;

  Ok(AnalysisReport {
    repository: request.location.to_string(),
    target: plan.target.display_name(),
    platform,
    shallow: plan.shallow,
    results,
  })
}

fn plan(path: &Path, keyword: &str, target: &str, include_remote: bool) -> Result<Plan> {
  let reader = CommitGraphReader::open(path)?;
  let target = reader.find_branch(target)?;
  let branches = reader.branches(include_remote)?;
  let sources = BranchMatcher::new(keyword).select(&branches);
  debug!(keyword, total = branches.len(), matched = sources.len(), "Selected branches");

  Ok(Plan {
    sources,
    target,
    remote_url: reader.remote_url(),
    shallow: reader.is_shallow(),
  })
}

async fn check_concurrently(path: &Path, plan: &Plan, options: &BatchOptions) -> Vec<MergeCheckResult> {
  let semaphore = Arc::new(Semaphore::new(options.jobs.max(1)));
  let check_options = CheckOptions {
    max_walk: options.max_walk,
    timeout: options.timeout,
    cancel: options.cancel.clone(),
  };

  let handles: Vec<_> = plan
    .sources
    .iter()
    .map(|source| {
      let semaphore = Arc::clone(&semaphore);
      let path = path.to_path_buf();
      let source = source.clone();
      let target = plan.target.clone();
      let check_options = check_options.clone();
      tokio::spawn(async move { check_one(semaphore, path, source, target, check_options).await })
    })
    .collect();

  let mut results = Vec::with_capacity(handles.len());
  for (handle, source) in handles.into_iter().zip(&plan.sources) {
    let outcome = handle
      .await
      .unwrap_or_else(|e| Err(AnalysisError::TaskFailed { reason: e.to_string() }));
    let result = outcome.unwrap_or_else(|e| {
      warn!(branch = %source.display_name(), error = %e, "Branch check did not finish");
      MergeCheckResult::new(source, &plan.target, MergeStatus::Unknown { reason: e.to_string() })
    });
    results.push(result);
  }
  results
}

async fn check_one(
  semaphore: Arc<Semaphore>,
  path: PathBuf,
  source: Branch,
  target: Branch,
  options: CheckOptions,
) -> Result<MergeCheckResult> {
  let timeout = options.timeout;
  let cancel = options.cancel.clone();
  run_limited(semaphore, timeout, &cancel, move || {
    let reader = CommitGraphReader::open(&path)?;
    Ok(MergeStatusChecker::new(&reader, options).check(&source, &target))
  })
  .await
}

/// Run `work` on the blocking pool under a semaphore permit.
///
/// The permit moves into the worker, so a timed-out check keeps its slot until
/// the worker actually returns.
async fn run_limited<T, F>(
  semaphore: Arc<Semaphore>,
  timeout: Option<Duration>,
  cancel: &CancellationFlag,
  work: F,
) -> Result<T>
where
  T: Send + 'static,
  F: FnOnce() -> Result<T> + Send + 'static,
{
  let permit = semaphore.acquire_owned().await.map_err(|_closed| AnalysisError::Cancelled)?;
  if cancel.is_cancelled() {
    return Err(AnalysisError::Cancelled);
  }

  let work = tokio::task::spawn_blocking(move || {
    let _permit = permit;
    work()
  });

  let joined = match timeout {
    Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_elapsed| AnalysisError::TimedOut {
      seconds: limit.as_secs_f64(),
    })?,
    None => work.await,
  };
  joined.map_err(|e| AnalysisError::TaskFailed { reason: e.to_string() })?
}

#[cfg(test)]
mod tests {
  use mergetrace_test_utils::git::{GitRepoTestGuard, checkout_branch, create_branch, create_commit, merge_branch};
  use tempfile::TempDir;

  use super::*;
  use crate::config::default_platforms;

  /// Three feature branches off main; `feature/b` is merged into main.
  fn repository() -> GitRepoTestGuard {
    let guard = GitRepoTestGuard::with_origin("git@gitlab.com:team/app.git");
    let repo = &guard.repo;
    create_commit(repo, "base.txt", "base", "initial").unwrap();
    for name in ["feature/a", "feature/b", "feature/c"] {
      create_branch(repo, name, Some("main")).unwrap();
      checkout_branch(repo, name).unwrap();
      create_commit(repo, &format!("{}.txt", name.replace('/', "-")), name, "work").unwrap();
      checkout_branch(repo, "main").unwrap();
    }
    create_commit(repo, "main.txt", "main", "main work").unwrap();
    merge_branch(
      repo,
      "feature/b",
      "Merge branch 'feature/b' into 'main'\n\nSee merge request team/app!7",
    )
    .unwrap();
    guard
  }

  fn request(guard: &GitRepoTestGuard, keyword: &str) -> AnalysisRequest {
    AnalysisRequest {
      keyword: keyword.into(),
      target: "main".into(),
      location: RepositoryLocation::local(guard.path()),
    }
  }

  fn expected_order(guard: &GitRepoTestGuard, keyword: &str) -> Vec<String> {
    let reader = CommitGraphReader::open(guard.path()).unwrap();
    let branches = reader.branches(true).unwrap();
    BranchMatcher::new(keyword)
      .select(&branches)
      .iter()
      .map(Branch::display_name)
      .collect()
  }

  #[tokio::test]
  async fn results_keep_enumeration_order_and_links() {
    let guard = repository();
    let options = BatchOptions {
      jobs: 3,
      ..BatchOptions::default()
    };

    let report = analyze_repository(guard.path(), &request(&guard, "feature"), &default_platforms(), &options)
      .await
      .unwrap();

    let names: Vec<_> = report.results.iter().map(|r| r.source_branch.clone()).collect();
    assert_eq!(names, expected_order(&guard, "feature"));
    assert_eq!(report.platform.as_ref().unwrap().key, "gitlab");

    for result in &report.results {
      if result.source_branch == "feature/b" {
        let links = result.links.as_ref().unwrap();
        assert_eq!(
          links.merge_request.as_deref(),
          Some("https://gitlab.com/team/app/-/merge_requests/7")
        );
        assert!(links.commit.as_deref().unwrap().starts_with("https://gitlab.com/team/app/-/commit/"));
      } else {
        assert_eq!(result.status, MergeStatus::NotMerged);
        assert!(result.links.is_none());
      }
    }
  }

  #[tokio::test]
  async fn single_job_matches_parallel_run() {
    let guard = repository();
    let platforms = default_platforms();
    let serial = BatchOptions {
      jobs: 1,
      ..BatchOptions::default()
    };
    let parallel = BatchOptions {
      jobs: 8,
      ..BatchOptions::default()
    };

    let a = analyze_repository(guard.path(), &request(&guard, ""), &platforms, &serial)
      .await
      .unwrap();
    let b = analyze_repository(guard.path(), &request(&guard, ""), &platforms, &parallel)
      .await
      .unwrap();
    assert_eq!(a.results, b.results);
  }

  #[tokio::test]
  async fn zero_timeout_yields_unknown_for_every_branch() {
    let guard = repository();
    let options = BatchOptions {
      timeout: Some(Duration::ZERO),
      ..BatchOptions::default()
    };

    let report = analyze_repository(guard.path(), &request(&guard, "feature"), &default_platforms(), &options)
      .await
      .unwrap();
    assert_eq!(report.results.len(), 3);
    assert!(
      report
        .results
        .iter()
        .all(|r| matches!(r.status, MergeStatus::Unknown { .. }))
    );
  }

  #[tokio::test]
  async fn cancelled_batch_yields_unknown() {
    let guard = repository();
    let options = BatchOptions::default();
    options.cancel.cancel();

    let report = analyze_repository(guard.path(), &request(&guard, "feature"), &default_platforms(), &options)
      .await
      .unwrap();
    let cancelled = MergeStatus::Unknown {
      reason: "check cancelled".into(),
    };
    assert!(report.results.iter().all(|r| r.status == cancelled));
  }

  #[tokio::test]
  async fn timed_out_worker_keeps_its_slot() {
    let semaphore = Arc::new(Semaphore::new(1));
    let (release, wait) = std::sync::mpsc::channel::<()>();

    let err = run_limited(
      Arc::clone(&semaphore),
      Some(Duration::from_millis(20)),
      &CancellationFlag::new(),
      move || {
        let _ = wait.recv();
        Ok(())
      },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AnalysisError::TimedOut { .. }));
    assert_eq!(semaphore.available_permits(), 0);

    release.send(()).unwrap();
    let permit = tokio::time::timeout(Duration::from_secs(5), semaphore.acquire())
      .await
      .unwrap()
      .unwrap();
    drop(permit);
  }

  #[tokio::test]
  async fn unreadable_repository_aborts() {
    let dir = TempDir::new().unwrap();
    let request = AnalysisRequest {
      keyword: String::new(),
      target: "main".into(),
      location: RepositoryLocation::local(dir.path()),
    };

    let err = analyze_repository(dir.path(), &request, &default_platforms(), &BatchOptions::default())
      .await
      .unwrap_err();
    assert!(matches!(err, AnalysisError::RepositoryUnreadable { .. }));
  }

  #[tokio::test]
  async fn missing_target_aborts() {
    let guard = repository();
    let mut request = request(&guard, "feature");
    request.target = "develop".into();

    let err = analyze_repository(guard.path(), &request, &default_platforms(), &BatchOptions::default())
      .await
      .unwrap_err();
    assert!(matches!(err, AnalysisError::BranchNotFound { .. }));
  }

  #[tokio::test]
  async fn no_matches_is_an_empty_report() {
    let guard = repository();
    let report = analyze_repository(
      guard.path(),
      &request(&guard, "no-such-branch"),
      &default_platforms(),
      &BatchOptions::default(),
    )
    .await
    .unwrap();
    assert!(report.results.is_empty());
    assert!(!report.shallow);
  }
}
