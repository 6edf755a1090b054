//! Git repository management for testing
//!
//! This module provides utilities for creating temporary git repositories and
//! shaping their history (linear commits, side branches, merge commits and
//! fast-forwards) so merge detection can be exercised against real object
//! databases.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use git2::build::CheckoutBuilder;
use git2::{BranchType, Oid, Repository, Signature};
use tempfile::TempDir;

/// Name used for the committer of merge commits created by [`merge_branch`].
pub const MERGE_COMMITTER_NAME: &str = "Merge Bot";
/// Email used for the committer of merge commits created by [`merge_branch`].
const MERGE_COMMITTER_EMAIL: &str = "merge-bot@example.com";

/// A test guard that owns a temporary git repository.
///
/// The repository (and its working directory) is removed when the guard is
/// dropped.
pub struct GitRepoTestGuard {
  /// The temporary directory containing the git repository
  pub temp_dir: TempDir,
  /// The git repository
  pub repo: Repository,
}

impl GitRepoTestGuard {
  /// Create a new test git repository with `main` as the initial branch.
  pub fn new() -> Self {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let temp_path = temp_dir.path();

    let mut options = git2::RepositoryInitOptions::new();
    options.initial_head("main");
    let repo = Repository::init_opts(temp_path, &options).expect("Failed to initialize git repository");

    // Set test user configuration
    let mut config = repo.config().expect("Failed to get repository config");
    config
      .set_str("user.name", "Mergetrace Test User")
      .expect("Failed to set user.name");
    config
      .set_str("user.email", "mergetrace-test@example.com")
      .expect("Failed to set user.email");

    assert!(
      temp_path.join(".git").exists(),
      "Git repository was not properly initialized"
    );

    Self { temp_dir, repo }
  }

  /// Create a new test repository that already has an `origin` remote.
  pub fn with_origin(url: &str) -> Self {
    let guard = Self::new();
    guard.repo.remote("origin", url).expect("Failed to add origin remote");
    guard
  }

  /// Get the path to the git repository
  pub fn path(&self) -> &Path {
    self.temp_dir.path()
  }

  /// Reopen the repository from disk, bypassing the in-process object cache of
  /// [`GitRepoTestGuard::repo`].
  pub fn reopen(&self) -> Repository {
    Repository::open(self.path()).expect("Failed to reopen git repository")
  }
}

impl Default for GitRepoTestGuard {
  fn default() -> Self {
    Self::new()
  }
}

/// Create a commit on the current HEAD and return its id.
pub fn create_commit(repo: &Repository, file_name: &str, content: &str, message: &str) -> Result<Oid> {
  let repo_path = repo.workdir().context("Repository has no working directory")?;
  let file_path = repo_path.join(file_name);
  if let Some(parent) = file_path.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(&file_path, content)?;

  let mut index = repo.index()?;
  index.add_path(Path::new(file_name))?;
  index.write()?;

  let tree_id = index.write_tree()?;
  let tree = repo.find_tree(tree_id)?;

  let signature = Signature::now("Test User", "test@example.com")?;

  let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
  let oid = match parent {
    Some(parent) => repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])?,
    None => repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[])?,
  };

  Ok(oid)
}

/// Create a branch, starting at another local branch or at HEAD.
pub fn create_branch(repo: &Repository, branch_name: &str, start_point: Option<&str>) -> Result<()> {
  let head = if let Some(start) = start_point {
    repo
      .find_branch(start, BranchType::Local)?
      .into_reference()
      .peel_to_commit()?
  } else {
    repo.head()?.peel_to_commit()?
  };

  repo.branch(branch_name, &head, false)?;
  Ok(())
}

/// Checkout a local branch, updating index and working tree.
pub fn checkout_branch(repo: &Repository, branch_name: &str) -> Result<()> {
  let obj = repo
    .revparse_single(&format!("refs/heads/{branch_name}"))?
    .peel_to_commit()?;

  repo.checkout_tree(obj.as_object(), Some(CheckoutBuilder::new().force()))?;
  repo.set_head(&format!("refs/heads/{branch_name}"))?;

  Ok(())
}

/// Merge a local branch into the checked-out branch with a true merge commit.
///
/// The merge commit is always created (no fast-forward), with the checked-out
/// tip as first parent and `branch_name`'s tip as second parent. The committer
/// is [`MERGE_COMMITTER_NAME`] so tests can tell it apart from the authors of
/// ordinary commits.
pub fn merge_branch(repo: &Repository, branch_name: &str, message: &str) -> Result<Oid> {
  let ours = repo.head()?.peel_to_commit()?;
  let theirs = repo
    .find_branch(branch_name, BranchType::Local)
    .with_context(|| format!("Branch '{branch_name}' not found"))?
    .into_reference()
    .peel_to_commit()?;

  let mut index = repo.merge_commits(&ours, &theirs, None)?;
  if index.has_conflicts() {
    anyhow::bail!("Merging '{branch_name}' produced conflicts");
  }
  let tree_id = index.write_tree_to(repo)?;
  let tree = repo.find_tree(tree_id)?;

  let author = Signature::now("Test User", "test@example.com")?;
  let committer = Signature::now(MERGE_COMMITTER_NAME, MERGE_COMMITTER_EMAIL)?;
  let oid = repo.commit(Some("HEAD"), &author, &committer, message, &tree, &[&ours, &theirs])?;

  repo.checkout_head(Some(CheckoutBuilder::new().force()))?;

  Ok(oid)
}

/// Move `target` to the tip of `source`, as a fast-forward merge would.
pub fn fast_forward_branch(repo: &Repository, target: &str, source: &str) -> Result<()> {
  let tip = repo
    .find_branch(source, BranchType::Local)?
    .into_reference()
    .peel_to_commit()?;
  // `Repository::branch` refuses to force-move the checked-out branch.
  repo.reference(&format!("refs/heads/{target}"), tip.id(), true, "fast-forward")?;

  if repo.head()?.shorthand() == Some(target) {
    repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
  }

  Ok(())
}

/// Id of the commit HEAD points at.
pub fn head_id(repo: &Repository) -> Result<Oid> {
  Ok(repo.head()?.peel_to_commit()?.id())
}

/// Delete the loose object file for `oid`, simulating truncated history.
///
/// Reopen the repository afterwards (see [`GitRepoTestGuard::reopen`]); an
/// already-open handle may still serve the object from its cache.
pub fn remove_loose_object(repo: &Repository, oid: Oid) -> Result<()> {
  let hex = oid.to_string();
  let object_path = repo.path().join("objects").join(&hex[..2]).join(&hex[2..]);
  fs::remove_file(&object_path).with_context(|| format!("Failed to remove object {}", object_path.display()))?;
  Ok(())
}
