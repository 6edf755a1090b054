//! Read-only access to a repository's commit graph.
//!
//! [`CommitGraphReader`] owns one `git2::Repository` handle and caches every
//! commit it reads, plus ancestry answers, for the lifetime of the reader (one
//! analysis session). It never writes to the repository.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use git2::{BranchType, ErrorClass, ErrorCode, Repository, Sort};
use tracing::{debug, trace, warn};

use super::branches::{Branch, BranchKind};
use super::commit::{CommitId, CommitRef};
use crate::error::{AnalysisError, Result};

/// Remote consulted first when looking for the repository's hosting URL.
pub const DEFAULT_REMOTE: &str = "origin";

/// Commit-graph queries over one repository.
pub struct CommitGraphReader {
  repo: Repository,
  path: PathBuf,
  commits: RefCell<HashMap<CommitId, CommitRef>>,
  ancestry: RefCell<HashMap<(CommitId, CommitId), bool>>,
}

impl CommitGraphReader {
  /// Open the repository at `path` (a working tree or a bare repository).
  ///
  /// The path is used as-is; parent directories are not searched.
  pub fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let repo = Repository::open(path).map_err(|source| AnalysisError::RepositoryUnreadable {
      path: path.to_path_buf(),
      source,
    })?;

    // A repository whose object database cannot be opened is as good as absent.
    repo.odb().map_err(|source| AnalysisError::RepositoryUnreadable {
      path: path.to_path_buf(),
      source,
    })?;

    debug!(path = %path.display(), bare = repo.is_bare(), "Opened repository");
    Ok(Self::from_repository(repo))
  }

  /// Wrap an already opened repository.
  pub fn from_repository(repo: Repository) -> Self {
    let path = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
    Self {
      repo,
      path,
      commits: RefCell::new(HashMap::new()),
      ancestry: RefCell::new(HashMap::new()),
    }
  }

  /// Path the repository was opened from (working directory, or the git
  /// directory for bare repositories).
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Whether history is truncated (shallow clone).
  pub fn is_shallow(&self) -> bool {
    self.repo.is_shallow()
  }

  /// URL of `origin`, falling back to the first remote that has a URL.
  pub fn remote_url(&self) -> Option<String> {
    if let Ok(remote) = self.repo.find_remote(DEFAULT_REMOTE)
      && let Some(url) = remote.url()
    {
      return Some(url.to_string());
    }

    let names = self.repo.remotes().ok()?;
    names
      .iter()
      .flatten()
      .filter_map(|name| self.repo.find_remote(name).ok())
      .find_map(|remote| remote.url().map(str::to_string))
  }

  /// Enumerate branches with their tip commits.
  ///
  /// Local branches come first, then remote-tracking branches. `<remote>/HEAD`
  /// is skipped, as is any remote branch whose short name is already listed.
  pub fn branches(&self, include_remote: bool) -> Result<Vec<Branch>> {
    let mut branches = Vec::new();
    let mut seen = HashSet::new();

    self.collect_branches(BranchType::Local, &mut seen, &mut branches)?;
    if include_remote {
      self.collect_branches(BranchType::Remote, &mut seen, &mut branches)?;
    }

    debug!(count = branches.len(), include_remote, "Enumerated branches");
    Ok(branches)
  }

  fn collect_branches(
    &self,
    branch_type: BranchType,
    seen: &mut HashSet<String>,
    branches: &mut Vec<Branch>,
  ) -> Result<()> {
    let iter = self.repo.branches(Some(branch_type)).map_err(|e| self.unreadable(e))?;

    for item in iter {
      let (branch, _) = item.map_err(|e| self.unreadable(e))?;
      let reference = branch.get();
      let Some(refname) = reference.name().map(str::to_string) else {
        warn!("Skipping branch with a non UTF-8 reference name");
        continue;
      };

      let (name, kind) = match branch_type {
        BranchType::Local => (strip_ref_prefix(&refname, "refs/heads/").to_string(), BranchKind::Local),
        BranchType::Remote => {
          let Some((remote, short)) = self.split_remote_branch(&refname) else {
            continue;
          };
          if short == "HEAD" {
            continue;
          }
          (short, BranchKind::Remote { remote })
        }
      };

      if !seen.insert(name.clone()) {
        trace!(branch = %name, "Skipping duplicate branch name");
        continue;
      }

      let tip = match reference.peel_to_commit() {
        Ok(commit) => self.remember(&commit),
        Err(e) => {
          warn!(branch = %name, error = %e, "Skipping branch whose tip cannot be read");
          continue;
        }
      };

      branches.push(Branch {
        name,
        kind,
        refname,
        tip,
      });
    }

    Ok(())
  }

  /// Split `refs/remotes/<remote>/<branch>` into its remote and branch parts.
  fn split_remote_branch(&self, refname: &str) -> Option<(String, String)> {
    let remote = self
      .repo
      .branch_remote_name(refname)
      .ok()
      .and_then(|buf| buf.as_str().map(str::to_string));

    let rest = strip_ref_prefix(refname, "refs/remotes/");
    match remote {
      Some(remote) => {
        let short = rest.strip_prefix(&format!("{remote}/"))?.to_string();
        Some((remote, short))
      }
      None => rest
        .split_once('/')
        .map(|(remote, short)| (remote.to_string(), short.to_string())),
    }
  }

  /// Look up a branch by name: a local branch first, then the same name on
  /// any remote. A remote-qualified name such as `origin/main` is also
  /// accepted.
  pub fn find_branch(&self, name: &str) -> Result<Branch> {
    let not_found = || AnalysisError::BranchNotFound { name: name.to_string() };

    if let Ok(branch) = self.repo.find_branch(name, BranchType::Local) {
      let commit = branch.get().peel_to_commit().map_err(|e| self.unreadable_tip(name, &e))?;
      return Ok(Branch {
        name: name.to_string(),
        kind: BranchKind::Local,
        refname: format!("refs/heads/{name}"),
        tip: self.remember(&commit),
      });
    }

    let mut candidates = Vec::new();
    if let Ok(remotes) = self.repo.remotes() {
      candidates.extend(remotes.iter().flatten().map(|remote| format!("{remote}/{name}")));
    }
    candidates.push(name.to_string());

    for candidate in candidates {
      let refname = format!("refs/remotes/{candidate}");
      let Ok(branch) = self.repo.find_branch(&candidate, BranchType::Remote) else {
        continue;
      };
      let Some((remote, short)) = self.split_remote_branch(&refname) else {
        continue;
      };
      let commit = branch.get().peel_to_commit().map_err(|e| self.unreadable_tip(name, &e))?;
      return Ok(Branch {
        name: short,
        kind: BranchKind::Remote { remote },
        refname,
        tip: self.remember(&commit),
      });
    }

    Err(not_found())
  }

  /// Commit metadata by id.
  pub fn commit(&self, id: CommitId) -> Result<CommitRef> {
    if let Some(commit) = self.commits.borrow().get(&id) {
      return Ok(commit.clone());
    }

    let commit = self
      .repo
      .find_commit(id.oid())
      .map_err(|e| AnalysisError::ancestry(format!("reading commit {}", id.short()), &e))?;
    Ok(self.remember(&commit))
  }

  /// Commit metadata by (possibly abbreviated) hexadecimal hash.
  pub fn commit_by_hash(&self, hash: &str) -> Result<CommitRef> {
    let object = self
      .repo
      .revparse_single(hash)
      .and_then(|object| object.peel_to_commit())
      .map_err(|e| AnalysisError::ancestry(format!("resolving {hash}"), &e))?;
    Ok(self.remember(&object))
  }

  /// Whether `ancestor` is reachable from `descendant` by following parent
  /// links. A commit counts as its own ancestor.
  pub fn is_ancestor(&self, ancestor: CommitId, descendant: CommitId) -> Result<bool> {
    if ancestor == descendant {
      return Ok(true);
    }

    let key = (ancestor, descendant);
    if let Some(answer) = self.ancestry.borrow().get(&key) {
      return Ok(*answer);
    }

    let answer = self
      .repo
      .graph_descendant_of(descendant.oid(), ancestor.oid())
      .map_err(|e| {
        AnalysisError::ancestry(
          format!("checking {} against {}", ancestor.short(), descendant.short()),
          &e,
        )
      })?;
    self.ancestry.borrow_mut().insert(key, answer);
    Ok(answer)
  }

  /// Lowest common ancestor of two commits, or `None` when their histories are
  /// disjoint.
  pub fn merge_base(&self, a: CommitId, b: CommitId) -> Result<Option<CommitId>> {
    match self.repo.merge_base(a.oid(), b.oid()) {
      Ok(oid) => Ok(Some(CommitId::new(oid))),
      Err(e) if e.code() == ErrorCode::NotFound && e.class() == ErrorClass::Merge => Ok(None),
      Err(e) => Err(AnalysisError::ancestry(
        format!("computing merge base of {} and {}", a.short(), b.short()),
        &e,
      )),
    }
  }

  /// Commits reachable from `tip` but not from `ancestor`, children before
  /// parents. Fails when more than `limit` commits qualify.
  pub fn commits_since(&self, ancestor: CommitId, tip: CommitId, limit: usize) -> Result<Vec<CommitId>> {
    let context = || format!("walking {}..{}", ancestor.short(), tip.short());
    let mut walk = self.repo.revwalk().map_err(|e| AnalysisError::ancestry(context(), &e))?;
    walk
      .set_sorting(Sort::TOPOLOGICAL)
      .and_then(|()| walk.push(tip.oid()))
      .and_then(|()| walk.hide(ancestor.oid()))
      .map_err(|e| AnalysisError::ancestry(context(), &e))?;

    let mut ids = Vec::new();
    for oid in walk {
      let oid = oid.map_err(|e| AnalysisError::ancestry(context(), &e))?;
      if ids.len() == limit {
        return Err(AnalysisError::AncestryUnavailable {
          reason: format!("more than {limit} commits between {} and {}", ancestor.short(), tip.short()),
        });
      }
      ids.push(CommitId::new(oid));
    }
    trace!(ancestor = %ancestor.short(), tip = %tip.short(), count = ids.len(), "Walked commit range");
    Ok(ids)
  }

  #[cfg(test)]
  fn cached_commits(&self) -> usize {
    self.commits.borrow().len()
  }

  fn remember(&self, commit: &git2::Commit<'_>) -> CommitRef {
    let record = CommitRef::from_git(commit);
    self.commits.borrow_mut().insert(record.id, record.clone());
    record
  }

  fn unreadable_tip(&self, branch: &str, source: &git2::Error) -> AnalysisError {
    AnalysisError::ancestry(format!("reading tip of '{branch}'"), source)
  }

  fn unreadable(&self, source: git2::Error) -> AnalysisError {
    AnalysisError::RepositoryUnreadable {
      path: self.path.clone(),
      source,
    }
  }
}

fn strip_ref_prefix<'a>(refname: &'a str, prefix: &str) -> &'a str {
  refname.strip_prefix(prefix).unwrap_or(refname)
}
