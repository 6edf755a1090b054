use std::path::Path;

use assert_cmd::Command;
use mergetrace_test_utils::git::{
  GitRepoTestGuard, checkout_branch, create_branch, create_commit, fast_forward_branch, merge_branch,
};
use predicates::prelude::*;
use tempfile::TempDir;

/// The binary with configuration and cache isolated under `home`.
fn mergetrace(home: &Path) -> Command {
  let mut cmd = Command::new(env!("CARGO_BIN_EXE_mergetrace"));
  cmd
    .env("XDG_CONFIG_HOME", home.join("config"))
    .env("XDG_CACHE_HOME", home.join("cache"))
    .env_remove("MERGETRACE_CONFIG")
    .arg("--colors")
    .arg("never");
  cmd
}

/// `main` with `feature/merged` merged in, `feature/direct` fast-forwarded,
/// and `feature/open` left out.
fn sample_repository() -> GitRepoTestGuard {
  let guard = GitRepoTestGuard::with_origin("git@gitlab.com:team/app.git");
  let repo = &guard.repo;
  create_commit(repo, "base.txt", "base", "initial").unwrap();

  for name in ["feature/direct", "feature/merged", "feature/open"] {
    create_branch(repo, name, Some("main")).unwrap();
    checkout_branch(repo, name).unwrap();
    create_commit(repo, &format!("{}.txt", name.replace('/', "-")), name, name).unwrap();
  }

  checkout_branch(repo, "main").unwrap();
  fast_forward_branch(repo, "main", "feature/direct").unwrap();
  merge_branch(
    repo,
    "feature/merged",
    "Merge branch 'feature/merged' into 'main'\n\nSee merge request team/app!42",
  )
  .unwrap();
  guard
}

#[test]
fn help_lists_commands() {
  let home = TempDir::new().unwrap();
  mergetrace(home.path())
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("check"))
    .stdout(predicate::str::contains("branches"))
    .stdout(predicate::str::contains("repos"))
    .stdout(predicate::str::contains("init"));
}

#[test]
fn init_writes_config_once() {
  let home = TempDir::new().unwrap();
  let config = home.path().join("mergetrace.toml");

  mergetrace(home.path())
    .arg("--config")
    .arg(&config)
    .arg("init")
    .assert()
    .success();
  let written = std::fs::read_to_string(&config).unwrap();
  assert!(written.contains("[platforms.gitlab]"));

  mergetrace(home.path())
    .arg("--config")
    .arg(&config)
    .arg("init")
    .assert()
    .failure()
    .stderr(predicate::str::contains("already exists"));

  mergetrace(home.path())
    .arg("--config")
    .arg(&config)
    .args(["init", "--force"])
    .assert()
    .success();
}

#[test]
fn check_reports_each_branch_as_json() {
  let home = TempDir::new().unwrap();
  let repo = sample_repository();

  let output = mergetrace(home.path())
    .arg("check")
    .arg("feature")
    .arg("--repo")
    .arg(repo.path())
    .args(["--target", "main", "--format", "json"])
    .output()
    .unwrap();
  assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

  let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(report["target"], "main");
  assert_eq!(report["platform"]["key"], "gitlab");

  let results = report["results"].as_array().unwrap();
  let status_of = |branch: &str| {
    results
      .iter()
      .find(|r| r["source_branch"] == branch)
      .map(|r| r["status"].clone())
      .unwrap()
  };
  assert_eq!(status_of("feature/direct")["status"], "merged");
  assert_eq!(status_of("feature/direct")["kind"], "direct");
  assert_eq!(status_of("feature/merged")["kind"], "merge");
  assert_eq!(status_of("feature/open")["status"], "not_merged");

  let merged = results.iter().find(|r| r["source_branch"] == "feature/merged").unwrap();
  assert_eq!(
    merged["links"]["merge_request"],
    "https://gitlab.com/team/app/-/merge_requests/42"
  );
}

#[test]
fn check_prints_a_table() {
  let home = TempDir::new().unwrap();
  let repo = sample_repository();

  mergetrace(home.path())
    .arg("check")
    .arg("FEATURE")
    .arg("--repo")
    .arg(repo.path())
    .args(["--sort", "merged"])
    .assert()
    .success()
    .stdout(predicate::str::contains("feature/open"))
    .stdout(predicate::str::contains("not merged"))
    .stdout(predicate::str::contains("!42"))
    .stdout(predicate::str::contains("2 merged, 1 not merged, 0 unknown"));
}

#[test]
fn check_fails_for_missing_target() {
  let home = TempDir::new().unwrap();
  let repo = sample_repository();

  mergetrace(home.path())
    .arg("check")
    .arg("feature")
    .arg("--repo")
    .arg(repo.path())
    .args(["--target", "release"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("release"));
}

#[test]
fn check_fails_for_unreadable_repository() {
  let home = TempDir::new().unwrap();
  let missing = home.path().join("not-a-repo");

  mergetrace(home.path())
    .arg("check")
    .arg("feature")
    .arg("--repo")
    .arg(&missing)
    .assert()
    .failure();
}

#[test]
fn branches_lists_newest_first_as_json() {
  let home = TempDir::new().unwrap();
  let repo = sample_repository();

  let output = mergetrace(home.path())
    .arg("branches")
    .arg("--repo")
    .arg(repo.path())
    .args(["--local-only", "--format", "json"])
    .output()
    .unwrap();
  assert!(output.status.success());

  let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let listing = listing.as_array().unwrap();
  assert_eq!(listing.len(), 4);
  assert_eq!(listing[0]["index"], 1);
  assert!(listing.iter().any(|b| b["name"] == "feature/open"));
}

#[test]
fn repos_lists_saved_presets() {
  let home = TempDir::new().unwrap();
  let config = home.path().join("mergetrace.toml");
  std::fs::write(
    &config,
    r#"
[[repositories]]
name = "app"
url = "git@gitlab.com:team/app.git"
"#,
  )
  .unwrap();

  mergetrace(home.path())
    .arg("--config")
    .arg(&config)
    .arg("repos")
    .assert()
    .success()
    .stdout(predicate::str::contains("app"))
    .stdout(predicate::str::contains("GitLab"));
}
