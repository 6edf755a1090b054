//! # Check Command
//!
//! Runs the merge analysis for one repository and prints the findings.

use std::cmp::Ordering;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Args, ValueEnum};
use mergetrace_core::{
  AnalysisReport, AnalysisRequest, BatchOptions, MergeCheckResult, MergeStatus, Settings, analyze_repository,
};
use owo_colors::OwoColorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tokio::runtime::Runtime;

use super::{locate_repository, repository_label};
use crate::output::{
  OutputFormat, format_link, format_repo_name, format_status, format_timestamp, print_header, print_info,
  print_warning, truncate,
};

/// Order of rows in the output
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
  /// Branch enumeration order
  #[default]
  Enumeration,
  /// Merged branches first, most recently merged first
  Merged,
}

/// Command for checking merge status
#[derive(Args)]
pub struct CheckArgs {
  /// Keyword matched case-insensitively against branch names
  #[arg(value_name = "KEYWORD")]
  pub keyword: String,

  /// Branch the matching branches are checked against
  #[arg(long, short = 't', value_name = "BRANCH", default_value = "main")]
  pub target: String,

  /// Repository path, URL or saved preset (defaults to current repository)
  #[arg(long, short = 'r', value_name = "PATH|URL|PRESET")]
  pub repo: Option<String>,

  /// Seconds allowed per branch check; 0 disables the limit
  #[arg(long, value_name = "SECS")]
  pub timeout: Option<u64>,

  /// Number of branches checked at once
  #[arg(long, short = 'j', value_name = "N")]
  pub jobs: Option<usize>,

  /// Only consider local branches
  #[arg(long = "local-only")]
  pub local_only: bool,

  /// Row order
  #[arg(long, value_enum, default_value_t = SortOrder::Enumeration)]
  pub sort: SortOrder,

  /// Output format
  #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Text)]
  pub format: OutputFormat,
}

impl CheckArgs {
  fn batch_options(&self, settings: &Settings) -> Result<BatchOptions> {
    let mut options = BatchOptions::from(&settings.analysis);
    if let Some(secs) = self.timeout {
      options.timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }
    if let Some(jobs) = self.jobs {
      if jobs == 0 {
        bail!("--jobs must be at least 1");
      }
      options.jobs = jobs;
    }
    if self.local_only {
      options.include_remote = false;
    }
    Ok(options)
  }
}

pub(crate) fn handle_check_command(args: CheckArgs, settings: &Settings) -> Result<()> {
  let options = args.batch_options(settings)?;
  let (location, path) = locate_repository(settings, args.repo.as_deref())?;
  let label = repository_label(&location);

  let request = AnalysisRequest {
    keyword: args.keyword.clone(),
    target: args.target.clone(),
    location,
  };

  let rt = Runtime::new()?;
  let mut report = rt.block_on(analyze_repository(&path, &request, &settings.platforms, &options))?;

  if args.sort == SortOrder::Merged {
    sort_merged_first(&mut report.results);
  }

  match args.format {
    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    OutputFormat::Text => display_report(&report, &label, &args.keyword),
  }

  Ok(())
}

/// Merged results first, newest merge first; the rest keep their order.
pub(crate) fn sort_merged_first(results: &mut [MergeCheckResult]) {
  results.sort_by(|a, b| match (a.merged_at(), b.merged_at()) {
    (Some(a), Some(b)) => b.cmp(&a),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  });
}

#[derive(Tabled)]
struct CheckRow {
  #[tabled(rename = "Branch")]
  branch: String,
  #[tabled(rename = "Status")]
  status: String,
  #[tabled(rename = "Merged At")]
  merged_at: String,
  #[tabled(rename = "Merged By")]
  merged_by: String,
  #[tabled(rename = "Commit")]
  commit: String,
  #[tabled(rename = "Request")]
  request: String,
  #[tabled(rename = "Link")]
  link: String,
}

impl From<&MergeCheckResult> for CheckRow {
  fn from(result: &MergeCheckResult) -> Self {
    let details = result.details();
    let links = result.links.as_ref();
    let link = links.and_then(|links| links.merge_request.as_deref().or(links.commit.as_deref()));

    Self {
      branch: result.source_branch.clone(),
      status: format_status(&result.status),
      merged_at: details.map_or_else(|| "-".into(), |d| format_timestamp(d.merged_at)),
      merged_by: details.map_or_else(|| "-".into(), |d| truncate(&d.merged_by.name, 24)),
      commit: details.map_or_else(|| "-".into(), |d| d.commit.id.short()),
      request: details
        .and_then(|d| d.request.as_ref())
        .map_or_else(|| "-".into(), |r| r.label.clone()),
      link: format_link(link),
    }
  }
}

fn display_report(report: &AnalysisReport, label: &str, keyword: &str) {
  print_header(&format!("Branches matching '{keyword}' against {}", report.target));
  let platform = report.platform.as_ref().map_or("unrecognized platform", |p| p.name());
  println!("{} ({})", format_repo_name(label), platform.dimmed());

  if report.results.is_empty() {
    print_info(&format!("No branches match '{keyword}'"));
    return;
  }

  let rows: Vec<CheckRow> = report.results.iter().map(CheckRow::from).collect();
  println!("{}", Table::new(rows).with(Style::sharp()));

  for result in &report.results {
    if let MergeStatus::Unknown { reason } = &result.status {
      print_warning(&format!("{}: {reason}", result.source_branch));
    }
  }
  if report.shallow {
    print_warning("Repository history is shallow; branches that are not found merged are reported as unknown");
  }

  let merged = report.results.iter().filter(|r| r.is_merged()).count();
  let not_merged = report
    .results
    .iter()
    .filter(|r| matches!(r.status, MergeStatus::NotMerged))
    .count();
  let unknown = report.results.len() - merged - not_merged;
  print_info(&format!("{merged} merged, {not_merged} not merged, {unknown} unknown"));
}

#[cfg(test)]
mod tests {
  use mergetrace_core::{CommitGraphReader, MergeStatusChecker};
  use mergetrace_test_utils::git::{
    GitRepoTestGuard, checkout_branch, create_branch, create_commit, fast_forward_branch, merge_branch,
  };

  use super::*;

  fn results() -> Vec<MergeCheckResult> {
    let guard = GitRepoTestGuard::new();
    let repo = &guard.repo;
    create_commit(repo, "base.txt", "base", "initial").unwrap();
    for name in ["feature/open", "feature/old", "feature/new"] {
      create_branch(repo, name, Some("main")).unwrap();
      checkout_branch(repo, name).unwrap();
      create_commit(repo, &format!("{}.txt", name.replace('/', "-")), name, name).unwrap();
    }
    checkout_branch(repo, "main").unwrap();
    fast_forward_branch(repo, "main", "feature/old").unwrap();
    checkout_branch(repo, "main").unwrap();
    // Committed after feature/old, so it carries the later merge date.
    std::thread::sleep(std::time::Duration::from_millis(1100));
    merge_branch(repo, "feature/new", "Merge branch 'feature/new'").unwrap();

    let reader = CommitGraphReader::open(guard.path()).unwrap();
    let target = reader.find_branch("main").unwrap();
    let mut sources: Vec<_> = reader
      .branches(false)
      .unwrap()
      .into_iter()
      .filter(|b| b.name.starts_with("feature/"))
      .collect();
    sources.sort_by(|a, b| b.name.cmp(&a.name));
    MergeStatusChecker::new(&reader, Default::default()).check_all(&sources, &target)
  }

  #[test]
  fn merged_first_puts_newest_merge_on_top() {
    let mut results = results();
    let names: Vec<_> = results.iter().map(|r| r.source_branch.as_str()).collect();
    assert_eq!(names, ["feature/open", "feature/old", "feature/new"]);

    sort_merged_first(&mut results);
    let names: Vec<_> = results.iter().map(|r| r.source_branch.as_str()).collect();
    assert_eq!(names, ["feature/new", "feature/old", "feature/open"]);
    assert!(results[0].merged_at() > results[1].merged_at());
    assert!(!results[2].is_merged());
  }

  #[test]
  fn rows_show_dashes_for_unmerged_branches() {
    owo_colors::set_override(false);
    let results = results();
    let open = results.iter().find(|r| r.source_branch == "feature/open").unwrap();
    let row = CheckRow::from(open);
    assert_eq!(row.status, "not merged");
    assert_eq!(row.commit, "-");
    assert_eq!(row.link, "-");

    let merged = results.iter().find(|r| r.source_branch == "feature/new").unwrap();
    let row = CheckRow::from(merged);
    assert_eq!(row.status, "merged");
    assert_eq!(row.commit.len(), 8);
  }

  #[test]
  fn zero_jobs_is_rejected() {
    let args = CheckArgs {
      keyword: "feature".into(),
      target: "main".into(),
      repo: None,
      timeout: Some(0),
      jobs: Some(0),
      local_only: true,
      sort: SortOrder::Enumeration,
      format: OutputFormat::Text,
    };
    assert!(args.batch_options(&Settings::default()).is_err());

    let args = CheckArgs { jobs: Some(2), ..args };
    let options = args.batch_options(&Settings::default()).unwrap();
    assert_eq!(options.jobs, 2);
    assert!(options.timeout.is_none());
    assert!(!options.include_remote);
  }
}
