//! # Branches Command
//!
//! Lists the branches of a repository, newest tip first.

use anyhow::Result;
use clap::Args;
use mergetrace_core::{Branch, CommitGraphReader, Settings};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::{locate_repository, repository_label};
use crate::output::{OutputFormat, format_repo_name, format_timestamp, print_header, print_info, truncate};

/// Command for listing branches
#[derive(Args)]
pub struct BranchesArgs {
  /// Repository path, URL or saved preset (defaults to current repository)
  #[arg(long, short = 'r', value_name = "PATH|URL|PRESET")]
  pub repo: Option<String>,

  /// Only list local branches
  #[arg(long = "local-only")]
  pub local_only: bool,

  /// Output format
  #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Text)]
  pub format: OutputFormat,
}

/// One line of the listing
#[derive(Serialize, Tabled)]
pub struct BranchListing {
  #[tabled(rename = "#")]
  pub index: usize,
  #[tabled(rename = "Branch")]
  pub name: String,
  #[tabled(rename = "Kind")]
  pub kind: String,
  #[tabled(rename = "Tip")]
  pub tip: String,
  #[tabled(rename = "Date")]
  pub date: String,
  #[tabled(rename = "Author")]
  pub author: String,
  #[tabled(rename = "Subject")]
  pub subject: String,
}

pub(crate) fn handle_branches_command(args: BranchesArgs, settings: &Settings) -> Result<()> {
  let (location, path) = locate_repository(settings, args.repo.as_deref())?;
  let reader = CommitGraphReader::open(&path)?;
  let listing = list_branches(reader.branches(!args.local_only)?);

  match args.format {
    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
    OutputFormat::Text => {
      print_header("Branches");
      println!("{}", format_repo_name(&repository_label(&location)));
      if listing.is_empty() {
        print_info("No branches found");
      } else {
        println!("{}", Table::new(listing).with(Style::sharp()));
      }
    }
  }

  Ok(())
}

/// Newest tip first, numbered from 1.
fn list_branches(mut branches: Vec<Branch>) -> Vec<BranchListing> {
  branches.sort_by(|a, b| b.tip.committed_at.cmp(&a.tip.committed_at));
  branches
    .into_iter()
    .enumerate()
    .map(|(i, branch)| BranchListing {
      index: i + 1,
      name: branch.display_name(),
      kind: branch.kind.to_string(),
      tip: branch.tip.id.short(),
      date: format_timestamp(branch.tip.committed_at),
      author: branch.tip.author.name.clone(),
      subject: truncate(branch.tip.summary(), 60),
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use mergetrace_test_utils::git::{GitRepoTestGuard, checkout_branch, create_branch, create_commit};

  use super::*;

  #[test]
  fn newest_branch_is_listed_first() {
    let guard = GitRepoTestGuard::new();
    let repo = &guard.repo;
    create_commit(repo, "base.txt", "base", "initial").unwrap();
    create_branch(repo, "feature/late", None).unwrap();
    checkout_branch(repo, "feature/late").unwrap();
    std::thread::sleep(std::time::Duration::from_millis(1100));
    create_commit(repo, "late.txt", "late", "Add late work").unwrap();

    let reader = CommitGraphReader::open(guard.path()).unwrap();
    let listing = list_branches(reader.branches(false).unwrap());

    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].index, 1);
    assert_eq!(listing[0].name, "feature/late");
    assert_eq!(listing[0].kind, "local");
    assert_eq!(listing[0].subject, "Add late work");
    assert_eq!(listing[0].author, "Test User");
    assert_eq!(listing[1].name, "main");
  }
}
