//! # Mergetrace Core Library
//!
//! Read-only merge-status analysis over git commit graphs, plus link
//! synthesis for the hosting platform a repository lives on.
//!
//! The flow for one request is: [`CommitGraphReader`] lists branches,
//! [`BranchMatcher`] selects those matching a keyword,
//! [`MergeStatusChecker`] classifies each against the target branch, and
//! [`LinkEnricher`] attaches commit and merge-request links resolved by
//! [`PlatformResolver`]. [`analyze_repository`] runs the whole flow with
//! bounded concurrency and per-branch timeouts.

pub mod config;
pub mod error;
pub mod git;
pub mod links;
pub mod location;
pub mod merge;
pub mod platform;

pub use config::{AnalysisSettings, ConfigDirs, RepositoryPreset, Settings};
pub use error::{AnalysisError, Result};
pub use git::{Branch, BranchKind, BranchMatcher, CommitGraphReader, CommitId, CommitRef, Identity};
pub use links::{LinkEnricher, LinkSet};
pub use location::{LocationSource, RemoteScheme, RepositoryLocation};
pub use merge::{
  AnalysisReport, AnalysisRequest, BatchOptions, CancellationFlag, CheckOptions, MergeCheckResult, MergeDetails,
  MergeKind, MergeStatus, MergeStatusChecker, analyze_repository,
};
pub use platform::{
  MergeRequestRef, PlatformConfig, PlatformResolver, PlatformTable, ReferenceStyle, ResolvedPlatform,
};
