//! Test utilities shared across the mergetrace workspace
//!
//! This crate provides common testing infrastructure including:
//! - Temporary git repositories ([`GitRepoTestGuard`]) with helpers for
//!   building commit graphs (commits, branches, merges, fast-forwards)
//! - XDG directory isolation ([`EnvTestGuard`])
//!
//! The clippy dead_code lint is disabled for this crate because test utilities
//! may not be used by all tests, and the compiler cannot detect usage across
//! crate boundaries in development dependencies.

#![allow(dead_code)]

pub mod env;
pub mod git;

// Re-export commonly used items
pub use env::EnvTestGuard;
pub use git::{
  GitRepoTestGuard, checkout_branch, create_branch, create_commit, fast_forward_branch, head_id, merge_branch,
  remove_loose_object,
};
