//! Git history access for merge analysis.
//!
//! The module is split into focused submodules: commit records, branch
//! records with keyword selection, and the read-only graph reader.

pub mod branches;
pub mod commit;
pub mod reader;

pub use branches::{Branch, BranchKind, BranchMatcher};
pub use commit::{CommitId, CommitRef, Identity};
pub use reader::{CommitGraphReader, DEFAULT_REMOTE};
