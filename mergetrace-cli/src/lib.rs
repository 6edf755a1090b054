//! # Mergetrace CLI
//!
//! Command-line front end for `mergetrace-core`: argument parsing, repository
//! acquisition, and table or JSON output.

pub mod acquire;
pub mod cli;
pub mod output;
