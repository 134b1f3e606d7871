//! Test harnesses for apiweld.
//!
//! Provides `SpecWorkspace`, a scratch directory of spec files for
//! multi-file bundling and proxy compilation tests.

#[cfg(test)]
pub mod cli;
pub mod workspace;

pub use workspace::{SpecWorkspace, TestError};
