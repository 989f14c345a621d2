//! Utility functions and helpers.
//!
//! - [`bytes`] - Human-readable byte formatting
//! - [`error`] - Error taxonomy and the crate-wide [`Result`](error::Result) alias

pub mod bytes;
pub mod error;
