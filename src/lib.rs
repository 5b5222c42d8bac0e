//! Jira issue and changelog extraction.
//!
//! Issues are fetched in blocks from a Jira server (or read back from a raw
//! dump), their nested `fields` are flattened into dotted columns, their
//! change histories are expanded into one row per changed field, and both
//! tables can be pseudonymized consistently before being written as CSV.

pub mod anonymize;
pub mod boards;
pub mod changelog;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod flatten;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod reprocess;
pub mod schema;
pub mod sink;
pub mod util;

pub use error::{ErrorCode, ExtractError, Result, StructuredError};
