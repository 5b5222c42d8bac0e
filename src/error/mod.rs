//! Error types and handling for `jira_extract`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Accepts `anyhow` errors at the edges via [`ExtractError::Other`]
//! - Provides recovery hints for user-facing errors
//! - Maps every variant onto a stable [`ErrorCode`] and exit code

mod structured;

pub use structured::{ErrorCode, StructuredError};

use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for extraction and reprocessing runs.
#[derive(Error, Debug)]
pub enum ExtractError {
    // === Tracker Errors ===
    /// The HTTP request could not be sent or its body could not be read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The tracker answered with a non-success status.
    #[error("Tracker responded with {status} for {url}: {body}")]
    Api {
        status: u16,
        url: String,
        body: String,
    },

    /// The tracker answered with a payload of an unexpected shape.
    #[error("Unexpected tracker response from {url}: {reason}")]
    UnexpectedResponse { url: String, reason: String },

    // === Raw Dump Errors ===
    /// A raw dump is missing a required column.
    #[error("Raw dump '{path}' has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },

    /// A raw dump row could not be decoded.
    #[error("Raw dump record {record}: {reason}")]
    RawRecord { record: u64, reason: String },

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // === Validation Errors ===
    /// Argument or field validation failed.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    // === Configuration Errors ===
    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ExtractError {
    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Api { status: 401, .. } => Some("Check --username/--password or JX_USERNAME/JX_PASSWORD"),
            Self::Api { status: 403, .. } => Some("The account lacks permission to browse this project"),
            Self::Api { status: 400 | 404, .. } => Some("Check the project key and the server URL"),
            Self::MissingColumn { .. } => {
                Some("Pass a file produced by 'jx extract' (ending with -raw.csv)")
            }
            _ => None,
        }
    }

    /// Create a validation error for a specific field.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a raw dump decoding error for a CSV record number.
    #[must_use]
    pub fn raw_record(record: u64, reason: impl Into<String>) -> Self {
        Self::RawRecord {
            record,
            reason: reason.into(),
        }
    }
}

/// Result type using `ExtractError`.
pub type Result<T> = std::result::Result<T, ExtractError>;
