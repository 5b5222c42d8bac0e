//! Structured error output.
//!
//! Provides machine-parseable error information with:
//! - Error codes for categorization
//! - Hints for self-correction
//! - Retryability flags
//! - Context for debugging

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Machine-readable error codes.
///
/// These codes are stable and can be used for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // === Tracker Errors (exit code 2) ===
    /// Request could not be completed
    NetworkError,
    /// Credentials rejected
    AuthFailed,
    /// Tracker returned an error status
    ApiError,
    /// Tracker returned an unexpected payload
    UnexpectedResponse,

    // === Validation Errors (exit code 4) ===
    /// Argument validation failed
    ValidationFailed,

    // === Raw Dump Errors (exit code 6) ===
    /// Required column missing from raw dump
    MissingColumn,
    /// Raw dump row could not be decoded
    RawRecordError,
    /// CSV read/write failed
    CsvError,

    // === Config Errors (exit code 7) ===
    /// Configuration error
    ConfigError,

    // === I/O Errors (exit code 8) ===
    /// File I/O error
    IoError,
    /// JSON serialization error
    JsonError,
    /// YAML parsing error
    YamlError,

    // === Internal Errors (exit code 1) ===
    /// Unexpected internal error
    InternalError,
}

impl ErrorCode {
    /// Get the string representation for JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::AuthFailed => "AUTH_FAILED",
            Self::ApiError => "API_ERROR",
            Self::UnexpectedResponse => "UNEXPECTED_RESPONSE",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::MissingColumn => "MISSING_COLUMN",
            Self::RawRecordError => "RAW_RECORD_ERROR",
            Self::CsvError => "CSV_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::YamlError => "YAML_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether this error is potentially retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::ValidationFailed)
    }

    /// Get the exit code for this error category.
    ///
    /// - 1: Internal/unknown errors
    /// - 2: Tracker errors
    /// - 4: Validation errors
    /// - 6: Raw dump errors
    /// - 7: Config errors
    /// - 8: I/O errors
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::NetworkError | Self::AuthFailed | Self::ApiError | Self::UnexpectedResponse => 2,
            Self::ValidationFailed => 4,
            Self::MissingColumn | Self::RawRecordError | Self::CsvError => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError | Self::YamlError => 8,
            Self::InternalError => 1,
        }
    }
}

/// Structured error for machine-parseable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional hint for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether the operation can be retried
    pub retryable: bool,
    /// Additional context data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    /// Underlying causes, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl StructuredError {
    /// Create a new structured error from an `ExtractError`.
    #[must_use]
    pub fn from_error(err: &ExtractError) -> Self {
        let (code, context) = Self::extract_code_and_context(err);

        let message = err.to_string();
        let causes = cause_chain(err, &message);

        Self {
            code,
            message,
            hint: err.suggestion().map(str::to_string),
            retryable: code.is_retryable(),
            context,
            causes,
        }
    }

    /// Serialize to JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "hint": self.hint,
                "retryable": self.retryable,
                "context": self.context,
                "causes": self.causes,
            }
        })
    }

    /// Format for human-readable output.
    #[must_use]
    pub fn to_human(&self, color: bool) -> String {
        let mut output = String::new();

        if color {
            output.push_str("\x1b[31mError:\x1b[0m ");
        } else {
            output.push_str("Error: ");
        }

        output.push_str(&self.message);

        for cause in &self.causes {
            output.push_str("\n  Caused by: ");
            output.push_str(cause);
        }

        if let Some(hint) = &self.hint {
            output.push('\n');
            if color {
                output.push_str("\x1b[33mHint:\x1b[0m ");
            } else {
                output.push_str("Hint: ");
            }
            output.push_str(hint);
        }

        output
    }

    fn extract_code_and_context(err: &ExtractError) -> (ErrorCode, Option<Value>) {
        match err {
            ExtractError::Http(e) => (
                ErrorCode::NetworkError,
                e.url().map(|url| json!({"url": url.as_str()})),
            ),
            ExtractError::Api { status, url, .. } => {
                let code = if matches!(status, 401 | 403) {
                    ErrorCode::AuthFailed
                } else {
                    ErrorCode::ApiError
                };
                (code, Some(json!({"status": status, "url": url})))
            }
            ExtractError::UnexpectedResponse { url, .. } => {
                (ErrorCode::UnexpectedResponse, Some(json!({"url": url})))
            }
            ExtractError::MissingColumn { path, column } => (
                ErrorCode::MissingColumn,
                Some(json!({"path": path.display().to_string(), "column": column})),
            ),
            ExtractError::RawRecord { record, .. } => {
                (ErrorCode::RawRecordError, Some(json!({"record": record})))
            }
            ExtractError::Csv(_) => (ErrorCode::CsvError, None),
            ExtractError::Validation { field, .. } => {
                (ErrorCode::ValidationFailed, Some(json!({"field": field})))
            }
            ExtractError::Config(_) => (ErrorCode::ConfigError, None),
            ExtractError::Io(_) => (ErrorCode::IoError, None),
            ExtractError::Json(_) => (ErrorCode::JsonError, None),
            ExtractError::Yaml(_) => (ErrorCode::YamlError, None),
            ExtractError::Other(_) => (ErrorCode::InternalError, None),
        }
    }
}

/// Messages of `err`'s sources, skipping text already shown in `message`.
fn cause_chain(err: &ExtractError, message: &str) -> Vec<String> {
    let mut causes: Vec<String> = Vec::new();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) && !causes.contains(&text) {
            causes.push(text);
        }
        source = cause.source();
    }
    causes
}
