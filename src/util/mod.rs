//! Shared utilities for `jira_extract`.
//!
//! - Date-range parsing and elapsed-time formatting
//! - Progress indicators (for long-running operations)
//! - Output file naming

pub mod progress;
pub mod time;

use std::path::{Path, PathBuf};

/// Host part of a server URL without the port, e.g. `jira.atlassian.com`.
///
/// Falls back to a filesystem-safe rendering of the whole string when it is
/// not a URL.
#[must_use]
pub fn server_domain(server: &str) -> String {
    reqwest::Url::parse(server)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| {
            server
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '.' { c } else { '_' })
                .collect()
        })
}

/// Output path `{dir}/{domain}-{project}-{file}`.
#[must_use]
pub fn prefixed_output(dir: &Path, domain: &str, project: &str, file: &str) -> PathBuf {
    dir.join(format!("{domain}-{project}-{file}"))
}

/// Append a suffix to a path's file name: `X-raw.csv` + `issues0.csv` ->
/// `X-raw.csvissues0.csv`.
#[must_use]
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
