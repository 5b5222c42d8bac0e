//! Logging setup and per-run context.
//!
//! Logs go to stderr so CSV and JSON output on stdout stay clean. `RUST_LOG`
//! overrides the verbosity flags.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Once};
use tracing::{Span, info_span};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

use crate::util::progress::should_show_progress;

/// Default filter for a verbosity level.
fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "jira_extract=info,warn",
        1 => "jira_extract=debug,info",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// `-v` enables debug output, `-vv` trace. `--quiet` keeps errors only. With
/// `log_file` set, a JSON copy of every event is appended to that file.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a subscriber is
/// already installed.
pub fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose > 0)
        .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stderr()));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(fmt::layer().json().with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}

/// Subscriber for unit and integration tests; safe to call repeatedly.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Shared state of one command invocation.
#[derive(Debug, Clone)]
pub struct RunContext {
    span: Span,
    show_progress: bool,
}

impl RunContext {
    /// Context for `command`, drawing progress bars on interactive stderr.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            span: info_span!("run", command),
            show_progress: should_show_progress(),
        }
    }

    /// Context without progress output.
    #[must_use]
    pub fn quiet() -> Self {
        Self {
            span: Span::none(),
            show_progress: false,
        }
    }

    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }

    #[must_use]
    pub const fn show_progress(&self) -> bool {
        self.show_progress
    }
}
