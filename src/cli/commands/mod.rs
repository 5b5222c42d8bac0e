//! Subcommand implementations.

pub mod boards;
pub mod completions;
pub mod extract;
pub mod parse;

use crate::error::Result;
use crate::pipeline::RunSummary;
use crate::util::time::format_elapsed;
use std::path::PathBuf;
use std::time::Duration;

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub json: bool,
    pub quiet: bool,
}

/// Print a run summary: JSON on stdout with `--json`, else a short report.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn print_summary(summary: &RunSummary, global: &GlobalOptions) -> Result<()> {
    if global.json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    if global.quiet {
        return Ok(());
    }
    println!(
        "{} in {}",
        summary.describe(),
        format_elapsed(Duration::from_secs_f64(summary.elapsed_secs))
    );
    for path in &summary.files {
        println!("  {}", path.display());
    }
    for skipped in &summary.skipped {
        println!("  skipped {}: {}", skipped.source, skipped.reason);
    }
    if !summary.dropped_columns.is_empty() {
        println!("  dropped late columns: {}", summary.dropped_columns.join(", "));
    }
    Ok(())
}
