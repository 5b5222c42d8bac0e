//! Progress indicators for parsing, chunking and board export.
//!
//! Bars are drawn only when stderr is an interactive terminal, so piped runs
//! and tests stay quiet.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{IsTerminal, stderr};
use std::time::Duration;

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} ({pos} issues)";

/// Whether stderr can take progress output.
#[must_use]
pub fn should_show_progress() -> bool {
    stderr().is_terminal()
}

fn hidden(pb: ProgressBar) -> ProgressBar {
    pb.set_draw_target(ProgressDrawTarget::hidden());
    pb
}

/// Determinate bar over `total` units, hidden unless `show`.
#[must_use]
pub fn create_progress_bar(total: u64, message: &str, show: bool) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if !show {
        return hidden(pb);
    }
    if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.set_message(message.to_string());
    pb
}

/// Issue counter for paging with no known total.
#[must_use]
pub fn create_spinner(message: &str, show: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if !show {
        return hidden(pb);
    }
    if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
