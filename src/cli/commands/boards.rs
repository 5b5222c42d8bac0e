//! Boards command: export the issues of every agile board.

use super::{GlobalOptions, print_summary};
use crate::boards::export_boards;
use crate::cli::BoardsArgs;
use crate::config::{CliOverrides, ExtractSettings, load_config};
use crate::error::Result;
use crate::fetch::jira::JiraClient;
use crate::flatten::ArrayPolicy;
use crate::logging::RunContext;

/// Execute the boards command.
///
/// # Errors
///
/// Returns an error if no server is configured, the board list cannot be
/// retrieved, or the output cannot be written.
pub fn execute(args: &BoardsArgs, global: &GlobalOptions) -> Result<()> {
    let overrides = CliOverrides {
        server: args.server.server.clone(),
        username: args.server.username.clone(),
        password: args.server.password.clone(),
        block_size: args.block_size,
        ..CliOverrides::default()
    };
    let layer = load_config(global.config.as_deref(), &overrides)?;
    let settings = ExtractSettings::from_layer(&layer)?;

    let client = JiraClient::connect(
        settings.require_server()?,
        settings.username.as_deref(),
        settings.password.as_deref(),
    )?;

    let ctx = RunContext::new("boards");
    let summary = export_boards(
        &client,
        settings.block_size,
        ArrayPolicy::Keep,
        &args.output,
        &ctx,
    )?;
    print_summary(&summary, global)
}
