//! Extract command: fetch from Jira and write the two tables.

use super::{GlobalOptions, print_summary};
use crate::cli::ExtractArgs;
use crate::config::{CliOverrides, ExtractSettings, load_config};
use crate::error::Result;
use crate::fetch::Scope;
use crate::fetch::jira::JiraClient;
use crate::flatten::ArrayPolicy;
use crate::logging::RunContext;
use crate::pipeline::{ExtractOptions, run_extract};
use crate::util::time::DateRange;
use tracing::info;

/// Execute the extract command.
///
/// # Errors
///
/// Returns an error if the arguments or configuration are invalid, or the
/// extraction fails.
pub fn execute(args: &ExtractArgs, global: &GlobalOptions) -> Result<()> {
    // Validate cheap inputs before touching the network.
    let range = DateRange::parse(args.start.as_deref(), args.end.as_deref())?;
    let settings = resolve_settings(args, global)?;
    let server = settings.require_server()?;

    let options = ExtractOptions {
        scope: Scope::from_key(args.project.as_deref()),
        range,
        anonymize: args.anonymize,
        streaming: args.streaming,
        arrays: if args.explode_arrays {
            ArrayPolicy::Explode
        } else {
            ArrayPolicy::Keep
        },
    };

    info!(server, "Connecting to Jira");
    let client = JiraClient::connect(
        server,
        settings.username.as_deref(),
        settings.password.as_deref(),
    )?;

    let ctx = RunContext::new("extract");
    let summary = run_extract(&client, &settings, &options, &ctx)?;
    print_summary(&summary, global)
}

fn resolve_settings(args: &ExtractArgs, global: &GlobalOptions) -> Result<ExtractSettings> {
    let overrides = CliOverrides {
        server: args.server.server.clone(),
        username: args.server.username.clone(),
        password: args.server.password.clone(),
        block_size: args.block_size,
        issue_file: args.issue_file.clone(),
        changelog_file: args.changelog_file.clone(),
        out_dir: args.out_dir.clone(),
    };
    let layer = load_config(global.config.as_deref(), &overrides)?;
    ExtractSettings::from_layer(&layer)
}
