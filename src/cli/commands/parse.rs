//! Parse command: rebuild the tables from a raw dump.

use super::{GlobalOptions, print_summary};
use crate::cli::ParseArgs;
use crate::config::{CliOverrides, ExtractSettings, load_config};
use crate::error::Result;
use crate::flatten::ArrayPolicy;
use crate::logging::RunContext;
use crate::reprocess::{ReprocessOptions, reprocess};

/// Execute the parse command.
///
/// # Errors
///
/// Returns an error if the dump cannot be read or decoded, or the output
/// cannot be written.
pub fn execute(args: &ParseArgs, global: &GlobalOptions) -> Result<()> {
    let layer = load_config(global.config.as_deref(), &CliOverrides::default())?;
    let settings = ExtractSettings::from_layer(&layer)?;

    let options = ReprocessOptions {
        split: args.split,
        anonymize: args.anonymize,
        keep_chunks: args.keep_chunks,
        arrays: if args.explode_arrays {
            ArrayPolicy::Explode
        } else {
            ArrayPolicy::Keep
        },
        identity: settings.identity,
    };

    let ctx = RunContext::new("parse");
    let summary = reprocess(&args.file, &options, &ctx)?;
    print_summary(&summary, global)
}
