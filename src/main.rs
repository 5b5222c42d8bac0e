use clap::Parser;
use jira_extract::cli::commands::{self, GlobalOptions};
use jira_extract::cli::{Cli, Commands};
use jira_extract::logging::init_logging;
use jira_extract::{ExtractError, StructuredError};
use std::io::{self, IsTerminal};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let global = GlobalOptions {
        config: cli.config.clone(),
        json: cli.json,
        quiet: cli.quiet,
    };

    let result = match &cli.command {
        Commands::Extract(args) => commands::extract::execute(args, &global),
        Commands::Parse(args) => commands::parse::execute(args, &global),
        Commands::Boards(args) => commands::boards::execute(args, &global),
        Commands::Completions(args) => commands::completions::execute(args),
    };

    if let Err(e) = result {
        handle_error(&e, cli.json);
    }
}

/// Report an error with its cause chain and exit with its code.
///
/// When --json is set or stdout is not a TTY, outputs structured JSON to stderr.
/// Otherwise, outputs human-readable error with optional color.
fn handle_error(err: &ExtractError, json_mode: bool) -> ! {
    let structured = StructuredError::from_error(err);
    tracing::error!(error = %err, causes = ?structured.causes, "Run failed");
    let exit_code = structured.code.exit_code();

    let use_json = json_mode || !io::stdout().is_terminal();

    if use_json {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        let use_color = io::stderr().is_terminal();
        eprintln!("{}", structured.to_human(use_color));
    }

    std::process::exit(exit_code);
}
