//! Shell completions generation command.
//!
//! ```bash
//! jx completions bash > ~/.local/share/bash-completion/completions/jx
//! jx completions zsh -o ~/.zsh/completions/_jx
//! ```

use crate::cli::{Cli, CompletionsArgs, ShellType};
use crate::error::Result;
use clap::CommandFactory;
use clap_complete::{Shell, generate};
use std::io;
use tracing::info;

const BIN_NAME: &str = "jx";

/// Execute the completions command.
///
/// # Errors
///
/// Returns an error if the output file cannot be created.
pub fn execute(args: &CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    let shell = convert_shell_type(args.shell);

    if let Some(output_path) = &args.output {
        let mut file = std::fs::File::create(output_path)?;
        generate(shell, &mut cmd, BIN_NAME, &mut file);
        info!(path = %output_path.display(), shell = %shell, "Wrote completion script");
    } else {
        generate(shell, &mut cmd, BIN_NAME, &mut io::stdout());
    }
    Ok(())
}

const fn convert_shell_type(shell: ShellType) -> Shell {
    match shell {
        ShellType::Bash => Shell::Bash,
        ShellType::Zsh => Shell::Zsh,
        ShellType::Fish => Shell::Fish,
        ShellType::PowerShell => Shell::PowerShell,
        ShellType::Elvish => Shell::Elvish,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(shell: Shell) -> String {
        let mut cmd = Cli::command();
        let mut output = Vec::new();
        generate(shell, &mut cmd, BIN_NAME, &mut output);
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_bash_completion_lists_subcommands() {
        let script = script(Shell::Bash);
        assert!(script.contains("_jx"));
        for command in ["extract", "parse", "boards", "completions"] {
            assert!(script.contains(command), "missing {command}");
        }
        assert!(script.contains("--json"));
    }

    #[test]
    fn test_fish_completion_syntax() {
        assert!(script(Shell::Fish).contains("complete -c jx"));
        assert_eq!(convert_shell_type(ShellType::PowerShell), Shell::PowerShell);
    }
}
