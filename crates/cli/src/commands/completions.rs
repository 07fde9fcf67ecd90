//! completions command - Print a shell completion script
//!
//! The script is registered under the command's own name, so a renamed
//! binary keeps working after `s3cm completions <shell> > file`.

use std::io::Write;

use clap::{Args, CommandFactory};
use clap_complete::Shell;

use super::Cli;
use crate::exit_code::ExitCode;

/// Print a shell completion script
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Execute the completions command
pub fn execute(args: CompletionsArgs) -> ExitCode {
    let script = completion_script(args.shell);
    match std::io::stdout().lock().write_all(&script) {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::debug!(error = %e, "stdout closed while writing completions");
            ExitCode::GeneralError
        }
    }
}

fn completion_script(shell: Shell) -> Vec<u8> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    let mut script = Vec::new();
    clap_complete::generate(shell, &mut cmd, name, &mut script);
    script
}
