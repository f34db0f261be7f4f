//! Shell completion generation for the batchexec CLI.

use std::io;

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{Shell, generate};

use crate::cli::{Cli, CompletionShell};

fn to_shell(shell: CompletionShell) -> Shell {
    match shell {
        CompletionShell::Bash => Shell::Bash,
        CompletionShell::Zsh => Shell::Zsh,
        CompletionShell::Fish => Shell::Fish,
    }
}

pub fn print(shell: CompletionShell) -> Result<()> {
    let mut cmd = Cli::command();
    generate(to_shell(shell), &mut cmd, "batchexec", &mut io::stdout());
    Ok(())
}
