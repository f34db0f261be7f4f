use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "batchexec",
    about = "Run command scripts against a host console with per-command pacing",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config root (defaults to the nearest .batchexec/ directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a script (file name including extension)
    Exec {
        /// Script file name, e.g. "wolves.txt"
        file: String,

        /// tmux pane to send commands to (overrides host.target)
        #[arg(long)]
        target: Option<String>,

        /// Print commands instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// List scripts available to exec
    List,

    /// Interactive console with exec, stop and delay commands
    Console {
        /// tmux pane to send commands to (overrides host.target)
        #[arg(long)]
        target: Option<String>,

        /// Print commands instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show effective configuration
    Config {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_exec_with_target() {
        let cli = Cli::parse_from(["batchexec", "-v", "exec", "wolves.txt", "--target", "srv:0.0"]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Exec {
                file,
                target,
                dry_run,
            } => {
                assert_eq!(file, "wolves.txt");
                assert_eq!(target.as_deref(), Some("srv:0.0"));
                assert!(!dry_run);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn exec_requires_a_file() {
        assert!(Cli::try_parse_from(["batchexec", "exec"]).is_err());
    }

    #[test]
    fn root_is_global() {
        let cli = Cli::parse_from(["batchexec", "list", "--root", "/srv/cfg"]);
        assert_eq!(cli.root, Some(PathBuf::from("/srv/cfg")));
    }
}
