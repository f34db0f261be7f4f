//! Host adapters.
//!
//! The executor only needs three things from the host: a fire-and-forget
//! command sink, an output surface for local messages, and a liveness probe.
//! Concrete hosts decide what "submit" means (tmux pane, stdout dry run).

pub mod tmux;

use std::fmt;

pub use tmux::TmuxHost;

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Narrow capability interface to the host command processor.
pub trait Host: Send + Sync {
    /// Hand a command to the host. Outcome is not observed.
    fn submit(&self, command: &str);

    /// Write a line to the host's output surface.
    fn print(&self, text: &str);

    /// Whether the host can still accept commands.
    fn is_alive(&self) -> bool {
        true
    }

    fn notify(&self, notice: &Notice) {
        self.print(&notice.to_string());
    }
}

/// User-visible status messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NotFound { name: String },
    LoadFailed { name: String, reason: String },
    Busy { running: String },
    Completed,
    Abandoned { reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NotFound { name } => {
                write!(f, "{RED}[exec] File not found: {name}{RESET}")
            }
            Notice::LoadFailed { name, reason } => {
                write!(f, "{RED}[exec] Failed to read {name}: {reason}{RESET}")
            }
            Notice::Busy { running } => write!(
                f,
                "{YELLOW}[exec] {running} is still running; use 'stop' to cancel it{RESET}"
            ),
            Notice::Completed => write!(
                f,
                "{GREEN}[exec] Batch complete. All commands processed.{RESET}"
            ),
            Notice::Abandoned { reason } => {
                write!(f, "{YELLOW}[exec] Batch abandoned: {reason}{RESET}")
            }
        }
    }
}

/// Dry-run host: prints commands instead of sending them anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutHost;

impl Host for StdoutHost {
    fn submit(&self, command: &str) {
        println!("> {command}");
    }

    fn print(&self, text: &str) {
        println!("{text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_notice_names_the_file_in_red() {
        let rendered = Notice::NotFound {
            name: "ghost.txt".to_string(),
        }
        .to_string();
        assert!(rendered.starts_with(RED));
        assert!(rendered.contains("File not found: ghost.txt"));
        assert!(rendered.ends_with(RESET));
    }

    #[test]
    fn completion_notice_is_green() {
        let rendered = Notice::Completed.to_string();
        assert!(rendered.starts_with(GREEN));
        assert!(rendered.contains("Batch complete"));
    }

    #[test]
    fn host_trait_is_object_safe() {
        fn _accepts_dyn(_host: &dyn Host) {}
        _accepts_dyn(&StdoutHost);
        assert!(StdoutHost.is_alive());
    }
}
