//! Paced execution of command scripts.
//!
//! A script is a text file with one command per line. Each command is handed
//! to a host (a tmux pane, or stdout for a dry run) and followed by a delay
//! chosen by the command's tier, so hosts that do expensive work per command
//! are not flooded.

pub mod cli;
pub mod clock;
pub mod config;
pub mod console;
pub mod exec;
pub mod executor;
pub mod host;
pub mod log;
pub mod pacer;
pub mod paths;
pub mod script;
pub mod shell_completion;

#[cfg(test)]
mod testing;
