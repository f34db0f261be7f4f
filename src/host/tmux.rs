//! tmux pane host.
//!
//! Wraps the tmux CLI so any program running in a pane (a server console, a
//! REPL, a shell) can serve as the command processor. Commands are injected
//! with `send-keys` and submitted with an explicit Enter.

use std::process::{Command, Output};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};

use super::Host;

/// Check that tmux is installed and reachable.
pub fn check_tmux() -> Result<String> {
    let output = Command::new("tmux").arg("-V").output().context(
        "tmux not found; install tmux (e.g., `apt install tmux` or `brew install tmux`)",
    )?;

    if !output.status.success() {
        bail!(
            "tmux -V failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    match parse_tmux_version(&version) {
        Some((major, minor)) => debug!(major, minor, "tmux found"),
        None => warn!(version = %version, "unrecognised tmux version string"),
    }
    Ok(version)
}

/// Parse `tmux 3.3a` style version strings into `(major, minor)`.
pub fn parse_tmux_version(version_raw: &str) -> Option<(u32, u32)> {
    let ver = version_raw.trim().strip_prefix("tmux ")?;
    let (major, rest) = ver.split_once('.')?;
    let minor: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if major.is_empty() || minor.is_empty() {
        return None;
    }
    Some((major.parse().ok()?, minor.parse().ok()?))
}

fn run_tmux<I, S>(args: I) -> Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    Command::new("tmux")
        .args(args)
        .output()
        .context("failed to run tmux command")
}

/// Check if a specific tmux pane target exists.
pub fn pane_exists(target: &str) -> bool {
    run_tmux(["display-message", "-p", "-t", target, "#{pane_id}"])
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check whether a pane target is dead (`remain-on-exit` pane).
pub fn pane_dead(target: &str) -> Result<bool> {
    let output = run_tmux(["display-message", "-p", "-t", target, "#{pane_dead}"])
        .with_context(|| format!("failed to query pane_dead for target '{target}'"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("tmux display-message pane_dead failed: {stderr}");
    }

    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Ok(value == "1")
}

/// Type `keys` into the pane literally, then optionally press Enter.
pub fn send_keys(target: &str, keys: &str, press_enter: bool) -> Result<()> {
    if !keys.is_empty() {
        // `-l` sends text literally so punctuation/symbols are not interpreted as
        // tmux key names.
        let output = run_tmux(["send-keys", "-t", target, "-l", "--", keys])
            .with_context(|| format!("failed to send keys to target '{target}'"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("tmux send-keys failed: {stderr}");
        }
    }

    if press_enter {
        let output = run_tmux(["send-keys", "-t", target, "C-m"])
            .with_context(|| format!("failed to send Enter to target '{target}'"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("tmux send-keys Enter failed: {stderr}");
        }
    }

    debug!(target = target, keys = keys, "sent keys");
    Ok(())
}

/// Host backed by a tmux pane. Local output goes to this process's stdout.
#[derive(Debug, Clone)]
pub struct TmuxHost {
    target: String,
}

impl TmuxHost {
    /// Connect to an existing pane target such as `server:0.0` or `%3`.
    pub fn connect(target: &str) -> Result<Self> {
        check_tmux()?;
        if !pane_exists(target) {
            bail!("tmux pane '{target}' not found; start the host first or pass a valid --target");
        }
        Ok(Self {
            target: target.to_string(),
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl Host for TmuxHost {
    fn submit(&self, command: &str) {
        if let Err(e) = send_keys(&self.target, command, true) {
            warn!(target = %self.target, error = %e, "failed to submit command");
        }
    }

    fn print(&self, text: &str) {
        println!("{text}");
    }

    fn is_alive(&self) -> bool {
        pane_exists(&self.target) && !pane_dead(&self.target).unwrap_or(false)
    }
}
