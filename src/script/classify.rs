//! Line classification.
//!
//! Every script line falls into exactly one category:
//!
//! ```text
//! ""            → Blank     skipped, no delay
//! "# ..."       → Comment   skipped, no delay
//! "echo ..."    → Echo      printed locally, no delay
//! anything else → Command   submitted to the host, then paced by tier
//! ```
//!
//! Prefix checks ignore ASCII case; payloads and commands keep the casing of
//! the original (trimmed) line.

use std::fmt;

use serde::Serialize;

const ECHO_PREFIX: &str = "echo ";

/// Pacing category for a submitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayTier {
    /// Commands that create objects in the host (`spawn ...`).
    Spawn,
    /// Commands that write data files (`data dump...`, `physdump ...`).
    Data,
    /// Everything else.
    Default,
}

impl DelayTier {
    pub fn label(self) -> &'static str {
        match self {
            DelayTier::Spawn => "spawn",
            DelayTier::Data => "data",
            DelayTier::Default => "default",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "spawn" => Some(DelayTier::Spawn),
            "data" => Some(DelayTier::Data),
            "default" => Some(DelayTier::Default),
            _ => None,
        }
    }
}

impl fmt::Display for DelayTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

/// Prefix table, evaluated in order; first match wins.
const TIER_PREFIXES: &[(&str, DelayTier)] = &[
    ("spawn ", DelayTier::Spawn),
    ("data dump", DelayTier::Data),
    ("physdump ", DelayTier::Data),
];

/// What a single script line asks the executor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    Blank,
    Comment,
    Echo { payload: &'a str },
    Command { text: &'a str, tier: DelayTier },
}

impl Classification<'_> {
    /// Whether the line is skipped without touching the host.
    pub fn is_skipped(&self) -> bool {
        matches!(self, Classification::Blank | Classification::Comment)
    }
}

/// Classify one raw line. Pure; never fails.
pub fn classify(raw: &str) -> Classification<'_> {
    let line = raw.trim();
    if line.is_empty() {
        return Classification::Blank;
    }
    if line.starts_with('#') {
        return Classification::Comment;
    }
    if starts_with_ignore_case(line, ECHO_PREFIX) {
        return Classification::Echo {
            payload: &line[ECHO_PREFIX.len()..],
        };
    }

    Classification::Command {
        text: line,
        tier: tier_for(line),
    }
}

/// Pick the pacing tier for a (trimmed) command line.
pub fn tier_for(command: &str) -> DelayTier {
    TIER_PREFIXES
        .iter()
        .find(|(prefix, _)| starts_with_ignore_case(command, prefix))
        .map(|(_, tier)| *tier)
        .unwrap_or(DelayTier::Default)
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
