//! Structured execution log, one JSON line per event.
//!
//! Every batch run appends self-contained JSON objects to a `.jsonl` file:
//! start, echoed lines, submitted commands with their pacing, and the final
//! outcome. Entries carry an RFC 3339 timestamp and the run id, so several
//! runs can share one file and still be told apart.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::script::DelayTier;

/// A structured event in the execution log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub run_id: String,
    #[serde(flatten)]
    pub event: LogEvent,
}

/// All event types that can appear in the execution log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    /// A script name did not resolve; no run was started.
    ScriptNotFound { name: String },
    /// A run started.
    RunStarted { script: String, path: String, lines: usize },
    /// An `echo` line was printed locally.
    Echo { line: usize, payload: String },
    /// A command was handed to the host.
    CommandSubmitted {
        line: usize,
        command: String,
        tier: DelayTier,
        /// Wait applied afterwards in milliseconds; `None` for a yield.
        wait_millis: Option<u64>,
    },
    /// Every line was processed.
    RunCompleted {
        submitted: usize,
        echoed: usize,
        skipped: usize,
    },
    /// The run stopped early.
    RunAbandoned { reason: String, processed: usize },
}

/// Writer for JSON lines execution logs.
pub struct ExecutionLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl ExecutionLog {
    /// Open (or create) the log at `path`, creating parent directories.
    /// Appends to an existing file.
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Log an event for a run.
    pub fn log(&self, run_id: Uuid, event: LogEvent) -> Result<()> {
        let entry = LogEntry {
            timestamp: chrono::Utc::now().to_rfc3339(),
            run_id: run_id.to_string(),
            event,
        };

        let json = serde_json::to_string(&entry).context("failed to serialize log entry")?;

        debug!(event = %json, "execution log");

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("execution log writer poisoned"))?;
        writeln!(writer, "{json}").context("failed to write log entry")?;
        writer.flush().context("failed to flush log")?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
