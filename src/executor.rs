//! Batch executor.
//!
//! Walks a loaded script line by line:
//!
//! ```text
//! Blank / Comment → skip, no delay
//! Echo            → print payload locally, no delay
//! Command         → submit to host, then wait per tier (sleep or yield)
//! ```
//!
//! Line N's submission and its wait complete before line N+1 is classified.
//! After the last line a completion notice is printed. The stop flag and the
//! host's liveness are checked between lines; either one ends the run early
//! without submitting anything further.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::host::{Host, Notice};
use crate::log::{ExecutionLog, LogEvent};
use crate::pacer::{Pacer, Wait};
use crate::script::{Classification, Script, classify};

/// Line counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub submitted: usize,
    pub echoed: usize,
    pub skipped: usize,
    /// Timed waits performed after submissions.
    pub waits: usize,
    /// Scheduling yields performed instead of timed waits.
    pub yields: usize,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.submitted + self.echoed + self.skipped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonReason {
    /// The stop flag was raised (cancel, Ctrl-C, handle dropped).
    Stopped,
    /// The host stopped accepting commands.
    HostGone,
}

impl AbandonReason {
    pub fn describe(self) -> &'static str {
        match self {
            AbandonReason::Stopped => "stopped",
            AbandonReason::HostGone => "host is no longer available",
        }
    }
}

/// Terminal result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(RunSummary),
    Abandoned {
        reason: AbandonReason,
        summary: RunSummary,
    },
}

impl RunOutcome {
    pub fn summary(&self) -> RunSummary {
        match self {
            RunOutcome::Completed(summary) => *summary,
            RunOutcome::Abandoned { summary, .. } => *summary,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

/// Executes one script against one host.
pub struct BatchExecutor {
    pacer: Pacer,
    clock: Arc<dyn Clock>,
    stop: Arc<AtomicBool>,
    log: Option<Arc<ExecutionLog>>,
}

impl BatchExecutor {
    pub fn new(pacer: Pacer, clock: Arc<dyn Clock>) -> Self {
        Self {
            pacer,
            clock,
            stop: Arc::new(AtomicBool::new(false)),
            log: None,
        }
    }

    pub fn with_log(mut self, log: Arc<ExecutionLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Share an externally owned stop flag (for example a Ctrl-C handler's).
    pub fn with_stop(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Run the script to completion on the current thread.
    ///
    /// Every call is a separate run with its own id in the execution log.
    pub fn run(&self, script: &Script, host: &dyn Host) -> RunOutcome {
        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            script = %script.name(),
            lines = script.len(),
            "batch started"
        );
        self.record(run_id, LogEvent::RunStarted {
            script: script.name(),
            path: script.path().display().to_string(),
            lines: script.len(),
        });

        let mut summary = RunSummary::default();
        for (index, raw) in script.lines().iter().enumerate() {
            let line = index + 1;
            if self.stop.load(Ordering::Relaxed) {
                return self.abandon(run_id, AbandonReason::Stopped, summary, host);
            }

            match classify(raw) {
                Classification::Blank | Classification::Comment => {
                    summary.skipped += 1;
                }
                Classification::Echo { payload } => {
                    host.print(payload);
                    summary.echoed += 1;
                    self.record(run_id, LogEvent::Echo {
                        line,
                        payload: payload.to_string(),
                    });
                }
                Classification::Command { text, tier } => {
                    if !host.is_alive() {
                        return self.abandon(run_id, AbandonReason::HostGone, summary, host);
                    }

                    host.submit(text);
                    summary.submitted += 1;

                    let wait = self.pacer.wait_for(tier);
                    debug!(line = line, command = text, tier = %tier, wait = ?wait, "command submitted");
                    self.record(run_id, LogEvent::CommandSubmitted {
                        line,
                        command: text.to_string(),
                        tier,
                        wait_millis: match wait {
                            Wait::Sleep(d) => Some(d.as_millis().try_into().unwrap_or(u64::MAX)),
                            Wait::Yield => None,
                        },
                    });

                    match wait {
                        Wait::Sleep(duration) => {
                            summary.waits += 1;
                            if !self.clock.sleep(duration, &self.stop) {
                                return self.abandon(run_id, AbandonReason::Stopped, summary, host);
                            }
                        }
                        Wait::Yield => {
                            summary.yields += 1;
                            self.clock.yield_now();
                        }
                    }
                }
            }
        }

        host.notify(&Notice::Completed);
        self.record(run_id, LogEvent::RunCompleted {
            submitted: summary.submitted,
            echoed: summary.echoed,
            skipped: summary.skipped,
        });
        info!(
            run_id = %run_id,
            submitted = summary.submitted,
            echoed = summary.echoed,
            skipped = summary.skipped,
            "batch completed"
        );
        RunOutcome::Completed(summary)
    }

    /// Run the script on a worker thread and return immediately.
    pub fn spawn(self, script: Script, host: Arc<dyn Host>) -> Result<RunHandle> {
        let stop = self.stop.clone();
        let name = script.name();
        let handle = std::thread::Builder::new()
            .name("batchexec-run".to_string())
            .spawn(move || self.run(&script, host.as_ref()))
            .context("failed to spawn batch worker thread")?;

        Ok(RunHandle {
            script: name,
            stop,
            handle: Some(handle),
        })
    }

    fn abandon(
        &self,
        run_id: Uuid,
        reason: AbandonReason,
        summary: RunSummary,
        host: &dyn Host,
    ) -> RunOutcome {
        warn!(
            run_id = %run_id,
            reason = reason.describe(),
            processed = summary.processed(),
            "batch abandoned"
        );
        // A gone host has no output surface worth writing to.
        if reason == AbandonReason::Stopped {
            host.notify(&Notice::Abandoned {
                reason: reason.describe().to_string(),
            });
        }
        self.record(run_id, LogEvent::RunAbandoned {
            reason: reason.describe().to_string(),
            processed: summary.processed(),
        });
        RunOutcome::Abandoned { reason, summary }
    }

    fn record(&self, run_id: Uuid, event: LogEvent) {
        if let Some(log) = &self.log {
            if let Err(e) = log.log(run_id, event) {
                warn!(error = %e, "failed to write execution log");
            }
        }
    }
}

/// Handle to a batch running on a worker thread.
///
/// Dropping the handle cancels the run; the worker notices at its next
/// line or wait slice and exits without submitting further commands.
pub struct RunHandle {
    script: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<RunOutcome>>,
}

impl RunHandle {
    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn cancel(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    /// Block until the run ends.
    pub fn join(mut self) -> Result<RunOutcome> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("batch worker already joined"))?;
        handle
            .join()
            .map_err(|_| anyhow!("batch worker for {} panicked", self.script))
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if self.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!(script = %self.script, "run handle dropped; cancelling batch");
            self.cancel();
        }
    }
}
