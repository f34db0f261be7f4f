//! The `exec <file>` entry point.
//!
//! Resolves a script name, loads it, and starts a background run. Shared by
//! the one-shot CLI command and the interactive console. At most one run is
//! tracked at a time; dropping the session cancels it.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::executor::{BatchExecutor, RunHandle};
use crate::host::{Host, Notice};
use crate::log::{ExecutionLog, LogEvent};
use crate::pacer::Pacer;
use crate::paths::ScriptLocator;
use crate::script::{ExecError, Script};

pub struct ExecSession {
    locator: ScriptLocator,
    pacer: Pacer,
    clock: Arc<dyn Clock>,
    log: Option<Arc<ExecutionLog>>,
    active: Mutex<Option<RunHandle>>,
}

impl ExecSession {
    pub fn new(locator: ScriptLocator, pacer: Pacer, clock: Arc<dyn Clock>) -> Self {
        Self {
            locator,
            pacer,
            clock,
            log: None,
            active: Mutex::new(None),
        }
    }

    pub fn with_log(mut self, log: Arc<ExecutionLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn locator(&self) -> &ScriptLocator {
        &self.locator
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    /// Resolve and read a script. Nothing runs if this fails.
    pub fn prepare(&self, name: &str) -> Result<Script, ExecError> {
        let Some(path) = self.locator.resolve(name) else {
            warn!(name = name, "script not found");
            if let Some(log) = &self.log {
                if let Err(e) = log.log(
                    Uuid::new_v4(),
                    LogEvent::ScriptNotFound {
                        name: name.to_string(),
                    },
                ) {
                    warn!(error = %e, "failed to write execution log");
                }
            }
            return Err(ExecError::NotFound {
                name: name.to_string(),
            });
        };
        Script::load(&path)
    }

    /// Start a run on a worker thread.
    ///
    /// `stop` lets the caller hold the cancellation flag before the run starts
    /// (used for Ctrl-C in the foreground CLI command).
    pub fn launch(
        &self,
        script: Script,
        host: Arc<dyn Host>,
        stop: Option<Arc<AtomicBool>>,
    ) -> Result<RunHandle> {
        let mut executor = BatchExecutor::new(self.pacer.clone(), self.clock.clone());
        if let Some(log) = &self.log {
            executor = executor.with_log(log.clone());
        }
        if let Some(stop) = stop {
            executor = executor.with_stop(stop);
        }
        executor.spawn(script, host)
    }

    /// Console handler for `exec <file>`.
    ///
    /// `args[0]` is the command name. Missing argument is a no-op; failures
    /// are reported on the host's output surface.
    pub fn exec(&self, args: &[&str], host: &Arc<dyn Host>) {
        let Some(name) = args.get(1).copied() else {
            return;
        };

        let mut active = self.active_run();
        if let Some(running) = active.as_ref() {
            if !running.is_finished() {
                host.notify(&Notice::Busy {
                    running: running.script().to_string(),
                });
                return;
            }
        }

        let script = match self.prepare(name) {
            Ok(script) => script,
            Err(ExecError::NotFound { name }) => {
                host.notify(&Notice::NotFound { name });
                return;
            }
            Err(ExecError::Load { source, .. }) => {
                host.notify(&Notice::LoadFailed {
                    name: name.to_string(),
                    reason: source.to_string(),
                });
                return;
            }
        };

        match self.launch(script, host.clone(), None) {
            Ok(handle) => {
                info!(script = %handle.script(), "batch launched");
                *active = Some(handle);
            }
            Err(e) => {
                warn!(error = %e, "failed to launch batch");
                host.notify(&Notice::LoadFailed {
                    name: name.to_string(),
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    /// Cancel the active run. Returns `false` when nothing was running.
    pub fn stop(&self) -> bool {
        match self.active_run().take() {
            Some(handle) if !handle.is_finished() => {
                handle.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active_run()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Take the tracked run, if any, so the caller can join it.
    pub fn take_active(&self) -> Option<RunHandle> {
        self.active_run().take()
    }

    fn active_run(&self) -> MutexGuard<'_, Option<RunHandle>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
