//! Per-tier pacing delays.
//!
//! The pacer reads the shared delay table on every call, so a change made
//! while a batch is running applies to the next wait.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::warn;

use crate::script::DelayTier;

pub const DEFAULT_SPAWN_DELAY: Duration = Duration::from_millis(400);
pub const DEFAULT_DATA_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_COMMAND_DELAY: Duration = Duration::from_millis(120);

/// Delay applied after each tier of command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delays {
    pub spawn: Duration,
    pub data: Duration,
    /// Zero means "yield one scheduling step" instead of a timed wait.
    pub default: Duration,
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            spawn: DEFAULT_SPAWN_DELAY,
            data: DEFAULT_DATA_DELAY,
            default: DEFAULT_COMMAND_DELAY,
        }
    }
}

impl Delays {
    pub fn get(&self, tier: DelayTier) -> Duration {
        match tier {
            DelayTier::Spawn => self.spawn,
            DelayTier::Data => self.data,
            DelayTier::Default => self.default,
        }
    }

    pub fn set(&mut self, tier: DelayTier, delay: Duration) {
        match tier {
            DelayTier::Spawn => self.spawn = delay,
            DelayTier::Data => self.data = delay,
            DelayTier::Default => self.default = delay,
        }
    }
}

/// What the executor should do after submitting a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Sleep(Duration),
    Yield,
}

/// Computes the wait for a tier from a shared, live delay table.
#[derive(Debug, Clone)]
pub struct Pacer {
    delays: Arc<RwLock<Delays>>,
}

impl Pacer {
    pub fn new(delays: Delays) -> Self {
        Self {
            delays: Arc::new(RwLock::new(delays)),
        }
    }

    /// Current delay table. A poisoned lock falls back to the defaults.
    pub fn delays(&self) -> Delays {
        match self.delays.read() {
            Ok(delays) => *delays,
            Err(_) => {
                warn!("delay table lock poisoned; using default delays");
                Delays::default()
            }
        }
    }

    /// Replace the delay for one tier. Takes effect on the next wait.
    pub fn set_delay(&self, tier: DelayTier, delay: Duration) {
        let mut delays = match self.delays.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        delays.set(tier, delay);
    }

    pub fn wait_for(&self, tier: DelayTier) -> Wait {
        let delay = self.delays().get(tier);
        match tier {
            DelayTier::Spawn | DelayTier::Data => Wait::Sleep(delay),
            DelayTier::Default if delay.is_zero() => Wait::Yield,
            DelayTier::Default => Wait::Sleep(delay),
        }
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(Delays::default())
    }
}
