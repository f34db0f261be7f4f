//! Recording doubles for the host and the clock.
//!
//! Both write into one shared journal so tests can assert the exact order of
//! echoes, submissions, waits and notices without sleeping in real time.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::Clock;
use crate::host::Host;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Submit(String),
    Print(String),
    Sleep(Duration),
    Yield,
}

#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Step>>>);

impl Journal {
    pub fn push(&self, step: Step) {
        self.0.lock().unwrap().push(step);
    }

    pub fn steps(&self) -> Vec<Step> {
        self.0.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<String> {
        self.steps()
            .into_iter()
            .filter_map(|s| match s {
                Step::Submit(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn prints(&self) -> Vec<String> {
        self.steps()
            .into_iter()
            .filter_map(|s| match s {
                Step::Print(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.steps()
            .into_iter()
            .filter_map(|s| match s {
                Step::Sleep(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn yields(&self) -> usize {
        self.steps().iter().filter(|s| **s == Step::Yield).count()
    }
}

/// Host double. Optionally "dies" after a fixed number of submissions.
#[derive(Debug, Clone)]
pub struct RecordingHost {
    journal: Journal,
    alive: Arc<AtomicBool>,
    remaining: Option<Arc<AtomicUsize>>,
}

impl RecordingHost {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            alive: Arc::new(AtomicBool::new(true)),
            remaining: None,
        }
    }

    pub fn dies_after(journal: Journal, submissions: usize) -> Self {
        Self {
            remaining: Some(Arc::new(AtomicUsize::new(submissions))),
            ..Self::new(journal)
        }
    }

    pub fn kill(&self) {
        self.alive.store(false, Ordering::Relaxed);
    }
}

impl Host for RecordingHost {
    fn submit(&self, command: &str) {
        self.journal.push(Step::Submit(command.to_string()));
        if let Some(remaining) = &self.remaining {
            if remaining.fetch_sub(1, Ordering::Relaxed) <= 1 {
                self.kill();
            }
        }
    }

    fn print(&self, text: &str) {
        self.journal.push(Step::Print(text.to_string()));
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }
}

type SleepHook = Arc<dyn Fn() + Send + Sync>;

/// Clock double. Records waits and returns at once.
///
/// With `interrupt_at(n)`, the n-th sleep (1-based) raises the stop flag and
/// reports an interrupted wait, as if the run were cancelled mid-delay.
/// With `during_sleep(n, f)`, `f` runs inside the n-th sleep.
#[derive(Clone, Default)]
pub struct RecordingClock {
    journal: Journal,
    interrupt_at: Option<usize>,
    hook: Option<(usize, SleepHook)>,
    sleeps: Arc<AtomicUsize>,
}

impl RecordingClock {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn interrupt_at(mut self, sleep_number: usize) -> Self {
        self.interrupt_at = Some(sleep_number);
        self
    }

    pub fn during_sleep(mut self, sleep_number: usize, hook: impl Fn() + Send + Sync + 'static) -> Self {
        let hook: SleepHook = Arc::new(hook);
        self.hook = Some((sleep_number, hook));
        self
    }
}

impl Clock for RecordingClock {
    fn sleep(&self, duration: Duration, stop: &AtomicBool) -> bool {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        self.journal.push(Step::Sleep(duration));
        let count = self.sleeps.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some((at, hook)) = &self.hook {
            if *at == count {
                hook();
            }
        }
        if self.interrupt_at == Some(count) {
            stop.store(true, Ordering::Relaxed);
            return false;
        }
        true
    }

    fn yield_now(&self) {
        self.journal.push(Step::Yield);
    }
}
