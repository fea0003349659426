//! Pool module - Concurrent test scheduling
//!
//! A fixed number of workers pull work from one shared cursor:
//! - `batch`: a known list of test cases, each judged exactly once
//! - `stress`: generated tests, until the first failing one is found
//!
//! Shared state lives behind a single `std::sync::Mutex` that is only held
//! for bookkeeping; programs always run with the lock released.

pub mod batch;
pub mod report;
pub mod stress;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::core::{format_memory, VerdictStatus};
use crate::judger::Verdict;

// Re-exports
pub use crate::judger::TestCase;
pub use batch::run_batch;
pub use report::{ConsoleReporter, Reporter, SilentReporter};
pub use stress::{run_stress, HarnessFailure, Stage, StressCommands, StressFailure, StressOutcome};

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 10;

/// Running totals over judged tests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    pub tests_run: usize,
    pub counts: BTreeMap<VerdictStatus, usize>,
    pub max_time_secs: f64,
    pub max_memory_mb: f64,
}

impl Tally {
    /// Fold one verdict into the totals
    pub fn record(&mut self, verdict: &Verdict) {
        self.tests_run += 1;
        *self.counts.entry(verdict.status).or_insert(0) += 1;
        self.max_time_secs = self.max_time_secs.max(verdict.time_secs);
        self.max_memory_mb = self.max_memory_mb.max(verdict.memory_mb);
    }

    /// Sum of all per-status counts
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, status: VerdictStatus) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TESTS RAN: {} MAX TIME: {:.3}s MAX MEMORY: {}",
            self.tests_run,
            self.max_time_secs,
            format_memory(self.max_memory_mb)
        )?;
        for (status, count) in &self.counts {
            write!(f, " {}: {}", status, count)?;
        }
        Ok(())
    }
}

/// Lock shared pool state; a worker that panicked mid-update leaves the
/// bookkeeping usable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
