//! Progress reporting
//!
//! Callbacks are invoked while the pool lock is held, so lines written by
//! different workers never interleave.

use super::stress::{HarnessFailure, StressFailure};
use super::Tally;
use crate::judger::Verdict;

/// Receives pool events as they happen
pub trait Reporter: Send + Sync {
    /// A test finished; `tally` already includes it
    fn on_verdict(&self, _verdict: &Verdict, _tally: &Tally) {}

    /// The stress search found a failing test
    fn on_stress_failure(&self, _failure: &StressFailure, _tally: &Tally) {}

    /// The generator or reference broke, or the candidate hit a harness error
    fn on_harness_failure(&self, _failure: &HarnessFailure) {}

    /// All workers have exited
    fn on_finish(&self, _tally: &Tally) {}
}

/// Prints progress to stdout
#[derive(Debug, Clone, Default)]
pub struct ConsoleReporter {
    /// Print every verdict report, not only the running totals
    pub verbose: bool,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Reporter for ConsoleReporter {
    fn on_verdict(&self, verdict: &Verdict, tally: &Tally) {
        if self.verbose {
            print!("{}", verdict.message);
        }
        println!("{}", tally);
    }

    fn on_stress_failure(&self, failure: &StressFailure, tally: &Tally) {
        print!("{}", failure.verdict.message);
        match &failure.persist_error {
            None => println!("Failing input saved to {}", failure.input_path.display()),
            Some(e) => println!("Failed to save failing input to {}: {}", failure.input_path.display(), e),
        }
        println!("{}", tally);
    }

    fn on_harness_failure(&self, failure: &HarnessFailure) {
        println!("{}", failure);
    }

    fn on_finish(&self, tally: &Tally) {
        println!("----FINISHED----");
        println!("{}", tally);
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {}
