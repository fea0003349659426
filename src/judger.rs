//! Judger module for single test cases
//!
//! This module turns a process outcome into a verdict, comparing outputs only
//! when the program itself finished cleanly.

use std::path::PathBuf;
use tracing::debug;

use crate::checker::{canonicalize, compare_output};
use crate::core::{format_memory, VerdictStatus};
use crate::error::RunError;
use crate::runner::{ExecutionRequest, ProcessOutcome, ResourceLimits, Runner};

/// One (input, expected answer) pair of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct TestCase {
    pub id: String,
    pub input: PathBuf,
    pub answer: PathBuf,
}

impl TestCase {
    pub fn new(id: impl Into<String>, input: impl Into<PathBuf>, answer: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            input: input.into(),
            answer: answer.into(),
        }
    }
}

/// Result of judging one test
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub test_id: String,
    pub status: VerdictStatus,
    pub time_secs: f64,
    pub memory_mb: f64,
    /// Human-readable report, newline-terminated
    pub message: String,
    pub error: Option<RunError>,
}

impl Verdict {
    /// Verdict for a test that never got to run
    pub fn internal(test_id: impl Into<String>, error: RunError) -> Self {
        build_verdict(
            test_id,
            "",
            ProcessOutcome::failed(VerdictStatus::InternalError, error),
        )
    }
}

/// Build the verdict of one run.
///
/// Only a clean run is compared; any other status is carried forward as is.
pub fn build_verdict(
    test_id: impl Into<String>,
    canonical_expected: &str,
    outcome: ProcessOutcome,
) -> Verdict {
    let test_id = test_id.into();
    let usage = format!("{:.3}s {}", outcome.time_secs, format_memory(outcome.memory_mb));
    let error_text = outcome
        .error
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown error".to_string());

    let (status, message) = match outcome.status {
        VerdictStatus::Ok if compare_output(&outcome.output, canonical_expected) => (
            VerdictStatus::Ok,
            format!("Passed #{} ... {}\n", test_id, usage),
        ),
        VerdictStatus::Ok => (
            VerdictStatus::WrongAnswer,
            format!(
                "Failed #{} ... {}\n-----Output-----\n{}\n-----Answer-----\n{}\n",
                test_id,
                usage,
                canonicalize(&outcome.output),
                canonical_expected
            ),
        ),
        VerdictStatus::WrongAnswer => (
            VerdictStatus::WrongAnswer,
            format!("Failed #{} ... {}\n", test_id, usage),
        ),
        VerdictStatus::RuntimeError => (
            VerdictStatus::RuntimeError,
            format!("runtime error #{} ... {}: {}\n", test_id, usage, error_text),
        ),
        VerdictStatus::TimeLimitExceeded => (
            VerdictStatus::TimeLimitExceeded,
            format!("time limit exceeded #{} ... {}\n", test_id, usage),
        ),
        VerdictStatus::MemoryLimitExceeded => (
            VerdictStatus::MemoryLimitExceeded,
            format!("memory limit exceeded #{} ... {}\n", test_id, usage),
        ),
        VerdictStatus::OutputLimitExceeded => (
            VerdictStatus::OutputLimitExceeded,
            format!("output limit exceeded #{} ... {}\n", test_id, usage),
        ),
        VerdictStatus::InternalError => (
            VerdictStatus::InternalError,
            format!("internal error #{} ... {}: {}\n", test_id, usage, error_text),
        ),
    };

    Verdict {
        test_id,
        status,
        time_secs: outcome.time_secs,
        memory_mb: outcome.memory_mb,
        message,
        error: outcome.error,
    }
}

/// Judge a single test case
///
/// The input file is redirected as stdin; trouble with either file is
/// reported as an internal error rather than returned. A run that did not
/// finish cleanly keeps its status even when the answer is unreadable.
pub async fn judge(
    runner: &dyn Runner,
    case: &TestCase,
    command: &str,
    limits: Option<ResourceLimits>,
) -> Verdict {
    let input = match tokio::fs::File::open(&case.input).await {
        Ok(file) => file.into_std().await,
        Err(e) => return Verdict::internal(&case.id, RunError::io(case.input.display(), e)),
    };

    let request = ExecutionRequest::new(command, input).with_limits(limits);
    let mut outcome = runner.run(request).await;

    // The answer is only read after a clean run
    let expected = if outcome.status.is_ok() {
        match tokio::fs::read(&case.answer).await {
            Ok(bytes) => canonicalize(&bytes),
            Err(e) => {
                outcome.status = VerdictStatus::InternalError;
                outcome.error = Some(RunError::io(case.answer.display(), e));
                String::new()
            }
        }
    } else {
        String::new()
    };

    let verdict = build_verdict(&case.id, &expected, outcome);
    debug!("Test {} judged: {}", case.id, verdict.status);
    verdict
}
