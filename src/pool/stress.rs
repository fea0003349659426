//! Stress mode: search generated tests for one the candidate fails
//!
//! Each iteration generates an input from the test id, computes the expected
//! answer with the reference solution and judges the candidate against it.
//! The first failure stops every worker and its input is saved to disk.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::report::Reporter;
use super::{lock, Tally};
use crate::checker::canonicalize;
use crate::core::{test_file_path, VerdictStatus};
use crate::error::RunError;
use crate::judger::{build_verdict, Verdict};
use crate::runner::{ExecutionRequest, ProcessOutcome, ResourceLimits, Runner};

/// Commands taking part in a stress search
#[derive(Debug, Clone, PartialEq)]
pub struct StressCommands {
    /// Reads the test id on stdin, writes a test input
    pub generator: String,
    /// Known-correct solution producing the expected answer
    pub reference: String,
    /// Solution under test
    pub candidate: String,
}

/// Which program of an iteration misbehaved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generator,
    Reference,
    Candidate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Generator => "GEN",
            Stage::Reference => "BRUTE",
            Stage::Candidate => "SOLVE",
        };
        write!(f, "{}", s)
    }
}

/// The search broke down for reasons other than a wrong candidate
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessFailure {
    pub stage: Stage,
    pub test_id: u64,
    pub status: VerdictStatus,
    pub error: Option<RunError>,
}

impl fmt::Display for HarnessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} - {}", self.test_id, self.stage, self.status)?;
        if let Some(error) = &self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

/// A generated test the candidate fails
#[derive(Debug, Clone, PartialEq)]
pub struct StressFailure {
    pub test_id: u64,
    /// Where the generated input was written
    pub input_path: PathBuf,
    pub verdict: Verdict,
    /// Set when the input could not be written
    pub persist_error: Option<String>,
}

/// Result of a stress search
#[derive(Debug, Clone, Default)]
pub struct StressOutcome {
    pub failure: Option<StressFailure>,
    pub harness_failure: Option<HarnessFailure>,
    pub tally: Tally,
}

impl StressOutcome {
    /// Whether a failing test was found
    pub fn found(&self) -> bool {
        self.failure.is_some()
    }
}

#[derive(Debug)]
struct StressState {
    next_id: u64,
    stop: bool,
    tally: Tally,
    failure: Option<StressFailure>,
    harness_failure: Option<HarnessFailure>,
}

struct StressShared {
    runner: Arc<dyn Runner>,
    reporter: Arc<dyn Reporter>,
    commands: StressCommands,
    template: String,
    limits: Option<ResourceLimits>,
    state: Mutex<StressState>,
}

/// Run the stress search with `workers` concurrent workers.
///
/// Test ids start at 1. Workers finish the iteration they are in once the
/// search stops; running programs are not killed.
pub async fn run_stress(
    runner: Arc<dyn Runner>,
    commands: StressCommands,
    test_path_template: &str,
    limits: Option<ResourceLimits>,
    workers: usize,
    reporter: Arc<dyn Reporter>,
) -> StressOutcome {
    let workers = workers.max(1);
    info!("Starting stress search with {} workers", workers);

    let shared = Arc::new(StressShared {
        runner,
        reporter,
        commands,
        template: test_path_template.to_string(),
        limits,
        state: Mutex::new(StressState {
            next_id: 1,
            stop: false,
            tally: Tally::default(),
            failure: None,
            harness_failure: None,
        }),
    });

    let mut set = JoinSet::new();
    for worker_id in 0..workers {
        set.spawn(stress_worker(worker_id, Arc::clone(&shared)));
    }

    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            error!("Stress worker failed: {}", e);
        }
    }

    let outcome = {
        let mut state = lock(&shared.state);
        StressOutcome {
            failure: state.failure.take(),
            harness_failure: state.harness_failure.take(),
            tally: state.tally.clone(),
        }
    };

    shared.reporter.on_finish(&outcome.tally);
    match (&outcome.failure, &outcome.harness_failure) {
        (Some(failure), _) => info!("Stress search found failing test #{}", failure.test_id),
        (None, Some(harness)) => error!("Stress search aborted: {}", harness),
        (None, None) => info!("Stress search finished without a failure"),
    }
    outcome
}

async fn stress_worker(worker_id: usize, shared: Arc<StressShared>) {
    loop {
        let test_id = {
            let mut state = lock(&shared.state);
            if state.stop {
                break;
            }
            let id = state.next_id;
            state.next_id += 1;
            id
        };

        if !run_iteration(&shared, test_id).await {
            break;
        }
    }

    debug!("Stress worker {} exiting", worker_id);
}

/// One generate/reference/candidate round; `false` once the search is over
async fn run_iteration(shared: &StressShared, test_id: u64) -> bool {
    let commands = &shared.commands;

    let generated = run(shared, &commands.generator, test_id.to_string().into_bytes()).await;
    if !generated.is_success() {
        stop_on_harness_failure(shared, Stage::Generator, test_id, generated);
        return false;
    }

    let reference = run(shared, &commands.reference, generated.output.clone()).await;
    if !reference.is_success() {
        stop_on_harness_failure(shared, Stage::Reference, test_id, reference);
        return false;
    }

    let candidate = run(shared, &commands.candidate, generated.output.clone()).await;
    if !candidate.status.is_ok() && !candidate.status.is_candidate_fault() {
        stop_on_harness_failure(shared, Stage::Candidate, test_id, candidate);
        return false;
    }

    let verdict = build_verdict(test_id.to_string(), &canonicalize(&reference.output), candidate);
    if verdict.status.is_ok() {
        let mut state = lock(&shared.state);
        state.tally.record(&verdict);
        shared.reporter.on_verdict(&verdict, &state.tally);
        return true;
    }

    // Claim the failure; only the claiming worker writes the input file
    {
        let mut state = lock(&shared.state);
        if state.stop {
            warn!(
                "Discarding test #{} ({}) found after the search stopped",
                test_id, verdict.status
            );
            return false;
        }
        state.stop = true;
    }

    let input_path = test_file_path(&shared.template, test_id);
    let persist_error = tokio::fs::write(&input_path, &generated.output)
        .await
        .err()
        .map(|e| e.to_string());
    if let Some(e) = &persist_error {
        error!("Failed to save failing input to {:?}: {}", input_path, e);
    }

    let failure = StressFailure {
        test_id,
        input_path,
        verdict,
        persist_error,
    };

    let mut state = lock(&shared.state);
    state.tally.record(&failure.verdict);
    shared.reporter.on_stress_failure(&failure, &state.tally);
    state.failure = Some(failure);
    false
}

async fn run(shared: &StressShared, command: &str, input: Vec<u8>) -> ProcessOutcome {
    let request = ExecutionRequest::new(command, input).with_limits(shared.limits);
    shared.runner.run(request).await
}

fn stop_on_harness_failure(shared: &StressShared, stage: Stage, test_id: u64, outcome: ProcessOutcome) {
    let failure = HarnessFailure {
        stage,
        test_id,
        status: outcome.status,
        error: outcome.error,
    };

    let mut state = lock(&shared.state);
    if state.stop {
        warn!("Discarding {} after the search stopped", failure);
        return;
    }

    error!("Stress harness failure: {}", failure);
    state.stop = true;
    shared.reporter.on_harness_failure(&failure);
    state.harness_failure = Some(failure);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SilentReporter;
    use crate::runner::{ProcessInput, ProcessRunner};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// In-memory programs: `gen` echoes the id, `ref` echoes its input and
    /// `cand` echoes unless the input is one of `failing`. `jail` stands for
    /// a candidate whose sandbox breaks on the `failing` ids.
    struct ScriptedRunner {
        failing: fn(u64) -> bool,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ScriptedRunner {
        fn new(failing: fn(u64) -> bool) -> Self {
            Self {
                failing,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Runner for ScriptedRunner {
        async fn run(&self, request: ExecutionRequest) -> ProcessOutcome {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(1)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let input = match request.input {
                ProcessInput::Bytes(bytes) => bytes,
                ProcessInput::File(_) => panic!("stress mode pipes its inputs"),
            };
            let id: u64 = String::from_utf8_lossy(&input).trim().parse().unwrap();

            if request.command == "jail" && (self.failing)(id) {
                return ProcessOutcome::failed(
                    VerdictStatus::InternalError,
                    RunError::InvalidSandboxResult,
                );
            }

            let output = match request.command.as_str() {
                "cand" if (self.failing)(id) => b"wrong\n".to_vec(),
                "gen" | "ref" | "cand" | "jail" => format!("{}\n", id).into_bytes(),
                other => panic!("unexpected command {}", other),
            };

            ProcessOutcome {
                status: VerdictStatus::Ok,
                time_secs: 0.001,
                memory_mb: 1.0,
                output,
                error: None,
            }
        }
    }

    fn commands(generator: &str, reference: &str, candidate: &str) -> StressCommands {
        StressCommands {
            generator: generator.into(),
            reference: reference.into(),
            candidate: candidate.into(),
        }
    }

    fn template(dir: &std::path::Path) -> String {
        dir.join("stress-$%test%$.in").to_string_lossy().into_owned()
    }

    fn persisted(dir: &std::path::Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_failing_id_is_found_and_saved() {
        for _ in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let runner = Arc::new(ScriptedRunner::new(|id| id == 3));

            let outcome = run_stress(
                runner,
                commands("gen", "ref", "cand"),
                &template(dir.path()),
                None,
                4,
                Arc::new(SilentReporter),
            )
            .await;

            assert!(outcome.found());
            assert!(outcome.harness_failure.is_none());
            let failure = outcome.failure.unwrap();
            assert_eq!(failure.test_id, 3);
            assert_eq!(failure.verdict.status, VerdictStatus::WrongAnswer);
            assert!(failure.persist_error.is_none());

            assert_eq!(persisted(dir.path()), vec![dir.path().join("stress-3.in")]);
            assert_eq!(std::fs::read_to_string(&failure.input_path).unwrap(), "3\n");
            assert_eq!(outcome.tally.count(VerdictStatus::WrongAnswer), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_persist_exactly_one_file() {
        for _ in 0..20 {
            let dir = tempfile::tempdir().unwrap();
            let runner = Arc::new(ScriptedRunner::new(|id| id >= 3));

            let outcome = run_stress(
                runner.clone(),
                commands("gen", "ref", "cand"),
                &template(dir.path()),
                None,
                8,
                Arc::new(SilentReporter),
            )
            .await;

            let failure = outcome.failure.unwrap();
            assert!(failure.test_id >= 3);
            assert_eq!(persisted(dir.path()), vec![failure.input_path.clone()]);
            assert_eq!(
                std::fs::read_to_string(&failure.input_path).unwrap(),
                format!("{}\n", failure.test_id)
            );
            assert_eq!(outcome.tally.count(VerdictStatus::WrongAnswer), 1);
            assert!(runner.max_in_flight.load(Ordering::SeqCst) > 1);
        }
    }

    #[tokio::test]
    async fn test_broken_generator_is_harness_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ProcessRunner::new(Duration::from_millis(2)));

        let outcome = run_stress(
            runner,
            commands("false", "cat", "cat"),
            &template(dir.path()),
            None,
            3,
            Arc::new(SilentReporter),
        )
        .await;

        assert!(!outcome.found());
        let harness = outcome.harness_failure.unwrap();
        assert_eq!(harness.stage, Stage::Generator);
        assert_eq!(harness.status, VerdictStatus::RuntimeError);
        assert!(persisted(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_crashing_reference_is_harness_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ProcessRunner::new(Duration::from_millis(2)));

        let outcome = run_stress(
            runner,
            commands("cat", "sh -c 'exit 4'", "cat"),
            &template(dir.path()),
            None,
            1,
            Arc::new(SilentReporter),
        )
        .await;

        let harness = outcome.harness_failure.unwrap();
        assert_eq!(harness.stage, Stage::Reference);
        assert_eq!(harness.test_id, 1);
        assert_eq!(harness.error, Some(RunError::ExitCode(4)));
        assert_eq!(harness.to_string(), "#1 BRUTE - RE: exit status 4");
    }

    #[tokio::test]
    async fn test_broken_candidate_sandbox_is_harness_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(|id| id == 2));

        let outcome = run_stress(
            runner,
            commands("gen", "ref", "jail"),
            &template(dir.path()),
            None,
            1,
            Arc::new(SilentReporter),
        )
        .await;

        assert!(!outcome.found());
        let harness = outcome.harness_failure.unwrap();
        assert_eq!(harness.stage, Stage::Candidate);
        assert_eq!(harness.test_id, 2);
        assert_eq!(harness.status, VerdictStatus::InternalError);
        assert_eq!(harness.to_string(), "#2 SOLVE - INT: invalid sandbox results returned");
        assert!(persisted(dir.path()).is_empty());
        assert_eq!(outcome.tally.count(VerdictStatus::Ok), 1);
    }

    #[tokio::test]
    async fn test_crashing_candidate_is_a_finding() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ProcessRunner::new(Duration::from_millis(2)));

        let outcome = run_stress(
            runner,
            commands("cat", "cat", "sh -c 'exit 1'"),
            &template(dir.path()),
            None,
            1,
            Arc::new(SilentReporter),
        )
        .await;

        let failure = outcome.failure.unwrap();
        assert_eq!(failure.test_id, 1);
        assert_eq!(failure.verdict.status, VerdictStatus::RuntimeError);
        assert_eq!(std::fs::read_to_string(&failure.input_path).unwrap(), "1");
    }

    #[tokio::test]
    async fn test_unwritable_template_is_reported() {
        let runner = Arc::new(ScriptedRunner::new(|id| id == 1));

        let outcome = run_stress(
            runner,
            commands("gen", "ref", "cand"),
            "/nonexistent-dir/$%test%$.in",
            None,
            1,
            Arc::new(SilentReporter),
        )
        .await;

        let failure = outcome.failure.unwrap();
        assert_eq!(failure.input_path, PathBuf::from("/nonexistent-dir/1.in"));
        assert!(failure.persist_error.is_some());
    }
}
