//! Batch mode: judge a fixed list of tests

use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::report::Reporter;
use super::{lock, Tally};
use crate::judger::{judge, TestCase};
use crate::runner::{ResourceLimits, Runner};

#[derive(Debug, Default)]
struct BatchState {
    next: usize,
    tally: Tally,
}

struct BatchShared {
    runner: Arc<dyn Runner>,
    reporter: Arc<dyn Reporter>,
    tests: Vec<TestCase>,
    command: String,
    limits: Option<ResourceLimits>,
    state: Mutex<BatchState>,
}

/// Judge every test once with `workers` concurrent workers.
///
/// Returns after all workers have exited. A failing test never stops its
/// siblings; it is only counted.
pub async fn run_batch(
    runner: Arc<dyn Runner>,
    tests: Vec<TestCase>,
    command: &str,
    limits: Option<ResourceLimits>,
    workers: usize,
    reporter: Arc<dyn Reporter>,
) -> Tally {
    let workers = workers.max(1);
    info!("Running {} tests with {} workers", tests.len(), workers);

    let shared = Arc::new(BatchShared {
        runner,
        reporter,
        tests,
        command: command.to_string(),
        limits,
        state: Mutex::new(BatchState::default()),
    });

    let mut set = JoinSet::new();
    for worker_id in 0..workers {
        set.spawn(batch_worker(worker_id, Arc::clone(&shared)));
    }

    while let Some(joined) = set.join_next().await {
        if let Err(e) = joined {
            error!("Batch worker failed: {}", e);
        }
    }

    let tally = lock(&shared.state).tally.clone();
    shared.reporter.on_finish(&tally);
    info!("Batch finished: {}", tally);
    tally
}

async fn batch_worker(worker_id: usize, shared: Arc<BatchShared>) {
    loop {
        let index = {
            let mut state = lock(&shared.state);
            if state.next >= shared.tests.len() {
                break;
            }
            let index = state.next;
            state.next += 1;
            index
        };

        let case = &shared.tests[index];
        let verdict = judge(shared.runner.as_ref(), case, &shared.command, shared.limits).await;

        {
            let mut state = lock(&shared.state);
            state.tally.record(&verdict);
            shared.reporter.on_verdict(&verdict, &state.tally);
        }
    }

    debug!("Batch worker {} exiting", worker_id);
}
