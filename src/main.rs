use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use judge_engine::core::VerdictStatus;
use judge_engine::jobs::{load_job, Job};
use judge_engine::pool::{ConsoleReporter, Reporter};
use judge_engine::{Engine, EngineConfig, TestCase};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("judge_engine=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    let job_path: PathBuf = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .context("Usage: judge-engine <job.toml>")?;

    let job = load_job(&job_path)?;
    info!("Loaded job from {:?}", job_path);

    let mut config = EngineConfig::from_env().context("Failed to load configuration")?;
    config.apply(job.engine())?;

    let engine = Engine::new(config)?;
    engine.prepare().await?;

    let reporter: Arc<dyn Reporter> = Arc::new(ConsoleReporter::new(engine.config().verbose));

    match job {
        Job::Judge(job) => {
            let verdict = engine.judge(&job.test_case(), &job.command).await;
            print!("{}", verdict.message);
            Ok(exit_code(verdict.status.is_ok()))
        }
        Job::Batch(job) => {
            let tests: Vec<TestCase> = job.tests.into_iter().map(TestCase::from).collect();
            let tally = engine.run_batch(tests, &job.command, reporter).await;
            Ok(exit_code(tally.count(VerdictStatus::Ok) == tally.total()))
        }
        Job::Stress(job) => {
            let outcome = engine
                .run_stress(job.commands(), &job.test_path, reporter)
                .await;

            if let Some(harness) = &outcome.harness_failure {
                error!("Stress search aborted: {}", harness);
                return Ok(ExitCode::from(2));
            }
            Ok(exit_code(!outcome.found()))
        }
    }
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
