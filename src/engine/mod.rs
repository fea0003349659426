//! Engine facade
//!
//! Wires an `EngineConfig` to the matching runner and exposes the three entry
//! points: single test, batch and stress search.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::judger::{self, TestCase, Verdict};
use crate::pool::{self, Reporter, StressCommands, StressOutcome, Tally};
use crate::runner::{ProcessRunner, ResourceLimits, Runner, SandboxedRunner};
use crate::sandbox::SandboxOptions;

/// Judge engine
pub struct Engine {
    config: EngineConfig,
    runner: Arc<dyn Runner>,
}

impl Engine {
    /// Build an engine running programs directly or under the sandbox
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate().context("Invalid engine configuration")?;

        let inner = ProcessRunner::new(config.poll_interval());
        let runner: Arc<dyn Runner> = match &config.sandbox {
            Some(options) => {
                info!(
                    "Using sandbox at {:?} (limits: {:?})",
                    options.binary_path,
                    options.limits()
                );
                Arc::new(SandboxedRunner::new(options, inner))
            }
            None => {
                debug!("Sandbox disabled, programs run without time or memory limits");
                Arc::new(inner)
            }
        };

        Ok(Self { config, runner })
    }

    /// Build an engine around a custom runner
    pub fn with_runner(config: EngineConfig, runner: Arc<dyn Runner>) -> Self {
        Self { config, runner }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// One-time setup; installs the sandbox binary when one is configured
    pub async fn prepare(&self) -> Result<()> {
        self.runner
            .prepare()
            .await
            .context("Failed to prepare the runner")
    }

    /// Judge a single test
    pub async fn judge(&self, case: &TestCase, command: &str) -> Verdict {
        judger::judge(self.runner.as_ref(), case, command, self.limits()).await
    }

    /// Judge every test of a batch
    pub async fn run_batch(
        &self,
        tests: Vec<TestCase>,
        command: &str,
        reporter: Arc<dyn Reporter>,
    ) -> Tally {
        pool::run_batch(
            Arc::clone(&self.runner),
            tests,
            command,
            self.limits(),
            self.config.workers,
            reporter,
        )
        .await
    }

    /// Search generated tests until the candidate fails one
    pub async fn run_stress(
        &self,
        commands: StressCommands,
        test_path_template: &str,
        reporter: Arc<dyn Reporter>,
    ) -> StressOutcome {
        pool::run_stress(
            Arc::clone(&self.runner),
            commands,
            test_path_template,
            self.limits(),
            self.config.workers,
            reporter,
        )
        .await
    }

    fn limits(&self) -> Option<ResourceLimits> {
        self.config.sandbox.as_ref().map(SandboxOptions::limits)
    }
}
