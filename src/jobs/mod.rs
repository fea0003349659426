//! Job files driving the binary
//!
//! A job is a TOML document tagged by `mode`:
//!
//! ```toml
//! mode = "batch"
//! command = "./solution"
//!
//! [[tests]]
//! id = "1"
//! input = "tests/1.in"
//! answer = "tests/1.out"
//!
//! [engine]
//! workers = 4
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::config::EngineOverrides;
use crate::judger::TestCase;
use crate::pool::StressCommands;

/// Job enum - the three ways the engine can be driven
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "mode")]
pub enum Job {
    /// Judge one test
    #[serde(rename = "judge")]
    Judge(JudgeJob),
    /// Judge a fixed list of tests
    #[serde(rename = "batch")]
    Batch(BatchJob),
    /// Search generated tests for a failing one
    #[serde(rename = "stress")]
    Stress(StressJob),
}

impl Job {
    pub fn engine(&self) -> &EngineOverrides {
        match self {
            Job::Judge(job) => &job.engine,
            Job::Batch(job) => &job.engine,
            Job::Stress(job) => &job.engine,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestSpec {
    pub id: String,
    pub input: PathBuf,
    pub answer: PathBuf,
}

impl From<TestSpec> for TestCase {
    fn from(spec: TestSpec) -> Self {
        TestCase::new(spec.id, spec.input, spec.answer)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JudgeJob {
    pub command: String,
    pub id: String,
    pub input: PathBuf,
    pub answer: PathBuf,
    #[serde(default)]
    pub engine: EngineOverrides,
}

impl JudgeJob {
    pub fn test_case(&self) -> TestCase {
        TestCase::new(self.id.clone(), self.input.clone(), self.answer.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchJob {
    pub command: String,
    #[serde(default)]
    pub tests: Vec<TestSpec>,
    #[serde(default)]
    pub engine: EngineOverrides,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StressJob {
    pub generator: String,
    pub reference: String,
    pub candidate: String,
    /// Where a failing input is saved; `$%test%$` is replaced by the test id
    pub test_path: String,
    #[serde(default)]
    pub engine: EngineOverrides,
}

impl StressJob {
    pub fn commands(&self) -> StressCommands {
        StressCommands {
            generator: self.generator.clone(),
            reference: self.reference.clone(),
            candidate: self.candidate.clone(),
        }
    }
}

/// Read and parse a job file
pub fn load_job(path: &Path) -> Result<Job> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file {:?}", path))?;
    parse_job(&content).with_context(|| format!("Invalid job file {:?}", path))
}

pub fn parse_job(content: &str) -> Result<Job> {
    let job = toml::from_str(content)?;
    Ok(job)
}
