//! Runner module - Execution abstraction layer
//!
//! This module provides a unified interface for running programs:
//! - `ProcessRunner`: spawns the command directly and samples its memory
//! - `SandboxedRunner`: wraps the command in the sio2jail sandbox
//!
//! The runner module does NOT:
//! - Compare outputs or determine WA
//! - Know about test files, generators or the worker pool

pub mod process;
pub mod sandboxed;

use async_trait::async_trait;
use std::fs::File;

use crate::core::VerdictStatus;
use crate::error::RunError;

/// Data fed to the program's standard input
#[derive(Debug)]
pub enum ProcessInput {
    /// Written through a pipe
    Bytes(Vec<u8>),
    /// Redirected as the child's stdin
    File(File),
}

impl From<Vec<u8>> for ProcessInput {
    fn from(bytes: Vec<u8>) -> Self {
        ProcessInput::Bytes(bytes)
    }
}

impl From<&str> for ProcessInput {
    fn from(text: &str) -> Self {
        ProcessInput::Bytes(text.as_bytes().to_vec())
    }
}

impl From<File> for ProcessInput {
    fn from(file: File) -> Self {
        ProcessInput::File(file)
    }
}

/// Resource limits enforced by the sandbox
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceLimits {
    /// Time limit in seconds
    pub time_limit_secs: u32,
    /// Memory limit in MB
    pub memory_limit_mb: u32,
}

impl ResourceLimits {
    pub fn new(time_limit_secs: u32, memory_limit_mb: u32) -> Self {
        Self {
            time_limit_secs,
            memory_limit_mb,
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            time_limit_secs: 10,
            memory_limit_mb: 1024,
        }
    }
}

/// One run of one command
#[derive(Debug)]
pub struct ExecutionRequest {
    /// Fully substituted command line
    pub command: String,
    pub input: ProcessInput,
    pub limits: Option<ResourceLimits>,
}

impl ExecutionRequest {
    pub fn new(command: impl Into<String>, input: impl Into<ProcessInput>) -> Self {
        Self {
            command: command.into(),
            input: input.into(),
            limits: None,
        }
    }

    pub fn with_limits(mut self, limits: Option<ResourceLimits>) -> Self {
        self.limits = limits;
        self
    }
}

/// Outcome of running a program
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// `Ok` until output comparison says otherwise
    pub status: VerdictStatus,
    /// User CPU time in seconds
    pub time_secs: f64,
    /// Peak resident memory in MB
    pub memory_mb: f64,
    /// Captured stdout, partial if the program failed
    pub output: Vec<u8>,
    pub error: Option<RunError>,
}

impl ProcessOutcome {
    /// Outcome of a run that produced nothing measurable
    pub fn failed(status: VerdictStatus, error: RunError) -> Self {
        Self {
            status,
            time_secs: 0.0,
            memory_mb: 0.0,
            output: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_ok()
    }
}

/// Runner trait for executing programs
///
/// Implementations never fail outright: launch problems, crashes and
/// sandbox trouble all end up in the returned outcome.
#[async_trait]
pub trait Runner: Send + Sync {
    /// One-time setup before the first run
    async fn prepare(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run(&self, request: ExecutionRequest) -> ProcessOutcome;
}

// Re-exports
pub use process::ProcessRunner;
pub use sandboxed::SandboxedRunner;
