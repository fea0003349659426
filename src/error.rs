//! Error values attached to process outcomes and verdicts

use thiserror::Error;

/// Why an execution did not finish cleanly
///
/// Carried inside outcomes rather than returned, so a failing test is
/// tallied instead of aborting its siblings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to launch `{program}`: {reason}")]
    Launch { program: String, reason: String },

    #[error("exit status {0}")]
    ExitCode(i32),

    #[error("killed by {0}")]
    Signal(String),

    /// Message reported by the sandbox for a runtime error
    #[error("{0}")]
    Sandbox(String),

    #[error("invalid sandbox results returned")]
    InvalidSandboxResult,

    #[error("invalid sandbox status `{0}`")]
    UnknownSandboxStatus(String),

    #[error("invalid sandbox metrics: {0}")]
    SandboxMetrics(String),

    #[error("sandbox unavailable: {0}")]
    SandboxInstall(String),

    #[error("{0}")]
    Io(String),
}

impl RunError {
    /// Wrap an I/O failure, keeping the path it happened on
    pub fn io(context: impl std::fmt::Display, err: std::io::Error) -> Self {
        RunError::Io(format!("{}: {}", context, err))
    }
}
