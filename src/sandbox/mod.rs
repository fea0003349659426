//! Sandbox module - Low-level sio2jail wrapper
//!
//! This module provides a minimal abstraction over the sio2jail sandbox.
//! It handles:
//! - Installing the sandbox binary on first use
//! - Building the wrapped command line with time/memory ceilings
//! - Parsing the structured result the sandbox writes to descriptor 3
//!
//! The sandbox module does NOT:
//! - Spawn processes (that's the runner's job)
//! - Compare outputs

pub mod config;
pub mod install;
pub mod report;

// Re-exports for convenience
pub use config::{sandbox_command, SandboxOptions, DEFAULT_BINARY_PATH};
pub use install::SandboxInstaller;
pub use report::{parse_report, SandboxReport};
