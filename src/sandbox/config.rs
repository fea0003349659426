//! Sandbox configuration
//!
//! Where the sio2jail binary lives, where to install it from, and the limits
//! applied to every sandboxed run.

use std::path::{Path, PathBuf};

use crate::core::expand_home;
use crate::runner::process::AUX_FD;
use crate::runner::ResourceLimits;

/// Default install location of the sandbox binary
pub const DEFAULT_BINARY_PATH: &str = "~/.st/sio2jail";

/// Namespace and capability switches passed to every sio2jail invocation
const JAIL_OPTIONS: &[&str] = &[
    "--mount-namespace",
    "off",
    "--pid-namespace",
    "off",
    "--uts-namespace",
    "off",
    "--ipc-namespace",
    "off",
    "--net-namespace",
    "off",
    "--capability-drop",
    "off",
    "--user-namespace",
    "off",
    "-s",
];

/// Sandbox options
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxOptions {
    /// Installed sandbox binary
    pub binary_path: PathBuf,
    /// Binary copied to `binary_path` on first use when it is missing
    pub binary_source: Option<PathBuf>,
    /// Time limit in seconds (default: 10)
    pub time_limit_secs: Option<u32>,
    /// Memory limit in MB (default: 1024)
    pub memory_limit_mb: Option<u32>,
}

impl Default for SandboxOptions {
    fn default() -> Self {
        Self {
            binary_path: expand_home(DEFAULT_BINARY_PATH),
            binary_source: None,
            time_limit_secs: None,
            memory_limit_mb: None,
        }
    }
}

impl SandboxOptions {
    /// Limits with defaults filled in for anything not overridden
    pub fn limits(&self) -> ResourceLimits {
        let defaults = ResourceLimits::default();
        ResourceLimits {
            time_limit_secs: self.time_limit_secs.unwrap_or(defaults.time_limit_secs),
            memory_limit_mb: self.memory_limit_mb.unwrap_or(defaults.memory_limit_mb),
        }
    }
}

/// Build the command line that runs `command` under the sandbox.
///
/// The sandbox writes its structured result to descriptor `AUX_FD`.
pub fn sandbox_command(binary: &Path, limits: &ResourceLimits, command: &str) -> String {
    format!(
        "{} -f {} --instruction-count-limit {}g -o oiaug {} --memory-limit {}M -- {}",
        quote(&binary.to_string_lossy()),
        AUX_FD,
        limits.time_limit_secs,
        JAIL_OPTIONS.join(" "),
        limits.memory_limit_mb,
        command
    )
}

/// Quote a word so `split_command` keeps it in one piece
fn quote(word: &str) -> String {
    if word.contains('\'') {
        format!("\"{}\"", word)
    } else {
        format!("'{}'", word)
    }
}
