//! Engine configuration
//!
//! Loaded from environment variables (`.env` is honoured by the binary) and
//! optionally overridden per job.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::core::expand_home;
use crate::pool::DEFAULT_WORKERS;
use crate::runner::process::DEFAULT_POLL_INTERVAL;
use crate::sandbox::SandboxOptions;

/// Engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of concurrent workers (default: 10)
    pub workers: usize,
    /// Delay between memory samples in milliseconds (default: 10)
    pub poll_interval_ms: u64,
    /// Print every verdict, not only the running totals
    pub verbose: bool,
    /// Run programs under the sandbox when set
    pub sandbox: Option<SandboxOptions>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            verbose: false,
            sandbox: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let sandbox = if parse_var(&lookup, "JUDGE_SANDBOX")?.map(Flag::get).unwrap_or(false) {
            let mut options = SandboxOptions::default();
            if let Some(path) = lookup("SIO2JAIL_PATH") {
                options.binary_path = expand_home(&path);
            }
            options.binary_source = lookup("SIO2JAIL_SOURCE").map(|path| expand_home(&path));
            options.time_limit_secs = parse_var(&lookup, "JUDGE_TIME_LIMIT")?;
            options.memory_limit_mb = parse_var(&lookup, "JUDGE_MEMORY_LIMIT")?;
            Some(options)
        } else {
            None
        };

        let config = Self {
            workers: parse_var(&lookup, "JUDGE_WORKERS")?.unwrap_or(defaults.workers),
            poll_interval_ms: parse_var(&lookup, "JUDGE_POLL_INTERVAL_MS")?
                .unwrap_or(defaults.poll_interval_ms),
            verbose: parse_var(&lookup, "JUDGE_VERBOSE")?.map(Flag::get).unwrap_or(false),
            sandbox,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pool cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("Worker count must be at least 1");
        }
        if self.poll_interval_ms == 0 {
            bail!("Poll interval must be at least 1ms");
        }
        if let Some(sandbox) = &self.sandbox {
            if sandbox.time_limit_secs == Some(0) {
                bail!("Sandbox time limit must be at least 1s");
            }
            if sandbox.memory_limit_mb == Some(0) {
                bail!("Sandbox memory limit must be at least 1MB");
            }
        }
        Ok(())
    }

    /// Apply per-job overrides on top of this configuration
    pub fn apply(&mut self, overrides: &EngineOverrides) -> Result<()> {
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
        if let Some(poll_interval_ms) = overrides.poll_interval_ms {
            self.poll_interval_ms = poll_interval_ms;
        }
        if let Some(verbose) = overrides.verbose {
            self.verbose = verbose;
        }

        match overrides.sandbox {
            Some(false) => self.sandbox = None,
            Some(true) if self.sandbox.is_none() => self.sandbox = Some(SandboxOptions::default()),
            _ => {}
        }

        let touches_sandbox = overrides.time_limit_secs.is_some()
            || overrides.memory_limit_mb.is_some()
            || overrides.sandbox_path.is_some()
            || overrides.sandbox_source.is_some();
        match self.sandbox.as_mut() {
            Some(sandbox) => {
                if let Some(time_limit_secs) = overrides.time_limit_secs {
                    sandbox.time_limit_secs = Some(time_limit_secs);
                }
                if let Some(memory_limit_mb) = overrides.memory_limit_mb {
                    sandbox.memory_limit_mb = Some(memory_limit_mb);
                }
                if let Some(path) = &overrides.sandbox_path {
                    sandbox.binary_path = path.clone();
                }
                if let Some(source) = &overrides.sandbox_source {
                    sandbox.binary_source = Some(source.clone());
                }
            }
            None if touches_sandbox => {
                bail!("Sandbox settings given but the sandbox is disabled (set `sandbox = true`)")
            }
            None => {}
        }

        self.validate()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Per-job overrides, every field optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineOverrides {
    pub workers: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub verbose: Option<bool>,
    pub sandbox: Option<bool>,
    pub time_limit_secs: Option<u32>,
    pub memory_limit_mb: Option<u32>,
    pub sandbox_path: Option<PathBuf>,
    pub sandbox_source: Option<PathBuf>,
}

/// Boolean environment value (`1/0`, `true/false`, `yes/no`, `on/off`)
struct Flag(bool);

impl Flag {
    fn get(self) -> bool {
        self.0
    }
}

impl FromStr for Flag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Flag(true)),
            "" | "0" | "false" | "no" | "off" => Ok(Flag(false)),
            other => Err(format!("expected a boolean, got `{}`", other)),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
    }
}
