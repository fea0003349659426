//! Sandboxed runner implementation using sio2jail
//!
//! Executes the candidate under instruction-count and memory ceilings and
//! reports the sandbox's verdict in the same shape as a direct run.

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ExecutionRequest, ProcessOutcome, ProcessRunner, ResourceLimits, Runner};
use crate::core::VerdictStatus;
use crate::error::RunError;
use crate::sandbox::{parse_report, sandbox_command, SandboxInstaller, SandboxOptions, SandboxReport};

/// Runner that executes code inside the sandbox
#[derive(Debug)]
pub struct SandboxedRunner {
    inner: ProcessRunner,
    installer: SandboxInstaller,
    default_limits: ResourceLimits,
}

impl SandboxedRunner {
    pub fn new(options: &SandboxOptions, inner: ProcessRunner) -> Self {
        Self {
            inner,
            installer: SandboxInstaller::new(&options.binary_path, options.binary_source.clone()),
            default_limits: options.limits(),
        }
    }

    /// Run a command in the sandbox
    pub async fn execute(&self, request: ExecutionRequest) -> ProcessOutcome {
        let binary = match self.installer.ensure_installed().await {
            Ok(path) => path.to_path_buf(),
            Err(e) => {
                return ProcessOutcome::failed(
                    VerdictStatus::InternalError,
                    RunError::SandboxInstall(format!("{:#}", e)),
                );
            }
        };

        let results = match tempfile::Builder::new().prefix("sio2jail-").tempfile() {
            Ok(file) => file,
            Err(e) => {
                return ProcessOutcome::failed(
                    VerdictStatus::InternalError,
                    RunError::io("Failed to create sandbox result file", e),
                );
            }
        };
        let channel = match results.reopen() {
            Ok(file) => file,
            Err(e) => {
                return ProcessOutcome::failed(
                    VerdictStatus::InternalError,
                    RunError::io(results.path().display(), e),
                );
            }
        };

        let limits = request.limits.unwrap_or(self.default_limits);
        let command = sandbox_command(&binary, &limits, &request.command);
        debug!("Running sandboxed command: {}", command);

        let wrapped = ExecutionRequest {
            command,
            input: request.input,
            limits: Some(limits),
        };
        let process = self.inner.run_with_aux(wrapped, Some(channel)).await;

        let report = tokio::fs::read_to_string(results.path())
            .await
            .map_err(|e| RunError::io(results.path().display(), e))
            .and_then(|content| parse_report(&content));

        merge_outcome(process, report)
    }
}

#[async_trait]
impl Runner for SandboxedRunner {
    async fn prepare(&self) -> anyhow::Result<()> {
        self.installer.ensure_installed().await.map(|_| ())
    }

    async fn run(&self, request: ExecutionRequest) -> ProcessOutcome {
        self.execute(request).await
    }
}

/// Combine the sandbox process outcome with the sandbox's own report.
///
/// The captured stdout always comes from the process, the report never
/// contains it.
fn merge_outcome(
    process: ProcessOutcome,
    report: Result<SandboxReport, RunError>,
) -> ProcessOutcome {
    match report {
        Err(report_error) if process.is_success() => {
            warn!("Sandbox exited cleanly without a usable report: {}", report_error);
            ProcessOutcome {
                status: VerdictStatus::InternalError,
                error: Some(report_error),
                ..process
            }
        }
        Err(report_error) => {
            // The sandbox itself failed; never report that as success
            debug!(
                "Falling back to process status {} (report: {})",
                process.status, report_error
            );
            process
        }
        Ok(report) if report.status.is_ok() && !process.is_success() => {
            let reason = process
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| process.status.to_string());
            ProcessOutcome {
                status: VerdictStatus::InternalError,
                time_secs: report.time_secs,
                memory_mb: report.memory_mb,
                output: process.output,
                error: Some(RunError::Sandbox(format!(
                    "sandbox reported OK but exited abnormally: {}",
                    reason
                ))),
            }
        }
        Ok(report) => ProcessOutcome {
            status: report.status,
            time_secs: report.time_secs,
            memory_mb: report.memory_mb,
            output: process.output,
            error: report.error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::time::{Duration, Instant};

    /// Stand-in for sio2jail: runs the target under `timeout` and writes a
    /// three-line report to descriptor 3.
    const FAKE_SANDBOX: &str = r#"#!/bin/sh
limit=1
while [ "$1" != "--" ]; do
    if [ "$1" = "--instruction-count-limit" ]; then limit="${2%g}"; fi
    shift
done
shift
timeout "$limit" "$@"
code=$?
if [ "$code" -eq 124 ]; then
    printf 'TLE 0 %d 0 0 0\ntime limit exceeded\n' "$((limit * 1000))" >&3
elif [ "$code" -ne 0 ]; then
    printf 'RE 0 0 0 0 0\nprocess exited due to signal or code %d\n' "$code" >&3
else
    printf 'OK 0 12 0 2048 0\nok\n' >&3
fi
"#;

    fn write_script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn sandboxed(binary: &Path, time_limit_secs: u32) -> SandboxedRunner {
        let options = SandboxOptions {
            binary_path: binary.to_path_buf(),
            binary_source: None,
            time_limit_secs: Some(time_limit_secs),
            memory_limit_mb: Some(256),
        };
        SandboxedRunner::new(&options, ProcessRunner::new(Duration::from_millis(2)))
    }

    fn outcome(status: VerdictStatus, error: Option<RunError>) -> ProcessOutcome {
        ProcessOutcome {
            status,
            time_secs: 0.25,
            memory_mb: 3.0,
            output: b"partial".to_vec(),
            error,
        }
    }

    #[tokio::test]
    async fn test_ok_report_carries_process_output() {
        let dir = tempfile::tempdir().unwrap();
        let jail = write_script(dir.path(), "sio2jail", FAKE_SANDBOX);

        let result = sandboxed(&jail, 5)
            .run(ExecutionRequest::new("sh -c 'read a; read b; echo $((a + b))'", "3\n4\n"))
            .await;

        assert_eq!(result.status, VerdictStatus::Ok);
        assert_eq!(result.output, b"7\n");
        assert_eq!(result.time_secs, 0.012);
        assert_eq!(result.memory_mb, 2.0);
    }

    #[tokio::test]
    async fn test_runtime_error_message_comes_from_report() {
        let dir = tempfile::tempdir().unwrap();
        let jail = write_script(dir.path(), "sio2jail", FAKE_SANDBOX);

        let result = sandboxed(&jail, 5)
            .run(ExecutionRequest::new("sh -c 'exit 1'", ""))
            .await;

        assert_eq!(result.status, VerdictStatus::RuntimeError);
        assert_eq!(
            result.error,
            Some(RunError::Sandbox("process exited due to signal or code 1".into()))
        );
    }

    #[tokio::test]
    async fn test_sleeping_candidate_hits_time_limit() {
        let dir = tempfile::tempdir().unwrap();
        let jail = write_script(dir.path(), "sio2jail", FAKE_SANDBOX);

        let started = Instant::now();
        let result = sandboxed(&jail, 1)
            .run(ExecutionRequest::new("sleep 20", ""))
            .await;

        assert_eq!(result.status, VerdictStatus::TimeLimitExceeded);
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_binary_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = sandboxed(&dir.path().join("absent"), 1)
            .run(ExecutionRequest::new("true", ""))
            .await;

        assert_eq!(result.status, VerdictStatus::InternalError);
        assert!(matches!(result.error, Some(RunError::SandboxInstall(_))));
    }

    #[tokio::test]
    async fn test_silent_sandbox_crash_is_not_success() {
        let dir = tempfile::tempdir().unwrap();
        let jail = write_script(dir.path(), "sio2jail", "#!/bin/sh\nexit 0\n");

        let result = sandboxed(&jail, 1)
            .run(ExecutionRequest::new("true", ""))
            .await;

        assert_eq!(result.status, VerdictStatus::InternalError);
        assert_eq!(result.error, Some(RunError::InvalidSandboxResult));
    }

    #[test]
    fn test_malformed_report_falls_back_to_process_status() {
        let process = outcome(VerdictStatus::RuntimeError, Some(RunError::ExitCode(2)));
        let merged = merge_outcome(process, Err(RunError::InvalidSandboxResult));

        assert_eq!(merged.status, VerdictStatus::RuntimeError);
        assert_eq!(merged.error, Some(RunError::ExitCode(2)));
        assert_eq!(merged.output, b"partial");
    }

    #[test]
    fn test_judged_report_wins_over_process_status() {
        let process = outcome(VerdictStatus::RuntimeError, Some(RunError::ExitCode(1)));
        let report = SandboxReport {
            status: VerdictStatus::MemoryLimitExceeded,
            time_secs: 0.1,
            memory_mb: 300.0,
            error: None,
        };
        let merged = merge_outcome(process, Ok(report));

        assert_eq!(merged.status, VerdictStatus::MemoryLimitExceeded);
        assert_eq!(merged.memory_mb, 300.0);
        assert_eq!(merged.output, b"partial");
    }

    #[test]
    fn test_ok_report_from_failed_sandbox_is_internal() {
        let process = outcome(VerdictStatus::RuntimeError, Some(RunError::Signal("SIGSEGV".into())));
        let report = SandboxReport {
            status: VerdictStatus::Ok,
            time_secs: 0.1,
            memory_mb: 1.0,
            error: None,
        };
        let merged = merge_outcome(process, Ok(report));

        assert_eq!(merged.status, VerdictStatus::InternalError);
        assert!(merged.error.unwrap().to_string().contains("SIGSEGV"));
    }
}
