//! Sandbox result file parser
//!
//! The sandbox writes exactly three lines to its result channel:
//! `<STATUS> <a> <time_ms> <b> <memory_kb> ...`, a message, and an empty
//! trailing line.

use crate::core::VerdictStatus;
use crate::error::RunError;

/// Parsed sandbox result
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxReport {
    pub status: VerdictStatus,
    /// CPU time in seconds
    pub time_secs: f64,
    /// Peak memory in MB
    pub memory_mb: f64,
    pub error: Option<RunError>,
}

impl SandboxReport {
    fn new(status: VerdictStatus) -> Self {
        Self {
            status,
            time_secs: 0.0,
            memory_mb: 0.0,
            error: None,
        }
    }
}

/// Parse the sandbox result file content.
///
/// `Err(InvalidSandboxResult)` means the file cannot be trusted at all and
/// the caller should fall back to the process exit status.
pub fn parse_report(content: &str) -> Result<SandboxReport, RunError> {
    let lines: Vec<&str> = content.split('\n').collect();
    if lines.len() != 3 {
        return Err(RunError::InvalidSandboxResult);
    }

    let fields: Vec<&str> = lines[0].split_whitespace().collect();
    let message = lines[1].trim();
    let metrics = parse_metrics(&fields);

    let mut report = match fields.first().copied() {
        Some("OK") => match metrics {
            Ok((time_secs, memory_mb)) => {
                return Ok(SandboxReport {
                    status: VerdictStatus::Ok,
                    time_secs,
                    memory_mb,
                    error: None,
                })
            }
            Err(reason) => {
                let mut report = SandboxReport::new(VerdictStatus::InternalError);
                report.error = Some(RunError::SandboxMetrics(reason));
                return Ok(report);
            }
        },
        Some("RE") | Some("RV") => {
            let mut report = SandboxReport::new(VerdictStatus::RuntimeError);
            report.error = Some(RunError::Sandbox(message.to_string()));
            report
        }
        Some("TLE") => SandboxReport::new(VerdictStatus::TimeLimitExceeded),
        Some("MLE") => SandboxReport::new(VerdictStatus::MemoryLimitExceeded),
        Some("OLE") => SandboxReport::new(VerdictStatus::OutputLimitExceeded),
        other => {
            let mut report = SandboxReport::new(VerdictStatus::InternalError);
            report.error = Some(RunError::UnknownSandboxStatus(
                other.unwrap_or_default().to_string(),
            ));
            return Ok(report);
        }
    };

    // Judged failures keep whatever metrics the sandbox managed to record
    if let Ok((time_secs, memory_mb)) = metrics {
        report.time_secs = time_secs;
        report.memory_mb = memory_mb;
    }

    Ok(report)
}

/// Time (ms, field 3) and memory (KB, field 5) as seconds and MB
fn parse_metrics(fields: &[&str]) -> Result<(f64, f64), String> {
    let time_ms = fields
        .get(2)
        .ok_or("missing time field")?
        .parse::<f64>()
        .map_err(|e| format!("time: {}", e))?;
    let memory_kb = fields
        .get(4)
        .ok_or("missing memory field")?
        .parse::<u64>()
        .map_err(|e| format!("memory: {}", e))?;

    Ok((time_ms / 1000.0, memory_kb as f64 / 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok() {
        let report = parse_report("OK 0 1500 0 2048 0\nok\n").unwrap();

        assert_eq!(report.status, VerdictStatus::Ok);
        assert_eq!(report.time_secs, 1.5);
        assert_eq!(report.memory_mb, 2.0);
        assert!(report.error.is_none());
    }

    #[test]
    fn test_parse_runtime_error_keeps_message() {
        for token in ["RE", "RV"] {
            let report = parse_report(&format!("{} 0 0 0 0 0\nexited with status 1\n", token)).unwrap();
            assert_eq!(report.status, VerdictStatus::RuntimeError);
            assert_eq!(
                report.error,
                Some(RunError::Sandbox("exited with status 1".into()))
            );
        }
    }

    #[test]
    fn test_parse_limit_statuses() {
        let tle = parse_report("TLE 0 1003 0 512 0\ntime limit exceeded\n").unwrap();
        assert_eq!(tle.status, VerdictStatus::TimeLimitExceeded);
        assert_eq!(tle.time_secs, 1.003);

        let mle = parse_report("MLE\nmemory limit exceeded\n").unwrap();
        assert_eq!(mle.status, VerdictStatus::MemoryLimitExceeded);
        assert_eq!(mle.time_secs, 0.0);

        let ole = parse_report("OLE 0 1 0 1 0\n\n").unwrap();
        assert_eq!(ole.status, VerdictStatus::OutputLimitExceeded);
    }

    #[test]
    fn test_unknown_status_is_internal() {
        let report = parse_report("XX 0 0 0 0 0\nboom\n").unwrap();
        assert_eq!(report.status, VerdictStatus::InternalError);
        assert_eq!(report.error, Some(RunError::UnknownSandboxStatus("XX".into())));
    }

    #[test]
    fn test_ok_with_bad_metrics_is_internal() {
        let report = parse_report("OK 0 fast 0 2048 0\nok\n").unwrap();
        assert_eq!(report.status, VerdictStatus::InternalError);
        assert!(matches!(report.error, Some(RunError::SandboxMetrics(_))));
    }

    #[test]
    fn test_wrong_line_count_is_invalid() {
        assert_eq!(parse_report(""), Err(RunError::InvalidSandboxResult));
        assert_eq!(parse_report("OK 0 1 0 1 0\n"), Err(RunError::InvalidSandboxResult));
        assert_eq!(
            parse_report("OK 0 1 0 1 0\nok\n\n"),
            Err(RunError::InvalidSandboxResult)
        );
    }
}
