use std::fmt;

/// Terminal status of one judged execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VerdictStatus {
    Ok,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    OutputLimitExceeded,
    RuntimeError,
    /// Harness or sandbox malfunction, not the candidate's fault
    InternalError,
}

impl VerdictStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, VerdictStatus::Ok)
    }

    /// Whether this status is attributable to the program under test
    pub fn is_candidate_fault(&self) -> bool {
        !matches!(self, VerdictStatus::Ok | VerdictStatus::InternalError)
    }
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerdictStatus::Ok => "OK",
            VerdictStatus::WrongAnswer => "WA",
            VerdictStatus::TimeLimitExceeded => "TLE",
            VerdictStatus::MemoryLimitExceeded => "MLE",
            VerdictStatus::OutputLimitExceeded => "OLE",
            VerdictStatus::RuntimeError => "RE",
            VerdictStatus::InternalError => "INT",
        };
        write!(f, "{}", s)
    }
}
