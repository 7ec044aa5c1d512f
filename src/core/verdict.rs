use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a submission
///
/// `Pending -> Running -> <terminal>`; every other move is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Running,
    Accepted,
    WrongAnswer,
    CompileError,
    RuntimeError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    SystemError,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending | SubmissionStatus::Running)
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        match self {
            SubmissionStatus::Pending => next == SubmissionStatus::Running,
            SubmissionStatus::Running => next.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Running => "running",
            SubmissionStatus::Accepted => "accepted",
            SubmissionStatus::WrongAnswer => "wrong_answer",
            SubmissionStatus::CompileError => "compile_error",
            SubmissionStatus::RuntimeError => "runtime_error",
            SubmissionStatus::TimeLimitExceeded => "time_limit_exceeded",
            SubmissionStatus::MemoryLimitExceeded => "memory_limit_exceeded",
            SubmissionStatus::SystemError => "system_error",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        use SubmissionStatus::*;

        assert!(Pending.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Accepted));
        assert!(Running.can_transition_to(WrongAnswer));
        assert!(Running.can_transition_to(SystemError));
        assert!(!Running.can_transition_to(Pending));
        assert!(!Accepted.can_transition_to(Running));
        assert!(!SystemError.can_transition_to(Accepted));
    }

    #[test]
    fn test_display_matches_serde() {
        let status = SubmissionStatus::TimeLimitExceeded;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, format!("\"{}\"", status));
    }
}
