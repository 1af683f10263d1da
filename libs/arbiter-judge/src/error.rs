use std::time::Duration;

/// Failures surfaced by the judging pipeline
///
/// Wrong answers and runtime errors are *not* here: they are ordinary
/// outcomes and travel inside the `Verdict`.
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("problem not found: {0}")]
    ProblemNotFound(String),

    #[error("problem {0} has no test cases to judge against")]
    NoTestCases(String),

    #[error("remote execution service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("remote execution service protocol error: {0}")]
    RemoteProtocolError(String),

    #[error("judging did not settle after {iterations} polls in {elapsed:?}")]
    JudgingTimeout { iterations: u32, elapsed: Duration },

    #[error("reference solution in {language} rejected on case {case}: {status}")]
    ReferenceRejected {
        language: String,
        case: usize,
        status: String,
    },

    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl JudgeError {
    /// Stable machine-readable kind, used in API bodies and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            JudgeError::UnsupportedLanguage(_) => "unsupported_language",
            JudgeError::InvalidInput(_) => "invalid_input",
            JudgeError::ProblemNotFound(_) => "problem_not_found",
            JudgeError::NoTestCases(_) => "no_test_cases",
            JudgeError::RemoteUnavailable(_) => "remote_unavailable",
            JudgeError::RemoteProtocolError(_) => "remote_protocol_error",
            JudgeError::JudgingTimeout { .. } => "judging_timeout",
            JudgeError::ReferenceRejected { .. } => "reference_rejected",
            JudgeError::Store(_) => "store_error",
            JudgeError::Internal(_) => "internal_error",
        }
    }

    /// Errors raised while talking to the remote service
    /// On the submit path these finalize the submission to `error`
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            JudgeError::RemoteUnavailable(_)
                | JudgeError::RemoteProtocolError(_)
                | JudgeError::JudgingTimeout { .. }
        )
    }
}

impl From<redis::RedisError> for JudgeError {
    fn from(e: redis::RedisError) -> Self {
        JudgeError::Store(e.to_string())
    }
}
