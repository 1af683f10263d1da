pub mod types;
pub mod redis;
pub mod config;

// Re-export commonly used types for convenience
pub use config::Config;
pub use types::{
    ExecutionRequest, ExecutionResult, Submission, SubmissionStatus, TestCase, Token, Verdict,
    VerdictStatus,
};
