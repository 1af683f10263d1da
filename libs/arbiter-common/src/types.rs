use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Highest remote status id that is still in flight (1 = queued, 2 = processing)
pub const LAST_PENDING_STATUS: u32 = 2;

/// Test Case Definition (Immutable Input)
/// Served by the problem store, ordering matters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub output: String,
}

/// Problem as stored by the problem service
/// Only the parts the judge reads are modelled here
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: String,
    #[serde(default)]
    pub visible_test_cases: Vec<TestCase>,
    #[serde(default)]
    pub hidden_test_cases: Vec<TestCase>,
}

/// Opaque handle the remote service hands out for one in-flight execution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(pub String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single unit of remote work, one per test case
/// Write-once - built fresh for every batch and never mutated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub source_code: String,
    pub language_id: u32,
    pub stdin: String,
    pub expected_output: String,
}

impl ExecutionRequest {
    pub fn for_case(source_code: &str, language_id: u32, case: &TestCase) -> Self {
        Self {
            source_code: source_code.to_string(),
            language_id,
            stdin: case.input.clone(),
            expected_output: case.output.clone(),
        }
    }
}

/// Outcome of one remote execution as reported by the poll endpoint
///
/// `time` is in seconds and `memory` in KB; both are zero when the remote
/// side did not report them (compile errors, queued entries).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub token: Token,
    pub status_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_description: Option<String>,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    pub time: f64,
    #[serde(default)]
    pub memory: u64,
}

impl ExecutionResult {
    /// Queued (1) and processing (2) are the only in-flight states
    pub fn is_terminal(&self) -> bool {
        self.status_id > LAST_PENDING_STATUS
    }
}

/// Overall outcome of one judged batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictStatus {
    Accepted,
    Wrong,
    Error,
}

impl fmt::Display for VerdictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerdictStatus::Accepted => write!(f, "accepted"),
            VerdictStatus::Wrong => write!(f, "wrong"),
            VerdictStatus::Error => write!(f, "error"),
        }
    }
}

/// Reduction of one batch's execution results
///
/// ## Semantics:
/// - runtime: sum of `time` over accepted cases only (seconds)
/// - memory: max of `memory` over accepted cases only (KB)
/// - error_message: stderr of the first non-accepted case in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: VerdictStatus,
    pub tests_passed: u32,
    pub tests_total: u32,
    pub runtime: f64,
    pub memory: u64,
    pub error_message: Option<String>,
}

impl Verdict {
    /// Verdict recorded when judging could not complete at all
    pub fn failed(tests_total: u32, message: impl Into<String>) -> Self {
        Self {
            status: VerdictStatus::Error,
            tests_passed: 0,
            tests_total,
            runtime: 0.0,
            memory: 0,
            error_message: Some(message.into()),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == VerdictStatus::Accepted
    }
}

/// Submission State Machine
/// pending -> {accepted, wrong, error} is the only permitted transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Accepted,
    Wrong,
    Error,
}

impl From<VerdictStatus> for SubmissionStatus {
    fn from(status: VerdictStatus) -> Self {
        match status {
            VerdictStatus::Accepted => SubmissionStatus::Accepted,
            VerdictStatus::Wrong => SubmissionStatus::Wrong,
            VerdictStatus::Error => SubmissionStatus::Error,
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionStatus::Pending => write!(f, "pending"),
            SubmissionStatus::Accepted => write!(f, "accepted"),
            SubmissionStatus::Wrong => write!(f, "wrong"),
            SubmissionStatus::Error => write!(f, "error"),
        }
    }
}

/// Durable submission record
/// Written as `pending` before any remote call, finalized exactly once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub user_id: String,
    pub problem_id: String,
    pub code: String,
    pub language: String,
    pub status: SubmissionStatus,
    pub runtime: f64,
    pub memory: u64,
    pub test_cases_passed: u32,
    pub test_cases_total: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn pending(
        user_id: &str,
        problem_id: &str,
        code: &str,
        language: &str,
        test_cases_total: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            problem_id: problem_id.to_string(),
            code: code.to_string(),
            language: language.to_string(),
            status: SubmissionStatus::Pending,
            runtime: 0.0,
            memory: 0,
            test_cases_passed: 0,
            test_cases_total,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == SubmissionStatus::Pending
    }

    /// Write a verdict into a pending record
    /// Returns false (and leaves the record untouched) if it is already terminal
    pub fn apply_verdict(&mut self, verdict: &Verdict) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.status = verdict.status.into();
        self.runtime = verdict.runtime;
        self.memory = verdict.memory;
        self.test_cases_passed = verdict.tests_passed;
        self.error_message = verdict.error_message.clone();
        self.updated_at = Utc::now();
        true
    }
}
