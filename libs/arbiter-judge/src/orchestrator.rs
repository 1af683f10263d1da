/// Judge - High-Level Orchestration
///
/// **Responsibility:**
/// Glue the pipeline together for the two exposed operations:
/// - run:    resolve -> submit batch -> poll -> aggregate (visible cases, nothing stored)
/// - submit: resolve -> create pending -> submit batch -> poll -> aggregate -> finalize
///
/// This module knows nothing about:
/// - The wire format of the remote service (judge0's job)
/// - How a verdict is reduced (evaluator's job)
/// - How records are stored (store's job)
///
/// ## Detached finalize
/// On the submit path everything after `create_pending` runs on its own
/// task. Dropping the caller's future does not cancel it, so a pending
/// record is always finalized within the poll bound.

use crate::backend::ExecutionBackend;
use crate::error::JudgeError;
use crate::evaluator::{aggregate, case_details, CaseDetail};
use crate::language::LanguageResolver;
use crate::lifecycle::SubmissionLifecycle;
use crate::poller::{await_settlement, PollPolicy};
use crate::status::StatusTable;
use crate::store::{ProblemStore, SubmissionStore};
use arbiter_common::types::{
    ExecutionRequest, ExecutionResult, SubmissionStatus, TestCase, Verdict,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

/// Safety limit to keep pathological payloads away from the remote service
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB

/// Outcome of the run path
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub verdict: Verdict,
    pub cases: Vec<CaseDetail>,
}

/// Outcome of the submit path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionSummary {
    pub submission_id: Uuid,
    pub status: SubmissionStatus,
    pub test_cases_passed: u32,
    pub test_cases_total: u32,
    pub runtime: f64,
    pub memory: u64,
    pub error_message: Option<String>,
}

impl SubmissionSummary {
    fn new(submission_id: Uuid, verdict: &Verdict) -> Self {
        Self {
            submission_id,
            status: verdict.status.into(),
            test_cases_passed: verdict.tests_passed,
            test_cases_total: verdict.tests_total,
            runtime: verdict.runtime,
            memory: verdict.memory,
            error_message: verdict.error_message.clone(),
        }
    }
}

/// A known-good solution a problem author ships with the problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceSolution {
    pub language: String,
    pub code: String,
}

#[derive(Clone)]
pub struct Judge {
    backend: Arc<dyn ExecutionBackend>,
    problems: Arc<dyn ProblemStore>,
    lifecycle: SubmissionLifecycle,
    languages: Arc<LanguageResolver>,
    statuses: Arc<StatusTable>,
    policy: PollPolicy,
}

fn validate_input(code: &str, language: &str) -> Result<(), JudgeError> {
    if code.trim().is_empty() {
        return Err(JudgeError::InvalidInput("source code is empty".to_string()));
    }
    if code.len() > MAX_SOURCE_CODE_BYTES {
        return Err(JudgeError::InvalidInput(format!(
            "source code exceeds maximum size of {} bytes",
            MAX_SOURCE_CODE_BYTES
        )));
    }
    if language.trim().is_empty() {
        return Err(JudgeError::InvalidInput("language is missing".to_string()));
    }
    Ok(())
}

impl Judge {
    pub fn new(
        backend: Arc<dyn ExecutionBackend>,
        problems: Arc<dyn ProblemStore>,
        submissions: Arc<dyn SubmissionStore>,
        languages: LanguageResolver,
        statuses: StatusTable,
        policy: PollPolicy,
    ) -> Self {
        Self {
            backend,
            problems,
            lifecycle: SubmissionLifecycle::new(submissions),
            languages: Arc::new(languages),
            statuses: Arc::new(statuses),
            policy,
        }
    }

    pub fn lifecycle(&self) -> &SubmissionLifecycle {
        &self.lifecycle
    }

    pub fn languages(&self) -> &LanguageResolver {
        &self.languages
    }

    /// Submit one batch and wait for it to settle
    async fn execute(
        &self,
        code: &str,
        language_id: u32,
        cases: &[TestCase],
    ) -> Result<Vec<ExecutionResult>, JudgeError> {
        let requests: Vec<ExecutionRequest> = cases
            .iter()
            .map(|case| ExecutionRequest::for_case(code, language_id, case))
            .collect();

        let tokens = self.backend.submit_batch(&requests).await?;
        if tokens.len() != requests.len() {
            return Err(JudgeError::RemoteUnavailable(format!(
                "received {} tokens for {} requests",
                tokens.len(),
                requests.len()
            )));
        }

        await_settlement(self.backend.as_ref(), &tokens, &self.policy).await
    }

    /// Validate code and language, returning the remote language id
    fn prepare(&self, code: &str, language: &str) -> Result<u32, JudgeError> {
        validate_input(code, language)?;
        self.languages.resolve(language)
    }

    async fn run_cases(
        &self,
        label: &str,
        code: &str,
        language_id: u32,
        cases: &[TestCase],
    ) -> Result<RunReport, JudgeError> {
        if cases.is_empty() {
            return Err(JudgeError::NoTestCases(label.to_string()));
        }

        let results = self.execute(code, language_id, cases).await?;
        let verdict = aggregate(&results, &self.statuses);

        Ok(RunReport {
            cases: case_details(cases, &results, &self.statuses),
            verdict,
        })
    }

    /// Ephemeral run against the visible cases; nothing is persisted
    #[instrument(skip(self, code), fields(problem_id = %problem_id, language = %language))]
    pub async fn run_against_visible(
        &self,
        problem_id: &str,
        code: &str,
        language: &str,
    ) -> Result<RunReport, JudgeError> {
        let language_id = self.prepare(code, language)?;
        let cases = self.problems.visible_test_cases(problem_id).await?;

        let report = self.run_cases(problem_id, code, language_id, &cases).await?;
        info!(
            status = %report.verdict.status,
            passed = report.verdict.tests_passed,
            total = report.verdict.tests_total,
            "Run completed"
        );
        Ok(report)
    }

    /// Durable submission against the hidden cases
    #[instrument(skip(self, code), fields(user_id = %user_id, problem_id = %problem_id, language = %language))]
    pub async fn submit_against_hidden(
        &self,
        user_id: &str,
        problem_id: &str,
        code: &str,
        language: &str,
    ) -> Result<SubmissionSummary, JudgeError> {
        // Pre-dispatch checks: failures here leave no record behind
        validate_input(code, language)?;
        if user_id.trim().is_empty() {
            return Err(JudgeError::InvalidInput("user id is missing".to_string()));
        }
        let canonical = self.languages.canonical_name(language)?.to_string();
        let language_id = self.languages.resolve(&canonical)?;

        let cases = self.problems.hidden_test_cases(problem_id).await?;
        if cases.is_empty() {
            return Err(JudgeError::NoTestCases(problem_id.to_string()));
        }

        let submission_id = self
            .lifecycle
            .create_pending(user_id, problem_id, code, &canonical, cases.len() as u32)
            .await?;

        let tests_total = cases.len() as u32;
        let judge = self.clone();
        let code = code.to_string();
        let span = info_span!("judging", submission_id = %submission_id);
        let task = tokio::spawn(
            async move {
                judge
                    .judge_and_finalize(submission_id, &code, language_id, &cases)
                    .await
            }
            .instrument(span),
        );

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                // The task died before finalizing; close the record here
                error!(submission_id = %submission_id, error = %e, "Judging task aborted");
                let verdict = Verdict::failed(tests_total, format!("judging aborted: {}", e));
                if let Err(store_err) = self.lifecycle.finalize(submission_id, &verdict).await {
                    error!(
                        submission_id = %submission_id,
                        error = %store_err,
                        "Failed to finalize submission after aborted judging"
                    );
                }
                Err(JudgeError::Internal(format!("judging task failed: {}", e)))
            }
        }
    }

    async fn judge_and_finalize(
        &self,
        submission_id: Uuid,
        code: &str,
        language_id: u32,
        cases: &[TestCase],
    ) -> Result<SubmissionSummary, JudgeError> {
        match self.execute(code, language_id, cases).await {
            Ok(results) => {
                let verdict = aggregate(&results, &self.statuses);
                self.lifecycle.finalize(submission_id, &verdict).await?;
                Ok(SubmissionSummary::new(submission_id, &verdict))
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "Judging failed, recording error verdict");
                let verdict = Verdict::failed(cases.len() as u32, format!("judging failed: {}", e));
                if let Err(store_err) = self.lifecycle.finalize(submission_id, &verdict).await {
                    error!(error = %store_err, "Failed to finalize submission after judging failure");
                }
                Err(e)
            }
        }
    }

    /// Check that every reference solution passes every given case
    #[instrument(skip(self, cases, solutions), fields(cases = cases.len(), solutions = solutions.len()))]
    pub async fn validate_reference_solutions(
        &self,
        cases: &[TestCase],
        solutions: &[ReferenceSolution],
    ) -> Result<(), JudgeError> {
        if solutions.is_empty() {
            return Err(JudgeError::InvalidInput(
                "at least one reference solution is required".to_string(),
            ));
        }

        for solution in solutions {
            let language_id = self.prepare(&solution.code, &solution.language)?;
            let report = self
                .run_cases("reference", &solution.code, language_id, cases)
                .await?;

            if let Some((idx, failing)) = report
                .cases
                .iter()
                .enumerate()
                .find(|(_, detail)| !detail.passed)
            {
                warn!(
                    language = %solution.language,
                    case = idx + 1,
                    status = %failing.status,
                    "Reference solution rejected"
                );
                return Err(JudgeError::ReferenceRejected {
                    language: solution.language.clone(),
                    case: idx + 1,
                    status: failing.status.clone(),
                });
            }
        }

        Ok(())
    }
}
