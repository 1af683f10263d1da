/// Verdict Aggregator - Status-Table-Driven Reduction
///
/// **Core Responsibility:**
/// Reduce the settled per-case results of one batch to a single `Verdict`.
///
/// **Critical Properties:**
/// - Knows nothing about HTTP, tokens or polling
/// - Knows nothing about persistence
/// - Pure function: (results, status table) -> verdict
///
/// **Reduction Rules (input order):**
/// - Accepted case: tests_passed += 1, runtime += time, memory = max(memory)
/// - Other case: status becomes that case's class (wrong / error); the first
///   such case alone donates its stderr as the error message
/// - Accepted overall only when every case is accepted; never re-promoted
/// - tests_total is always the input length

use crate::status::{StatusClass, StatusTable};
use arbiter_common::types::{ExecutionResult, TestCase, Verdict, VerdictStatus};
use serde::Serialize;
use tracing::debug;

/// Per-case view returned by the run path for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseDetail {
    pub input: String,
    pub expected_output: String,
    pub actual_output: Option<String>,
    pub status_id: u32,
    pub status: String,
    pub passed: bool,
    pub time: f64,
    pub memory: u64,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
}

/// Reduce settled results to a verdict
pub fn aggregate(results: &[ExecutionResult], table: &StatusTable) -> Verdict {
    let mut verdict = Verdict {
        status: VerdictStatus::Accepted,
        tests_passed: 0,
        tests_total: results.len() as u32,
        runtime: 0.0,
        memory: 0,
        error_message: None,
    };
    let mut demoted = false;

    for (idx, result) in results.iter().enumerate() {
        let class = table.classify(result.status_id);
        debug!(case = idx + 1, status_id = result.status_id, class = ?class, "Evaluated case");

        match class.verdict() {
            Some(VerdictStatus::Accepted) => {
                verdict.tests_passed += 1;
                verdict.runtime += result.time;
                verdict.memory = verdict.memory.max(result.memory);
            }
            other => {
                // An unsettled result reaching here is a poller bug; count it as an error
                verdict.status = other.unwrap_or(VerdictStatus::Error);
                if !demoted {
                    verdict.error_message = result.stderr.clone();
                    demoted = true;
                }
            }
        }
    }

    verdict
}

fn describe(result: &ExecutionResult, table: &StatusTable) -> String {
    result
        .status_description
        .clone()
        .or_else(|| table.description(result.status_id).map(str::to_string))
        .unwrap_or_else(|| format!("Status {}", result.status_id))
}

/// Pair settled results with the cases they ran against
pub fn case_details(
    cases: &[TestCase],
    results: &[ExecutionResult],
    table: &StatusTable,
) -> Vec<CaseDetail> {
    cases
        .iter()
        .zip(results)
        .map(|(case, result)| CaseDetail {
            input: case.input.clone(),
            expected_output: case.output.clone(),
            actual_output: result.stdout.clone(),
            status_id: result.status_id,
            status: describe(result, table),
            passed: table.classify(result.status_id) == StatusClass::Accepted,
            time: result.time,
            memory: result.memory,
            stderr: result.stderr.clone(),
            compile_output: result.compile_output.clone(),
        })
        .collect()
}
