/// Poll-Until-Settled Loop
///
/// **Core Responsibility:**
/// Drive a set of tokens to terminal state with one batched status query per
/// iteration, then hand back results index-aligned with the input tokens.
///
/// **Bounds (both mandatory):**
/// - `max_attempts` status queries
/// - `deadline` wall-clock time since the first query
///
/// Exceeding either yields `JudgingTimeout`. A reply that violates the wire
/// contract yields `RemoteProtocolError` immediately. A failed round trip
/// (`RemoteUnavailable`) is logged and retried, spending one attempt.
///
/// The loop only ever suspends on `tokio::time::sleep`, so concurrent
/// judgings poll independently.

use crate::backend::ExecutionBackend;
use crate::error::JudgeError;
use arbiter_common::config::PollConfig;
use arbiter_common::types::{ExecutionResult, Token};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    /// Multiplier applied to the wait after every iteration (1.0 = fixed)
    pub backoff_factor: f64,
    pub max_interval: Duration,
    pub max_attempts: u32,
    pub deadline: Duration,
}

impl PollPolicy {
    /// Constant wait between polls
    pub fn fixed(interval: Duration, max_attempts: u32, deadline: Duration) -> Self {
        Self {
            initial_interval: interval,
            backoff_factor: 1.0,
            max_interval: interval,
            max_attempts,
            deadline,
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        let factor = if self.backoff_factor.is_finite() && self.backoff_factor >= 1.0 {
            self.backoff_factor
        } else {
            1.0
        };
        // Compare in f64 first; a large factor would overflow Duration
        if current.as_secs_f64() * factor >= self.max_interval.as_secs_f64() {
            self.max_interval
        } else {
            current.mul_f64(factor)
        }
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        Self {
            initial_interval: Duration::from_millis(config.initial_interval_ms),
            backoff_factor: config.backoff_factor,
            max_interval: Duration::from_millis(config.max_interval_ms.max(config.initial_interval_ms)),
            max_attempts: config.max_attempts.max(1),
            deadline: Duration::from_millis(config.deadline_ms),
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from(&PollConfig::default())
    }
}

/// Re-order a status reply so result[i] belongs to tokens[i]
fn align(tokens: &[Token], results: Vec<ExecutionResult>) -> Result<Vec<ExecutionResult>, JudgeError> {
    if results.len() != tokens.len() {
        return Err(JudgeError::RemoteProtocolError(format!(
            "status reply has {} entries for {} tokens",
            results.len(),
            tokens.len()
        )));
    }

    let mut by_token: HashMap<Token, ExecutionResult> = HashMap::with_capacity(results.len());
    for result in results {
        let token = result.token.clone();
        if by_token.insert(token.clone(), result).is_some() {
            return Err(JudgeError::RemoteProtocolError(format!(
                "status reply repeats token {}",
                token
            )));
        }
    }

    tokens
        .iter()
        .map(|token| {
            by_token.remove(token).ok_or_else(|| {
                JudgeError::RemoteProtocolError(format!("status reply is missing token {}", token))
            })
        })
        .collect()
}

/// Poll until every token is terminal or the policy bound is hit
#[instrument(skip(backend, tokens, policy), fields(tokens = tokens.len()))]
pub async fn await_settlement(
    backend: &dyn ExecutionBackend,
    tokens: &[Token],
    policy: &PollPolicy,
) -> Result<Vec<ExecutionResult>, JudgeError> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let start = Instant::now();
    let mut interval = policy.initial_interval;
    let mut iteration: u32 = 0;

    loop {
        iteration += 1;

        match backend.fetch_batch(tokens).await {
            Ok(results) => {
                let results = align(tokens, results)?;
                let settled = results.iter().filter(|r| r.is_terminal()).count();
                debug!(iteration, settled, total = tokens.len(), "Polled batch status");

                if settled == tokens.len() {
                    return Ok(results);
                }
            }
            Err(JudgeError::RemoteUnavailable(reason)) => {
                warn!(iteration, reason = %reason, "Status query failed, retrying");
            }
            Err(e) => return Err(e),
        }

        let elapsed = start.elapsed();
        if iteration >= policy.max_attempts || elapsed >= policy.deadline {
            warn!(
                iteration,
                elapsed_ms = elapsed.as_millis() as u64,
                "Batch did not settle within bound"
            );
            return Err(JudgeError::JudgingTimeout {
                iterations: iteration,
                elapsed,
            });
        }

        let remaining = policy.deadline - elapsed;
        tokio::time::sleep(interval.min(remaining)).await;
        interval = policy.next_interval(interval);
    }
}
