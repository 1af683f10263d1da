/// Remote Execution Backend - the only shared resource of the judge
///
/// **Contract:**
/// - `submit_batch`: one outbound call, one token per request, order-preserving.
///   Unreachable service or malformed reply -> `RemoteUnavailable`.
/// - `fetch_batch`: one status query covering every token. Results may come
///   back in any order but each one carries its token. A reply that cannot
///   be decoded -> `RemoteProtocolError`; a failed round trip ->
///   `RemoteUnavailable`.
///
/// The backend never sleeps or retries; pacing belongs to the poller.

use crate::error::JudgeError;
use arbiter_common::types::{ExecutionRequest, ExecutionResult, Token};
use async_trait::async_trait;

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn submit_batch(&self, requests: &[ExecutionRequest]) -> Result<Vec<Token>, JudgeError>;

    async fn fetch_batch(&self, tokens: &[Token]) -> Result<Vec<ExecutionResult>, JudgeError>;
}
