//! Judging orchestrator
//!
//! Turns a (code, language, problem) triple into a batch of remote
//! executions, drives them to settlement, reduces the per-case results to a
//! single verdict and, on the submit path, persists that verdict exactly once.

pub mod error;
pub mod language;
pub mod status;
pub mod backend;
pub mod judge0;
pub mod poller;
pub mod evaluator;
pub mod store;
pub mod lifecycle;
pub mod orchestrator;

#[cfg(test)]
mod testing;

pub use backend::ExecutionBackend;
pub use error::JudgeError;
pub use evaluator::{aggregate, CaseDetail};
pub use judge0::Judge0Client;
pub use language::LanguageResolver;
pub use lifecycle::{FinalizeOutcome, SubmissionLifecycle};
pub use orchestrator::{Judge, ReferenceSolution, RunReport, SubmissionSummary};
pub use poller::{await_settlement, PollPolicy};
pub use status::{StatusClass, StatusTable};
pub use store::{ProblemStore, RedisStore, SubmissionStore};
