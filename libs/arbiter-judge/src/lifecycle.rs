/// Submission Lifecycle Manager
///
/// **Responsibility:**
/// Own the only two writes a submission ever receives:
/// 1. `create_pending` - before any remote call, so a crash mid-judging
///    still leaves an auditable `pending` record
/// 2. `finalize` - once, with the verdict; a second finalize is reported and
///    ignored, never a silent overwrite
///
/// After an accepted finalize the problem joins the user's solved set.
/// The solved set is a true set, so repeated accepted submissions cannot
/// duplicate the entry.

use crate::error::JudgeError;
use crate::store::SubmissionStore;
use arbiter_common::redis::FinalizeWrite;
use arbiter_common::types::{Submission, SubmissionStatus, Verdict};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Verdict written; `newly_solved` when the problem entered the solved set
    Finalized { newly_solved: bool },
    /// Record was already terminal; nothing was written
    AlreadyFinalized { status: SubmissionStatus },
}

#[derive(Clone)]
pub struct SubmissionLifecycle {
    store: Arc<dyn SubmissionStore>,
}

impl SubmissionLifecycle {
    pub fn new(store: Arc<dyn SubmissionStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, code), fields(user_id = %user_id, problem_id = %problem_id))]
    pub async fn create_pending(
        &self,
        user_id: &str,
        problem_id: &str,
        code: &str,
        language: &str,
        tests_total: u32,
    ) -> Result<Uuid, JudgeError> {
        let submission = Submission::pending(user_id, problem_id, code, language, tests_total);
        self.store.insert(&submission).await?;

        info!(
            submission_id = %submission.id,
            language = %language,
            tests_total,
            "Submission recorded as pending"
        );
        Ok(submission.id)
    }

    #[instrument(skip(self, verdict), fields(submission_id = %submission_id, status = %verdict.status))]
    pub async fn finalize(
        &self,
        submission_id: Uuid,
        verdict: &Verdict,
    ) -> Result<FinalizeOutcome, JudgeError> {
        let mut submission = self.store.get(&submission_id).await?.ok_or_else(|| {
            JudgeError::Store(format!("submission {} vanished before finalize", submission_id))
        })?;

        if !submission.apply_verdict(verdict) {
            return self.already_final(&submission).await;
        }

        match self.store.finalize(&submission).await? {
            FinalizeWrite::Written => {}
            FinalizeWrite::AlreadyTerminal => {
                let current = self.store.get(&submission_id).await?.unwrap_or(submission);
                return self.already_final(&current).await;
            }
            FinalizeWrite::Missing => {
                error!("Submission disappeared during finalize");
                return Err(JudgeError::Store(format!(
                    "submission {} vanished during finalize",
                    submission_id
                )));
            }
        }

        let newly_solved = if verdict.is_accepted() {
            self.store
                .add_solved(&submission.user_id, &submission.problem_id)
                .await?
        } else {
            false
        };

        info!(
            tests_passed = verdict.tests_passed,
            tests_total = verdict.tests_total,
            newly_solved,
            "Submission finalized"
        );
        Ok(FinalizeOutcome::Finalized { newly_solved })
    }

    /// A repeated finalize is an inconsistency worth logging, not an error.
    /// The solved-set insert is repeated (it is idempotent) so a finalize that
    /// crashed between the two writes heals on retry.
    async fn already_final(&self, stored: &Submission) -> Result<FinalizeOutcome, JudgeError> {
        warn!(
            submission_id = %stored.id,
            status = %stored.status,
            "Finalize on an already terminal submission ignored"
        );
        if stored.status == SubmissionStatus::Accepted {
            self.store
                .add_solved(&stored.user_id, &stored.problem_id)
                .await?;
        }
        Ok(FinalizeOutcome::AlreadyFinalized {
            status: stored.status,
        })
    }

    pub async fn get(&self, submission_id: &Uuid) -> Result<Option<Submission>, JudgeError> {
        self.store.get(submission_id).await
    }

    pub async fn history(&self, user_id: &str, problem_id: &str) -> Result<Vec<Submission>, JudgeError> {
        self.store.history(user_id, problem_id).await
    }

    pub async fn solved(&self, user_id: &str) -> Result<Vec<String>, JudgeError> {
        self.store.solved(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn purge_user(&self, user_id: &str) -> Result<usize, JudgeError> {
        let removed = self.store.purge_user(user_id).await?;
        info!(removed, "Purged user submissions");
        Ok(removed)
    }
}
