// Storage seams used by the judge
// Problem store: read-only source of test cases
// Submission store: durable submission records and per-user solved sets

use crate::error::JudgeError;
use arbiter_common::redis::{self as keys, FinalizeWrite};
use arbiter_common::types::{Submission, TestCase};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use uuid::Uuid;

#[async_trait]
pub trait ProblemStore: Send + Sync {
    /// Cases shown to the user, used by the run path
    async fn visible_test_cases(&self, problem_id: &str) -> Result<Vec<TestCase>, JudgeError>;

    /// Cases kept secret, used by the submit path
    async fn hidden_test_cases(&self, problem_id: &str) -> Result<Vec<TestCase>, JudgeError>;
}

#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn insert(&self, submission: &Submission) -> Result<(), JudgeError>;

    async fn get(&self, submission_id: &Uuid) -> Result<Option<Submission>, JudgeError>;

    /// Replace the stored record with its terminal form, only while the
    /// stored record is still pending. Must be atomic with respect to that check.
    async fn finalize(&self, submission: &Submission) -> Result<FinalizeWrite, JudgeError>;

    /// Set insert; true only if the problem was not already solved
    async fn add_solved(&self, user_id: &str, problem_id: &str) -> Result<bool, JudgeError>;

    async fn solved(&self, user_id: &str) -> Result<Vec<String>, JudgeError>;

    /// Newest first
    async fn history(&self, user_id: &str, problem_id: &str) -> Result<Vec<Submission>, JudgeError>;

    /// Cascading delete of a user's submissions and solved set
    async fn purge_user(&self, user_id: &str) -> Result<usize, JudgeError>;
}

/// Redis-backed implementation of both stores
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl ProblemStore for RedisStore {
    async fn visible_test_cases(&self, problem_id: &str) -> Result<Vec<TestCase>, JudgeError> {
        let mut conn = self.conn.clone();
        keys::get_problem(&mut conn, problem_id)
            .await?
            .map(|p| p.visible_test_cases)
            .ok_or_else(|| JudgeError::ProblemNotFound(problem_id.to_string()))
    }

    async fn hidden_test_cases(&self, problem_id: &str) -> Result<Vec<TestCase>, JudgeError> {
        let mut conn = self.conn.clone();
        keys::get_problem(&mut conn, problem_id)
            .await?
            .map(|p| p.hidden_test_cases)
            .ok_or_else(|| JudgeError::ProblemNotFound(problem_id.to_string()))
    }
}

#[async_trait]
impl SubmissionStore for RedisStore {
    async fn insert(&self, submission: &Submission) -> Result<(), JudgeError> {
        let mut conn = self.conn.clone();
        Ok(keys::insert_submission(&mut conn, submission).await?)
    }

    async fn get(&self, submission_id: &Uuid) -> Result<Option<Submission>, JudgeError> {
        let mut conn = self.conn.clone();
        Ok(keys::get_submission(&mut conn, submission_id).await?)
    }

    async fn finalize(&self, submission: &Submission) -> Result<FinalizeWrite, JudgeError> {
        let mut conn = self.conn.clone();
        Ok(keys::finalize_submission(&mut conn, submission).await?)
    }

    async fn add_solved(&self, user_id: &str, problem_id: &str) -> Result<bool, JudgeError> {
        let mut conn = self.conn.clone();
        Ok(keys::add_solved(&mut conn, user_id, problem_id).await?)
    }

    async fn solved(&self, user_id: &str) -> Result<Vec<String>, JudgeError> {
        let mut conn = self.conn.clone();
        Ok(keys::solved_problems(&mut conn, user_id).await?)
    }

    async fn history(&self, user_id: &str, problem_id: &str) -> Result<Vec<Submission>, JudgeError> {
        let mut conn = self.conn.clone();
        Ok(keys::list_submissions(&mut conn, user_id, problem_id).await?)
    }

    async fn purge_user(&self, user_id: &str) -> Result<usize, JudgeError> {
        let mut conn = self.conn.clone();
        Ok(keys::purge_user(&mut conn, user_id).await?)
    }
}
