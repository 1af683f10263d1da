// In-crate fakes for the backend and store seams

use crate::backend::ExecutionBackend;
use crate::error::JudgeError;
use crate::store::{ProblemStore, SubmissionStore};
use arbiter_common::redis::FinalizeWrite;
use arbiter_common::types::{ExecutionRequest, ExecutionResult, Problem, Submission, TestCase, Token};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

pub fn result(token: &str, status_id: u32) -> ExecutionResult {
    ExecutionResult {
        token: Token(token.to_string()),
        status_id,
        status_description: None,
        stdout: None,
        stderr: None,
        compile_output: None,
        time: 0.0,
        memory: 0,
    }
}

pub fn case(input: &str, output: &str) -> TestCase {
    TestCase {
        input: input.to_string(),
        output: output.to_string(),
    }
}

/// Replays canned status replies; the last one repeats forever
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<Vec<ExecutionResult>, JudgeError>>>,
    fetches: AtomicU32,
    sizes: Mutex<Vec<usize>>,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<Vec<ExecutionResult>, JudgeError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fetches: AtomicU32::new(0),
            sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fetched_sizes(&self) -> Vec<usize> {
        self.sizes.lock().unwrap().clone()
    }
}

fn clone_reply(
    reply: &Result<Vec<ExecutionResult>, JudgeError>,
) -> Result<Vec<ExecutionResult>, JudgeError> {
    match reply {
        Ok(results) => Ok(results.clone()),
        Err(JudgeError::RemoteUnavailable(m)) => Err(JudgeError::RemoteUnavailable(m.clone())),
        Err(JudgeError::RemoteProtocolError(m)) => Err(JudgeError::RemoteProtocolError(m.clone())),
        Err(other) => Err(JudgeError::Internal(other.to_string())),
    }
}

#[async_trait]
impl ExecutionBackend for ScriptedBackend {
    async fn submit_batch(&self, requests: &[ExecutionRequest]) -> Result<Vec<Token>, JudgeError> {
        Ok((0..requests.len()).map(|i| Token(format!("t{}", i))).collect())
    }

    async fn fetch_batch(&self, tokens: &[Token]) -> Result<Vec<ExecutionResult>, JudgeError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.sizes.lock().unwrap().push(tokens.len());

        let mut replies = self.replies.lock().unwrap();
        if replies.len() > 1 {
            replies.pop_front().unwrap()
        } else {
            match replies.front() {
                Some(reply) => clone_reply(reply),
                None => Err(JudgeError::Internal("no scripted reply".to_string())),
            }
        }
    }
}

/// Final outcome the simulated remote reports for one case index
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status_id: u32,
    pub stderr: Option<String>,
    pub time: f64,
    pub memory: u64,
}

impl Outcome {
    pub fn accepted(time: f64, memory: u64) -> Self {
        Self { status_id: 3, stderr: None, time, memory }
    }

    pub fn failed(status_id: u32, stderr: &str) -> Self {
        Self {
            status_id,
            stderr: Some(stderr.to_string()),
            time: 0.0,
            memory: 0,
        }
    }
}

struct Pending {
    outcome: Outcome,
    request: ExecutionRequest,
    polls_left: u32,
}

/// Behaves like the remote service: issues unique tokens, reports
/// "processing" for a few polls, then the scripted outcome. Replies come
/// back in reverse order so alignment is always exercised.
pub struct SimulatedBackend {
    outcomes: Vec<Outcome>,
    pending_polls: u32,
    submit_failure: Option<String>,
    never_settle: bool,
    crash_on_fetch: bool,
    next_token: AtomicUsize,
    inflight: Mutex<HashMap<Token, Pending>>,
    submits: AtomicU32,
}

impl SimulatedBackend {
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        Self {
            outcomes,
            pending_polls: 1,
            submit_failure: None,
            never_settle: false,
            crash_on_fetch: false,
            next_token: AtomicUsize::new(0),
            inflight: Mutex::new(HashMap::new()),
            submits: AtomicU32::new(0),
        }
    }

    pub fn unreachable(reason: &str) -> Self {
        let mut backend = Self::new(Vec::new());
        backend.submit_failure = Some(reason.to_string());
        backend
    }

    pub fn stuck() -> Self {
        let mut backend = Self::new(Vec::new());
        backend.never_settle = true;
        backend
    }

    /// Panics on the first status query, killing whatever task polls it
    pub fn crashing() -> Self {
        let mut backend = Self::new(Vec::new());
        backend.crash_on_fetch = true;
        backend
    }

    pub fn submit_calls(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionBackend for SimulatedBackend {
    async fn submit_batch(&self, requests: &[ExecutionRequest]) -> Result<Vec<Token>, JudgeError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.submit_failure {
            return Err(JudgeError::RemoteUnavailable(reason.clone()));
        }

        let mut inflight = self.inflight.lock().unwrap();
        let tokens: Vec<Token> = requests
            .iter()
            .enumerate()
            .map(|(idx, request)| {
                let token = Token(format!("sim-{}", self.next_token.fetch_add(1, Ordering::SeqCst)));
                let outcome = self
                    .outcomes
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| Outcome::accepted(0.01, 1024));
                inflight.insert(
                    token.clone(),
                    Pending {
                        outcome,
                        request: request.clone(),
                        polls_left: self.pending_polls,
                    },
                );
                token
            })
            .collect();
        Ok(tokens)
    }

    async fn fetch_batch(&self, tokens: &[Token]) -> Result<Vec<ExecutionResult>, JudgeError> {
        if self.crash_on_fetch {
            panic!("simulated backend crashed while polling {} tokens", tokens.len());
        }
        let mut inflight = self.inflight.lock().unwrap();
        let mut results = Vec::with_capacity(tokens.len());

        for token in tokens.iter().rev() {
            let pending = inflight
                .get_mut(token)
                .ok_or_else(|| JudgeError::RemoteProtocolError(format!("unknown token {}", token)))?;

            let mut entry = result(token.as_str(), 2);
            if !self.never_settle && pending.polls_left == 0 {
                entry.status_id = pending.outcome.status_id;
                entry.stderr = pending.outcome.stderr.clone();
                entry.time = pending.outcome.time;
                entry.memory = pending.outcome.memory;
                if pending.outcome.status_id == 3 {
                    entry.stdout = Some(pending.request.expected_output.clone());
                }
            } else {
                pending.polls_left = pending.polls_left.saturating_sub(1);
            }
            results.push(entry);
        }
        Ok(results)
    }
}

/// In-memory problem and submission store
#[derive(Default)]
pub struct MemoryStore {
    problems: Mutex<HashMap<String, Problem>>,
    submissions: Mutex<HashMap<Uuid, Submission>>,
    // insertion order, newest last
    order: Mutex<Vec<Uuid>>,
    solved: Mutex<HashMap<String, BTreeSet<String>>>,
}

impl MemoryStore {
    pub fn with_problem(problem: Problem) -> Self {
        let store = Self::default();
        store
            .problems
            .lock()
            .unwrap()
            .insert(problem.id.clone(), problem);
        store
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().values().cloned().collect()
    }
}

#[async_trait]
impl ProblemStore for MemoryStore {
    async fn visible_test_cases(&self, problem_id: &str) -> Result<Vec<TestCase>, JudgeError> {
        self.problems
            .lock()
            .unwrap()
            .get(problem_id)
            .map(|p| p.visible_test_cases.clone())
            .ok_or_else(|| JudgeError::ProblemNotFound(problem_id.to_string()))
    }

    async fn hidden_test_cases(&self, problem_id: &str) -> Result<Vec<TestCase>, JudgeError> {
        self.problems
            .lock()
            .unwrap()
            .get(problem_id)
            .map(|p| p.hidden_test_cases.clone())
            .ok_or_else(|| JudgeError::ProblemNotFound(problem_id.to_string()))
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert(&self, submission: &Submission) -> Result<(), JudgeError> {
        self.submissions
            .lock()
            .unwrap()
            .insert(submission.id, submission.clone());
        self.order.lock().unwrap().push(submission.id);
        Ok(())
    }

    async fn get(&self, submission_id: &Uuid) -> Result<Option<Submission>, JudgeError> {
        Ok(self.submissions.lock().unwrap().get(submission_id).cloned())
    }

    async fn finalize(&self, submission: &Submission) -> Result<FinalizeWrite, JudgeError> {
        let mut submissions = self.submissions.lock().unwrap();
        match submissions.get_mut(&submission.id) {
            None => Ok(FinalizeWrite::Missing),
            Some(stored) if !stored.is_pending() => Ok(FinalizeWrite::AlreadyTerminal),
            Some(stored) => {
                *stored = submission.clone();
                Ok(FinalizeWrite::Written)
            }
        }
    }

    async fn add_solved(&self, user_id: &str, problem_id: &str) -> Result<bool, JudgeError> {
        Ok(self
            .solved
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .insert(problem_id.to_string()))
    }

    async fn solved(&self, user_id: &str) -> Result<Vec<String>, JudgeError> {
        Ok(self
            .solved
            .lock()
            .unwrap()
            .get(user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn history(&self, user_id: &str, problem_id: &str) -> Result<Vec<Submission>, JudgeError> {
        let submissions = self.submissions.lock().unwrap();
        Ok(self
            .order
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter_map(|id| submissions.get(id))
            .filter(|s| s.user_id == user_id && s.problem_id == problem_id)
            .cloned()
            .collect())
    }

    async fn purge_user(&self, user_id: &str) -> Result<usize, JudgeError> {
        let mut submissions = self.submissions.lock().unwrap();
        let before = submissions.len();
        submissions.retain(|_, s| s.user_id != user_id);
        self.solved.lock().unwrap().remove(user_id);
        Ok(before - submissions.len())
    }
}
