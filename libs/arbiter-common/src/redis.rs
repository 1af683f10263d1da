use crate::types::{Problem, Submission};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};

/// Redis key layout - defines where every durable record lives
/// Keeps the API and any offline tooling agreeing on deterministic keys

pub const SUBMISSION_PREFIX: &str = "arbiter:submission";
pub const HISTORY_PREFIX: &str = "arbiter:history";
pub const USER_SUBMISSIONS_PREFIX: &str = "arbiter:user_submissions";
pub const SOLVED_PREFIX: &str = "arbiter:solved";
pub const PROBLEM_PREFIX: &str = "arbiter:problem";

/// Atomically replace a submission only while it is still pending.
/// Returns -1 when the record is missing, 0 when already terminal, 1 when written.
const FINALIZE_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[1])
if not current then
  return -1
end
if cjson.decode(current).status ~= 'pending' then
  return 0
end
redis.call('SET', KEYS[1], ARGV[1])
return 1
"#;

/// Result of a guarded finalize write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeWrite {
    Written,
    AlreadyTerminal,
    Missing,
}

/// Key of one submission record
pub fn submission_key(submission_id: &uuid::Uuid) -> String {
    format!("{}:{}", SUBMISSION_PREFIX, submission_id)
}

/// Key of a user's submission history for one problem (newest first)
pub fn history_key(user_id: &str, problem_id: &str) -> String {
    format!("{}:{}:{}", HISTORY_PREFIX, user_id, problem_id)
}

/// Key of the set of every submission id a user owns
pub fn user_submissions_key(user_id: &str) -> String {
    format!("{}:{}", USER_SUBMISSIONS_PREFIX, user_id)
}

/// Key of a user's solved-problem set
pub fn solved_key(user_id: &str) -> String {
    format!("{}:{}", SOLVED_PREFIX, user_id)
}

/// Key of a problem document
pub fn problem_key(problem_id: &str) -> String {
    format!("{}:{}", PROBLEM_PREFIX, problem_id)
}

fn encode_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
}

fn decode_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "deserialization error", e.to_string()))
}

/// Persist a freshly created submission and index it
/// Record, history entry and ownership entry are written in one MULTI
pub async fn insert_submission(
    conn: &mut ConnectionManager,
    submission: &Submission,
) -> RedisResult<()> {
    let payload = serde_json::to_string(submission).map_err(encode_error)?;
    let id = submission.id.to_string();

    let _: () = redis::pipe()
        .atomic()
        .set(submission_key(&submission.id), payload)
        .ignore()
        .lpush(history_key(&submission.user_id, &submission.problem_id), &id)
        .ignore()
        .sadd(user_submissions_key(&submission.user_id), &id)
        .ignore()
        .query_async(conn)
        .await?;

    Ok(())
}

/// Overwrite a pending submission with its terminal form
pub async fn finalize_submission(
    conn: &mut ConnectionManager,
    submission: &Submission,
) -> RedisResult<FinalizeWrite> {
    let payload = serde_json::to_string(submission).map_err(encode_error)?;
    let outcome: i64 = redis::Script::new(FINALIZE_SCRIPT)
        .key(submission_key(&submission.id))
        .arg(payload)
        .invoke_async(conn)
        .await?;

    Ok(match outcome {
        1 => FinalizeWrite::Written,
        0 => FinalizeWrite::AlreadyTerminal,
        _ => FinalizeWrite::Missing,
    })
}

/// Retrieve one submission
pub async fn get_submission(
    conn: &mut ConnectionManager,
    submission_id: &uuid::Uuid,
) -> RedisResult<Option<Submission>> {
    let payload: Option<String> = conn.get(submission_key(submission_id)).await?;

    match payload {
        Some(data) => Ok(Some(serde_json::from_str(&data).map_err(decode_error)?)),
        None => Ok(None),
    }
}

async fn load_submissions(
    conn: &mut ConnectionManager,
    ids: &[String],
) -> RedisResult<Vec<Submission>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let keys: Vec<String> = ids
        .iter()
        .map(|id| format!("{}:{}", SUBMISSION_PREFIX, id))
        .collect();
    let payloads: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(conn).await?;

    payloads
        .into_iter()
        .flatten()
        .map(|data| serde_json::from_str(&data).map_err(decode_error))
        .collect()
}

/// A user's submissions for one problem, newest first
pub async fn list_submissions(
    conn: &mut ConnectionManager,
    user_id: &str,
    problem_id: &str,
) -> RedisResult<Vec<Submission>> {
    let ids: Vec<String> = conn.lrange(history_key(user_id, problem_id), 0, -1).await?;
    load_submissions(conn, &ids).await
}

/// Add a problem to the solved set
/// SADD keeps set semantics - returns true only when the id was not present
pub async fn add_solved(
    conn: &mut ConnectionManager,
    user_id: &str,
    problem_id: &str,
) -> RedisResult<bool> {
    let added: i64 = conn.sadd(solved_key(user_id), problem_id).await?;
    Ok(added > 0)
}

/// All problems a user has solved, sorted for stable output
pub async fn solved_problems(
    conn: &mut ConnectionManager,
    user_id: &str,
) -> RedisResult<Vec<String>> {
    let mut solved: Vec<String> = conn.smembers(solved_key(user_id)).await?;
    solved.sort();
    Ok(solved)
}

/// Delete everything a user owns: submissions, history lists and solved set
/// Returns the number of submissions removed
pub async fn purge_user(conn: &mut ConnectionManager, user_id: &str) -> RedisResult<usize> {
    let ids: Vec<String> = conn.smembers(user_submissions_key(user_id)).await?;
    let submissions = load_submissions(conn, &ids).await?;

    let mut keys: Vec<String> = ids
        .iter()
        .map(|id| format!("{}:{}", SUBMISSION_PREFIX, id))
        .collect();
    let mut history: Vec<String> = submissions
        .iter()
        .map(|s| history_key(user_id, &s.problem_id))
        .collect();
    history.sort();
    history.dedup();
    keys.extend(history);
    keys.push(user_submissions_key(user_id));
    keys.push(solved_key(user_id));

    let _: () = redis::pipe()
        .atomic()
        .del(&keys)
        .ignore()
        .query_async(conn)
        .await?;

    Ok(ids.len())
}

/// Retrieve a problem document
pub async fn get_problem(
    conn: &mut ConnectionManager,
    problem_id: &str,
) -> RedisResult<Option<Problem>> {
    let payload: Option<String> = conn.get(problem_key(problem_id)).await?;

    match payload {
        Some(data) => Ok(Some(serde_json::from_str(&data).map_err(decode_error)?)),
        None => Ok(None),
    }
}
