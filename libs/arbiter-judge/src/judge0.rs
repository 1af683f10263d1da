/// Judge0 Client - Batch Submitter over HTTP
///
/// **Wire contract:**
/// - `POST {base}/submissions/batch` with `{"submissions": [...]}` answers
///   `[{"token": ...}, ...]`, one entry per request in request order.
/// - `GET {base}/submissions/batch?tokens=a,b&fields=*` answers
///   `{"submissions": [...]}` with one entry per token.
///
/// Settings (base URL, RapidAPI credentials, base64 mode) come in through
/// `Judge0Config`; nothing is read from the process environment here.

use crate::backend::ExecutionBackend;
use crate::error::JudgeError;
use anyhow::Context;
use arbiter_common::config::Judge0Config;
use arbiter_common::types::{ExecutionRequest, ExecutionResult, Token};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{header, Client};
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Longest slice of a remote error body kept in error messages
const MAX_BODY_SNIPPET: usize = 200;

#[derive(Debug, Serialize)]
struct WireRequest {
    source_code: String,
    language_id: u32,
    stdin: String,
    expected_output: String,
}

#[derive(Debug, Serialize)]
struct SubmitBody {
    submissions: Vec<WireRequest>,
}

#[derive(Debug, Deserialize)]
struct SubmitEntry {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    id: u32,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireResult {
    token: Option<String>,
    status_id: Option<u32>,
    status: Option<WireStatus>,
    stdout: Option<String>,
    stderr: Option<String>,
    compile_output: Option<String>,
    #[serde(default, deserialize_with = "seconds")]
    time: Option<f64>,
    memory: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BatchBody {
    submissions: Option<Vec<Option<WireResult>>>,
}

/// Judge0 reports `time` as a decimal string ("0.012"), occasionally as a number
fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(MAX_BODY_SNIPPET) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

fn encode(text: &str, base64_encoded: bool) -> String {
    if base64_encoded {
        general_purpose::STANDARD.encode(text)
    } else {
        text.to_string()
    }
}

/// Judge0 wraps base64 output at 60 columns, so whitespace is dropped first
fn decode(text: Option<String>, base64_encoded: bool) -> Result<Option<String>, JudgeError> {
    match text {
        Some(text) if base64_encoded => {
            let compact: String = text.split_whitespace().collect();
            let bytes = general_purpose::STANDARD.decode(compact).map_err(|e| {
                JudgeError::RemoteProtocolError(format!("invalid base64 field: {}", e))
            })?;
            Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
        }
        other => Ok(other),
    }
}

/// Turn a submit reply into tokens, one per request
fn parse_submit_response(body: &[u8], expected: usize) -> Result<Vec<Token>, JudgeError> {
    let entries: Vec<SubmitEntry> = serde_json::from_slice(body).map_err(|e| {
        JudgeError::RemoteUnavailable(format!("malformed batch submit response: {}", e))
    })?;

    if entries.len() != expected {
        return Err(JudgeError::RemoteUnavailable(format!(
            "batch submit returned {} tokens for {} requests",
            entries.len(),
            expected
        )));
    }

    entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| match entry.token {
            Some(token) if !token.is_empty() => Ok(Token(token)),
            _ => Err(JudgeError::RemoteUnavailable(format!(
                "batch submit entry {} carries no token",
                idx
            ))),
        })
        .collect()
}

/// Turn a poll reply into results (remote order, not yet aligned)
fn parse_batch_response(
    body: &[u8],
    base64_encoded: bool,
) -> Result<Vec<ExecutionResult>, JudgeError> {
    let batch: BatchBody = serde_json::from_slice(body).map_err(|e| {
        JudgeError::RemoteProtocolError(format!("malformed batch status response: {}", e))
    })?;

    let submissions = batch.submissions.ok_or_else(|| {
        JudgeError::RemoteProtocolError("batch status response has no submissions".to_string())
    })?;

    submissions
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            let entry = entry.ok_or_else(|| {
                JudgeError::RemoteProtocolError(format!("batch status entry {} is null", idx))
            })?;
            into_result(entry, base64_encoded)
        })
        .collect()
}

fn into_result(wire: WireResult, base64_encoded: bool) -> Result<ExecutionResult, JudgeError> {
    let token = wire
        .token
        .filter(|t| !t.is_empty())
        .map(Token)
        .ok_or_else(|| JudgeError::RemoteProtocolError("status entry without token".to_string()))?;

    let status_id = wire
        .status_id
        .or_else(|| wire.status.as_ref().map(|s| s.id))
        .ok_or_else(|| {
            JudgeError::RemoteProtocolError(format!("status entry {} has no status id", token))
        })?;

    Ok(ExecutionResult {
        token,
        status_id,
        status_description: wire.status.and_then(|s| s.description),
        stdout: decode(wire.stdout, base64_encoded)?,
        stderr: decode(wire.stderr, base64_encoded)?,
        compile_output: decode(wire.compile_output, base64_encoded)?,
        time: wire.time.unwrap_or(0.0),
        memory: wire.memory.unwrap_or(0),
    })
}

fn default_headers(config: &Judge0Config) -> anyhow::Result<header::HeaderMap> {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

    if let Some(key) = &config.api_key {
        headers.insert(
            "x-rapidapi-key",
            header::HeaderValue::from_str(key).context("Invalid JUDGE0_API_KEY header value")?,
        );
    }
    if let Some(host) = &config.api_host {
        headers.insert(
            "x-rapidapi-host",
            header::HeaderValue::from_str(host).context("Invalid JUDGE0_API_HOST header value")?,
        );
    }
    Ok(headers)
}

/// HTTP implementation of the execution backend
#[derive(Debug, Clone)]
pub struct Judge0Client {
    client: Client,
    batch_url: String,
    base64_encoded: bool,
}

impl Judge0Client {
    pub fn new(config: &Judge0Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(default_headers(config)?)
            .build()
            .context("Failed to build Judge0 HTTP client")?;

        Ok(Self {
            client,
            batch_url: format!("{}/submissions/batch", config.base_url.trim_end_matches('/')),
            base64_encoded: config.base64_encoded,
        })
    }

    fn base64_flag(&self) -> &'static str {
        if self.base64_encoded {
            "true"
        } else {
            "false"
        }
    }
}

#[async_trait]
impl ExecutionBackend for Judge0Client {
    #[instrument(skip(self, requests), fields(requests = requests.len()))]
    async fn submit_batch(&self, requests: &[ExecutionRequest]) -> Result<Vec<Token>, JudgeError> {
        let body = SubmitBody {
            submissions: requests
                .iter()
                .map(|r| WireRequest {
                    source_code: encode(&r.source_code, self.base64_encoded),
                    language_id: r.language_id,
                    stdin: encode(&r.stdin, self.base64_encoded),
                    expected_output: encode(&r.expected_output, self.base64_encoded),
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.batch_url)
            .query(&[("base64_encoded", self.base64_flag())])
            .json(&body)
            .send()
            .await
            .map_err(|e| JudgeError::RemoteUnavailable(format!("batch submit failed: {}", e)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| JudgeError::RemoteUnavailable(format!("batch submit body: {}", e)))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            warn!(status = %status, body = snippet(&text), "Batch submit rejected");
            return Err(JudgeError::RemoteUnavailable(format!(
                "batch submit returned HTTP {}: {}",
                status,
                snippet(&text)
            )));
        }

        let tokens = parse_submit_response(&bytes, requests.len())?;
        debug!(tokens = tokens.len(), "Batch submitted");
        Ok(tokens)
    }

    #[instrument(skip(self, tokens), fields(tokens = tokens.len()))]
    async fn fetch_batch(&self, tokens: &[Token]) -> Result<Vec<ExecutionResult>, JudgeError> {
        let joined = tokens
            .iter()
            .map(Token::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .client
            .get(&self.batch_url)
            .query(&[
                ("tokens", joined.as_str()),
                ("base64_encoded", self.base64_flag()),
                ("fields", "*"),
            ])
            .send()
            .await
            .map_err(|e| JudgeError::RemoteUnavailable(format!("batch status failed: {}", e)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| JudgeError::RemoteUnavailable(format!("batch status body: {}", e)))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            return Err(JudgeError::RemoteUnavailable(format!(
                "batch status returned HTTP {}: {}",
                status,
                snippet(&text)
            )));
        }

        parse_batch_response(&bytes, self.base64_encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Judge0Config {
        Judge0Config {
            base_url: "https://judge0.example.com/".to_string(),
            api_key: Some("secret".to_string()),
            api_host: Some("judge0.example.com".to_string()),
            base64_encoded: false,
            request_timeout_ms: 1000,
        }
    }

    #[test]
    fn test_client_builds_batch_url() {
        let client = Judge0Client::new(&config()).unwrap();
        assert_eq!(client.batch_url, "https://judge0.example.com/submissions/batch");
        assert_eq!(client.base64_flag(), "false");
    }

    #[test]
    fn test_default_headers_carry_credentials() {
        let headers = default_headers(&config()).unwrap();
        assert_eq!(headers.get("x-rapidapi-key").unwrap(), "secret");
        assert_eq!(headers.get("x-rapidapi-host").unwrap(), "judge0.example.com");

        let mut bare = config();
        bare.api_key = None;
        bare.api_host = None;
        let headers = default_headers(&bare).unwrap();
        assert!(headers.get("x-rapidapi-key").is_none());
    }

    #[test]
    fn test_parse_submit_response_in_order() {
        let body = br#"[{"token": "a"}, {"token": "b"}, {"token": "c"}]"#;
        let tokens = parse_submit_response(body, 3).unwrap();
        assert_eq!(
            tokens,
            vec![Token("a".into()), Token("b".into()), Token("c".into())]
        );
    }

    #[test]
    fn test_parse_submit_response_rejects_partial() {
        let body = br#"[{"token": "a"}]"#;
        let err = parse_submit_response(body, 2).unwrap_err();
        assert!(matches!(err, JudgeError::RemoteUnavailable(_)));

        let body = br#"[{"token": "a"}, {"language_id": ["is not included in the list"]}]"#;
        let err = parse_submit_response(body, 2).unwrap_err();
        assert!(matches!(err, JudgeError::RemoteUnavailable(_)));
    }

    #[test]
    fn test_parse_submit_response_rejects_non_array() {
        let err = parse_submit_response(br#"{"error": "quota exceeded"}"#, 1).unwrap_err();
        assert!(matches!(err, JudgeError::RemoteUnavailable(_)));
        let err = parse_submit_response(b"", 1).unwrap_err();
        assert!(matches!(err, JudgeError::RemoteUnavailable(_)));
    }

    #[test]
    fn test_parse_batch_response_fields() {
        let body = br#"{"submissions": [
            {"token": "a", "status_id": 3, "status": {"id": 3, "description": "Accepted"},
             "stdout": "5\n", "stderr": null, "compile_output": null, "time": "0.012", "memory": 3320},
            {"token": "b", "status": {"id": 11, "description": "Runtime Error (NZEC)"},
             "stdout": null, "stderr": "Traceback", "time": null, "memory": null}
        ]}"#;

        let results = parse_batch_response(body, false).unwrap();
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].token, Token("a".into()));
        assert_eq!(results[0].status_id, 3);
        assert_eq!(results[0].stdout.as_deref(), Some("5\n"));
        assert!((results[0].time - 0.012).abs() < 1e-9);
        assert_eq!(results[0].memory, 3320);

        assert_eq!(results[1].status_id, 11);
        assert_eq!(results[1].status_description.as_deref(), Some("Runtime Error (NZEC)"));
        assert_eq!(results[1].stderr.as_deref(), Some("Traceback"));
        assert_eq!(results[1].time, 0.0);
        assert_eq!(results[1].memory, 0);
    }

    #[test]
    fn test_parse_batch_response_numeric_time() {
        let body = br#"{"submissions": [{"token": "a", "status_id": 3, "time": 0.5, "memory": 10}]}"#;
        let results = parse_batch_response(body, false).unwrap();
        assert!((results[0].time - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_parse_batch_response_protocol_errors() {
        let cases: [&[u8]; 5] = [
            b"not json",
            br#"{"error": "nope"}"#,
            br#"{"submissions": [null]}"#,
            br#"{"submissions": [{"status_id": 3}]}"#,
            br#"{"submissions": [{"token": "a"}]}"#,
        ];
        for body in cases {
            let err = parse_batch_response(body, false).unwrap_err();
            assert!(
                matches!(err, JudgeError::RemoteProtocolError(_)),
                "body {:?} gave {:?}",
                String::from_utf8_lossy(body),
                err
            );
        }
    }

    #[test]
    fn test_base64_fields_decoded() {
        // "hello\n" and "oops" with a wrapped line break
        let body = br#"{"submissions": [{"token": "a", "status_id": 4,
            "stdout": "aGVs\nbG8K", "stderr": "b29wcw==", "compile_output": null}]}"#;
        let results = parse_batch_response(body, true).unwrap();
        assert_eq!(results[0].stdout.as_deref(), Some("hello\n"));
        assert_eq!(results[0].stderr.as_deref(), Some("oops"));
        assert_eq!(results[0].compile_output, None);
    }

    #[test]
    fn test_invalid_base64_is_protocol_error() {
        let body = br#"{"submissions": [{"token": "a", "status_id": 4, "stdout": "***"}]}"#;
        let err = parse_batch_response(body, true).unwrap_err();
        assert!(matches!(err, JudgeError::RemoteProtocolError(_)));
    }

    #[test]
    fn test_encode_respects_mode() {
        assert_eq!(encode("hi", false), "hi");
        assert_eq!(encode("hi", true), "aGk=");
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        let long = "é".repeat(500);
        assert_eq!(snippet(&long).chars().count(), MAX_BODY_SNIPPET);
        assert_eq!(snippet("short"), "short");
    }
}
