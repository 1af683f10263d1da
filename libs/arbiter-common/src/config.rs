use std::env;

/// Application configuration
/// Provides defaults with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    pub port: u16,
    pub judge0: Judge0Config,
    pub poll: PollConfig,
    pub language_config_path: Option<String>,
    pub status_table_path: Option<String>,
}

/// Settings handed to the remote execution client at construction
#[derive(Debug, Clone)]
pub struct Judge0Config {
    pub base_url: String,
    pub api_key: Option<String>,
    pub api_host: Option<String>,
    pub base64_encoded: bool,
    pub request_timeout_ms: u64,
}

/// Bounds for the poll-until-settled loop
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub initial_interval_ms: u64,
    pub backoff_factor: f64,
    pub max_interval_ms: u64,
    pub max_attempts: u32,
    pub deadline_ms: u64,
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn var_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            port: var_or("PORT", 3000),
            judge0: Judge0Config::from_env(),
            poll: PollConfig::from_env(),
            language_config_path: var_opt("LANGUAGE_CONFIG_PATH"),
            status_table_path: var_opt("STATUS_TABLE_PATH"),
        }
    }

    pub fn new() -> Self {
        Self::from_env()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Judge0Config {
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("JUDGE0_URL")
                .unwrap_or_else(|_| "https://judge0-ce.p.rapidapi.com".to_string()),
            api_key: var_opt("JUDGE0_API_KEY"),
            api_host: var_opt("JUDGE0_API_HOST"),
            base64_encoded: var_or("JUDGE0_BASE64", false),
            request_timeout_ms: var_or("JUDGE0_REQUEST_TIMEOUT_MS", 10_000),
        }
    }
}

impl PollConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            initial_interval_ms: var_or("POLL_INITIAL_INTERVAL_MS", defaults.initial_interval_ms),
            backoff_factor: var_or("POLL_BACKOFF_FACTOR", defaults.backoff_factor),
            max_interval_ms: var_or("POLL_MAX_INTERVAL_MS", defaults.max_interval_ms),
            max_attempts: var_or("POLL_MAX_ATTEMPTS", defaults.max_attempts),
            deadline_ms: var_or("POLL_DEADLINE_MS", defaults.deadline_ms),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1000,
            backoff_factor: 1.5,
            max_interval_ms: 5000,
            max_attempts: 60,
            deadline_ms: 120_000,
        }
    }
}
