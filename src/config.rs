//! Process configuration read from the environment.
//!
//! Scorer parameters are not part of this: they are passed to
//! [`crate::models::scorer::ScorerConfig`] explicitly.

use std::time::Duration;

use crate::error::PipelineError;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";
pub const DEFAULT_SYMBOLS: &str = "AAPL,TSLA";
pub const DEFAULT_STREAM_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const UPDATE_PATH: &str = "/api/stocks/update";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub backend_url: String,
    pub backend_auth_token: Option<String>,
    pub symbols: Vec<String>,
    pub stream_interval: Duration,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub data_period: String,
    pub data_interval: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            backend_auth_token: None,
            symbols: parse_symbols(DEFAULT_SYMBOLS),
            stream_interval: Duration::from_secs(DEFAULT_STREAM_INTERVAL_SECS),
            openai_api_key: None,
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            data_period: "1d".to_string(),
            data_interval: "5m".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = AppConfig::default();

        let stream_interval = match get("STREAM_INTERVAL") {
            Some(raw) => {
                let secs: u64 = raw
                    .parse()
                    .map_err(|_| PipelineError::Config(format!("STREAM_INTERVAL must be whole seconds, got '{}'", raw)))?;
                if secs == 0 {
                    return Err(PipelineError::Config("STREAM_INTERVAL must be positive".to_string()));
                }
                Duration::from_secs(secs)
            }
            None => defaults.stream_interval,
        };

        let symbols = match get("STREAM_SYMBOLS") {
            Some(raw) => parse_symbols(&raw),
            None => defaults.symbols,
        };

        Ok(AppConfig {
            backend_url: get("BACKEND_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.backend_url),
            backend_auth_token: get("BACKEND_AUTH_TOKEN"),
            symbols,
            stream_interval,
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            data_period: get("DATA_PERIOD").unwrap_or(defaults.data_period),
            data_interval: get("DATA_INTERVAL").unwrap_or(defaults.data_interval),
        })
    }

    /// Full URL records are posted to.
    pub fn backend_endpoint(&self) -> String {
        format!("{}{}", self.backend_url.trim_end_matches('/'), UPDATE_PATH)
    }
}

/// HTTP client with a request timeout and optional user agent. Builder
/// failures (such as an invalid user agent) are configuration errors.
pub fn http_client(timeout: Duration, user_agent: Option<&str>) -> Result<reqwest::Client, PipelineError> {
    let mut builder = reqwest::Client::builder().timeout(timeout);
    if let Some(agent) = user_agent {
        builder = builder.user_agent(agent);
    }
    builder
        .build()
        .map_err(|e| PipelineError::Config(format!("cannot build HTTP client: {}", e)))
}

/// Comma-separated tickers, trimmed and upper-cased. Blank entries are dropped.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}
