//! Client configuration (§10.3 "the client mirrors this"), same `from_env` convention as
//! the server's `Config`, with `UPLOAD_CLIENT_<KEY>`-style variables.

use std::env;
use std::time::Duration;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub chunk_size: u64,
    pub max_concurrent_chunks: usize,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub app_name: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            chunk_size: 5 * 1024 * 1024,
            max_concurrent_chunks: 3,
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            app_name: "chunked-upload-client".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("UPLOAD_CLIENT_BASE_URL") {
            config.base_url = url;
        }
        if let Some(v) = parse_env("UPLOAD_CLIENT_CHUNK_SIZE") {
            config.chunk_size = v;
        }
        if let Some(v) = parse_env("UPLOAD_CLIENT_MAX_CONCURRENT_CHUNKS") {
            config.max_concurrent_chunks = v;
        }
        if let Some(v) = parse_env::<u64>("UPLOAD_CLIENT_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_env("UPLOAD_CLIENT_MAX_RETRY_ATTEMPTS") {
            config.retry.max_attempts = v;
        }

        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("base url cannot be empty".to_string());
        }
        if self.chunk_size == 0 {
            return Err("chunk size cannot be 0".to_string());
        }
        if self.max_concurrent_chunks == 0 {
            return Err("max concurrent chunks cannot be 0".to_string());
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}
