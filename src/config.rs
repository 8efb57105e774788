//! Configuration for the upload receiver.
//!
//! Mirrors the shape and environment-variable convention of the teacher codebase's
//! `Config`: a struct with sensible defaults, an `UPLOAD_<SECTION>_<KEY>`-style
//! `from_env` override, and a `validate` pass run before the server binds.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Ceiling on in-flight `save_chunk` calls (§10.3); requests beyond it are shed with
    /// `TooManyConcurrentUploads` rather than queued. Backs a `tokio::sync::Semaphore`
    /// in `UploadCoordinator`.
    pub max_concurrent_uploads: usize,
    /// Size of the blocking thread pool the assembler's `spawn_blocking` call runs on.
    pub io_pool_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory both temp chunk directories and final assembled files live under.
    pub base_dir: PathBuf,
    /// Prefix for per-session temporary directories (default `temp_`).
    pub temp_dir_prefix: String,
    pub default_chunk_size: u64,
    pub max_chunk_size: u64,
    pub max_chunk_count: u64,
    pub max_file_size: u64,
    pub safety_buffer_bytes: u64,
    pub min_free_bytes: u64,
    pub extension_allow_list: Vec<String>,
    pub extension_block_list: Vec<String>,
    pub auto_cleanup_enabled: bool,
    pub auto_cleanup_delay_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_concurrent_uploads: 10,
            io_pool_size: 16,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./upload-data"),
            temp_dir_prefix: "temp_".to_string(),
            default_chunk_size: 5 * 1024 * 1024,
            max_chunk_size: 100 * 1024 * 1024,
            max_chunk_count: 10_000,
            max_file_size: 50 * 1024 * 1024 * 1024,
            safety_buffer_bytes: 50 * 1024 * 1024,
            min_free_bytes: 100 * 1024 * 1024,
            extension_allow_list: Vec::new(),
            extension_block_list: vec![
                "exe".into(),
                "bat".into(),
                "cmd".into(),
                "scr".into(),
                "com".into(),
                "pif".into(),
            ],
            auto_cleanup_enabled: true,
            auto_cleanup_delay_hours: 24,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec![
                "GET".into(),
                "POST".into(),
                "DELETE".into(),
                "OPTIONS".into(),
            ],
            allowed_headers: vec!["*".to_string()],
            allow_credentials: false,
            max_age_secs: 3600,
        }
    }
}

impl StorageConfig {
    pub fn auto_cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.auto_cleanup_delay_hours * 3600)
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults.
    ///
    /// Recognized variables: `UPLOAD_SERVER_HOST`, `UPLOAD_SERVER_PORT`,
    /// `UPLOAD_SERVER_MAX_CONCURRENT_UPLOADS`, `UPLOAD_SERVER_IO_POOL_SIZE`,
    /// `UPLOAD_STORAGE_BASE_DIR`, `UPLOAD_STORAGE_TEMP_DIR_PREFIX`,
    /// `UPLOAD_STORAGE_DEFAULT_CHUNK_SIZE`, `UPLOAD_STORAGE_MAX_CHUNK_SIZE`,
    /// `UPLOAD_STORAGE_MAX_CHUNK_COUNT`, `UPLOAD_STORAGE_MAX_FILE_SIZE`,
    /// `UPLOAD_STORAGE_AUTO_CLEANUP_ENABLED`, `UPLOAD_STORAGE_AUTO_CLEANUP_DELAY_HOURS`,
    /// `UPLOAD_LOGGING_LEVEL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = env::var("UPLOAD_SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(v) = parse_env("UPLOAD_SERVER_PORT") {
            config.server.port = v;
        }
        if let Some(v) = parse_env("UPLOAD_SERVER_MAX_CONCURRENT_UPLOADS") {
            config.server.max_concurrent_uploads = v;
        }
        if let Some(v) = parse_env("UPLOAD_SERVER_IO_POOL_SIZE") {
            config.server.io_pool_size = v;
        }
        if let Ok(dir) = env::var("UPLOAD_STORAGE_BASE_DIR") {
            config.storage.base_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = env::var("UPLOAD_STORAGE_TEMP_DIR_PREFIX") {
            config.storage.temp_dir_prefix = prefix;
        }
        if let Some(v) = parse_env("UPLOAD_STORAGE_DEFAULT_CHUNK_SIZE") {
            config.storage.default_chunk_size = v;
        }
        if let Some(v) = parse_env("UPLOAD_STORAGE_MAX_CHUNK_SIZE") {
            config.storage.max_chunk_size = v;
        }
        if let Some(v) = parse_env("UPLOAD_STORAGE_MAX_CHUNK_COUNT") {
            config.storage.max_chunk_count = v;
        }
        if let Some(v) = parse_env("UPLOAD_STORAGE_MAX_FILE_SIZE") {
            config.storage.max_file_size = v;
        }
        if let Ok(v) = env::var("UPLOAD_STORAGE_AUTO_CLEANUP_ENABLED") {
            config.storage.auto_cleanup_enabled = v.to_lowercase() == "true" || v == "1";
        }
        if let Some(v) = parse_env("UPLOAD_STORAGE_AUTO_CLEANUP_DELAY_HOURS") {
            config.storage.auto_cleanup_delay_hours = v;
        }
        if let Ok(level) = env::var("UPLOAD_LOGGING_LEVEL") {
            config.logging.level = level;
        }

        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server port cannot be 0".to_string());
        }
        if self.storage.base_dir.as_os_str().is_empty() {
            return Err("storage base dir cannot be empty".to_string());
        }
        if self.storage.default_chunk_size > self.storage.max_chunk_size {
            return Err("default chunk size cannot exceed max chunk size".to_string());
        }
        if self.storage.max_chunk_count == 0 {
            return Err("max chunk count cannot be 0".to_string());
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "invalid log level '{}'; valid values: {}",
                self.logging.level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_default_chunk_size_above_max() {
        let mut config = Config::default();
        config.storage.default_chunk_size = config.storage.max_chunk_size + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn server_address_formats_host_and_port() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9000;
        assert_eq!(config.server_address(), "127.0.0.1:9000");
    }
}
