use crate::http_client::{EnhancedHttpClient, HttpClientConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Overridden by the `PORT` environment variable
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Chapters with more pages than this are reported as long strips
    #[serde(default = "default_long_strip_threshold")]
    pub long_strip_threshold: usize,

    /// Upper bound on latest-release pages walked per update check
    #[serde(default = "default_max_update_pages")]
    pub max_update_pages: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Maximum number of retry attempts for failed requests
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial retry delay in milliseconds
    #[serde(default = "default_initial_retry_delay")]
    pub initial_retry_delay_ms: u64,

    /// Maximum retry delay in milliseconds
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_ms: u64,

    /// Timeout for HTTP requests in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Requests per second allowed against the upstream site
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Enable cookie support
    #[serde(default = "default_true")]
    pub enable_cookies: bool,

    /// Enable gzip/brotli compression
    #[serde(default = "default_true")]
    pub enable_compression: bool,
}

fn default_true() -> bool { true }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 3000 }
fn default_base_url() -> String { "https://readm.org".to_string() }
fn default_long_strip_threshold() -> usize { 60 }
fn default_max_update_pages() -> u32 { 25 }
fn default_max_retries() -> usize { 3 }
fn default_initial_retry_delay() -> u64 { 500 }
fn default_max_retry_delay() -> u64 { 8000 }
fn default_timeout() -> u64 { 15 }
fn default_requests_per_second() -> u32 { 4 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            long_strip_threshold: default_long_strip_threshold(),
            max_update_pages: default_max_update_pages(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_retry_delay_ms: default_initial_retry_delay(),
            max_retry_delay_ms: default_max_retry_delay(),
            timeout_secs: default_timeout(),
            requests_per_second: default_requests_per_second(),
            enable_cookies: true,
            enable_compression: true,
        }
    }
}

impl Config {
    /// Read `config.toml` from the working directory, then apply environment overrides
    pub fn load() -> Self {
        let mut config = Self::from_file(Path::new("config.toml"));
        config.apply_port_override(std::env::var("PORT").ok().as_deref());
        config
    }

    /// Parse a config file, falling back to defaults when it is missing or invalid
    pub fn from_file(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                log::warn!("Could not read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn apply_port_override(&mut self, port: Option<&str>) {
        let Some(raw) = port else { return };
        match raw.trim().parse::<u16>() {
            Ok(port) => self.server.port = port,
            Err(_) => log::warn!("Ignoring invalid PORT value '{}'", raw),
        }
    }
}

impl HttpConfig {
    /// Create the shared upstream HTTP client from this configuration
    pub fn create_http_client(&self) -> Result<EnhancedHttpClient, reqwest::Error> {
        let config = HttpClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            initial_retry_delay_ms: self.initial_retry_delay_ms,
            max_retry_delay_ms: self.max_retry_delay_ms,
            requests_per_second: self.requests_per_second,
            enable_cookies: self.enable_cookies,
            enable_gzip: self.enable_compression,
        };

        EnhancedHttpClient::with_config(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.source.base_url, "https://readm.org");
        assert_eq!(config.source.long_strip_threshold, 60);
        assert_eq!(config.source.max_update_pages, 25);
        assert_eq!(config.http.requests_per_second, 4);
        assert_eq!(config.http.timeout_secs, 15);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8080

            [http]
            requests_per_second = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.http.requests_per_second, 2);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.source.max_update_pages, 25);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::from_file(Path::new("does/not/exist.toml"));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_port_override() {
        let mut config = Config::default();
        config.apply_port_override(Some("4100"));
        assert_eq!(config.server.port, 4100);

        config.apply_port_override(Some("not-a-port"));
        assert_eq!(config.server.port, 4100);

        config.apply_port_override(None);
        assert_eq!(config.server.port, 4100);
    }

    #[test]
    fn test_create_http_client() {
        assert!(HttpConfig::default().create_http_client().is_ok());
    }
}
