//! Server configuration module
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use qrcert_core::reference::DEFAULT_REFERENCE_FILE;
use qrcert_core::resolver::{
    HttpResolverConfig, DEFAULT_MAX_REDIRECTS, DEFAULT_RESOLVE_TIMEOUT, DEFAULT_SHORTENERS,
};

/// Bundled classifier, relative to the working directory.
pub const DEFAULT_MODEL_PATH: &str = "models/hospital-url-domain-v1.onnx";

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Server host (default: 127.0.0.1)
    pub host: [u8; 4],
    /// Allowed CORS origins, comma-separated (default: allow all in dev)
    pub allowed_origins: Option<Vec<String>>,
    /// Request body limit in MB (default: 20)
    pub body_limit_mb: usize,
    /// Maximum image size per upload in MB (default: 10)
    pub max_file_size_mb: usize,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Enable rate limiting (default: false for tests, true when loaded from env)
    pub rate_limit_enabled: bool,
    /// Rate limit: requests per second (default: 10)
    pub rate_limit_per_sec: u64,
    /// Rate limit: burst size (default: 20)
    pub rate_limit_burst: u32,
    /// File holding the enrolled reference digest
    pub reference_digest_path: PathBuf,
    /// ONNX classifier; its schema sidecar sits next to it
    pub model_path: PathBuf,
    /// Feature schema: preset name or path to a schema JSON (default: domain-v1)
    pub feature_schema: String,
    /// Shortener deny-list
    pub shortener_domains: Vec<String>,
    /// Exact-match allow-list of known-good certificate URLs
    pub known_good_urls: Vec<String>,
    /// Timeout for resolving a shortened URL, in seconds (default: 5)
    pub resolve_timeout_secs: u64,
    /// Maximum redirects followed during resolution (default: 10)
    pub max_redirects: usize,
    /// Bearer token required by POST /enroll (unset: open enrollment)
    pub enroll_token: Option<String>,
    /// Directory uploads are archived into (unset: not archived)
    pub upload_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            host: [127, 0, 0, 1],
            allowed_origins: None, // None = allow all (dev mode)
            body_limit_mb: 20,
            max_file_size_mb: 10,
            timeout_secs: 30,
            rate_limit_enabled: false, // Disabled by default (for tests)
            rate_limit_per_sec: 10,
            rate_limit_burst: 20,
            reference_digest_path: PathBuf::from(DEFAULT_REFERENCE_FILE),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            feature_schema: qrcert_core::features::DOMAIN_V1.to_string(),
            shortener_domains: DEFAULT_SHORTENERS.iter().map(|s| s.to_string()).collect(),
            known_good_urls: Vec::new(),
            resolve_timeout_secs: DEFAULT_RESOLVE_TIMEOUT.as_secs(),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            enroll_token: None,
            upload_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("HOST")
            .ok()
            .map(|h| {
                if h == "0.0.0.0" {
                    [0, 0, 0, 0]
                } else {
                    [127, 0, 0, 1]
                }
            })
            .unwrap_or(defaults.host);

        // Rate limiting enabled by default in production, can be disabled with RATE_LIMIT_ENABLED=false
        let rate_limit_enabled = std::env::var("RATE_LIMIT_ENABLED")
            .map(|v| v.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            port: parse_var("PORT", defaults.port),
            host,
            allowed_origins: list_var("ALLOWED_ORIGINS"),
            body_limit_mb: parse_var("BODY_LIMIT_MB", defaults.body_limit_mb),
            max_file_size_mb: parse_var("MAX_FILE_SIZE_MB", defaults.max_file_size_mb),
            timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", defaults.timeout_secs),
            rate_limit_enabled,
            rate_limit_per_sec: parse_var("RATE_LIMIT_PER_SEC", defaults.rate_limit_per_sec),
            rate_limit_burst: parse_var("RATE_LIMIT_BURST", defaults.rate_limit_burst),
            reference_digest_path: std::env::var("REFERENCE_DIGEST_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.reference_digest_path),
            model_path: std::env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            feature_schema: std::env::var("FEATURE_SCHEMA").unwrap_or(defaults.feature_schema),
            shortener_domains: list_var("SHORTENER_DOMAINS")
                .unwrap_or(defaults.shortener_domains),
            known_good_urls: list_var("KNOWN_GOOD_URLS").unwrap_or(defaults.known_good_urls),
            resolve_timeout_secs: parse_var("RESOLVE_TIMEOUT_SECS", defaults.resolve_timeout_secs),
            max_redirects: parse_var("MAX_REDIRECTS", defaults.max_redirects),
            enroll_token: std::env::var("ENROLL_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            upload_dir: std::env::var("UPLOAD_DIR")
                .ok()
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Get socket address from config
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }

    /// Maximum upload size in bytes
    pub fn max_file_size(&self) -> usize {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Settings for the shortened-URL resolver
    pub fn resolver_config(&self) -> HttpResolverConfig {
        HttpResolverConfig {
            timeout: Duration::from_secs(self.resolve_timeout_secs),
            max_redirects: self.max_redirects,
            ..Default::default()
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Comma-separated list; blank entries are dropped.
fn list_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|value| split_list(&value))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
