//! Shortened-URL detection and resolution.
//!
//! Shortener detection works on the parsed host, matching a deny-list entry
//! exactly or as a dot-delimited parent domain. Substring matches are not
//! accepted, so `notbit.ly.com` and `notbitly.com` are not treated as `bit.ly`.
//!
//! Resolution is a single GET that follows redirects up to a fixed count and
//! gives up after a fixed timeout. It is never retried.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{redirect, Client};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::{Result, VerifyError};

/// Shortening services recognised out of the box.
pub const DEFAULT_SHORTENERS: &[&str] = &["qrco.de", "bit.ly", "goo.gl", "t.co", "tinyurl.com"];

/// Default timeout for a whole redirect chain.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default maximum number of redirects followed.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Deny-list of URL shortening domains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenerList {
    domains: Vec<String>,
}

impl ShortenerList {
    /// Build a list from domain names. Entries are lowercased and stripped of
    /// a trailing root dot; blank entries are dropped.
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains = domains
            .into_iter()
            .map(|d| normalize_host(d.as_ref().trim()))
            .filter(|d| !d.is_empty())
            .collect();
        Self { domains }
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Whether the URL's host is a listed shortener or a subdomain of one.
    pub fn is_shortened(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = normalize_host(host);

        self.domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

impl Default for ShortenerList {
    fn default() -> Self {
        Self::new(DEFAULT_SHORTENERS)
    }
}

fn normalize_host(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Follows a shortened URL to its landing page.
#[async_trait]
pub trait UrlResolver: Send + Sync {
    /// Return the final URL after redirects, or `VerifyError::Resolution`.
    async fn resolve(&self, url: &str) -> Result<String>;
}

/// Configuration for the HTTP resolver.
#[derive(Debug, Clone)]
pub struct HttpResolverConfig {
    /// Timeout for the whole request, redirects included.
    pub timeout: Duration,
    /// Maximum number of redirects followed before giving up.
    pub max_redirects: usize,
    /// User-Agent sent with the request.
    pub user_agent: String,
}

impl Default for HttpResolverConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_RESOLVE_TIMEOUT,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: format!("qrcert/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// `reqwest`-backed resolver.
pub struct HttpResolver {
    client: Client,
}

impl HttpResolver {
    /// Create a resolver with default timeout and redirect limit.
    pub fn new() -> Result<Self> {
        Self::with_config(HttpResolverConfig::default())
    }

    /// Create a resolver with custom configuration.
    #[instrument(level = "debug", skip_all, fields(
        timeout_ms = config.timeout.as_millis() as u64,
        max_redirects = config.max_redirects
    ))]
    pub fn with_config(config: HttpResolverConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| {
                warn!(error = %e, "Failed to create HTTP client");
                VerifyError::Resolution(format!("Failed to create HTTP client: {e}"))
            })?;

        debug!("URL resolver created");
        Ok(Self { client })
    }
}

#[async_trait]
impl UrlResolver for HttpResolver {
    #[instrument(level = "debug", skip(self))]
    async fn resolve(&self, url: &str) -> Result<String> {
        let start = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| {
            let latency_ms = start.elapsed().as_millis() as u64;
            let reason = if e.is_timeout() {
                "timed out"
            } else if e.is_redirect() {
                "too many redirects"
            } else if e.is_connect() {
                "connection failed"
            } else {
                "request failed"
            };
            warn!(error = %e, latency_ms, reason, "Shortened URL resolution failed");
            VerifyError::Resolution(format!("{url}: {reason}: {e}"))
        })?;

        let resolved = response.url().to_string();
        info!(
            status = %response.status(),
            latency_ms = start.elapsed().as_millis() as u64,
            resolved = %resolved,
            "Resolved shortened URL"
        );
        Ok(resolved)
    }
}
