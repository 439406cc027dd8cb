//! HTTP fetch pipeline for icon downloads.
//!
//! ### URL Canonicalization
//! - Trim whitespace, ensure scheme (default: `https`)
//! - Lowercase host, remove fragments
//!
//! ### SSRF & Safety Gates
//! - Deny private ranges (RFC1918, link-local, localhost, CGNAT, etc.)
//! - Resolve DNS and validate all A/AAAA answers are public.
//! - Redirects to literal private addresses are refused.
//! - Max redirects: 5
//! - Max body bytes: 500KB (configurable)
//!
//! ### Content Gate
//! - Only `image/*` and `application/octet-stream` bodies are accepted. A
//!   missing Content-Type is accepted.

pub mod ssrf;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use reqwest::{Client, StatusCode, header, redirect};
use std::time::{Duration, Instant};

pub use ssrf::{SsrfError, validate_ip};

use iconcache_core::cache::{MAX_SINGLE_SIZE, canonicalize};
use iconcache_core::config::AppConfig;
use iconcache_core::{Error, FetchedIcon, IconFetcher};

const ICON_ACCEPT: &str = "image/avif,image/webp,image/png,image/svg+xml,image/x-icon,image/*;q=0.8,*/*;q=0.5";

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "iconcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 500KB)
    pub max_bytes: usize,

    /// Request timeout (default: 10s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Skip the private-address checks (default: false)
    pub allow_private_hosts: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "iconcache/0.1".to_string(),
            max_bytes: MAX_SINGLE_SIZE,
            timeout: Duration::from_millis(10_000),
            max_redirects: 5,
            allow_private_hosts: false,
        }
    }
}

impl FetchConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_single_size,
            timeout: config.timeout(),
            allow_private_hosts: config.allow_private_hosts,
            ..Self::default()
        }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The original URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: StatusCode,
    /// Content-Type header
    pub content_type: Option<String>,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

/// Whether a Content-Type header names something that can be an icon.
pub fn is_icon_content_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    mime.starts_with("image/") || mime == "application/octet-stream"
}

fn redirect_policy(max_redirects: usize, allow_private_hosts: bool) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            return attempt.error("too many redirects");
        }
        if !allow_private_hosts && let Some(Err(e)) = ssrf::check_literal_host(attempt.url()) {
            return attempt.error(e);
        }
        attempt.follow()
    })
}

/// HTTP fetch client with safety checks.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(redirect_policy(config.max_redirects, config.allow_private_hosts))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Fetch an icon URL, returning raw bytes and metadata.
    ///
    /// Performs the SSRF check, then enforces status, size and content-type
    /// limits. The body is read incrementally and abandoned as soon as it
    /// crosses `max_bytes`.
    pub async fn fetch(&self, url_str: &str) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let url = canonicalize(url_str).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        if !self.config.allow_private_hosts {
            ssrf::check_url(&url)
                .await
                .map_err(|e| Error::SsrfBlocked(e.to_string()))?;
        }

        let mut response = self
            .http
            .get(url.as_str())
            .header(header::ACCEPT, ICON_ACCEPT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::FetchTimeout(format!("{url}: {e}"))
                } else {
                    Error::HttpError(format!("network error: {}", e))
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            return Err(Error::HttpError(format!("status {}", status.as_u16())));
        }

        let max_bytes = self.config.max_bytes;
        if let Some(len) = response.content_length()
            && len as usize > max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, max_bytes)));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if let Some(ct) = content_type.as_deref()
            && !is_icon_content_type(ct)
        {
            return Err(Error::UnsupportedContent(format!("{url} served {ct}")));
        }

        let final_url = response.url().clone();

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::HttpError(format!("failed to read response: {}", e)))?
        {
            if body.len() + chunk.len() > max_bytes {
                return Err(Error::FetchTooLarge(format!("body exceeds {} bytes", max_bytes)));
            }
            body.extend_from_slice(&chunk);
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            url = %url,
            final_url = %final_url,
            fetch_ms,
            bytes = body.len(),
            "fetched icon"
        );

        Ok(FetchResponse { url, final_url, status, content_type, bytes: Bytes::from(body), fetch_ms })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl IconFetcher for FetchClient {
    async fn fetch_icon(&self, url: &str) -> Result<FetchedIcon, Error> {
        let response = self.fetch(url).await?;
        Ok(FetchedIcon {
            url: response.final_url.to_string(),
            bytes: response.bytes,
            content_type: response.content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "iconcache/0.1");
        assert_eq!(config.max_bytes, 500 * 1024);
        assert_eq!(config.timeout, Duration::from_millis(10_000));
        assert_eq!(config.max_redirects, 5);
        assert!(!config.allow_private_hosts);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig {
            user_agent: "test-agent".into(),
            max_single_size: 1024,
            timeout_ms: 2_000,
            allow_private_hosts: true,
            ..Default::default()
        };
        let config = FetchConfig::from_app_config(&app);
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert!(config.allow_private_hosts);
    }

    #[test]
    fn test_icon_content_types() {
        assert!(is_icon_content_type("image/png"));
        assert!(is_icon_content_type("image/x-icon"));
        assert!(is_icon_content_type("Image/SVG+XML; charset=utf-8"));
        assert!(is_icon_content_type("application/octet-stream"));
        assert!(!is_icon_content_type("text/html; charset=utf-8"));
        assert!(!is_icon_content_type("application/json"));
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_rejects_invalid_url() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let result = client.fetch("ftp://example.com/favicon.ico").await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_blocks_private_address() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let result = client.fetch("http://127.0.0.1:9/favicon.ico").await;
        assert!(matches!(result, Err(Error::SsrfBlocked(_))));

        let result = client.fetch_icon("http://localhost/favicon.ico").await;
        assert!(matches!(result, Err(Error::SsrfBlocked(_))));
    }
}
