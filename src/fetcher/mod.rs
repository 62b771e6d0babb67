//! Resource fetching: resolve a possibly-relative URL and download it as
//! inline data.
//!
//! Failure is a value here, not an exception. Every way a resource can be
//! unavailable (malformed URL, timeout, non-success status, transport error,
//! empty body, oversized body) maps to `None`; callers degrade gracefully
//! instead of aborting the capture. There are no retries: one bounded
//! attempt per call site.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::config::CaptureConfig;

/// Browser-like user agent sent with every resource fetch. Some CDNs serve
/// different (or no) content to unknown agents.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.6834.160 Safari/537.36";

/// A self-contained `data:` URL that can be embedded in place of an external
/// reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineData(String);

impl InlineData {
    /// Build a data URL from a MIME type and raw bytes.
    #[must_use]
    pub fn from_parts(mime: &str, bytes: &[u8]) -> Self {
        // Pre-allocate: base64 output length is known up front.
        let encoded_len = base64::encoded_len(bytes.len(), true).unwrap_or(0);
        let mut out = String::with_capacity(encoded_len + mime.len() + 16);
        out.push_str("data:");
        out.push_str(mime);
        out.push_str(";base64,");
        base64::engine::general_purpose::STANDARD.encode_string(bytes, &mut out);
        Self(out)
    }

    /// Wrap a URL that is already in inline form.
    #[must_use]
    pub fn from_data_url(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for InlineData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a URL is already self-contained and needs no fetch.
#[must_use]
pub fn is_inline(url: &str) -> bool {
    url.trim_start().starts_with("data:")
}

/// Resolve a potentially relative URL against a base URL.
///
/// Query strings are re-encoded because URLs lifted from HTML frequently
/// carry unencoded special characters (`:`, `,`, `@`, `;`) that strict
/// servers such as font CDNs reject.
pub fn resolve_url(base_url: &str, url: &str) -> Result<String> {
    let mut resolved = match Url::parse(base_url) {
        Ok(base) => base.join(url).context("failed to resolve URL against base")?,
        // No usable base: the reference must stand on its own.
        Err(_) => Url::parse(url).context("invalid URL without a usable base")?,
    };

    if resolved.query().is_some() {
        let query_pairs: Vec<(String, String)> = resolved
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        resolved.query_pairs_mut().clear();
        for (key, value) in query_pairs {
            resolved.query_pairs_mut().append_pair(&key, &value);
        }
    }

    Ok(resolved.to_string())
}

/// Capability interface for resolving external references to inline data.
///
/// The pipeline only ever talks to this trait, so tests run against
/// in-memory fakes and the HTTP implementation stays at the edge.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Resolve `url` against `base_url` and fetch it as a data URL.
    /// `None` means the resource is unavailable; the caller keeps whatever
    /// it already has.
    async fn fetch(&self, url: &str, base_url: &str) -> Option<InlineData>;

    /// Resolve and fetch a resource as text (style sheets, frame markup).
    async fn fetch_text(&self, url: &str, base_url: &str) -> Option<String>;
}

/// HTTP-backed fetcher with a per-request timeout and a streaming size cap.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
    max_resource_size: usize,
}

impl HttpFetcher {
    #[must_use]
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            client: Client::new(),
            timeout: config.fetch_timeout,
            max_resource_size: config.max_resource_size,
        }
    }

    /// Single bounded download attempt. Returns the response content type
    /// and body, or the reason the resource is unavailable.
    async fn download(&self, url: &str) -> Result<(String, Vec<u8>)> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "*/*")
            .send()
            .await
            .context("request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("non-success status: {}", response.status());
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        // Enforce the size cap before downloading when the server declares
        // a length, and again while streaming in case it lied.
        let expected = response.content_length().unwrap_or(0);
        if expected > self.max_resource_size as u64 {
            anyhow::bail!(
                "resource too large: {expected} bytes exceeds limit of {} bytes",
                self.max_resource_size
            );
        }

        let mut buffer = if expected > 0 {
            Vec::with_capacity(expected as usize)
        } else {
            Vec::new()
        };

        let mut stream = response.bytes_stream();
        let mut total = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("failed to read response chunk")?;
            let new_total = total + chunk.len();
            if new_total > self.max_resource_size {
                anyhow::bail!(
                    "resource exceeded size limit during download: {new_total} bytes (max: {})",
                    self.max_resource_size
                );
            }
            buffer.extend_from_slice(&chunk);
            total = new_total;
        }

        if buffer.is_empty() {
            anyhow::bail!("empty response body");
        }

        Ok((content_type, buffer))
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, base_url: &str) -> Option<InlineData> {
        // Already inline: no-op fast path, no network call.
        if is_inline(url) {
            return Some(InlineData::from_data_url(url));
        }

        let resolved = match resolve_url(base_url, url) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::debug!("unresolvable resource URL {url}: {e}");
                return None;
            }
        };

        match self.download(&resolved).await {
            Ok((content_type, bytes)) => {
                // The data URL only wants the bare MIME type, not header
                // parameters like charset.
                let mime = content_type
                    .split(';')
                    .next()
                    .unwrap_or("application/octet-stream")
                    .trim()
                    .to_string();
                Some(InlineData::from_parts(&mime, &bytes))
            }
            Err(e) => {
                log::debug!("resource unavailable {resolved}: {e:#}");
                None
            }
        }
    }

    async fn fetch_text(&self, url: &str, base_url: &str) -> Option<String> {
        let resolved = match resolve_url(base_url, url) {
            Ok(resolved) => resolved,
            Err(e) => {
                log::debug!("unresolvable text URL {url}: {e}");
                return None;
            }
        };

        match self.download(&resolved).await {
            Ok((_, bytes)) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => {
                log::debug!("text resource unavailable {resolved}: {e:#}");
                None
            }
        }
    }
}
