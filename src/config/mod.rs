//! Configuration for the capture pipeline and the snapshot store.

use std::time::Duration;

/// Tuning knobs for one capture pipeline instance.
///
/// The pipeline makes a single bounded fetch attempt per resource and
/// bounds `@import` recursion; these knobs set those bounds.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Timeout for each individual resource fetch. A fetch that does not
    /// complete within this budget counts as unavailable.
    pub fetch_timeout: Duration,

    /// Maximum size for any single downloaded resource (bytes). Larger
    /// bodies are abandoned mid-stream and the resource counts as
    /// unavailable.
    pub max_resource_size: usize,

    /// Maximum `@import` nesting depth. Sheets reached beyond this depth
    /// contribute empty text, which also bounds cyclic import graphs.
    pub max_import_depth: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            max_resource_size: 5 * 1024 * 1024,
            max_import_depth: 5,
        }
    }
}

impl CaptureConfig {
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_resource_size(mut self, bytes: usize) -> Self {
        self.max_resource_size = bytes;
        self
    }

    #[must_use]
    pub fn with_max_import_depth(mut self, depth: usize) -> Self {
        self.max_import_depth = depth;
        self
    }
}

/// Configuration for the snapshot store server.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Socket address the server binds to.
    pub listen_addr: String,

    /// Base URL used when building snapshot links returned to clients.
    /// Defaults to `http://{listen_addr}` when unset.
    pub public_url: Option<String>,

    /// Upload size ceiling (bytes) applied to the encoded document body.
    /// Requests above it are rejected with 413 and nothing is stored.
    pub max_upload_bytes: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8098".to_string(),
            public_url: None,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn with_listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    #[must_use]
    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    /// Base URL for links returned from the upload endpoint, without a
    /// trailing slash.
    #[must_use]
    pub fn public_base(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}", self.listen_addr),
        }
    }
}
