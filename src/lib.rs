//! Capture a web page as one self-contained HTML document.
//!
//! The capture pipeline resolves every external resource a page depends on
//! (stylesheets, images, SVG references, frames), embeds them as data URLs
//! or inline markup, strips active content, and serializes the result as a
//! single document that renders without network access.
//!
//! The companion snapshot store accepts captured documents over HTTP,
//! optionally transport-compressed, and serves them back under short
//! identifiers until they expire.

pub mod capture;
pub mod codec;
pub mod config;
pub mod fetcher;
pub mod inliner;
pub mod page;
pub mod sanitize;
pub mod store;
pub mod style;

pub use capture::{CaptureEngine, CaptureResult};
pub use config::{CaptureConfig, StoreConfig};
pub use fetcher::{resolve_url, HttpFetcher, InlineData, ResourceFetcher};
pub use page::{DetachedPage, PageAccess};
