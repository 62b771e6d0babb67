//! Live-page access capability.
//!
//! Some resources can only be read out of the rendered page itself:
//! already-decoded image pixels, canvas contents, and the markup of nested
//! frames. The pipeline receives that access as an explicit capability
//! rather than reaching into ambient globals, so a capture can run against
//! a real page, a recorded fake, or nothing at all.

use async_trait::async_trait;

use crate::fetcher::InlineData;

/// Read-only access to the rendered page a capture was triggered on.
///
/// Every method answers `None` when the content is inaccessible, which the
/// pipeline treats as "fall back or leave in place" rather than an error.
/// Implementations backed by a real page are expected to bound any
/// wait-for-load internally (a couple of seconds for a still-pending
/// image, at most).
#[async_trait]
pub trait PageAccess: Send + Sync {
    /// Decoded pixel data for the image element whose source attribute
    /// equals `src`, re-encoded as inline raster data. `None` when there is
    /// no live counterpart, the image never decoded, or reading the pixel
    /// buffer is blocked by cross-origin taint.
    async fn decoded_image(&self, src: &str) -> Option<InlineData> {
        let _ = src;
        None
    }

    /// Current pixel content of the canvas at `index` (document order).
    /// `None` for a security-tainted canvas.
    async fn canvas_data(&self, index: usize) -> Option<InlineData> {
        let _ = index;
        None
    }

    /// Rendered markup of the nested frame whose source attribute equals
    /// `src`. `None` when the frame content is cross-origin or absent.
    async fn frame_markup(&self, src: &str) -> Option<String> {
        let _ = src;
        None
    }
}

/// Page access for captures that run without a rendered page (for example
/// when capturing server-delivered HTML directly). Nothing is readable, so
/// images fall back to direct fetches, canvases stay as-is, and frames
/// become placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedPage;

#[async_trait]
impl PageAccess for DetachedPage {}
