//! Upload client: the capture side's view of the snapshot store.

use anyhow::{bail, Context, Result};

use super::handlers::{UploadRequest, UploadResponse};
use crate::capture::CaptureResult;
use crate::codec;

/// Upload a successful capture to a snapshot store at `server`.
///
/// When `compress` is set the document travels gzip-compressed and
/// transport-encoded, which the store reverses before persisting.
pub async fn upload_snapshot(
    server: &str,
    capture: &CaptureResult,
    expires_in: Option<&str>,
    compress: bool,
) -> Result<UploadResponse> {
    let html = capture
        .html
        .as_deref()
        .context("capture produced no document to upload")?;

    let (payload, compressed) = if compress {
        (codec::encode(&codec::compress(html)?), true)
    } else {
        (html.to_string(), false)
    };

    let request = UploadRequest {
        html: payload,
        compressed,
        title: capture.title.clone(),
        source_url: capture.source_url.clone(),
        expires_in: expires_in.map(ToString::to_string),
    };

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/api/upload", server.trim_end_matches('/')))
        .json(&request)
        .send()
        .await
        .context("upload request failed")?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        bail!("upload rejected ({status}): {body}");
    }

    response
        .json::<UploadResponse>()
        .await
        .context("malformed upload response")
}
