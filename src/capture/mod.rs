//! Capture orchestration: one pass from source markup to a self-contained
//! document string.
//!
//! The orchestrator sequences style resolution, snapshot parsing, resource
//! inlining, sanitization and final assembly, and converts any stage error
//! into a structured failure at the outermost boundary. The
//! source markup is never mutated; all rewriting happens on the snapshot
//! tree, which is owned exclusively by the running capture.

use anyhow::{Context, Result};
use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use serde::{Deserialize, Serialize};

use crate::config::CaptureConfig;
use crate::fetcher::ResourceFetcher;
use crate::inliner;
use crate::page::PageAccess;
use crate::sanitize;
use crate::style;

/// Outcome of one capture invocation. Immutable after creation.
///
/// `success == true` implies `html` holds a complete document and `error`
/// is absent; `success == false` implies a non-empty `error` and no `html`.
/// The constructors enforce this.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaptureResult {
    #[must_use]
    pub fn ok(html: String, title: Option<String>, source_url: impl Into<String>) -> Self {
        Self {
            success: true,
            html: Some(html),
            title,
            source_url: Some(source_url.into()),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        let error = error.into();
        let error = if error.trim().is_empty() {
            "capture failed".to_string()
        } else {
            error
        };
        Self {
            success: false,
            html: None,
            title: None,
            source_url: None,
            error: Some(error),
        }
    }
}

/// Runs the capture pipeline over one document.
pub struct CaptureEngine<F, P> {
    fetcher: F,
    page: P,
    config: CaptureConfig,
}

impl<F: ResourceFetcher, P: PageAccess> CaptureEngine<F, P> {
    #[must_use]
    pub fn new(fetcher: F, page: P, config: CaptureConfig) -> Self {
        Self {
            fetcher,
            page,
            config,
        }
    }

    /// Capture `html` (as rendered at `base_url`) into a self-contained
    /// document. Per-resource failures degrade silently; only a pipeline
    /// failure produces an unsuccessful result, and it never escapes as an
    /// error.
    pub async fn capture(&self, html: &str, base_url: &str) -> CaptureResult {
        match self.run(html, base_url).await {
            Ok((document, title)) => CaptureResult::ok(document, title, base_url),
            Err(e) => {
                log::warn!("capture of {base_url} failed: {e:#}");
                CaptureResult::failure(format!("capture failed: {e:#}"))
            }
        }
    }

    async fn run(&self, html: &str, base_url: &str) -> Result<(String, Option<String>)> {
        // Style text is resolved from the source document before the
        // snapshot exists; sheet links are still intact there.
        let styles = style::collect_document_styles(
            html,
            base_url,
            &self.fetcher,
            self.config.max_import_depth,
        )
        .await;

        // Read-only extraction, then all network resolution, before any
        // tree is built: the mutable snapshot never crosses an await.
        let refs = inliner::extract_resource_refs(html);
        let maps = inliner::resolve_all(&refs, base_url, &self.fetcher, &self.page).await;

        let snapshot = kuchiki::parse_html().one(html.to_string());
        let title = extract_title(&snapshot);

        // Apply before sanitizing: extraction indexed elements (canvases by
        // document order) against the unmodified tree, so the apply pass
        // must see that same tree state.
        inliner::apply_replacements(&snapshot, &maps)?;
        sanitize::sanitize(&snapshot);
        assemble(&snapshot, &styles)?;

        Ok((serialize_snapshot(&snapshot)?, title))
    }
}

fn extract_title(snapshot: &NodeRef) -> Option<String> {
    snapshot
        .select_first("title")
        .ok()
        .map(|t| t.text_contents().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Parse an HTML fragment and detach the first node matching `selector`.
fn fragment_node(html: &str, selector: &str) -> Result<NodeRef> {
    let fragment = kuchiki::parse_html().one(html.to_string());
    let node = fragment
        .select_first(selector)
        .map_err(|()| anyhow::anyhow!("invalid fragment selector: {selector}"))?
        .as_node()
        .clone();
    node.detach();
    Ok(node)
}

/// Final assembly on the snapshot: inject the aggregated style block, make
/// sure a charset declaration exists, and drop base elements so relative
/// references cannot escape the document.
fn assemble(snapshot: &NodeRef, styles: &str) -> Result<()> {
    let head = snapshot
        .select_first("head")
        .map_err(|()| anyhow::anyhow!("document has no head element"))?;
    let head = head.as_node();

    let has_charset = snapshot
        .select("meta[charset]")
        .map(|mut m| m.next().is_some())
        .unwrap_or(false);
    if !has_charset {
        let meta = fragment_node(r#"<meta charset="utf-8">"#, "meta")?;
        head.prepend(meta);
    }

    if !styles.trim().is_empty() {
        let style_node = fragment_node("<style></style>", "style")?;
        style_node.append(NodeRef::new_text(styles));
        head.append(style_node);
    }

    if let Ok(matches) = snapshot.select("base") {
        let nodes: Vec<_> = matches.collect();
        for node_ref in nodes {
            node_ref.as_node().detach();
        }
    }

    Ok(())
}

/// Serialize the snapshot with exactly one doctype declaration.
fn serialize_snapshot(snapshot: &NodeRef) -> Result<String> {
    let doctypes: Vec<_> = snapshot
        .children()
        .filter(|child| child.as_doctype().is_some())
        .collect();
    for doctype in doctypes {
        doctype.detach();
    }

    let mut out = Vec::new();
    snapshot
        .serialize(&mut out)
        .context("failed to serialize snapshot")?;
    let body = String::from_utf8(out).context("serialized snapshot is not valid UTF-8")?;
    Ok(format!("<!DOCTYPE html>\n{body}"))
}
