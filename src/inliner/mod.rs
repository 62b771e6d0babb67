//! Resource inlining over a document snapshot.
//!
//! The work splits into three phases so the mutable tree never crosses a
//! task boundary: a read-only extraction pass collects distinct resource
//! references from the source markup, the references are resolved
//! concurrently into per-class maps, and a single apply pass rewrites the
//! snapshot tree from those maps. The four resolution passes (images,
//! inline-style backgrounds, SVG image references, canvases) run
//! concurrently; the frame pass follows sequentially because it reads from
//! the live page.

use anyhow::{Context, Result};
use futures::future::join_all;
use kuchiki::NodeRef;
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};

use crate::fetcher::{self, InlineData, ResourceFetcher};
use crate::page::PageAccess;
use crate::style;

lazy_static! {
    static ref IMG_SELECTOR: Selector =
        Selector::parse("img[src]").expect("BUG: hardcoded img selector is invalid");
    static ref STYLED_SELECTOR: Selector =
        Selector::parse("[style]").expect("BUG: hardcoded [style] selector is invalid");
    static ref SVG_IMAGE_SELECTOR: Selector =
        Selector::parse("svg image").expect("BUG: hardcoded svg image selector is invalid");
    static ref CANVAS_SELECTOR: Selector =
        Selector::parse("canvas").expect("BUG: hardcoded canvas selector is invalid");
    static ref FRAME_SELECTOR: Selector =
        Selector::parse("iframe, frame").expect("BUG: hardcoded frame selector is invalid");
}

/// Attributes that hint at responsive or lazy loading; they are stripped
/// from every image the inliner rewrites so the inline data always wins.
const IMAGE_HINT_ATTRS: &[&str] = &["srcset", "sizes", "loading", "data-src", "data-srcset"];

/// Distinct external references found in one document, by resource class.
#[derive(Debug, Default)]
pub struct ResourceRefs {
    /// `img` sources, non-inline, first-seen order.
    pub images: Vec<String>,
    /// `style` attribute values containing a `url(` reference.
    pub styled: Vec<String>,
    /// `svg image` href targets, non-inline.
    pub svg_refs: Vec<String>,
    /// Number of canvas elements, addressed by document-order index.
    pub canvas_count: usize,
    /// Frame sources, non-inline, first-seen order.
    pub frames: Vec<String>,
}

/// Resolved inline data per resource class, keyed by the original source
/// string (or canvas index). Entries are written once during resolution and
/// only read during the apply pass.
#[derive(Debug, Default)]
pub struct InlineMaps {
    pub images: HashMap<String, InlineData>,
    pub styles: HashMap<String, String>,
    pub svg_refs: HashMap<String, InlineData>,
    pub canvases: HashMap<usize, InlineData>,
    pub frames: HashMap<String, String>,
}

fn push_distinct(seen: &mut HashSet<String>, out: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !fetcher::is_inline(value) && seen.insert(value.to_string()) {
        out.push(value.to_string());
    }
}

/// Local-name attribute lookup. SVG content parsed inside HTML carries
/// `xlink:href` under the XLink namespace, which plain lookups miss.
fn attr_by_local_name<'a>(element: &'a scraper::node::Element, name: &str) -> Option<&'a str> {
    element.attrs().find(|(n, _)| *n == name).map(|(_, v)| v)
}

/// Read-only extraction of every external reference the inliner handles.
#[must_use]
pub fn extract_resource_refs(html: &str) -> ResourceRefs {
    let document = Html::parse_document(html);
    let mut refs = ResourceRefs::default();

    let mut seen_images = HashSet::new();
    for element in document.select(&IMG_SELECTOR) {
        if let Some(src) = element.value().attr("src") {
            push_distinct(&mut seen_images, &mut refs.images, src);
        }
    }

    let mut seen_styles = HashSet::new();
    for element in document.select(&STYLED_SELECTOR) {
        if let Some(value) = element.value().attr("style") {
            if value.contains("url(") && seen_styles.insert(value.to_string()) {
                refs.styled.push(value.to_string());
            }
        }
    }

    let mut seen_svg = HashSet::new();
    for element in document.select(&SVG_IMAGE_SELECTOR) {
        if let Some(href) = attr_by_local_name(element.value(), "href") {
            push_distinct(&mut seen_svg, &mut refs.svg_refs, href);
        }
    }

    refs.canvas_count = document.select(&CANVAS_SELECTOR).count();

    let mut seen_frames = HashSet::new();
    for element in document.select(&FRAME_SELECTOR) {
        if let Some(src) = element.value().attr("src") {
            push_distinct(&mut seen_frames, &mut refs.frames, src);
        }
    }

    refs
}

/// Resolve image sources: prefer already-decoded pixel data from the live
/// page, fall back to one direct fetch, and on total failure record nothing
/// so the original URL stays in place.
async fn resolve_images(
    sources: &[String],
    base_url: &str,
    fetcher: &dyn ResourceFetcher,
    page: &dyn PageAccess,
) -> HashMap<String, InlineData> {
    let tasks = sources.iter().map(|src| async move {
        if let Some(data) = page.decoded_image(src).await {
            return (src.clone(), Some(data));
        }
        // Cross-origin taint or no live counterpart: one direct fetch.
        (src.clone(), fetcher.fetch(src, base_url).await)
    });

    join_all(tasks)
        .await
        .into_iter()
        .filter_map(|(src, data)| data.map(|d| (src, d)))
        .collect()
}

/// Resolve inline-style backgrounds by running each distinct `style`
/// attribute value through the style resolver.
async fn resolve_styled(
    values: &[String],
    base_url: &str,
    fetcher: &dyn ResourceFetcher,
) -> HashMap<String, String> {
    let tasks = values.iter().map(|value| async move {
        let resolved = style::resolve_urls(value, base_url, fetcher).await;
        (value.clone(), resolved)
    });

    join_all(tasks).await.into_iter().collect()
}

/// Resolve SVG image references directly via the fetcher.
async fn resolve_svg_refs(
    sources: &[String],
    base_url: &str,
    fetcher: &dyn ResourceFetcher,
) -> HashMap<String, InlineData> {
    let tasks = sources
        .iter()
        .map(|href| async move { (href.clone(), fetcher.fetch(href, base_url).await) });

    join_all(tasks)
        .await
        .into_iter()
        .filter_map(|(href, data)| data.map(|d| (href, d)))
        .collect()
}

/// Capture canvas pixel content via the live page. A canvas whose content
/// cannot be read gets no entry and is left untouched by the apply pass.
async fn resolve_canvases(count: usize, page: &dyn PageAccess) -> HashMap<usize, InlineData> {
    let tasks = (0..count).map(|index| async move { (index, page.canvas_data(index).await) });

    join_all(tasks)
        .await
        .into_iter()
        .filter_map(|(index, data)| data.map(|d| (index, d)))
        .collect()
}

/// Run all resolution passes: the four independent ones concurrently, then
/// the frame pass sequentially against the live page.
pub async fn resolve_all(
    refs: &ResourceRefs,
    base_url: &str,
    fetcher: &dyn ResourceFetcher,
    page: &dyn PageAccess,
) -> InlineMaps {
    let (images, styles, svg_refs, canvases) = futures::join!(
        resolve_images(&refs.images, base_url, fetcher, page),
        resolve_styled(&refs.styled, base_url, fetcher),
        resolve_svg_refs(&refs.svg_refs, base_url, fetcher),
        resolve_canvases(refs.canvas_count, page),
    );

    let mut frames = HashMap::new();
    for src in &refs.frames {
        if let Some(markup) = page.frame_markup(src).await {
            frames.insert(src.clone(), markup);
        }
    }

    log::debug!(
        "resolved {}/{} images, {}/{} styled, {}/{} svg refs, {}/{} canvases, {}/{} frames",
        images.len(),
        refs.images.len(),
        styles.len(),
        refs.styled.len(),
        svg_refs.len(),
        refs.svg_refs.len(),
        canvases.len(),
        refs.canvas_count,
        frames.len(),
        refs.frames.len(),
    );

    InlineMaps {
        images,
        styles,
        svg_refs,
        canvases,
        frames,
    }
}

/// Parse an HTML fragment and pull out the first node matching `selector`.
fn parse_fragment_node(html: &str, selector: &str) -> Result<NodeRef> {
    use kuchiki::traits::TendrilSink;

    let fragment = kuchiki::parse_html().one(html.to_string());
    let node = fragment
        .select_first(selector)
        .map_err(|()| anyhow::anyhow!("invalid fragment selector: {selector}"))?
        .as_node()
        .clone();
    node.detach();
    Ok(node)
}

/// Rewrite the snapshot tree from the resolved maps. This is the only place
/// the tree is mutated, and it runs on a single task after all resolution
/// has joined.
pub fn apply_replacements(snapshot: &NodeRef, maps: &InlineMaps) -> Result<()> {
    apply_images(snapshot, &maps.images)?;
    apply_styled(snapshot, &maps.styles)?;
    apply_svg_refs(snapshot, &maps.svg_refs)?;
    apply_canvases(snapshot, &maps.canvases)?;
    apply_frames(snapshot, &maps.frames)?;
    Ok(())
}

fn apply_images(snapshot: &NodeRef, images: &HashMap<String, InlineData>) -> Result<()> {
    let matches: Vec<_> = snapshot
        .select("img[src]")
        .map_err(|()| anyhow::anyhow!("invalid img selector"))?
        .collect();

    for node_ref in matches {
        let src = {
            let attrs = node_ref.attributes.borrow();
            attrs.get("src").map(ToString::to_string)
        };
        let Some(src) = src else { continue };
        let Some(data) = images.get(&src) else {
            // Unresolved: the original URL stays, never a broken placeholder.
            continue;
        };

        let mut attrs = node_ref.attributes.borrow_mut();
        attrs.insert("src", data.as_str().to_string());
        for hint in IMAGE_HINT_ATTRS {
            attrs.remove(*hint);
        }
    }

    Ok(())
}

fn apply_styled(snapshot: &NodeRef, styles: &HashMap<String, String>) -> Result<()> {
    let matches: Vec<_> = snapshot
        .select("[style]")
        .map_err(|()| anyhow::anyhow!("invalid [style] selector"))?
        .collect();

    for node_ref in matches {
        let value = {
            let attrs = node_ref.attributes.borrow();
            attrs.get("style").map(ToString::to_string)
        };
        let Some(value) = value else { continue };
        if let Some(resolved) = styles.get(&value) {
            if resolved != &value {
                node_ref
                    .attributes
                    .borrow_mut()
                    .insert("style", resolved.clone());
            }
        }
    }

    Ok(())
}

fn apply_svg_refs(snapshot: &NodeRef, svg_refs: &HashMap<String, InlineData>) -> Result<()> {
    let matches: Vec<_> = snapshot
        .select("svg image")
        .map_err(|()| anyhow::anyhow!("invalid svg image selector"))?
        .collect();

    for node_ref in matches {
        let href = {
            let attrs = node_ref.attributes.borrow();
            attrs
                .map
                .iter()
                .find(|(name, _)| &*name.local == "href")
                .map(|(_, attr)| attr.value.clone())
        };
        let Some(href) = href else { continue };
        let Some(data) = svg_refs.get(&href) else {
            continue;
        };

        let mut attrs = node_ref.attributes.borrow_mut();
        // Drop both the plain and the legacy xlink form, then set one
        // un-namespaced href carrying the inline data.
        attrs.map.retain(|name, _| &*name.local != "href");
        attrs.insert("href", data.as_str().to_string());
    }

    Ok(())
}

fn apply_canvases(snapshot: &NodeRef, canvases: &HashMap<usize, InlineData>) -> Result<()> {
    let matches: Vec<_> = snapshot
        .select("canvas")
        .map_err(|()| anyhow::anyhow!("invalid canvas selector"))?
        .collect();

    for (index, node_ref) in matches.into_iter().enumerate() {
        let Some(data) = canvases.get(&index) else {
            // Unreadable canvas content: the element stays as-is.
            continue;
        };

        let img = parse_fragment_node("<img>", "img").context("building canvas replacement")?;
        if let Some(element) = img.as_element() {
            let mut img_attrs = element.attributes.borrow_mut();
            img_attrs.insert("src", data.as_str().to_string());
            // Carry the canvas's visual footprint over to the image.
            let canvas_attrs = node_ref.attributes.borrow();
            for name in ["width", "height", "class", "style", "id"] {
                if let Some(value) = canvas_attrs.get(name) {
                    img_attrs.insert(name, value.to_string());
                }
            }
        }

        let node = node_ref.as_node();
        node.insert_before(img);
        node.detach();
    }

    Ok(())
}

fn apply_frames(snapshot: &NodeRef, frames: &HashMap<String, String>) -> Result<()> {
    let matches: Vec<_> = snapshot
        .select("iframe, frame")
        .map_err(|()| anyhow::anyhow!("invalid frame selector"))?
        .collect();

    for node_ref in matches {
        let (src, has_srcdoc, width, height) = {
            let attrs = node_ref.attributes.borrow();
            (
                attrs.get("src").map(ToString::to_string),
                attrs.contains("srcdoc"),
                attrs.get("width").map(ToString::to_string),
                attrs.get("height").map(ToString::to_string),
            )
        };

        // Already self-contained frames need no rewriting.
        if src.as_deref().map(fetcher::is_inline).unwrap_or(false) {
            continue;
        }

        if let Some(markup) = src.as_deref().and_then(|s| frames.get(s)) {
            let mut attrs = node_ref.attributes.borrow_mut();
            attrs.insert("srcdoc", markup.clone());
            attrs.remove("src");
            continue;
        }

        if has_srcdoc {
            // Inline content already present; just drop the external source.
            node_ref.attributes.borrow_mut().remove("src");
            continue;
        }

        // Inaccessible or absent content: neutral placeholder block with
        // the frame's original dimensions.
        let width = width.unwrap_or_else(|| "300".to_string());
        let height = height.unwrap_or_else(|| "150".to_string());
        let placeholder = parse_fragment_node("<div></div>", "div")
            .context("building frame placeholder")?;
        if let Some(element) = placeholder.as_element() {
            element.attributes.borrow_mut().insert(
                "style",
                format!(
                    "width:{width}px;height:{height}px;background:#ececec;\
                     border:1px solid #d0d0d0;display:inline-block;"
                ),
            );
        }

        let node = node_ref.as_node();
        node.insert_before(placeholder);
        node.detach();
    }

    Ok(())
}
