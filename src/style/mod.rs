//! Style resolution: rewrite every external `url()` reference in style text
//! to inline data, flattening `@import` trees along the way.
//!
//! One call to [`resolve_urls`] is a resolution pass: the distinct set of
//! referenced URLs is collected first, fetched concurrently, and the results
//! land in a private URL map scoped to the pass. References that fail to
//! resolve are left byte-identical in the output; degradation is silent and
//! local, never fatal.

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};

use crate::fetcher::{self, resolve_url, InlineData, ResourceFetcher};

lazy_static! {
    // Matches url("..."), url('...') and bare url(...) references.
    static ref CSS_URL_RE: Regex = Regex::new(
        r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^'")\s][^)]*?))\s*\)"#
    )
    .expect("BUG: hardcoded url() regex is invalid");

    // Matches a whole @import statement in either the url() or the bare
    // string form, through its terminating semicolon.
    static ref CSS_IMPORT_RE: Regex = Regex::new(
        r#"@import\s+(?:url\(\s*(?:"([^"]*)"|'([^']*)'|([^'")\s][^)]*?))\s*\)|"([^"]*)"|'([^']*)')[^;]*;"#
    )
    .expect("BUG: hardcoded @import regex is invalid");
}

/// One style sheet, or one `@import` target: its rule text plus the base
/// URL relative references inside it resolve against.
#[derive(Debug, Clone)]
pub struct StyleSheetNode {
    pub base_url: String,
    pub text: String,
}

/// First populated capture group of a `url()` or `@import` match.
fn captured_target(caps: &Captures<'_>) -> Option<String> {
    (1..caps.len())
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().trim().to_string())
}

/// Whether a reference should be fetched at all. Already-inline data and
/// fragment-only references stay untouched.
fn is_external_reference(target: &str) -> bool {
    !target.is_empty() && !target.starts_with('#') && !fetcher::is_inline(target)
}

/// Distinct external URLs referenced by `url()` in `css`, in first-seen
/// order.
#[must_use]
pub fn extract_css_urls(css: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for caps in CSS_URL_RE.captures_iter(css) {
        if let Some(target) = captured_target(&caps) {
            if is_external_reference(&target) && seen.insert(target.clone()) {
                urls.push(target);
            }
        }
    }

    urls
}

/// Rewrite every resolvable `url()` reference in `css` to inline data.
///
/// All distinct URLs are fetched concurrently; each resolved URL is then
/// substituted literally across the three quoting styles it may appear in,
/// always emitting double-quoted `url("...")`. Unresolved references are
/// left exactly as they were.
pub async fn resolve_urls(css: &str, base_url: &str, fetcher: &dyn ResourceFetcher) -> String {
    let urls = extract_css_urls(css);
    if urls.is_empty() {
        return css.to_string();
    }

    log::debug!("resolving {} distinct style references", urls.len());

    let fetches = urls.into_iter().map(|url| async move {
        let data = fetcher.fetch(&url, base_url).await;
        (url, data)
    });

    // Resolution pass map: original URL -> inline data, absent on failure.
    let resolved: HashMap<String, InlineData> = join_all(fetches)
        .await
        .into_iter()
        .filter_map(|(url, data)| data.map(|d| (url, d)))
        .collect();

    let mut out = css.to_string();
    for (original, data) in &resolved {
        let inlined = format!("url(\"{}\")", data.as_str());
        out = out.replace(&format!("url(\"{original}\")"), &inlined);
        out = out.replace(&format!("url('{original}')"), &inlined);
        out = out.replace(&format!("url({original})"), &inlined);
    }

    out
}

/// Fully resolve one style sheet: flatten its `@import` tree depth-first,
/// then inline its own `url()` references.
///
/// Imported sheets are fetched as text with the import's resolved URL as
/// their own base, and their resolved text is prepended before the
/// importing sheet's rules (imports must precede rules in the cascade).
/// Recursion beyond `max_depth` contributes empty text, which terminates
/// cyclic import graphs. A sheet that cannot be fetched contributes empty
/// text; nothing here fails the capture.
pub fn resolve_stylesheet<'a>(
    sheet: StyleSheetNode,
    depth: usize,
    fetcher: &'a dyn ResourceFetcher,
    max_depth: usize,
) -> BoxFuture<'a, String> {
    async move {
        if depth > max_depth {
            log::debug!(
                "import depth {depth} exceeds bound {max_depth}, dropping sheet at {}",
                sheet.base_url
            );
            return String::new();
        }

        let mut imports: Vec<String> = Vec::new();
        let stripped = CSS_IMPORT_RE
            .replace_all(&sheet.text, |caps: &Captures<'_>| {
                if let Some(target) = captured_target(caps) {
                    if is_external_reference(&target) {
                        imports.push(target);
                    }
                }
                String::new()
            })
            .into_owned();

        let mut flattened = String::new();
        for target in imports {
            let Some(text) = fetcher.fetch_text(&target, &sheet.base_url).await else {
                log::debug!("imported sheet unavailable: {target}");
                continue;
            };
            let import_base =
                resolve_url(&sheet.base_url, &target).unwrap_or_else(|_| sheet.base_url.clone());
            let imported = StyleSheetNode {
                base_url: import_base,
                text,
            };
            let resolved = resolve_stylesheet(imported, depth + 1, fetcher, max_depth).await;
            if !resolved.trim().is_empty() {
                flattened.push_str(&resolved);
                flattened.push('\n');
            }
        }

        flattened.push_str(&resolve_urls(&stripped, &sheet.base_url, fetcher).await);
        flattened
    }
    .boxed()
}

/// A style contribution found while walking the source document.
enum SheetSource {
    /// `<link rel="stylesheet" href>`.
    Linked(String),
    /// `<style>` element text.
    Inline(String),
}

/// Resolve all style text of a document: every linked sheet and every
/// inline style element, in document order, each resolved independently.
/// Blank contributions are filtered out; the rest is concatenated.
pub async fn collect_document_styles(
    html: &str,
    base_url: &str,
    fetcher: &dyn ResourceFetcher,
    max_depth: usize,
) -> String {
    // Extract synchronously so the parsed document never crosses an await.
    let sources: Vec<SheetSource> = {
        let document = scraper::Html::parse_document(html);
        let selector = scraper::Selector::parse("link[rel], style")
            .expect("BUG: hardcoded style source selector is invalid");

        document
            .select(&selector)
            .filter_map(|element| {
                if element.value().name() == "link" {
                    // rel is a space-separated, case-insensitive token list.
                    let is_stylesheet = element.value().attr("rel").is_some_and(|rel| {
                        rel.split_whitespace()
                            .any(|word| word.eq_ignore_ascii_case("stylesheet"))
                    });
                    if !is_stylesheet {
                        return None;
                    }
                    element
                        .value()
                        .attr("href")
                        .map(|href| SheetSource::Linked(href.to_string()))
                } else {
                    Some(SheetSource::Inline(element.text().collect::<String>()))
                }
            })
            .collect()
    };

    let tasks = sources.into_iter().map(|source| async move {
        match source {
            SheetSource::Linked(href) => {
                // Linked sheet rules are read out-of-band by fetching the
                // sheet's own URL; an unreadable sheet contributes nothing.
                let Some(text) = fetcher.fetch_text(&href, base_url).await else {
                    log::debug!("linked sheet unavailable: {href}");
                    return String::new();
                };
                let sheet_base =
                    resolve_url(base_url, &href).unwrap_or_else(|_| base_url.to_string());
                resolve_stylesheet(
                    StyleSheetNode {
                        base_url: sheet_base,
                        text,
                    },
                    0,
                    fetcher,
                    max_depth,
                )
                .await
            }
            SheetSource::Inline(text) => {
                resolve_stylesheet(
                    StyleSheetNode {
                        base_url: base_url.to_string(),
                        text,
                    },
                    0,
                    fetcher,
                    max_depth,
                )
                .await
            }
        }
    });

    let parts = join_all(tasks).await;
    parts
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_all_three_quoting_styles() {
        let css = r#"
            a { background: url("https://x/a.png"); }
            b { background: url('https://x/b.png'); }
            c { background: url(https://x/c.png); }
        "#;
        let urls = extract_css_urls(css);
        assert_eq!(
            urls,
            vec!["https://x/a.png", "https://x/b.png", "https://x/c.png"]
        );
    }

    #[test]
    fn skips_inline_and_fragment_references() {
        let css = r#"
            a { background: url(data:image/png;base64,AAAA); }
            b { fill: url(#gradient); }
            c { background: url(""); }
        "#;
        assert!(extract_css_urls(css).is_empty());
    }

    #[test]
    fn deduplicates_repeated_references() {
        let css = r#"
            a { background: url(x.png); }
            b { background: url('x.png'); }
            c { background: url("x.png"); }
        "#;
        assert_eq!(extract_css_urls(css), vec!["x.png"]);
    }

    #[test]
    fn import_statements_are_matched_in_both_forms() {
        let css = r#"
            @import url("reset.css");
            @import 'layout.css' screen;
            @import url(theme.css);
            body { color: red; }
        "#;
        let mut targets = Vec::new();
        for caps in CSS_IMPORT_RE.captures_iter(css) {
            targets.push(captured_target(&caps).unwrap());
        }
        assert_eq!(targets, vec!["reset.css", "layout.css", "theme.css"]);
    }
}
