//! Document sanitization: strip executable content from a snapshot before
//! resources are inlined.
//!
//! Scripts are deliberately dropped; a stored snapshot is a static
//! document. Resource-hint and stylesheet links are removed too because the
//! aggregated resolved style text supersedes them.

use kuchiki::NodeRef;

/// `link` rel values that point at resources the inlined style block makes
/// redundant.
const STRIPPED_LINK_RELS: &[&str] = &[
    "stylesheet",
    "preload",
    "prefetch",
    "preconnect",
    "dns-prefetch",
    "modulepreload",
];

/// Attributes that can carry an executable URL.
const URL_ATTRS: &[&str] = &["href", "src", "action", "formaction"];

fn is_executable_url(value: &str) -> bool {
    value
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("javascript:")
}

/// Strip executable content and superseded link elements from the snapshot.
pub fn sanitize(snapshot: &NodeRef) {
    // Script and noscript elements go entirely.
    if let Ok(matches) = snapshot.select("script, noscript") {
        let nodes: Vec<_> = matches.collect();
        for node_ref in nodes {
            node_ref.as_node().detach();
        }
    }

    // Event handler attributes and executable URLs on every element.
    if let Ok(matches) = snapshot.select("*") {
        for node_ref in matches {
            let mut attrs = node_ref.attributes.borrow_mut();
            attrs.map.retain(|name, attr| {
                let local: &str = &name.local;
                if local.starts_with("on") {
                    return false;
                }
                if URL_ATTRS.contains(&local) && is_executable_url(&attr.value) {
                    return false;
                }
                true
            });
        }
    }

    // Resource-hint and stylesheet links, plus leftover style elements that
    // the injected aggregate block replaces.
    if let Ok(matches) = snapshot.select("link[rel]") {
        let nodes: Vec<_> = matches.collect();
        for node_ref in nodes {
            let stripped = {
                let attrs = node_ref.attributes.borrow();
                attrs
                    .get("rel")
                    .map(|rel| {
                        rel.split_whitespace()
                            .any(|word| STRIPPED_LINK_RELS.iter().any(|r| word.eq_ignore_ascii_case(r)))
                    })
                    .unwrap_or(false)
            };
            if stripped {
                node_ref.as_node().detach();
            }
        }
    }

    if let Ok(matches) = snapshot.select("style") {
        let nodes: Vec<_> = matches.collect();
        for node_ref in nodes {
            node_ref.as_node().detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchiki::traits::TendrilSink;

    fn parse(html: &str) -> NodeRef {
        kuchiki::parse_html().one(html.to_string())
    }

    fn serialize(node: &NodeRef) -> String {
        let mut out = Vec::new();
        node.serialize(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn scripts_and_noscript_are_removed() {
        let snapshot = parse(
            r#"<html><head><script>alert(1)</script></head>
               <body><noscript>enable js</noscript><p>kept</p></body></html>"#,
        );
        sanitize(&snapshot);
        let html = serialize(&snapshot);
        assert!(!html.contains("script"));
        assert!(!html.contains("enable js"));
        assert!(html.contains("<p>kept</p>"));
    }

    #[test]
    fn event_handlers_are_stripped() {
        let snapshot = parse(r#"<html><body><div onclick="evil()" onmouseover="x()" id="d"></div></body></html>"#);
        sanitize(&snapshot);
        let div = snapshot.select_first("div").unwrap();
        let attrs = div.attributes.borrow();
        assert_eq!(attrs.get("onclick"), None);
        assert_eq!(attrs.get("onmouseover"), None);
        assert_eq!(attrs.get("id"), Some("d"));
    }

    #[test]
    fn executable_urls_are_stripped() {
        let snapshot = parse(
            r#"<html><body>
                <a href=" JavaScript:evil()">x</a>
                <a href="https://example.com/">ok</a>
            </body></html>"#,
        );
        sanitize(&snapshot);
        let links: Vec<_> = snapshot.select("a").unwrap().collect();
        assert_eq!(links[0].attributes.borrow().get("href"), None);
        assert_eq!(
            links[1].attributes.borrow().get("href"),
            Some("https://example.com/")
        );
    }

    #[test]
    fn hint_links_and_styles_are_removed() {
        let snapshot = parse(
            r#"<html><head>
                <link rel="stylesheet" href="a.css">
                <link rel="preload" href="b.woff2" as="font">
                <link rel="canonical" href="https://example.com/">
                <style>body{}</style>
            </head><body></body></html>"#,
        );
        sanitize(&snapshot);
        let html = serialize(&snapshot);
        assert!(!html.contains("stylesheet"));
        assert!(!html.contains("preload"));
        assert!(!html.contains("<style>"));
        assert!(html.contains("canonical"));
    }
}
