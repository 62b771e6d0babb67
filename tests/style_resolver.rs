//! Style resolution against an in-memory fetcher: rewriting, degradation,
//! deduplication, and import flattening.

mod common;

use common::FakeFetcher;
use pagestash::style::{collect_document_styles, resolve_stylesheet, resolve_urls, StyleSheetNode};

const BASE: &str = "https://site.test/css/main.css";

#[tokio::test]
async fn css_without_references_is_returned_unchanged() {
    let fetcher = FakeFetcher::new();
    let css = "body { color: red; margin: 0; }";

    let resolved = resolve_urls(css, BASE, &fetcher).await;
    assert_eq!(resolved, css);
    assert_eq!(fetcher.fetches(), 0);
}

#[tokio::test]
async fn failed_references_are_left_byte_identical() {
    let fetcher = FakeFetcher::new();
    let css = r#"a { background: url("missing.png"); } b { background: url(also-gone.gif); }"#;

    let resolved = resolve_urls(css, BASE, &fetcher).await;
    assert_eq!(resolved, css);
}

#[tokio::test]
async fn all_three_quoting_styles_are_rewritten() {
    let fetcher = FakeFetcher::new()
        .with_resource("https://site.test/css/a.png", "image/png", b"a".to_vec())
        .with_resource("https://site.test/css/b.png", "image/png", b"b".to_vec())
        .with_resource("https://site.test/css/c.png", "image/png", b"c".to_vec());
    let css = r#"
        a { background: url("a.png"); }
        b { background: url('b.png'); }
        c { background: url(c.png); }
    "#;

    let resolved = resolve_urls(css, BASE, &fetcher).await;
    assert!(!resolved.contains("a.png"));
    assert!(!resolved.contains("b.png"));
    assert!(!resolved.contains("c.png"));
    assert_eq!(resolved.matches(r#"url("data:image/png;base64,"#).count(), 3);
}

#[tokio::test]
async fn repeated_references_are_fetched_once() {
    let fetcher =
        FakeFetcher::new().with_resource("https://site.test/css/x.png", "image/png", b"x".to_vec());
    let css = r#"
        a { background: url(x.png); }
        b { background: url('x.png'); }
        c { background: url("x.png"); }
    "#;

    let resolved = resolve_urls(css, BASE, &fetcher).await;
    assert_eq!(fetcher.fetches(), 1);
    assert_eq!(resolved.matches("data:image/png;base64,").count(), 3);
}

#[tokio::test]
async fn imports_are_flattened_ahead_of_the_importing_sheet() {
    let fetcher = FakeFetcher::new()
        .with_text(
            "https://site.test/css/reset.css",
            "* { margin: 0; }",
        )
        .with_resource("https://site.test/css/bg.png", "image/png", b"bg".to_vec());

    let sheet = StyleSheetNode {
        base_url: BASE.to_string(),
        text: r#"@import url("reset.css"); body { background: url(bg.png); }"#.to_string(),
    };
    let resolved = resolve_stylesheet(sheet, 0, &fetcher, 5).await;

    let reset_at = resolved.find("margin: 0").expect("imported rules present");
    let body_at = resolved.find("body {").expect("own rules present");
    assert!(reset_at < body_at, "imported rules must precede own rules");
    assert!(!resolved.contains("@import"));
    assert!(resolved.contains("data:image/png;base64,"));
}

#[tokio::test]
async fn imported_sheet_references_resolve_against_its_own_url() {
    // theme.css lives under /skins/ and references a sibling image.
    let fetcher = FakeFetcher::new()
        .with_text(
            "https://site.test/skins/theme.css",
            "h1 { background: url(tile.png); }",
        )
        .with_resource(
            "https://site.test/skins/tile.png",
            "image/png",
            b"t".to_vec(),
        );

    let sheet = StyleSheetNode {
        base_url: BASE.to_string(),
        text: "@import url(../skins/theme.css);".to_string(),
    };
    let resolved = resolve_stylesheet(sheet, 0, &fetcher, 5).await;
    assert!(resolved.contains("data:image/png;base64,"));
    assert!(!resolved.contains("tile.png"));
}

#[tokio::test]
async fn cyclic_imports_terminate_at_the_depth_bound() {
    let fetcher = FakeFetcher::new()
        .with_text(
            "https://site.test/css/a.css",
            "@import url(b.css); .a { color: red; }",
        )
        .with_text(
            "https://site.test/css/b.css",
            "@import url(a.css); .b { color: blue; }",
        );

    let sheet = StyleSheetNode {
        base_url: BASE.to_string(),
        text: "@import url(a.css);".to_string(),
    };
    // Must return, and with both rule sets present at least once.
    let resolved = resolve_stylesheet(sheet, 0, &fetcher, 3).await;
    assert!(resolved.contains(".a { color: red; }"));
    assert!(resolved.contains(".b { color: blue; }"));
}

#[tokio::test]
async fn document_styles_combine_linked_and_inline_sheets() {
    let fetcher = FakeFetcher::new().with_text(
        "https://site.test/linked.css",
        ".linked { color: green; }",
    );
    let html = r#"
        <html><head>
            <link rel="stylesheet" href="/linked.css">
            <link rel="stylesheet" href="/unavailable.css">
            <style>.inline { color: black; }</style>
        </head><body></body></html>
    "#;

    let styles = collect_document_styles(html, "https://site.test/page", &fetcher, 5).await;
    assert!(styles.contains(".linked { color: green; }"));
    assert!(styles.contains(".inline { color: black; }"));
}

#[tokio::test]
async fn stylesheet_rel_matches_token_wise_and_case_insensitively() {
    let fetcher = FakeFetcher::new()
        .with_text("https://site.test/upper.css", ".upper { color: red; }")
        .with_text("https://site.test/multi.css", ".multi { color: blue; }");
    let html = r#"
        <html><head>
            <link rel="STYLESHEET" href="/upper.css">
            <link rel="alternate stylesheet" href="/multi.css">
            <link rel="icon" href="/favicon.ico">
        </head><body></body></html>
    "#;

    let styles = collect_document_styles(html, "https://site.test/page", &fetcher, 5).await;
    assert!(styles.contains(".upper { color: red; }"));
    assert!(styles.contains(".multi { color: blue; }"));
}
