//! Icon link extraction from HTML.
//!
//! This module provides:
//! - Best-effort HTML parsing
//! - Base URL detection via `<head><base href>`
//! - Detection of icon `<link>` elements
//! - Candidate assembly with well-known fallback paths

pub mod candidates;

use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

use crate::errors::IconfinderError;

pub use candidates::{absolute_url, assemble_candidates, default_icon_urls, ICON_PATHS};

/// `rel` tokens that mark an icon link.
pub const ICON_REL_TOKENS: [&str; 3] = ["icon", "apple-touch-icon", "apple-touch-icon-precomposed"];

fn selector(css: &'static str, cell: &'static OnceLock<Selector>) -> &'static Selector {
    cell.get_or_init(|| {
        Selector::parse(css).unwrap_or_else(|e| unreachable!("invalid selector {css}: {e:?}"))
    })
}

fn link_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    selector("link[href][rel]", &SEL)
}

fn base_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    selector("head base[href]", &SEL)
}

/// Deepest element nesting a document may have.
pub const MAX_NESTING_DEPTH: usize = 512;

/// Parses an HTML document, recovering from malformed markup.
///
/// NUL characters are replaced with U+FFFD, so binary bodies parse as text
/// without links. Only documents nesting elements deeper than
/// [`MAX_NESTING_DEPTH`] are rejected with
/// [`IconfinderError::UnparsableDocument`].
pub fn parse_document(html: &str) -> Result<Html, IconfinderError> {
    let doc = if html.contains('\0') {
        Html::parse_document(&html.replace('\0', "\u{FFFD}"))
    } else {
        Html::parse_document(html)
    };
    if nesting_depth(&doc) > MAX_NESTING_DEPTH {
        return Err(IconfinderError::UnparsableDocument);
    }
    Ok(doc)
}

fn nesting_depth(doc: &Html) -> usize {
    let mut deepest = 0;
    let mut stack = vec![(doc.tree.root(), 0)];
    while let Some((node, depth)) = stack.pop() {
        let depth = if node.value().is_element() { depth + 1 } else { depth };
        deepest = deepest.max(depth);
        stack.extend(node.children().map(|child| (child, depth)));
    }
    deepest
}

/// Returns the URL that relative links resolve against.
///
/// A `<base href>` in `<head>` overrides the page URL when it parses.
#[must_use]
pub fn determine_base_url(site_url: &Url, doc: &Html) -> Url {
    let href = doc
        .select(base_selector())
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty());

    match href {
        Some(href) => match Url::parse(href) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                site_url.join(href).unwrap_or_else(|_| site_url.clone())
            }
            Err(_) => site_url.clone(),
        },
        None => site_url.clone(),
    }
}

/// Whether a `rel` attribute value names an icon.
///
/// Matching is case-insensitive on whole whitespace-separated tokens, so
/// `SHORTCUT ICON` qualifies and `mask-icon` does not.
#[must_use]
pub fn is_icon_rel(rel: &str) -> bool {
    rel.split_whitespace()
        .any(|token| ICON_REL_TOKENS.iter().any(|t| token.eq_ignore_ascii_case(t)))
}

/// Returns the raw `href` of every icon `<link>`, in document order.
#[must_use]
pub fn extract_icon_hrefs(doc: &Html) -> Vec<String> {
    doc.select(link_selector())
        .filter_map(|el| {
            let attrs = el.value();
            let rel = attrs.attr("rel")?;
            if !is_icon_rel(rel) {
                return None;
            }
            let href = attrs.attr("href")?.trim();
            (!href.is_empty()).then(|| href.to_string())
        })
        .collect()
}

/// Finds all icon candidates for a page.
///
/// Returns the well-known paths plus every icon link in `html`, resolved
/// against the effective base URL, de-duplicated and sorted.
pub fn find_icon_links(site_url: &Url, html: &str) -> Result<Vec<String>, IconfinderError> {
    let doc = parse_document(html)?;
    let base_url = determine_base_url(site_url, &doc);
    let hrefs = extract_icon_hrefs(&doc);
    tracing::debug!(
        site_url = %site_url,
        base_url = %base_url,
        links = hrefs.len(),
        "Extracted icon links"
    );
    Ok(assemble_candidates(&base_url, &hrefs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use pretty_assertions::assert_eq;

    fn hrefs(html: &str) -> Vec<String> {
        let mut links = extract_icon_hrefs(&parse_document(html).unwrap());
        links.sort();
        links
    }

    #[test]
    fn test_rejects_non_icon_links() {
        let invalid = [
            "<link rel='nope'>",
            "<link rel='icon'>",
            "<link rel='icon' href=''>",
            "<link rel='mask-icon' href='a.png'>",
            "<link rel='xxiconxx' href='a.png'>",
            "<link href='a.png'>",
        ];
        for html in invalid {
            assert!(hrefs(html).is_empty(), "{html} shouldn't contain links");
        }
    }

    #[test]
    fn test_rel_is_case_insensitive() {
        let valid = [
            "<link rel='icon' href='xx'>",
            "<link rel='shortcut icon' href='xx'>",
            "<link REL='Shortcut Icon' href='xx'>",
            "<link rel='SHORTCUT ICON' href='xx'>",
            "<link rel='apple-touch-icon' href='xx'>",
            "<link rel='apple-touch-icon-precomposed' href='xx'>",
            "<link rel='APPLE-TOUCH-ICON-PRECOMPOSED' href='xx'>",
        ];
        for html in valid {
            assert_eq!(hrefs(html), vec!["xx".to_string()], "{html} should contain one link");
        }
    }

    #[test]
    fn test_extracts_page_links() {
        assert_eq!(
            hrefs(fixtures::DARINGFIREBALL_HTML),
            vec!["/graphics/apple-touch-icon.png", "/graphics/favicon.ico?v=005"]
        );
        assert_eq!(
            hrefs(fixtures::NEWYORKER_HTML),
            vec![
                "/wp-content/assets/dist/img/icon/apple-touch-icon-114x114-precomposed.png",
                "/wp-content/assets/dist/img/icon/apple-touch-icon-144x144-precomposed.png",
                "/wp-content/assets/dist/img/icon/apple-touch-icon-57x57-precomposed.png",
                "/wp-content/assets/dist/img/icon/apple-touch-icon-precomposed.png",
                "/wp-content/assets/dist/img/icon/apple-touch-icon.png",
                "/wp-content/assets/dist/img/icon/favicon.ico",
            ]
        );
    }

    #[test]
    fn test_find_icon_links_adds_well_known_paths() {
        let site = Url::parse("http://daringfireball.net").unwrap();
        let links = find_icon_links(&site, fixtures::DARINGFIREBALL_HTML).unwrap();
        assert_eq!(
            links,
            vec![
                "http://daringfireball.net/apple-touch-icon-precomposed.png",
                "http://daringfireball.net/apple-touch-icon.png",
                "http://daringfireball.net/favicon.ico",
                "http://daringfireball.net/graphics/apple-touch-icon.png",
                "http://daringfireball.net/graphics/favicon.ico?v=005",
            ]
        );
    }

    #[test]
    fn test_find_icon_links_is_deterministic() {
        let site = Url::parse("http://www.newyorker.com/").unwrap();
        let first = find_icon_links(&site, fixtures::NEWYORKER_HTML).unwrap();
        for _ in 0..10 {
            assert_eq!(find_icon_links(&site, fixtures::NEWYORKER_HTML).unwrap(), first);
        }
        assert_eq!(first.len(), 9);
    }

    #[test]
    fn test_base_tag_overrides_site_url() {
        let site = Url::parse("http://aws.amazon.com/").unwrap();
        let html = r#"<html><head>
            <base href="http://a0.awsstatic.com/main/images/site/">
            <link rel="icon" href="favicon.ico">
            </head><body></body></html>"#;
        let links = find_icon_links(&site, html).unwrap();
        assert!(links.contains(&"http://a0.awsstatic.com/main/images/site/favicon.ico".to_string()));
        assert!(links.contains(&"http://a0.awsstatic.com/favicon.ico".to_string()));
        assert!(!links.iter().any(|l| l.starts_with("http://aws.amazon.com")));
    }

    #[test]
    fn test_relative_and_unparsable_base_tag() {
        let site = Url::parse("https://example.com/blog/post").unwrap();

        let doc = parse_document(r#"<head><base href="/static/"></head>"#).unwrap();
        assert_eq!(determine_base_url(&site, &doc).as_str(), "https://example.com/static/");

        let doc = parse_document(r#"<head><base href="http://[::1"></head>"#).unwrap();
        assert_eq!(determine_base_url(&site, &doc), site);

        let doc = parse_document("<head></head>").unwrap();
        assert_eq!(determine_base_url(&site, &doc), site);
    }

    #[test]
    fn test_malformed_markup_is_recovered() {
        let html = "<html><head><link rel=icon href=/a.png><div><link rel='apple-touch-icon' href='/b.png'";
        let links = hrefs(html);
        assert!(links.contains(&"/a.png".to_string()));
    }

    #[test]
    fn test_nul_bytes_do_not_abort_extraction() {
        let html = "<html><head>\0<link rel=\"icon\" href=\"/i\0.png\"></head><body>\0</body></html>";
        assert_eq!(hrefs(html), vec!["/i\u{FFFD}.png".to_string()]);

        let site = Url::parse("http://a.com/logo.png").unwrap();
        let body = String::from_utf8_lossy(&fixtures::png_bytes(16, 16)).into_owned();
        assert_eq!(
            find_icon_links(&site, &body).unwrap(),
            vec![
                "http://a.com/apple-touch-icon-precomposed.png",
                "http://a.com/apple-touch-icon.png",
                "http://a.com/favicon.ico",
            ]
        );
    }

    #[test]
    fn test_excessive_nesting_is_unparsable() {
        let shallow = fixtures::nested_divs(100);
        assert!(parse_document(&shallow).is_ok());

        let deep = fixtures::nested_divs(MAX_NESTING_DEPTH + 10);
        assert!(matches!(parse_document(&deep), Err(IconfinderError::UnparsableDocument)));
    }
}
