//! Candidate URL assembly.

use std::collections::BTreeSet;
use url::Url;

use crate::errors::IconfinderError;

/// Conventional icon locations tried for every site.
pub const ICON_PATHS: [&str; 3] = [
    "/favicon.ico",
    "/apple-touch-icon.png",
    "/apple-touch-icon-precomposed.png",
];

/// Resolves `href` against `base` using standard URL resolution.
///
/// Only `http` and `https` results are returned; `data:`, `javascript:` and
/// similar references cannot be fetched.
#[must_use]
pub fn absolute_url(base: &Url, href: &str) -> Option<String> {
    let url = base.join(href.trim()).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.into())
}

/// Merges the well-known paths and page links into a sorted, de-duplicated
/// candidate list.
///
/// The order is lexicographic so results and cache entries are stable; it
/// says nothing about priority.
#[must_use]
pub fn assemble_candidates<I, S>(base: &Url, hrefs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut links: BTreeSet<String> = ICON_PATHS
        .iter()
        .filter_map(|path| absolute_url(base, path))
        .collect();
    links.extend(hrefs.into_iter().filter_map(|href| absolute_url(base, href.as_ref())));
    links.into_iter().collect()
}

/// Candidates for a site whose page could not be fetched.
pub fn default_icon_urls(site_url: &str) -> Result<Vec<String>, IconfinderError> {
    let base = Url::parse(site_url).map_err(|e| {
        IconfinderError::invalid_url(format!("{site_url}: {e}"))
    })?;
    if base.cannot_be_a_base() || base.host_str().is_none() {
        return Err(IconfinderError::invalid_url(site_url));
    }
    Ok(assemble_candidates(&base, std::iter::empty::<&str>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_absolute_url() {
        let b = base("http://example.com/blog/post.html");
        assert_eq!(absolute_url(&b, "/favicon.ico").unwrap(), "http://example.com/favicon.ico");
        assert_eq!(absolute_url(&b, "icon.png").unwrap(), "http://example.com/blog/icon.png");
        assert_eq!(absolute_url(&b, "../img/icon.png").unwrap(), "http://example.com/img/icon.png");
        assert_eq!(absolute_url(&b, "//cdn.example.com/i.png").unwrap(), "http://cdn.example.com/i.png");
        assert_eq!(
            absolute_url(&b, "https://other.example.org/i.png?v=1").unwrap(),
            "https://other.example.org/i.png?v=1"
        );
        assert!(absolute_url(&b, "data:image/png;base64,AAAA").is_none());
    }

    #[test]
    fn test_assemble_candidates_dedups_and_sorts() {
        let b = base("http://example.com");
        let links = assemble_candidates(
            &b,
            ["/graphics/favicon.ico?v=005", "/graphics/apple-touch-icon.png", "/favicon.ico"],
        );
        assert_eq!(
            links,
            vec![
                "http://example.com/apple-touch-icon-precomposed.png",
                "http://example.com/apple-touch-icon.png",
                "http://example.com/favicon.ico",
                "http://example.com/graphics/apple-touch-icon.png",
                "http://example.com/graphics/favicon.ico?v=005",
            ]
        );
    }

    #[test]
    fn test_well_known_paths_ignore_base_query() {
        let b = base("https://example.com/some/page?lang=en#top");
        let links = assemble_candidates(&b, Vec::<String>::new());
        assert_eq!(
            links,
            vec![
                "https://example.com/apple-touch-icon-precomposed.png",
                "https://example.com/apple-touch-icon.png",
                "https://example.com/favicon.ico",
            ]
        );
    }

    #[test]
    fn test_default_icon_urls() {
        let links = default_icon_urls("http://foobar.com").unwrap();
        assert_eq!(links.len(), 3);
        assert!(links.contains(&"http://foobar.com/favicon.ico".to_string()));

        assert!(matches!(default_icon_urls("not a url"), Err(IconfinderError::InvalidUrl(_))));
        assert!(matches!(default_icon_urls("mailto:me@example.com"), Err(IconfinderError::InvalidUrl(_))));
    }
}
