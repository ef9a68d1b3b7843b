//! Filtering and ranking of discovered icons.
//!
//! Every function here is pure: no network, no shared state. Callers run
//! them repeatedly on one discovery result for different preferences.

use std::cmp::Ordering;

use crate::models::{Icon, IconFormat};
use crate::size_range::SizeRange;

/// Formats kept when the caller does not ask for specific ones.
pub const DEFAULT_FORMATS: [IconFormat; 4] =
    [IconFormat::Gif, IconFormat::Ico, IconFormat::Jpg, IconFormat::Png];

/// Drops degenerate icons such as 1x1 tracking pixels.
#[must_use]
pub fn reject_broken_icons(icons: Vec<Icon>) -> Vec<Icon> {
    icons
        .into_iter()
        .filter(|icon| icon.width > 1 && icon.height > 1)
        .collect()
}

/// Keeps only icons in `allowed`.
#[must_use]
pub fn discard_unwanted_formats(icons: &[Icon], allowed: &[IconFormat]) -> Vec<Icon> {
    icons
        .iter()
        .filter(|icon| allowed.contains(&icon.format))
        .cloned()
        .collect()
}

/// Orders by width, height and byte size, then by URL.
fn compare_icons(a: &Icon, b: &Icon, descending: bool) -> Ordering {
    let size = (a.width, a.height, a.bytes).cmp(&(b.width, b.height, b.bytes));
    let size = if descending { size.reverse() } else { size };
    size.then_with(|| a.url.cmp(&b.url))
}

/// Sorts by size; the URL tie-break is always ascending.
pub fn sort_icons(icons: &mut [Icon], descending: bool) {
    icons.sort_by(|a, b| compare_icons(a, b, descending));
}

/// The largest icon, or `None` for an empty list.
#[must_use]
pub fn best_icon(icons: &[Icon]) -> Option<&Icon> {
    icons.iter().min_by(|a, b| compare_icons(a, b, true))
}

/// Picks the icon that best fits `range`.
///
/// 1. Any SVG wins outright.
/// 2. Otherwise the smallest icon within `perfect..=max`.
/// 3. Otherwise the largest icon within `min..=perfect`.
/// 4. Otherwise `None`, which callers treat as "use a fallback".
#[must_use]
pub fn icon_in_size_range(icons: &[Icon], range: SizeRange) -> Option<Icon> {
    if let Some(svg) = icons.iter().find(|icon| icon.format == IconFormat::Svg) {
        return Some(svg.clone());
    }

    let mut sorted = icons.to_vec();

    sort_icons(&mut sorted, false);
    if let Some(icon) = sorted
        .iter()
        .find(|icon| SizeRange::fits(icon.width, icon.height, range.perfect, range.max))
    {
        return Some(icon.clone());
    }

    sort_icons(&mut sorted, true);
    sorted
        .into_iter()
        .find(|icon| SizeRange::fits(icon.width, icon.height, range.min, range.perfect))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::size_range::DEFAULT_MAX_ICON_SIZE;
    use pretty_assertions::assert_eq;

    fn icon(url: &str, format: IconFormat, size: u32, bytes: usize) -> Icon {
        Icon::new(url, format, size, size).with_body_info(bytes, "")
    }

    fn range(s: &str) -> SizeRange {
        SizeRange::parse(s, DEFAULT_MAX_ICON_SIZE).unwrap()
    }

    fn icons() -> Vec<Icon> {
        vec![
            icon("http://a.com/16.ico", IconFormat::Ico, 16, 100),
            icon("http://a.com/32.png", IconFormat::Png, 32, 200),
            icon("http://a.com/57.png", IconFormat::Png, 57, 300),
            icon("http://a.com/144.png", IconFormat::Png, 144, 400),
        ]
    }

    #[test]
    fn test_reject_broken_icons() {
        let input = vec![
            icon("http://a.com/pixel.gif", IconFormat::Gif, 1, 43),
            Icon::new("http://a.com/wide.png", IconFormat::Png, 64, 1),
            Icon::new("http://a.com/zero.png", IconFormat::Png, 0, 0),
            icon("http://a.com/ok.png", IconFormat::Png, 2, 70),
        ];
        let kept = reject_broken_icons(input);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "http://a.com/ok.png");
    }

    #[test]
    fn test_reject_broken_icons_is_idempotent() {
        let mut input = icons();
        input.push(icon("http://a.com/pixel.gif", IconFormat::Gif, 1, 43));
        let once = reject_broken_icons(input);
        let twice = reject_broken_icons(once.clone());
        assert_eq!(once, twice);
        assert!(twice.iter().all(|i| i.width > 1 && i.height > 1));
    }

    #[test]
    fn test_discard_unwanted_formats() {
        let mut input = icons();
        input.push(icon("http://a.com/logo.svg", IconFormat::Svg, 9999, 500));

        let kept = discard_unwanted_formats(&input, &DEFAULT_FORMATS);
        assert_eq!(kept.len(), 4);
        assert!(kept.iter().all(|i| i.format != IconFormat::Svg));

        let png_only = discard_unwanted_formats(&input, &[IconFormat::Png]);
        assert_eq!(png_only.len(), 3);

        let with_svg = discard_unwanted_formats(&input, &[IconFormat::Svg]);
        assert_eq!(with_svg.len(), 1);
    }

    #[test]
    fn test_sort_icons_descending_tie_breaks() {
        let mut input = vec![
            icon("http://www.ard.de/favicon.ico", IconFormat::Ico, 144, 116_094),
            icon("http://www.ard.de/apple-touch-icon.png", IconFormat::Png, 144, 29_228),
            icon("http://www.ard.de/ARD-144.png", IconFormat::Png, 144, 29_228),
            icon("http://www.ard.de/small.png", IconFormat::Png, 16, 90_000),
        ];
        sort_icons(&mut input, true);
        let urls: Vec<&str> = input.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "http://www.ard.de/favicon.ico",
                "http://www.ard.de/ARD-144.png",
                "http://www.ard.de/apple-touch-icon.png",
                "http://www.ard.de/small.png",
            ]
        );
        assert_eq!(best_icon(&input).unwrap().url, "http://www.ard.de/favicon.ico");
    }

    #[test]
    fn test_sort_icons_ascending() {
        let mut input = icons();
        input.reverse();
        sort_icons(&mut input, false);
        let sizes: Vec<u32> = input.iter().map(|i| i.width).collect();
        assert_eq!(sizes, vec![16, 32, 57, 144]);
    }

    #[test]
    fn test_best_icon_empty() {
        assert!(best_icon(&[]).is_none());
    }

    #[test]
    fn test_svg_always_wins() {
        let mut input = icons();
        input.push(icon("http://a.com/logo.svg", IconFormat::Svg, 9999, 500));
        for r in ["16", "0..0..0", "120", "500", "16..32..64"] {
            let found = icon_in_size_range(&input, range(r)).unwrap();
            assert_eq!(found.format, IconFormat::Svg, "range {r}");
        }
    }

    #[test]
    fn test_smallest_at_least_perfect() {
        let found = icon_in_size_range(&icons(), range("50")).unwrap();
        assert_eq!(found.width, 57);

        let found = icon_in_size_range(&icons(), range("32")).unwrap();
        assert_eq!(found.width, 32);
    }

    #[test]
    fn test_falls_back_to_largest_below_perfect() {
        let found = icon_in_size_range(&icons(), range("120..200..500")).unwrap();
        assert_eq!(found.width, 144);

        let found = icon_in_size_range(&icons(), range("16..100..120")).unwrap();
        assert_eq!(found.width, 57);
    }

    #[test]
    fn test_oversized_icons_are_skipped() {
        let found = icon_in_size_range(&icons(), range("0..60..100")).unwrap();
        assert_eq!(found.width, 57);
    }

    #[test]
    fn test_no_match() {
        assert!(icon_in_size_range(&icons(), range("200..300..400")).is_none());
        assert!(icon_in_size_range(&[], range("16")).is_none());
    }

    #[test]
    fn test_non_square_icons_need_both_dimensions() {
        let input = vec![Icon::new("http://a.com/banner.png", IconFormat::Png, 120, 40)];
        assert!(icon_in_size_range(&input, range("64")).is_none());
        assert_eq!(icon_in_size_range(&input, range("0..120..120")).unwrap().width, 120);
    }
}
