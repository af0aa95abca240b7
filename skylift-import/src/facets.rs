//! Link expansion and rich-text facets.
//!
//! All offsets are UTF-8 byte offsets into the final text.
use regex::Regex;
use skylift_common::{Facet, FacetKind, UrlEntity};
use std::ops::Range;
use std::sync::LazyLock;

/// Post text after link expansion, with its facets sorted by start offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedText {
    pub text: String,
    pub facets: Vec<Facet>,
}

/// Expand short links and annotate links and hashtags.
///
/// ```
/// use skylift_common::UrlEntity;
/// use skylift_import::render_text;
///
/// let urls = [UrlEntity {
///     short_url: "http://t.co/abc".into(),
///     expanded_url: "http://example.com/page".into(),
/// }];
/// let out = render_text("check http://t.co/abc out", &urls, &[]);
/// assert_eq!(out.text, "check http://example.com/page out");
/// assert_eq!(out.facets[0].slice(&out.text), Some("http://example.com/page"));
/// ```
pub fn render_text(text: &str, urls: &[UrlEntity], hashtags: &[String]) -> RenderedText {
    let (text, links) = expand_links(text, urls);

    let mut facets: Vec<Facet> = links
        .into_iter()
        .map(|(range, uri)| Facet::new(range.start, range.end, FacetKind::Link { uri }))
        .collect();

    let tags: Vec<Facet> = hashtag_spans(&text, hashtags)
        .into_iter()
        .filter(|tag| !facets.iter().any(|link| link.overlaps(&tag.range())))
        .collect();
    facets.extend(tags);
    facets.sort_by_key(|f| f.start);

    RenderedText { text, facets }
}

/// Replace each entity's short form with its expansion, entity by entity.
///
/// Text produced by an earlier expansion is never matched again.
fn expand_links(text: &str, urls: &[UrlEntity]) -> (String, Vec<(Range<usize>, String)>) {
    let mut out = text.to_string();
    let mut links: Vec<(Range<usize>, String)> = Vec::new();

    for entity in urls {
        let short = entity.short_url.as_str();
        let expanded = entity.expanded_url.as_str();
        if short.is_empty() || expanded.is_empty() {
            continue;
        }

        let mut pos = 0;
        while let Some(found) = out[pos..].find(short) {
            let start = pos + found;
            let end = start + short.len();

            if let Some((taken, _)) = links.iter().find(|(r, _)| r.start < end && start < r.end) {
                pos = taken.end;
                continue;
            }

            out.replace_range(start..end, expanded);
            for (range, _) in links.iter_mut().filter(|(r, _)| r.start >= end) {
                range.start = range.start - short.len() + expanded.len();
                range.end = range.end - short.len() + expanded.len();
            }
            links.push((start..start + expanded.len(), expanded.to_string()));
            pos = start + expanded.len();
        }
    }

    (out, links)
}

// A `#` only opens a tag after a non-word character, so `c#sharp` and
// entities like `&#39;` are not tags.
static HASHTAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w&])([#＃](\w+))").expect("hashtag pattern is valid")
});

/// `#tag` spans in `text` whose tag is one the archive recorded.
fn hashtag_spans(text: &str, hashtags: &[String]) -> Vec<Facet> {
    if hashtags.is_empty() {
        return Vec::new();
    }
    let wanted: Vec<String> = hashtags.iter().map(|h| h.to_lowercase()).collect();

    HASHTAG
        .captures_iter(text)
        .filter_map(|caps| {
            let span = caps.get(1)?;
            let tag = caps.get(2)?.as_str();
            wanted.contains(&tag.to_lowercase()).then(|| {
                Facet::new(
                    span.start(),
                    span.end(),
                    FacetKind::Hashtag {
                        tag: tag.to_string(),
                    },
                )
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(short: &str, expanded: &str) -> UrlEntity {
        UrlEntity {
            short_url: short.into(),
            expanded_url: expanded.into(),
        }
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_entities_means_no_facets() {
        let out = render_text("just words #unrecorded", &[], &[]);
        assert_eq!(out.text, "just words #unrecorded");
        assert!(out.facets.is_empty());
    }

    #[test]
    fn multibyte_prefix_uses_byte_offsets() {
        let urls = [url("https://t.co/x", "https://example.org/ü")];
        let out = render_text("héllo 🌍 https://t.co/x!", &urls, &[]);
        assert_eq!(out.text, "héllo 🌍 https://example.org/ü!");
        let link = &out.facets[0];
        assert_eq!(link.slice(&out.text), Some("https://example.org/ü"));
        assert_eq!(link.start, "héllo 🌍 ".len());
    }

    #[test]
    fn every_occurrence_is_expanded() {
        let urls = [url("t.co/a", "example.com/a")];
        let out = render_text("t.co/a and t.co/a", &urls, &[]);
        assert_eq!(out.text, "example.com/a and example.com/a");
        assert_eq!(out.facets.len(), 2);
        for f in &out.facets {
            assert_eq!(f.slice(&out.text), Some("example.com/a"));
        }
    }

    #[test]
    fn expansions_are_not_rescanned() {
        // the first expansion contains the second entity's short form
        let urls = [
            url("https://t.co/1", "https://t.co/2/landing"),
            url("https://t.co/2", "https://example.com/two"),
        ];
        let out = render_text("a https://t.co/1 b https://t.co/2", &urls, &[]);
        assert_eq!(out.text, "a https://t.co/2/landing b https://example.com/two");
        let slices: Vec<_> = out.facets.iter().map(|f| f.slice(&out.text).unwrap()).collect();
        assert_eq!(slices, ["https://t.co/2/landing", "https://example.com/two"]);
    }

    #[test]
    fn earlier_spans_shift_when_later_entities_grow_text_before_them() {
        let urls = [url("t.co/b", "example.com/bbbb"), url("t.co/a", "example.com/aaaaaaaa")];
        let out = render_text("t.co/a then t.co/b", &urls, &[]);
        assert_eq!(out.text, "example.com/aaaaaaaa then example.com/bbbb");
        let slices: Vec<_> = out.facets.iter().map(|f| f.slice(&out.text).unwrap()).collect();
        assert_eq!(slices, ["example.com/aaaaaaaa", "example.com/bbbb"]);
    }

    #[test]
    fn recorded_hashtags_become_tag_facets() {
        let out = render_text("Loving #Rust and #go, not c#sharp", &[], &tags(&["rust", "sharp"]));
        assert_eq!(out.facets.len(), 1);
        assert_eq!(out.facets[0].slice(&out.text), Some("#Rust"));
        assert_eq!(
            out.facets[0].kind,
            FacetKind::Hashtag {
                tag: "Rust".into()
            }
        );
    }

    #[test]
    fn link_wins_over_overlapping_hashtag() {
        let urls = [url("https://t.co/z", "https://example.com/#frag")];
        let out = render_text("see https://t.co/z #frag", &urls, &tags(&["frag"]));
        assert_eq!(out.facets.len(), 2);
        assert!(matches!(out.facets[0].kind, FacetKind::Link { .. }));
        assert_eq!(out.facets[1].slice(&out.text), Some("#frag"));
        assert!(out.facets[1].start > out.facets[0].end);
    }

    #[test]
    fn hashtag_inside_a_link_is_dropped() {
        let urls = [url("https://t.co/z", "https://example.com/#frag")];
        let out = render_text("see https://t.co/z", &urls, &tags(&["frag"]));
        assert_eq!(out.facets.len(), 1);
        assert_eq!(
            out.facets[0].kind,
            FacetKind::Link {
                uri: "https://example.com/#frag".into()
            }
        );
        for pair in out.facets.windows(2) {
            assert!(!pair[0].overlaps(&pair[1].range()));
        }
    }

    #[test]
    fn adjacent_and_fullwidth_hashtags_are_found() {
        let out = render_text("#one,#two ＃three &#39;", &[], &tags(&["one", "two", "three", "39"]));
        let slices: Vec<_> = out.facets.iter().map(|f| f.slice(&out.text).unwrap()).collect();
        assert_eq!(slices, ["#one", "#two", "＃three"]);
    }
}
