//! Record model for archived posts and the rich-text facets built from them.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Timestamp layout used by the source archive, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
pub const ARCHIVE_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Parse a timestamp in the archive's fixed layout into a UTC instant.
///
/// ```
/// use skylift_common::model::parse_archive_timestamp;
///
/// let ts = parse_archive_timestamp("Wed Oct 10 20:19:24 +0000 2018").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2018-10-10T20:19:24+00:00");
/// ```
pub fn parse_archive_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_str(raw.trim(), ARCHIVE_DATE_FORMAT).map(|dt| dt.with_timezone(&Utc))
}

/// A single post from the source archive.
///
/// Ids are decimal strings assigned monotonically by the source network, so
/// comparing them numerically (see [`ArchivedPost::id_cmp`]) gives
/// chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedPost {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    #[serde(default)]
    pub in_reply_to_id: Option<String>,
    #[serde(default)]
    pub in_reply_to_handle: Option<String>,
    #[serde(default)]
    pub is_sensitive: bool,
    #[serde(default)]
    pub urls: Vec<UrlEntity>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub media: Vec<MediaItem>,
}

impl ArchivedPost {
    /// True when the post replies to something (in or out of the archive).
    pub fn is_reply(&self) -> bool {
        self.in_reply_to_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }

    /// Reply target id, ignoring blank values the archive sometimes carries.
    pub fn reply_target(&self) -> Option<&str> {
        self.in_reply_to_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Numeric comparison of two post ids without parsing them into integers.
    ///
    /// ```
    /// use skylift_common::ArchivedPost;
    /// use std::cmp::Ordering;
    ///
    /// assert_eq!(ArchivedPost::id_cmp("99", "100"), Ordering::Less);
    /// assert_eq!(ArchivedPost::id_cmp("0100", "100"), Ordering::Equal);
    /// ```
    pub fn id_cmp(a: &str, b: &str) -> std::cmp::Ordering {
        let a = a.trim().trim_start_matches('0');
        let b = b.trim().trim_start_matches('0');
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }
}

/// A shortened link recorded by the archive alongside its expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlEntity {
    pub short_url: String,
    pub expanded_url: String,
}

/// An attached image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Where the image bytes can be fetched from.
    pub source_url: String,
    /// Human-facing form shown in the original post (`pic.twitter.com/...`).
    pub display_url: String,
    /// Short link the source network appended to the post text for this image.
    #[serde(default)]
    pub short_url: Option<String>,
}

/// What a facet annotates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FacetKind {
    Link { uri: String },
    Hashtag { tag: String },
    Mention { did: String },
}

/// A byte-indexed span over the final post text.
///
/// `start` is inclusive, `end` exclusive; both are UTF-8 byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub start: usize,
    pub end: usize,
    pub kind: FacetKind,
}

impl Facet {
    pub fn new(start: usize, end: usize, kind: FacetKind) -> Self {
        Self { start, end, kind }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The annotated text, or `None` if the span is out of bounds or splits a character.
    pub fn slice<'t>(&self, text: &'t str) -> Option<&'t str> {
        text.get(self.range())
    }

    pub fn overlaps(&self, other: &Range<usize>) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn id_cmp_orders_numerically() {
        assert_eq!(
            ArchivedPost::id_cmp("1000000000000000000", "999999999999999999"),
            Ordering::Greater
        );
        assert_eq!(ArchivedPost::id_cmp("12", "12"), Ordering::Equal);
        assert_eq!(ArchivedPost::id_cmp("12", "21"), Ordering::Less);
    }

    #[test]
    fn parses_archive_timestamp_with_offset() {
        let ts = parse_archive_timestamp("Mon Jan 02 03:04:05 +0200 2023").unwrap();
        assert_eq!(ts.to_rfc3339(), "2023-01-02T01:04:05+00:00");
        assert!(parse_archive_timestamp("2023-01-02").is_err());
    }

    #[test]
    fn facet_overlap_is_half_open() {
        let f = Facet::new(2, 5, FacetKind::Hashtag { tag: "x".into() });
        assert!(f.overlaps(&(4..8)));
        assert!(!f.overlaps(&(5..8)));
        assert!(!f.overlaps(&(0..2)));
    }

    #[test]
    fn blank_reply_id_is_not_a_reply() {
        let post = ArchivedPost {
            id: "1".into(),
            created_at: Utc::now(),
            text: "hi".into(),
            in_reply_to_id: Some("  ".into()),
            in_reply_to_handle: None,
            is_sensitive: false,
            urls: vec![],
            hashtags: vec![],
            media: vec![],
        };
        assert!(!post.is_reply());
        assert_eq!(post.reply_target(), None);
    }
}
