//! Loader for the `tweets.js` file inside a Twitter/X data export.
//!
//! The export wraps its JSON array in a JavaScript assignment
//! (`window.YTD.tweets.part0 = [...]`). The loader slices from the first `[`,
//! deserialises the entries, and converts each into an [`ArchivedPost`].
use crate::twitter::types::{ArchiveEntry, Tweet};
use skylift_common::model::parse_archive_timestamp;
use skylift_common::{ArchivedPost, MediaItem, UrlEntity};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File names the export has used for the post list, newest first.
const ARCHIVE_FILES: [&str; 2] = ["tweets.js", "tweet.js"];

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed archive: {0}")]
    Malformed(String),
}

/// Resolve `path` to the post list file.
///
/// Accepts the file itself, the export root (`<root>/data/tweets.js`) or the
/// export's `data` directory.
pub fn resolve_archive_file(path: &Path) -> Result<PathBuf, ArchiveError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if path.is_dir() {
        for dir in [path.join("data"), path.to_path_buf()] {
            for name in ARCHIVE_FILES {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
    }
    Err(ArchiveError::NotFound(path.to_path_buf()))
}

/// Read and parse the archive at `path` (file or export directory).
pub fn load_archive(path: &Path) -> Result<Vec<ArchivedPost>, ArchiveError> {
    let file = resolve_archive_file(path)?;
    let raw = std::fs::read_to_string(&file).map_err(|source| ArchiveError::Io {
        path: file.clone(),
        source,
    })?;
    let posts = parse_archive(&raw)?;
    tracing::info!(path = %file.display(), posts = posts.len(), "archive.loaded");
    Ok(posts)
}

/// Parse the contents of `tweets.js`, wrapper and all.
pub fn parse_archive(raw: &str) -> Result<Vec<ArchivedPost>, ArchiveError> {
    let start = raw
        .find('[')
        .ok_or_else(|| ArchiveError::Malformed("no JSON array found".into()))?;
    let body = raw[start..].trim_end().trim_end_matches(';');
    let entries: Vec<ArchiveEntry> = serde_json::from_str(body).map_err(|e| {
        ArchiveError::Malformed(format!("line {} column {}: {e}", e.line(), e.column()))
    })?;

    entries
        .into_iter()
        .map(|entry| to_archived_post(entry.tweet))
        .collect()
}

fn to_archived_post(tweet: Tweet) -> Result<ArchivedPost, ArchiveError> {
    let id = tweet
        .id()
        .ok_or_else(|| ArchiveError::Malformed("tweet without id".into()))?
        .trim()
        .to_string();
    let created_at = parse_archive_timestamp(&tweet.created_at).map_err(|e| {
        ArchiveError::Malformed(format!(
            "tweet {id}: bad created_at {:?}: {e}",
            tweet.created_at
        ))
    })?;

    let urls = tweet
        .entities
        .urls
        .iter()
        .filter_map(|u| {
            let expanded = u.expanded_url.as_deref().filter(|s| !s.is_empty())?;
            Some(UrlEntity {
                short_url: u.url.clone(),
                expanded_url: expanded.to_string(),
            })
        })
        .collect();

    let hashtags = tweet
        .entities
        .hashtags
        .iter()
        .map(|h| h.text.clone())
        .collect();

    let media = tweet
        .extended_entities
        .as_ref()
        .map(|ext| ext.media.as_slice())
        .unwrap_or_default()
        .iter()
        .filter(|m| m.kind.as_deref().is_none_or(|k| k == "photo"))
        .filter_map(|m| {
            let source = m.media_url_https.as_ref().or(m.media_url.as_ref())?;
            Some(MediaItem {
                source_url: source.clone(),
                display_url: m.display_url.clone().unwrap_or_default(),
                short_url: m.url.clone(),
            })
        })
        .collect();

    Ok(ArchivedPost {
        id,
        created_at,
        text: decode_entities(&tweet.full_text),
        in_reply_to_id: tweet.reply_to_id().map(|s| s.trim().to_string()),
        in_reply_to_handle: tweet.in_reply_to_screen_name.clone(),
        is_sensitive: tweet.possibly_sensitive.unwrap_or(false),
        urls,
        hashtags,
        media,
    })
}

/// The export HTML-escapes `&`, `<` and `>` in post text.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
