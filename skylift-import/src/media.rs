use async_trait::async_trait;
use skylift_common::MediaItem;
use skylift_http::{HttpClient, RequestOpts};
use thiserror::Error;

/// Content type declared for every uploaded image.
pub const IMAGE_CONTENT_TYPE: &str = "image/png";

/// Largest image the destination accepts in an images embed.
pub const MAX_IMAGE_BYTES: usize = 1_000_000;

#[derive(Debug, Error)]
#[error("failed to fetch {url}: {reason}")]
pub struct MediaFetchError {
    pub url: String,
    pub reason: String,
}

/// Fetches the bytes of an archived image.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaFetchError>;
}

#[async_trait]
impl MediaFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaFetchError> {
        self.get_bytes(
            url,
            RequestOpts {
                allow_absolute: true,
                retries: Some(1),
                max_body_bytes: Some(MAX_IMAGE_BYTES),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| MediaFetchError {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Remove the short links the source appended for attached media.
pub fn strip_media_links(text: &str, media: &[MediaItem]) -> String {
    let mut out = text.to_string();
    for short in media.iter().filter_map(|m| m.short_url.as_deref()) {
        if !short.is_empty() {
            out = out.replace(short, "");
        }
    }
    out.truncate(out.trim_end().len());
    out
}
