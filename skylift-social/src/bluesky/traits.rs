use crate::bluesky::types::{BlobRef, PostDraft, PostRef, Session};
use async_trait::async_trait;

#[derive(thiserror::Error, Debug)]
pub enum DestinationError {
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The destination asked us to slow down. Only this kind triggers a cooldown.
    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("service error: {0}")]
    Service(String),
}

impl DestinationError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DestinationError::RateLimited { .. })
    }
}

#[async_trait]
pub trait Destination: Send + Sync {
    /// Open a session; later calls act on behalf of the returned account.
    async fn authenticate(&self, identifier: &str, secret: &str)
    -> Result<Session, DestinationError>;

    /// Upload raw bytes and return a reference that can be embedded in a post.
    async fn upload_blob(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<BlobRef, DestinationError>;

    /// Create a post and return a strong reference to it.
    async fn create_post(&self, draft: &PostDraft) -> Result<PostRef, DestinationError>;
}
