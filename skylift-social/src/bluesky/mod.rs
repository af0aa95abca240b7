//! Bluesky (AT Protocol) destination client.
//!
//! [`traits::Destination`] is the seam the import loop talks to;
//! [`client::BlueskyClient`] implements it with XRPC calls over the shared
//! HTTP client. Rate limiting is reported as
//! [`traits::DestinationError::RateLimited`] and never retried here, so the
//! caller stays in charge of cooldowns.
pub mod client;
pub mod traits;
pub mod types;

pub use client::{BlueskyClient, DEFAULT_SERVICE};
pub use traits::{Destination, DestinationError};
pub use types::{BlobRef, PostDraft, PostRef, ReplyRef, Session};
