//! Social network collaborators used by the importer.
//!
//! - [`twitter`]: reads a Twitter/X data export into [`skylift_common::ArchivedPost`]s.
//! - [`bluesky`]: the destination client (session, blob upload, post creation)
//!   behind the [`bluesky::Destination`] trait the import loop is written against.
pub mod bluesky;
pub mod twitter;
