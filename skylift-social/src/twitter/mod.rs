//! Twitter/X data-export ingestion.
//!
//! [`archive`] locates and parses the export's `tweets.js`; [`types`] holds the
//! raw JSON shapes exactly as the export writes them.
pub mod archive;
pub mod types;

pub use archive::{ArchiveError, load_archive};
