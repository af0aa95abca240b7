//! Common types and utilities shared across Skylift crates.
//!
//! This crate defines the archived-post record model, rich-text facets,
//! observability helpers, and the shared error taxonomy used throughout the
//! Skylift workspace. It is intentionally lightweight so that every crate can
//! depend on it without pulling in the HTTP or runtime stack.
//!
//! # Overview
//!
//! - [`ArchivedPost`] and its entities: one post from the source archive
//! - [`Facet`] and [`FacetKind`]: byte-indexed rich-text annotations
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`SkyliftError`] and [`Result`]: fatal, run-level error handling
//!
//! # Examples
//!
//! ```rust
//! use skylift_common::{Facet, FacetKind};
//!
//! let text = "see #rust";
//! let facet = Facet::new(4, 9, FacetKind::Hashtag { tag: "rust".into() });
//! assert_eq!(facet.slice(text), Some("#rust"));
//! ```
pub mod model;
pub mod observability;

pub use model::{ArchivedPost, Facet, FacetKind, MediaItem, UrlEntity};

/// Fatal error kinds for an import run.
///
/// Anything reported through this type stops the process before the posting
/// loop mutates state. Per-post failures live in the import crate and never
/// surface here.
#[derive(thiserror::Error, Debug)]
pub enum SkyliftError {
    /// Required input was missing or could not be interpreted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source archive is missing or malformed.
    #[error("Archive error: {0}")]
    Archive(String),

    /// The destination rejected the supplied credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Checkpoint state could not be written.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient alias for results that use [`SkyliftError`].
pub type Result<T> = std::result::Result<T, SkyliftError>;
