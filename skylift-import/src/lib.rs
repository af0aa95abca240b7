//! Import orchestration for moving an archived post history to Bluesky.
//!
//! The flow is: [`filter`] narrows the archive, [`thread`] marks which posts
//! take part in in-archive reply chains, and [`orchestrator`] posts the
//! survivors one at a time while [`checkpoint`] records progress after each
//! success so an interrupted run resumes without duplicates.
//!
//! ```
//! use skylift_import::{ImportCheckpoint, ImportFilterConfig, plan_import};
//!
//! let plan = plan_import(&[], &ImportFilterConfig::default(), ImportCheckpoint::default());
//! assert!(plan.posts.is_empty());
//! assert_eq!(plan.filter_report.removed(), 0);
//! ```
pub mod checkpoint;
pub mod facets;
pub mod filter;
pub mod media;
pub mod orchestrator;
pub mod thread;
pub mod throttle;

pub use checkpoint::{CheckpointError, CheckpointStore, ImportCheckpoint};
pub use facets::{RenderedText, render_text};
pub use filter::{FilterPipeline, FilterReport, FilterStage, ImportFilterConfig};
pub use media::{
    IMAGE_CONTENT_TYPE, MAX_IMAGE_BYTES, MediaFetchError, MediaFetcher, strip_media_links,
};
pub use orchestrator::{ImportReport, ImportSettings, Orchestrator, PostFailure};
pub use thread::{CreatedPost, ThreadLinks, resolve_threads};
pub use throttle::{Pause, Throttle, ThrottleSettings};

use skylift_common::ArchivedPost;

/// The narrowed, thread-annotated work list for one run.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    /// Posts to publish, in archive order; the orchestrator sorts them by time.
    pub posts: Vec<ArchivedPost>,
    /// Restored checkpoint with this run's thread candidates added.
    pub checkpoint: ImportCheckpoint,
    /// How many posts each filter stage removed.
    pub filter_report: FilterReport,
    /// Thread keys added by this run's scan.
    pub new_thread_keys: usize,
}

/// Run the filter pipeline and thread resolver without touching disk or network.
pub fn plan_import(
    archive: &[ArchivedPost],
    filters: &ImportFilterConfig,
    mut checkpoint: ImportCheckpoint,
) -> ImportPlan {
    let (posts, filter_report) = FilterPipeline::new(filters).apply(archive.to_vec(), &checkpoint);

    let resume_point = checkpoint.resume_point(archive).map(str::to_string);
    let new_thread_keys = if filters.link_threads {
        resolve_threads(
            archive,
            &posts,
            &mut checkpoint.threads,
            resume_point.as_deref(),
        )
    } else {
        0
    };

    ImportPlan {
        posts,
        checkpoint,
        filter_report,
        new_thread_keys,
    }
}
