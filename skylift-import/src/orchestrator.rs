//! The posting loop.
//!
//! Posts are published one at a time in ascending `created_at` order. Each
//! post walks an explicit state machine:
//!
//! ```text
//! Pending -> MediaUploading -> Posting -> Posted
//!                 |    ^          |  ^
//!                 v    |          v  |
//!               RateLimited    RateLimited
//! ```
//!
//! Each call site (blob upload, post creation) gets at most one cooldown and
//! retry; a second rate-limit error fails the post. Failed posts are logged
//! and skipped. After every success both checkpoint files are rewritten
//! before the next post starts.
use crate::checkpoint::{CheckpointError, CheckpointStore, ImportCheckpoint};
use crate::facets::render_text;
use crate::media::{IMAGE_CONTENT_TYPE, MediaFetchError, MediaFetcher, strip_media_links};
use crate::thread::{CreatedPost, ThreadLinks};
use crate::throttle::{Pause, Throttle, ThrottleSettings};
use crate::ImportPlan;
use skylift_common::ArchivedPost;
use skylift_social::bluesky::types::MAX_IMAGES;
use skylift_social::bluesky::{BlobRef, Destination, DestinationError, PostDraft, PostRef};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub checkpoint_dir: PathBuf,
    pub throttle: ThrottleSettings,
}

/// Why a single post was not published.
#[derive(Debug, Error)]
pub enum PostFailure {
    #[error(transparent)]
    MediaFetch(#[from] MediaFetchError),
    #[error("media upload failed: {0}")]
    Upload(#[source] DestinationError),
    #[error("post creation failed: {0}")]
    Create(#[source] DestinationError),
    #[error("cancelled")]
    Cancelled,
}

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub posted: usize,
    /// Archived ids of posts that were abandoned.
    pub failed: Vec<String>,
    pub cooldowns: usize,
    pub budget_pauses: usize,
    pub cancelled: bool,
    pub last_processed_id: Option<String>,
}

enum PostState {
    Pending,
    MediaUploading {
        next: usize,
        blobs: Vec<BlobRef>,
        retried: bool,
    },
    Posting {
        blobs: Vec<BlobRef>,
        retried: bool,
    },
    RateLimited {
        resume: Box<PostState>,
        retry_after_secs: Option<u64>,
    },
    Posted(PostRef),
    Failed(PostFailure),
}

impl PostState {
    fn name(&self) -> &'static str {
        match self {
            PostState::Pending => "pending",
            PostState::MediaUploading { .. } => "media_uploading",
            PostState::Posting { .. } => "posting",
            PostState::RateLimited { .. } => "rate_limited",
            PostState::Posted(_) => "posted",
            PostState::Failed(_) => "failed",
        }
    }
}

pub struct Orchestrator {
    destination: Arc<dyn Destination>,
    media: Arc<dyn MediaFetcher>,
    store: CheckpointStore,
    throttle: ThrottleSettings,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        destination: Arc<dyn Destination>,
        media: Arc<dyn MediaFetcher>,
        settings: ImportSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            destination,
            media,
            store: CheckpointStore::new(settings.checkpoint_dir),
            throttle: settings.throttle,
            cancel,
        }
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Publish every post in `plan`. Only a checkpoint write failure aborts the run.
    pub async fn run(&self, plan: ImportPlan) -> Result<ImportReport, CheckpointError> {
        let ImportPlan {
            mut posts,
            mut checkpoint,
            ..
        } = plan;
        posts.sort_by_key(|p| p.created_at);

        // persist the discovered thread keys before anything is posted
        self.store.save_threads(&checkpoint.threads)?;

        let mut throttle = Throttle::new(self.throttle.clone());
        let mut report = ImportReport::default();
        let total = posts.len();
        tracing::info!(total, thread_keys = checkpoint.threads.len(), "import.run.start");

        for (index, post) in posts.iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.publish(post, &checkpoint.threads, &mut report).await {
                Ok(created) => {
                    self.commit(post, created, &mut checkpoint)?;
                    report.posted += 1;

                    if index + 1 == total {
                        break;
                    }
                    let pause = throttle.record_post();
                    if let Pause::Budget(d) = pause {
                        report.budget_pauses += 1;
                        tracing::info!(
                            posted = throttle.total(),
                            pause_secs = d.as_secs(),
                            "import.throttle.budget_pause"
                        );
                    }
                    if !self.sleep(pause.duration()).await {
                        report.cancelled = true;
                        break;
                    }
                }
                Err(PostFailure::Cancelled) => {
                    tracing::info!(post_id = %post.id, "import.post.cancelled");
                    report.cancelled = true;
                    break;
                }
                Err(failure) => {
                    tracing::warn!(post_id = %post.id, error = %failure, "import.post.failed");
                    report.failed.push(post.id.clone());
                }
            }
        }

        report.last_processed_id = checkpoint.last_processed_id.clone();
        tracing::info!(
            posted = report.posted,
            failed = report.failed.len(),
            cooldowns = report.cooldowns,
            cancelled = report.cancelled,
            "import.run.finished"
        );
        Ok(report)
    }

    fn commit(
        &self,
        post: &ArchivedPost,
        created: CreatedPost,
        checkpoint: &mut ImportCheckpoint,
    ) -> Result<(), CheckpointError> {
        tracing::info!(post_id = %post.id, uri = %created.post.uri, "import.post.posted");
        checkpoint.threads.record(&post.id, created);
        checkpoint.advance(&post.id);
        self.store.save(checkpoint)
    }

    /// Drive one post through its state machine.
    async fn publish(
        &self,
        post: &ArchivedPost,
        threads: &ThreadLinks,
        report: &mut ImportReport,
    ) -> Result<CreatedPost, PostFailure> {
        let parent = post.reply_target().and_then(|id| threads.get(id));
        let rendered = render_text(
            &strip_media_links(&post.text, &post.media),
            &post.urls,
            &post.hashtags,
        );
        if post.media.len() > MAX_IMAGES {
            tracing::warn!(
                post_id = %post.id,
                attached = post.media.len(),
                kept = MAX_IMAGES,
                "import.post.media_truncated"
            );
        }
        let images = &post.media[..post.media.len().min(MAX_IMAGES)];

        let mut state = PostState::Pending;
        loop {
            tracing::trace!(post_id = %post.id, state = state.name(), "import.post.state");
            state = match state {
                PostState::Pending => PostState::MediaUploading {
                    next: 0,
                    blobs: Vec::with_capacity(images.len()),
                    retried: false,
                },

                PostState::MediaUploading {
                    next,
                    mut blobs,
                    retried,
                } => {
                    let Some(item) = images.get(next) else {
                        state = PostState::Posting {
                            blobs,
                            retried: false,
                        };
                        continue;
                    };
                    if self.cancel.is_cancelled() {
                        return Err(PostFailure::Cancelled);
                    }
                    let bytes = match self.media.fetch(&item.source_url).await {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            state = PostState::Failed(e.into());
                            continue;
                        }
                    };
                    match self.destination.upload_blob(bytes, IMAGE_CONTENT_TYPE).await {
                        Ok(blob) => {
                            blobs.push(blob);
                            PostState::MediaUploading {
                                next: next + 1,
                                blobs,
                                retried,
                            }
                        }
                        Err(DestinationError::RateLimited { retry_after_secs }) if !retried => {
                            PostState::RateLimited {
                                resume: Box::new(PostState::MediaUploading {
                                    next,
                                    blobs,
                                    retried: true,
                                }),
                                retry_after_secs,
                            }
                        }
                        Err(e) => PostState::Failed(PostFailure::Upload(e)),
                    }
                }

                PostState::Posting { blobs, retried } => {
                    if self.cancel.is_cancelled() {
                        return Err(PostFailure::Cancelled);
                    }
                    let draft = PostDraft {
                        text: rendered.text.clone(),
                        facets: rendered.facets.clone(),
                        created_at: post.created_at,
                        reply: parent.map(CreatedPost::reply_ref),
                        images: blobs,
                    };
                    match self.destination.create_post(&draft).await {
                        Ok(created) => PostState::Posted(created),
                        Err(DestinationError::RateLimited { retry_after_secs }) if !retried => {
                            PostState::RateLimited {
                                resume: Box::new(PostState::Posting {
                                    blobs: draft.images,
                                    retried: true,
                                }),
                                retry_after_secs,
                            }
                        }
                        Err(e) => PostState::Failed(PostFailure::Create(e)),
                    }
                }

                PostState::RateLimited {
                    resume,
                    retry_after_secs,
                } => {
                    report.cooldowns += 1;
                    let cooldown = self.throttle.rate_limit_cooldown;
                    tracing::warn!(
                        post_id = %post.id,
                        cooldown_secs = cooldown.as_secs(),
                        retry_after_secs,
                        "import.post.rate_limited"
                    );
                    if !self.sleep(cooldown).await {
                        return Err(PostFailure::Cancelled);
                    }
                    *resume
                }

                PostState::Posted(created) => {
                    return Ok(match parent {
                        Some(parent) => CreatedPost::reply_to(parent, created),
                        None => CreatedPost::top_level(created),
                    });
                }

                PostState::Failed(failure) => return Err(failure),
            };
        }
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    async fn sleep(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.cancel.is_cancelled();
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
