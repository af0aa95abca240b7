//! Selection of the posts to import.
//!
//! Stages run in a fixed order, each on the previous stage's output, and only
//! ever remove posts. Relative order is preserved throughout.
use crate::checkpoint::ImportCheckpoint;
use crate::thread::ThreadLinks;
use chrono::{DateTime, Utc};
use skylift_common::ArchivedPost;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Text prefix the source network uses for retweets.
pub const RETWEET_PREFIX: &str = "RT @";

/// Immutable filter settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFilterConfig {
    /// Inclusive lower bound on `created_at`.
    pub min_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub max_date: Option<DateTime<Utc>>,
    pub import_replies: bool,
    pub link_threads: bool,
    pub skip_sensitive: bool,
    pub skip_retweets: bool,
    /// Lowercased whole-token skip words.
    pub skip_words: BTreeSet<String>,
    /// Lowercased handles (without `@`) the archive owner has used.
    pub owner_handles: BTreeSet<String>,
}

impl Default for ImportFilterConfig {
    fn default() -> Self {
        Self {
            min_date: None,
            max_date: None,
            import_replies: false,
            link_threads: true,
            skip_sensitive: false,
            skip_retweets: true,
            skip_words: BTreeSet::new(),
            owner_handles: BTreeSet::new(),
        }
    }
}

impl ImportFilterConfig {
    pub fn with_skip_words<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.skip_words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        self
    }

    pub fn with_owner_handles<I, S>(mut self, handles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.owner_handles = handles
            .into_iter()
            .map(|h| normalize_handle(h.as_ref()))
            .filter(|h| !h.is_empty())
            .collect();
        self
    }

    fn is_owner(&self, handle: &str) -> bool {
        self.owner_handles.contains(&normalize_handle(handle))
    }
}

fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    DateBounds,
    ReplyPolicy,
    Sensitive,
    Retweets,
    SkipWords,
    Resume,
}

impl FilterStage {
    pub const ALL: [FilterStage; 6] = [
        FilterStage::DateBounds,
        FilterStage::ReplyPolicy,
        FilterStage::Sensitive,
        FilterStage::Retweets,
        FilterStage::SkipWords,
        FilterStage::Resume,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FilterStage::DateBounds => "date_bounds",
            FilterStage::ReplyPolicy => "reply_policy",
            FilterStage::Sensitive => "sensitive",
            FilterStage::Retweets => "retweets",
            FilterStage::SkipWords => "skip_words",
            FilterStage::Resume => "resume",
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-stage removal counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub input: usize,
    pub removed: Vec<(FilterStage, usize)>,
    pub kept: usize,
}

impl FilterReport {
    pub fn removed(&self) -> usize {
        self.removed.iter().map(|(_, n)| n).sum()
    }

    pub fn removed_by(&self, stage: FilterStage) -> usize {
        self.removed
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

pub struct FilterPipeline<'a> {
    config: &'a ImportFilterConfig,
}

impl<'a> FilterPipeline<'a> {
    pub fn new(config: &'a ImportFilterConfig) -> Self {
        Self { config }
    }

    /// Narrow `posts` to the import set. Pure: same input, same output.
    pub fn apply(
        &self,
        mut posts: Vec<ArchivedPost>,
        checkpoint: &ImportCheckpoint,
    ) -> (Vec<ArchivedPost>, FilterReport) {
        let mut report = FilterReport {
            input: posts.len(),
            ..Default::default()
        };

        let resume_point = checkpoint.resume_point(&posts).map(str::to_string);
        if resume_point.is_none() && checkpoint.last_processed_id.is_some() {
            tracing::warn!(
                last_processed_id = checkpoint.last_processed_id.as_deref().unwrap_or("-"),
                "import.filter.resume_point_not_in_archive"
            );
        }
        let resume = ResumeState {
            after: resume_point.as_deref(),
            threads: &checkpoint.threads,
        };

        for stage in FilterStage::ALL {
            let before = posts.len();
            posts.retain(|post| self.keeps(stage, post, &resume));
            let removed = before - posts.len();
            tracing::info!(stage = %stage, removed, remaining = posts.len(), "import.filter.stage");
            report.removed.push((stage, removed));
        }

        report.kept = posts.len();
        (posts, report)
    }

    fn keeps(&self, stage: FilterStage, post: &ArchivedPost, resume: &ResumeState<'_>) -> bool {
        let cfg = self.config;
        match stage {
            FilterStage::DateBounds => {
                cfg.min_date.is_none_or(|min| post.created_at >= min)
                    && cfg.max_date.is_none_or(|max| post.created_at <= max)
            }
            FilterStage::ReplyPolicy => {
                cfg.import_replies
                    || !post.is_reply()
                    || post
                        .in_reply_to_handle
                        .as_deref()
                        .is_some_and(|h| cfg.is_owner(h))
            }
            FilterStage::Sensitive => !(cfg.skip_sensitive && post.is_sensitive),
            FilterStage::Retweets => !(cfg.skip_retweets && post.text.starts_with(RETWEET_PREFIX)),
            FilterStage::SkipWords => {
                cfg.skip_words.is_empty() || !contains_skip_word(&post.text, &cfg.skip_words)
            }
            FilterStage::Resume => resume.keeps(post),
        }
    }
}

/// What the resume stage needs from the checkpoint.
struct ResumeState<'a> {
    /// Only set when the checkpointed id is present in the input.
    after: Option<&'a str>,
    threads: &'a ThreadLinks,
}

impl ResumeState<'_> {
    fn keeps(&self, post: &ArchivedPost) -> bool {
        if self.threads.is_posted(&post.id) {
            return false;
        }
        self.after
            .is_none_or(|last| ArchivedPost::id_cmp(&post.id, last) == Ordering::Greater)
            || self.threads.is_pending(&post.id)
    }
}

fn contains_skip_word(text: &str, words: &BTreeSet<String>) -> bool {
    text.replace(['?', '!'], " ")
        .split_whitespace()
        .any(|token| words.contains(&token.to_lowercase()))
}
