use serde::{Deserialize, Serialize};
use skylift_common::ArchivedPost;
use skylift_social::bluesky::{PostRef, ReplyRef};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

/// A post created on the destination, with the root of the thread it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPost {
    pub post: PostRef,
    pub root: PostRef,
}

impl CreatedPost {
    pub fn top_level(post: PostRef) -> Self {
        Self {
            root: post.clone(),
            post,
        }
    }

    /// Reference for a new post that replies to this one.
    pub fn reply_ref(&self) -> ReplyRef {
        ReplyRef {
            root: self.root.clone(),
            parent: self.post.clone(),
        }
    }

    /// The created record for a reply to `parent`.
    pub fn reply_to(parent: &CreatedPost, post: PostRef) -> Self {
        Self {
            post,
            root: parent.root.clone(),
        }
    }
}

/// Archived post id to created post, `None` until the post is published.
///
/// Keys are added by [`resolve_threads`]; values are filled in only by the
/// posting loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadLinks {
    entries: BTreeMap<String, Option<CreatedPost>>,
}

impl ThreadLinks {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Tracked but not yet posted.
    pub fn is_pending(&self, id: &str) -> bool {
        matches!(self.entries.get(id), Some(None))
    }

    /// Tracked and already published.
    pub fn is_posted(&self, id: &str) -> bool {
        matches!(self.entries.get(id), Some(Some(_)))
    }

    pub fn pending(&self) -> usize {
        self.entries.values().filter(|v| v.is_none()).count()
    }

    pub fn get(&self, id: &str) -> Option<&CreatedPost> {
        self.entries.get(id).and_then(Option::as_ref)
    }

    /// Add a placeholder for `id`; existing entries are left alone.
    pub fn track(&mut self, id: &str) -> bool {
        if self.entries.contains_key(id) {
            return false;
        }
        self.entries.insert(id.to_string(), None);
        true
    }

    /// Store the created post for a tracked id. Untracked ids are ignored.
    pub fn record(&mut self, id: &str, created: CreatedPost) -> bool {
        match self.entries.get_mut(id) {
            Some(slot) => {
                *slot = Some(created);
                true
            }
            None => false,
        }
    }
}

/// Track every reply in `selected` whose parent exists anywhere in `archive`.
///
/// Both ends of each such edge become keys: the parent so its created
/// reference is kept for children, the reply so it can be resurrected on
/// resume if it never got posted. Ids at or before `resume_point` are never
/// given a new placeholder: an earlier run may have posted them untracked.
/// Returns how many keys were added.
pub fn resolve_threads(
    archive: &[ArchivedPost],
    selected: &[ArchivedPost],
    links: &mut ThreadLinks,
    resume_point: Option<&str>,
) -> usize {
    let known: HashSet<&str> = archive.iter().map(|p| p.id.as_str()).collect();
    let unprocessed = |id: &str| {
        resume_point.is_none_or(|last| ArchivedPost::id_cmp(id, last) == Ordering::Greater)
    };
    let track = |links: &mut ThreadLinks, id: &str| {
        usize::from(unprocessed(id) && links.track(id))
    };

    let mut added = 0;
    for post in selected {
        let Some(parent) = post.reply_target() else {
            continue;
        };
        if !known.contains(parent) {
            continue;
        }
        added += track(links, parent);
        added += track(links, &post.id);
    }

    tracing::info!(
        added,
        tracked = links.len(),
        pending = links.pending(),
        "import.threads.resolved"
    );
    added
}
