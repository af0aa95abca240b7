#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use skylift_common::observability::{LogConfig, LogFormat};
use skylift_common::{ArchivedPost, MediaItem, UrlEntity};
use skylift_import::{MediaFetchError, MediaFetcher};
use skylift_social::bluesky::{
    BlobRef, Destination, DestinationError, PostDraft, PostRef, Session,
};
use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "skylift-tests",
            log_dir: Some(std::env::temp_dir().join("skylift-tests")),
            emit_stderr: true,
            format: if std::env::var("SKYLIFT_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug",
        };

        skylift_common::observability::init_logging(config).unwrap_or_default()
    });
}

/// Scripted answer for one destination call. Once a script runs out every call succeeds.
#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Ok,
    RateLimited,
    Fail,
}

impl Reply {
    fn into_result(self) -> Result<(), DestinationError> {
        match self {
            Reply::Ok => Ok(()),
            Reply::RateLimited => Err(DestinationError::RateLimited {
                retry_after_secs: Some(1),
            }),
            Reply::Fail => Err(DestinationError::Service("boom".into())),
        }
    }
}

#[derive(Default)]
pub struct FakeDestination {
    create_script: Mutex<VecDeque<Reply>>,
    upload_script: Mutex<VecDeque<Reply>>,
    /// Drafts that were accepted, in order, with the reference handed back.
    pub created: Mutex<Vec<(PostDraft, PostRef)>>,
    pub create_attempts: Mutex<usize>,
    pub uploads: Mutex<Vec<(usize, String)>>,
}

impl FakeDestination {
    pub fn with_create_script(replies: impl IntoIterator<Item = Reply>) -> Self {
        let fake = Self::default();
        fake.create_script.lock().unwrap().extend(replies);
        fake
    }

    pub fn script_uploads(&self, replies: impl IntoIterator<Item = Reply>) {
        self.upload_script.lock().unwrap().extend(replies);
    }

    pub fn texts(&self) -> Vec<String> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .map(|(d, _)| d.text.clone())
            .collect()
    }

    pub fn draft_for(&self, text: &str) -> PostDraft {
        self.created
            .lock()
            .unwrap()
            .iter()
            .find(|(d, _)| d.text == text)
            .map(|(d, _)| d.clone())
            .unwrap_or_else(|| panic!("no post with text {text:?}"))
    }

    pub fn ref_for(&self, text: &str) -> PostRef {
        self.created
            .lock()
            .unwrap()
            .iter()
            .find(|(d, _)| d.text == text)
            .map(|(_, r)| r.clone())
            .unwrap_or_else(|| panic!("no post with text {text:?}"))
    }
}

#[async_trait]
impl Destination for FakeDestination {
    async fn authenticate(&self, identifier: &str, _secret: &str) -> Result<Session, DestinationError> {
        Ok(Session {
            did: "did:plc:test".into(),
            handle: identifier.into(),
            access_jwt: "a".into(),
            refresh_jwt: "r".into(),
        })
    }

    async fn upload_blob(&self, bytes: Vec<u8>, content_type: &str) -> Result<BlobRef, DestinationError> {
        let reply = self.upload_script.lock().unwrap().pop_front().unwrap_or(Reply::Ok);
        reply.into_result()?;
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((bytes.len(), content_type.to_string()));
        Ok(BlobRef(serde_json::json!({
            "$type": "blob",
            "ref": {"$link": format!("blob{}", uploads.len())},
            "size": bytes.len(),
        })))
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<PostRef, DestinationError> {
        *self.create_attempts.lock().unwrap() += 1;
        let reply = self.create_script.lock().unwrap().pop_front().unwrap_or(Reply::Ok);
        reply.into_result()?;
        let mut created = self.created.lock().unwrap();
        let n = created.len() + 1;
        let post_ref = PostRef {
            uri: format!("at://did:plc:test/app.bsky.feed.post/{n}"),
            cid: format!("cid{n}"),
        };
        created.push((draft.clone(), post_ref.clone()));
        Ok(post_ref)
    }
}

/// Serves a few bytes for any URL, except ones containing `broken`.
pub struct FakeMedia;

#[async_trait]
impl MediaFetcher for FakeMedia {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, MediaFetchError> {
        if url.contains("broken") {
            return Err(MediaFetchError {
                url: url.into(),
                reason: "404".into(),
            });
        }
        Ok(vec![0x89, b'P', b'N', b'G'])
    }
}

/// A post authored on 2021-03-`day` at `hour`:00 UTC.
pub fn post(id: &str, day: u32, hour: u32, text: &str) -> ArchivedPost {
    ArchivedPost {
        id: id.into(),
        created_at: Utc.with_ymd_and_hms(2021, 3, day, hour, 0, 0).unwrap(),
        text: text.into(),
        in_reply_to_id: None,
        in_reply_to_handle: None,
        is_sensitive: false,
        urls: vec![],
        hashtags: vec![],
        media: vec![],
    }
}

pub fn reply(id: &str, day: u32, hour: u32, text: &str, parent: &str) -> ArchivedPost {
    ArchivedPost {
        in_reply_to_id: Some(parent.into()),
        in_reply_to_handle: Some("me".into()),
        ..post(id, day, hour, text)
    }
}

pub fn with_url(mut post: ArchivedPost, short: &str, expanded: &str) -> ArchivedPost {
    post.urls.push(UrlEntity {
        short_url: short.into(),
        expanded_url: expanded.into(),
    });
    post
}

pub fn with_images(mut post: ArchivedPost, sources: &[&str]) -> ArchivedPost {
    post.media.extend(sources.iter().enumerate().map(|(i, src)| MediaItem {
        source_url: src.to_string(),
        display_url: format!("pic.twitter.com/{i}"),
        short_url: Some("https://t.co/media".into()),
    }));
    post
}
