//! Durable resume state.
//!
//! Two files live in the checkpoint directory: `last_processed_id` (a bare id)
//! and `thread_map.json` (the [`ThreadLinks`] table). Each is replaced via a
//! synced temp file and a rename, so a crash leaves the previous copy intact.
use crate::thread::ThreadLinks;
use skylift_common::ArchivedPost;
use std::cmp::Ordering;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LAST_PROCESSED_FILE: &str = "last_processed_id";
pub const THREAD_MAP_FILE: &str = "thread_map.json";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode thread map: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportCheckpoint {
    pub last_processed_id: Option<String>,
    pub threads: ThreadLinks,
}

impl ImportCheckpoint {
    /// Move `last_processed_id` forward to `id`; never moves it back.
    pub fn advance(&mut self, id: &str) -> bool {
        let ahead = self
            .last_processed_id
            .as_deref()
            .is_none_or(|last| ArchivedPost::id_cmp(id, last) == Ordering::Greater);
        if ahead {
            self.last_processed_id = Some(id.to_string());
        }
        ahead
    }

    /// `last_processed_id`, but only when that post is one of `posts`.
    ///
    /// An id the archive no longer contains gives no resume point at all.
    pub fn resume_point(&self, posts: &[ArchivedPost]) -> Option<&str> {
        self.last_processed_id
            .as_deref()
            .filter(|last| posts.iter().any(|p| p.id == *last))
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Restore state. Missing or unreadable files count as "no checkpoint".
    pub fn load(&self) -> ImportCheckpoint {
        let last_processed_id = self.load_last_processed();
        let threads = self.load_threads();
        tracing::info!(
            dir = %self.dir.display(),
            last_processed_id = last_processed_id.as_deref().unwrap_or("-"),
            thread_keys = threads.len(),
            "import.checkpoint.loaded"
        );
        ImportCheckpoint {
            last_processed_id,
            threads,
        }
    }

    fn load_last_processed(&self) -> Option<String> {
        let path = self.dir.join(LAST_PROCESSED_FILE);
        let raw = read_if_present(&path)?;
        let id = raw.trim();
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            tracing::warn!(path = %path.display(), "import.checkpoint.ignored_invalid_id");
            return None;
        }
        Some(id.to_string())
    }

    fn load_threads(&self) -> ThreadLinks {
        let path = self.dir.join(THREAD_MAP_FILE);
        let Some(raw) = read_if_present(&path) else {
            return ThreadLinks::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "import.checkpoint.ignored_thread_map");
            ThreadLinks::default()
        })
    }

    pub fn save_last_processed(&self, id: &str) -> Result<(), CheckpointError> {
        self.write_atomic(LAST_PROCESSED_FILE, id.as_bytes())
    }

    pub fn save_threads(&self, threads: &ThreadLinks) -> Result<(), CheckpointError> {
        let encoded = serde_json::to_vec_pretty(threads)?;
        self.write_atomic(THREAD_MAP_FILE, &encoded)
    }

    /// Thread map first: a crash between the two writes leaves the post
    /// recorded there, which the resume filter treats as done.
    pub fn save(&self, checkpoint: &ImportCheckpoint) -> Result<(), CheckpointError> {
        self.save_threads(&checkpoint.threads)?;
        if let Some(id) = &checkpoint.last_processed_id {
            self.save_last_processed(id)?;
        }
        Ok(())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<(), CheckpointError> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        let io_err = |source| CheckpointError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let mut file = File::create(&tmp).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);
        fs::rename(&tmp, &path).map_err(io_err)?;
        Ok(())
    }
}

fn read_if_present(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(raw) => Some(raw),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "import.checkpoint.unreadable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::CreatedPost;
    use skylift_social::bluesky::PostRef;

    #[test]
    fn missing_directory_means_fresh_run() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path().join("never-created"));
        assert_eq!(store.load(), ImportCheckpoint::default());
    }

    #[test]
    fn saves_and_restores_both_artifacts() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());

        let mut checkpoint = ImportCheckpoint::default();
        checkpoint.threads.track("10");
        checkpoint.threads.track("11");
        checkpoint.threads.record(
            "10",
            CreatedPost::top_level(PostRef {
                uri: "at://did:plc:me/app.bsky.feed.post/a".into(),
                cid: "cid-a".into(),
            }),
        );
        checkpoint.advance("10");
        store.save(&checkpoint).unwrap();

        let restored = store.load();
        assert_eq!(restored, checkpoint);
        assert!(restored.threads.is_pending("11"));
        assert!(!tmp.path().join("thread_map.json.tmp").exists());
    }

    #[test]
    fn corrupt_files_are_treated_as_absent() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(THREAD_MAP_FILE), "{ not json").unwrap();
        fs::write(tmp.path().join(LAST_PROCESSED_FILE), "garbage\n").unwrap();

        let restored = CheckpointStore::new(tmp.path()).load();
        assert_eq!(restored, ImportCheckpoint::default());
    }

    #[test]
    fn last_processed_tolerates_trailing_newline() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(LAST_PROCESSED_FILE), "1234\n").unwrap();
        let restored = CheckpointStore::new(tmp.path()).load();
        assert_eq!(restored.last_processed_id.as_deref(), Some("1234"));
    }

    #[test]
    fn resume_point_requires_the_id_in_the_archive() {
        let checkpoint = ImportCheckpoint {
            last_processed_id: Some("20".into()),
            ..Default::default()
        };
        let mut archive = vec![ArchivedPost {
            id: "10".into(),
            created_at: chrono::Utc::now(),
            text: String::new(),
            in_reply_to_id: None,
            in_reply_to_handle: None,
            is_sensitive: false,
            urls: vec![],
            hashtags: vec![],
            media: vec![],
        }];
        assert_eq!(checkpoint.resume_point(&archive), None);

        let anchor = ArchivedPost {
            id: "20".into(),
            ..archive[0].clone()
        };
        archive.push(anchor);
        assert_eq!(checkpoint.resume_point(&archive), Some("20"));
    }

    #[test]
    fn thread_map_written_without_last_id_still_marks_post_done() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(tmp.path());
        store.save_last_processed("10").unwrap();

        // post 11 was created and recorded, then the process died before
        // last_processed_id moved past it
        let mut threads = ThreadLinks::default();
        threads.track("11");
        threads.record(
            "11",
            CreatedPost::top_level(PostRef {
                uri: "at://did:plc:me/app.bsky.feed.post/b".into(),
                cid: "cid-b".into(),
            }),
        );
        store.save_threads(&threads).unwrap();

        let restored = store.load();
        assert_eq!(restored.last_processed_id.as_deref(), Some("10"));
        assert!(restored.threads.is_posted("11"));
        assert!(!restored.threads.is_pending("11"));
    }

    #[test]
    fn advance_only_moves_forward() {
        let mut checkpoint = ImportCheckpoint::default();
        assert!(checkpoint.advance("100"));
        assert!(!checkpoint.advance("99"));
        assert!(checkpoint.advance("1000"));
        assert_eq!(checkpoint.last_processed_id.as_deref(), Some("1000"));
    }
}
