//! XRPC client for a Bluesky PDS.
//!
//! Requests go out with `retries: Some(0)` so a 429 reaches the caller as
//! [`DestinationError::RateLimited`] on the first hit. An expired access token
//! is refreshed once, transparently, before the request is replayed.
use crate::bluesky::traits::{Destination, DestinationError};
use crate::bluesky::types::{
    BlobRef, CreateRecordRequest, CreateSessionRequest, POST_COLLECTION, PostDraft, PostRecord,
    PostRef, Session, UploadBlobResponse,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use skylift_http::{Auth, HttpClient, HttpError, RequestOpts};
use tokio::sync::RwLock;

pub const DEFAULT_SERVICE: &str = "https://bsky.social";

const CREATE_SESSION: &str = "xrpc/com.atproto.server.createSession";
const REFRESH_SESSION: &str = "xrpc/com.atproto.server.refreshSession";
const UPLOAD_BLOB: &str = "xrpc/com.atproto.repo.uploadBlob";
const CREATE_RECORD: &str = "xrpc/com.atproto.repo.createRecord";

const BAD_REQUEST: u16 = 400;
const UNAUTHORIZED: u16 = 401;

enum Payload<'a> {
    Json(serde_json::Value),
    Bytes {
        bytes: &'a [u8],
        content_type: &'a str,
    },
}

pub struct BlueskyClient {
    http: HttpClient,
    session: RwLock<Option<Session>>,
}

impl BlueskyClient {
    /// Build a client for the PDS at `service` (e.g. `https://bsky.social`).
    pub fn new(service: &str) -> Result<Self, HttpError> {
        let base = if service.ends_with('/') {
            service.to_string()
        } else {
            format!("{service}/")
        };
        Ok(Self {
            http: HttpClient::new(&base)?.with_retries(0),
            session: RwLock::new(None),
        })
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    async fn access_token(&self) -> Result<(String, String), DestinationError> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| (s.access_jwt.clone(), s.did.clone()))
            .ok_or_else(|| DestinationError::Auth("no active session".into()))
    }

    async fn refresh(&self) -> Result<(), DestinationError> {
        let refresh_jwt = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_jwt.clone())
            .ok_or_else(|| DestinationError::Auth("no active session".into()))?;

        let fresh: Session = self
            .http
            .post_json_opts(
                REFRESH_SESSION,
                &serde_json::json!({}),
                RequestOpts {
                    auth: Some(Auth::Bearer(&refresh_jwt)),
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| match e.status().map(|s| s.as_u16()) {
                Some(BAD_REQUEST | UNAUTHORIZED) => DestinationError::Auth(e.to_string()),
                _ => map_http(e),
            })?;

        tracing::info!(handle = %fresh.handle, "bluesky.session.refreshed");
        *self.session.write().await = Some(fresh);
        Ok(())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &Payload<'_>,
        token: &str,
    ) -> Result<T, HttpError> {
        let opts = RequestOpts {
            auth: Some(Auth::Bearer(token)),
            retries: Some(0),
            ..Default::default()
        };
        match payload {
            Payload::Json(body) => self.http.post_json_opts(path, body, opts).await,
            Payload::Bytes {
                bytes,
                content_type,
            } => self.http.post_bytes(path, bytes, content_type, opts).await,
        }
    }

    /// Authenticated call with one transparent token refresh.
    async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: Payload<'_>,
    ) -> Result<T, DestinationError> {
        let (token, _) = self.access_token().await?;
        match self.send(path, &payload, &token).await {
            Err(err) if is_expired_token(&err) => {
                tracing::debug!(path, "bluesky.session.expired");
                self.refresh().await?;
                let (token, _) = self.access_token().await?;
                self.send(path, &payload, &token).await.map_err(map_http)
            }
            other => other.map_err(map_http),
        }
    }
}

fn is_expired_token(err: &HttpError) -> bool {
    err.status().map(|s| s.as_u16()) == Some(BAD_REQUEST) && err.code() == Some("ExpiredToken")
}

fn map_http(err: HttpError) -> DestinationError {
    match &err {
        HttpError::Api {
            retry_after_secs, ..
        } if err.is_rate_limited() => DestinationError::RateLimited {
            retry_after_secs: *retry_after_secs,
        },
        HttpError::Api { status, .. } if status.as_u16() == UNAUTHORIZED => {
            DestinationError::Auth(err.to_string())
        }
        _ => DestinationError::Service(err.to_string()),
    }
}

#[async_trait]
impl Destination for BlueskyClient {
    async fn authenticate(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<Session, DestinationError> {
        let session: Session = self
            .http
            .post_json_opts(
                CREATE_SESSION,
                &CreateSessionRequest {
                    identifier,
                    password: secret,
                },
                RequestOpts {
                    retries: Some(0),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| {
                if e.is_rate_limited() {
                    map_http(e)
                } else if matches!(e.status().map(|s| s.as_u16()), Some(BAD_REQUEST | UNAUTHORIZED)) {
                    DestinationError::Auth(e.to_string())
                } else {
                    DestinationError::Service(e.to_string())
                }
            })?;

        tracing::info!(handle = %session.handle, did = %session.did, "bluesky.session.created");
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn upload_blob(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<BlobRef, DestinationError> {
        let size = bytes.len();
        let resp: UploadBlobResponse = self
            .call(
                UPLOAD_BLOB,
                Payload::Bytes {
                    bytes: &bytes,
                    content_type,
                },
            )
            .await?;
        tracing::debug!(size, content_type, "bluesky.blob.uploaded");
        Ok(resp.blob)
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<PostRef, DestinationError> {
        let (_, did) = self.access_token().await?;
        let request = CreateRecordRequest {
            repo: &did,
            collection: POST_COLLECTION,
            record: PostRecord::from_draft(draft),
        };
        let body =
            serde_json::to_value(&request).map_err(|e| DestinationError::Service(e.to_string()))?;
        let created: PostRef = self.call(CREATE_RECORD, Payload::Json(body)).await?;
        tracing::debug!(uri = %created.uri, "bluesky.post.created");
        Ok(created)
    }
}
