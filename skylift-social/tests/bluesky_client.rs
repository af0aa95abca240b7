use chrono::{TimeZone, Utc};
use serde_json::json;
use skylift_common::{Facet, FacetKind};
use skylift_social::bluesky::{BlueskyClient, Destination, DestinationError, PostDraft};
use wiremock::matchers::{body_bytes, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_json(access: &str) -> serde_json::Value {
    json!({
        "did": "did:plc:abc",
        "handle": "me.bsky.social",
        "accessJwt": access,
        "refreshJwt": "refresh-1"
    })
}

async fn logged_in(server: &MockServer) -> BlueskyClient {
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.server.createSession"))
        .and(body_partial_json(json!({"identifier": "me.bsky.social", "password": "app-pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("access-1")))
        .mount(server)
        .await;
    let client = BlueskyClient::new(&server.uri()).unwrap();
    client.authenticate("me.bsky.social", "app-pw").await.unwrap();
    client
}

fn draft(text: &str) -> PostDraft {
    PostDraft {
        text: text.into(),
        facets: vec![],
        created_at: Utc.with_ymd_and_hms(2019, 1, 2, 3, 4, 5).unwrap(),
        reply: None,
        images: vec![],
    }
}

#[tokio::test]
async fn authenticate_stores_session() {
    let server = MockServer::start().await;
    let client = logged_in(&server).await;
    let session = client.session().await.unwrap();
    assert_eq!(session.did, "did:plc:abc");
    assert_eq!(session.access_jwt, "access-1");
}

#[tokio::test]
async fn bad_credentials_map_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.server.createSession"))
        .respond_with(ResponseTemplate::new(401).set_body_json(
            json!({"error": "AuthenticationRequired", "message": "Invalid identifier or password"}),
        ))
        .mount(&server)
        .await;

    let client = BlueskyClient::new(&server.uri()).unwrap();
    let err = client.authenticate("me", "wrong").await.unwrap_err();
    assert!(matches!(err, DestinationError::Auth(_)), "{err:?}");
}

#[tokio::test]
async fn create_post_sends_record_for_session_repo() {
    let server = MockServer::start().await;
    let client = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .and(header("authorization", "Bearer access-1"))
        .and(body_partial_json(json!({
            "repo": "did:plc:abc",
            "collection": "app.bsky.feed.post",
            "record": {
                "text": "hello #rust",
                "createdAt": "2019-01-02T03:04:05.000Z",
                "facets": [{
                    "index": {"byteStart": 6, "byteEnd": 11},
                    "features": [{"$type": "app.bsky.richtext.facet#tag", "tag": "rust"}]
                }]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "at://did:plc:abc/app.bsky.feed.post/3k",
            "cid": "bafy1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut d = draft("hello #rust");
    d.facets
        .push(Facet::new(6, 11, FacetKind::Hashtag { tag: "rust".into() }));
    let created = client.create_post(&d).await.unwrap();
    assert_eq!(created.cid, "bafy1");
}

#[tokio::test]
async fn rate_limit_is_reported_not_retried() {
    let server = MockServer::start().await;
    let client = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "120")
                .set_body_json(json!({"error": "RateLimitExceeded", "message": "Rate Limit Exceeded"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client.create_post(&draft("x")).await.unwrap_err();
    match err {
        DestinationError::RateLimited { retry_after_secs } => {
            assert_eq!(retry_after_secs, Some(120))
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn expired_token_is_refreshed_once() {
    let server = MockServer::start().await;
    let client = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": "ExpiredToken", "message": "Token has expired"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.server.refreshSession"))
        .and(header("authorization", "Bearer refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(session_json("access-2")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.createRecord"))
        .and(header("authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uri": "at://did:plc:abc/app.bsky.feed.post/3l",
            "cid": "bafy2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created = client.create_post(&draft("x")).await.unwrap();
    assert_eq!(created.cid, "bafy2");
    assert_eq!(client.session().await.unwrap().access_jwt, "access-2");
}

#[tokio::test]
async fn upload_blob_posts_raw_bytes() {
    let server = MockServer::start().await;
    let client = logged_in(&server).await;

    Mock::given(method("POST"))
        .and(path("/xrpc/com.atproto.repo.uploadBlob"))
        .and(header("content-type", "image/png"))
        .and(body_bytes(vec![1u8, 2, 3]))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "blob": {"$type": "blob", "ref": {"$link": "bafkrei"}, "mimeType": "image/png", "size": 3}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let blob = client.upload_blob(vec![1, 2, 3], "image/png").await.unwrap();
    assert_eq!(blob.0["size"], 3);
}

#[tokio::test]
async fn calls_without_session_fail_with_auth() {
    let client = BlueskyClient::new("http://127.0.0.1:9").unwrap();
    let err = client.create_post(&draft("x")).await.unwrap_err();
    assert!(matches!(err, DestinationError::Auth(_)));
}
