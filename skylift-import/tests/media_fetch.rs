use skylift_http::HttpClient;
use skylift_import::{MAX_IMAGE_BYTES, MediaFetcher};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn fetches_archive_media_by_absolute_url() {
    let cdn = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/ok.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 32]))
        .mount(&cdn)
        .await;

    let client = HttpClient::new("https://pbs.twimg.com/").unwrap();
    let bytes = client
        .fetch(&format!("{}/media/ok.jpg", cdn.uri()))
        .await
        .unwrap();
    assert_eq!(bytes.len(), 32);
}

#[tokio::test]
async fn oversized_media_is_a_fetch_error() {
    let cdn = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/huge.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; MAX_IMAGE_BYTES + 1]))
        .expect(1)
        .mount(&cdn)
        .await;

    let client = HttpClient::new("https://pbs.twimg.com/").unwrap();
    let url = format!("{}/media/huge.jpg", cdn.uri());
    let err = client.fetch(&url).await.unwrap_err();
    assert_eq!(err.url, url);
    assert!(err.reason.contains("exceeds"));
}
