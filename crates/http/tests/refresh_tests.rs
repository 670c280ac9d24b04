//! Concurrent reissue behaviour of the MOIM HTTP client

#![cfg(feature = "client")]

use futures::future::join_all;
use moim_http::client::{ClientError, MemoryTokenStore, MoimClient, TokenStore};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, store: Arc<MemoryTokenStore>, expired: Arc<AtomicUsize>) -> MoimClient {
    MoimClient::builder()
        .base_url(format!("{}/api", server.uri()))
        .token_store(store)
        .on_session_expired(move || {
            expired.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_concurrent_401s_share_one_reissue() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/meetings/\d+$"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/reissue"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": "fresh" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path_regex(r"^/api/meetings/\d+$"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "title": "Study group",
            "description": "Rust",
            "capacity": 10
        })))
        .expect(3)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("stale"));
    let expired = Arc::new(AtomicUsize::new(0));
    let client = client(&mock_server, store.clone(), expired.clone());

    let results = join_all((1..=3).map(|id| client.get_meeting(id))).await;

    for result in results {
        assert_eq!(result.unwrap().title, "Study group");
    }
    assert_eq!(store.get().as_deref(), Some("fresh"));
    assert_eq!(expired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_401s_share_one_failed_reissue() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/test/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/reissue"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_string("refresh token expired")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("expired"));
    let expired = Arc::new(AtomicUsize::new(0));
    let client = client(&mock_server, store.clone(), expired.clone());

    let results = join_all((0..3).map(|_| client.me())).await;

    for result in results {
        match result {
            Err(ClientError::SessionExpired(source)) => {
                assert!(matches!(*source, ClientError::AuthenticationFailed(ref message) if message == "refresh token expired"));
            }
            other => panic!("expected session expiry, got {other:?}"),
        }
    }
    assert_eq!(store.get(), None);
    assert_eq!(expired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_later_expiry_triggers_a_new_reissue() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/test/me"))
        .and(header("authorization", "Bearer one"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/test/me"))
        .and(header("authorization", "Bearer two"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "authorized",
            "loginUser": "a@moim.com"
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/reissue"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "two" })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token("one"));
    let expired = Arc::new(AtomicUsize::new(0));
    let client = client(&mock_server, store.clone(), expired);

    client.me().await.unwrap();

    // Token expires again later on; the next 401 starts a new reissue
    store.set("one");
    client.me().await.unwrap();

    assert_eq!(store.get().as_deref(), Some("two"));
}
