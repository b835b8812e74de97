//! End-to-end tests for the relay
//!
//! These tests run the whole path against a local mock HTTP server: enqueue,
//! worker pickup, the real reqwest transport, Kakao profile validation and
//! the DuckDB audit log.

use std::sync::Arc;
use std::time::Duration;

use courier_core::{
    HttpClientConfig, KakaoProfileProvider, ProviderId, ProviderRegistry, Relay, RelayConfig,
    ReqwestHttpClient, RetryConfig,
};
use courier_store::{AuditFilter, AuditStoreConfig, DuckDbAuditStore};
use serde_json::{json, Map, Value};
use tempfile::TempDir;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const PROFILE_BODY: &str = r#"{"id":99999,"connected_at":"2026-02-20T10:00:00Z","properties":{"nickname":"tester"},"kakao_account":{"profile_needs_agreement":false}}"#;

fn open_store() -> (TempDir, DuckDbAuditStore) {
    let temp = tempfile::tempdir().expect("tempdir");
    let store = courier_store::open(AuditStoreConfig::with_home(temp.path().join("courier")))
        .expect("audit store");
    (temp, store)
}

fn start_relay(base_url: &str, store: &DuckDbAuditStore, backoff_base: Duration) -> Relay {
    let config = RelayConfig {
        workers: 2,
        http: HttpClientConfig {
            timeout: Duration::from_secs(5),
            ..HttpClientConfig::default()
        },
        retry: RetryConfig::default().with_base_delay(backoff_base),
        throttle: None,
    };
    let client = Arc::new(ReqwestHttpClient::new(&config.http).expect("http client"));
    let registry = ProviderRegistry::with_kakao_providers(client, base_url).expect("registry");

    Relay::start(&config, registry, Arc::new(store.clone()))
}

fn params(token: &str) -> Map<String, Value> {
    match json!({ "user_id": "user-1", "kakao_token": token }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn profile_id() -> ProviderId {
    ProviderId::parse(KakaoProfileProvider::NAME).expect("id")
}

async fn drain(relay: &Relay) {
    tokio::time::timeout(Duration::from_secs(20), relay.drain())
        .await
        .expect("relay drained in time");
}

#[tokio::test]
async fn when_upstream_answers_ok_one_successful_entry_is_recorded() {
    // Given: A profile endpoint that accepts the token
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/user/me")
        .match_header("authorization", "Bearer valid")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(PROFILE_BODY)
        .expect(1)
        .create_async()
        .await;
    let (_temp, store) = open_store();
    let relay = start_relay(&server.url(), &store, Duration::from_millis(50));

    // When: A non-retrying task is enqueued and processed
    let receipt = relay
        .enqueue(profile_id(), params("valid"), false)
        .expect("enqueue");
    drain(&relay).await;
    relay.shutdown().await;

    // Then: Exactly one successful audit entry holds the normalized profile
    mock.assert_async().await;
    let entries = store
        .recent(
            &AuditFilter {
                provider: None,
                task_id: Some(receipt.task_id),
            },
            10,
        )
        .expect("recent");
    assert_eq!(entries.len(), 1);

    let entry = &entries[0];
    assert!(entry.success);
    assert!(!entry.is_validation_error);
    assert_eq!(entry.provider, "kakao_profile");
    assert_eq!(entry.error_message, None);
    assert_eq!(
        entry.data.as_ref().map(|data| Value::Object(data.clone())),
        Some(json!({
            "id": 99999,
            "connected_at": "2026-02-20T10:00:00Z",
            "properties": { "nickname": "tester" }
        }))
    );
}

#[tokio::test]
async fn when_upstream_keeps_failing_four_spaced_failures_are_recorded() {
    // Given: A profile endpoint that always answers 500
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/user/me")
        .with_status(500)
        .with_body("internal error")
        .expect(4)
        .create_async()
        .await;
    let (_temp, store) = open_store();
    let base = Duration::from_millis(100);
    let relay = start_relay(&server.url(), &store, base);

    // When: A retrying task is processed to exhaustion
    let receipt = relay
        .enqueue(profile_id(), params("valid"), true)
        .expect("enqueue");
    drain(&relay).await;
    let stats = relay.shutdown().await;

    // Then: Four failed, non-validation entries, spaced by growing backoff
    mock.assert_async().await;
    assert_eq!(stats.exhausted, 1);

    let mut entries = store
        .recent(
            &AuditFilter {
                provider: Some(String::from("kakao_profile")),
                task_id: Some(receipt.task_id),
            },
            10,
        )
        .expect("recent");
    entries.reverse();
    assert_eq!(entries.len(), 4);
    assert!(entries
        .iter()
        .all(|entry| !entry.success && !entry.is_validation_error));
    assert!(entries
        .iter()
        .all(|entry| entry.error_code.as_deref() == Some("provider.bad_status")));

    let recorded: Vec<OffsetDateTime> = entries
        .iter()
        .map(|entry| OffsetDateTime::parse(&entry.recorded_at, &Rfc3339).expect("rfc3339"))
        .collect();
    let gaps: Vec<Duration> = recorded
        .windows(2)
        .map(|pair| Duration::try_from(pair[1] - pair[0]).expect("non-negative gap"))
        .collect();
    for (index, gap) in gaps.iter().enumerate() {
        let expected = base * 2_u32.pow(index as u32);
        assert!(*gap >= expected, "gap {index} was {gap:?}, expected at least {expected:?}");
    }
    assert!(gaps[0] < gaps[1] && gaps[1] < gaps[2], "gaps: {gaps:?}");
}

#[tokio::test]
async fn enqueue_returns_before_the_call_completes() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v2/user/me")
        .with_status(200)
        .with_body(PROFILE_BODY)
        .create_async()
        .await;
    let (_temp, store) = open_store();
    let relay = start_relay(&server.url(), &store, Duration::from_millis(50));

    let first = relay
        .enqueue(profile_id(), params("a"), false)
        .expect("enqueue");
    let second = relay
        .enqueue(profile_id(), params("b"), false)
        .expect("enqueue");

    assert_ne!(first.task_id, second.task_id);
    assert!(second.queue_depth >= 1);

    drain(&relay).await;
    let stats = relay.shutdown().await;
    assert_eq!(stats.succeeded, 2);
    assert_eq!(store.count(&AuditFilter::default()).expect("count"), 2);
}
