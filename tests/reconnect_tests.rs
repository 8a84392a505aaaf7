// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the reconnecting client facade

mod helpers;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use chainshield::{
    BackoffConfig, CacheTtl, ConnectionErrorKind, InMemoryCache, ReconnectError, ReconnectPolicy,
    ResilientClient, ServiceResolver,
};
use futures::future::{join_all, poll_fn};
use helpers::{CountingDiscovery, MockBackend, MockClient, Scripted};
use tower::Service;

struct Harness {
    discovery: Arc<CountingDiscovery>,
    backend: Arc<MockBackend>,
    client: ResilientClient<MockClient>,
}

async fn connect(policy: ReconnectPolicy) -> Harness {
    helpers::init_tracing();
    let discovery = Arc::new(CountingDiscovery::new("db-1", 5432));
    let backoff = BackoffConfig::builder()
        .initial_delay(Duration::from_millis(5))
        .max_retries(2)
        .build();
    let resolver = ServiceResolver::new(
        InMemoryCache::new(CacheTtl::Unlimited),
        discovery.clone(),
        backoff,
    );
    let backend = MockBackend::new();
    let client = ResilientClient::connect("db", resolver, backend.factory(), policy)
        .await
        .unwrap();

    Harness {
        discovery,
        backend,
        client,
    }
}

#[tokio::test]
async fn test_call_without_errors_never_reconnects() {
    let h = connect(ReconnectPolicy::default()).await;

    let response = h.client.call(&"select 1".to_string()).await.unwrap();

    assert_eq!(response, "select 1 via db-1");
    assert_eq!(h.backend.builds(), 1);
    assert_eq!(h.discovery.lookups(), 1);
    assert_eq!(h.client.reconnect_count(), 0);
}

#[tokio::test]
async fn test_refused_connection_reconnects_once_and_retries() {
    let h = connect(ReconnectPolicy::default()).await;
    h.backend.fail_next([Scripted::Refused]);

    let response = h.client.call(&"select 1".to_string()).await.unwrap();

    assert_eq!(response, "select 1 via db-1");
    assert_eq!(h.backend.calls(), 2);
    assert_eq!(h.backend.builds(), 2);
    assert_eq!(h.discovery.lookups(), 2);
    assert_eq!(h.client.reconnect_count(), 1);
}

#[tokio::test]
async fn test_host_not_found_reconnects() {
    let h = connect(ReconnectPolicy::default()).await;
    h.backend.fail_next([Scripted::HostNotFound]);

    assert!(h.client.call(&"ping".to_string()).await.is_ok());
    assert_eq!(h.client.reconnect_count(), 1);
}

#[tokio::test]
async fn test_application_errors_pass_through() {
    let h = connect(ReconnectPolicy::default()).await;
    h.backend.fail_next([Scripted::Query("syntax error at or near \"selec\"")]);

    let error = h.client.call(&"selec 1".to_string()).await.unwrap_err();

    let io_error = error.into_operation_error().unwrap();
    assert_eq!(io_error.kind(), io::ErrorKind::Other);
    assert!(io_error.to_string().contains("syntax error"));
    assert_eq!(h.backend.calls(), 1);
    assert_eq!(h.backend.builds(), 1);
    assert_eq!(h.discovery.lookups(), 1);
}

#[tokio::test]
async fn test_reset_is_outside_the_default_set() {
    let h = connect(ReconnectPolicy::default()).await;
    h.backend.fail_next([Scripted::Reset]);

    let error = h.client.call(&"ping".to_string()).await.unwrap_err();

    assert!(matches!(error, ReconnectError::Operation(ref e) if e.kind() == io::ErrorKind::ConnectionReset));
    assert_eq!(h.client.reconnect_count(), 0);
}

#[tokio::test]
async fn test_policy_can_extend_the_set() {
    let policy = ReconnectPolicy::default().also_reconnect_on(ConnectionErrorKind::ConnectionReset);
    let h = connect(policy).await;
    h.backend.fail_next([Scripted::Reset]);

    assert!(h.client.call(&"ping".to_string()).await.is_ok());
    assert_eq!(h.client.reconnect_count(), 1);
}

#[tokio::test]
async fn test_second_failure_is_not_retried_again() {
    let h = connect(ReconnectPolicy::default()).await;
    h.backend.fail_next([Scripted::Refused, Scripted::Refused]);

    let error = h.client.call(&"ping".to_string()).await.unwrap_err();

    assert!(matches!(error, ReconnectError::Operation(ref e) if e.kind() == io::ErrorKind::ConnectionRefused));
    assert!(!error.is_recovery_failure());
    assert_eq!(h.backend.calls(), 2);
    assert_eq!(h.client.reconnect_count(), 1);
}

#[tokio::test]
async fn test_reconnect_follows_a_moved_service() {
    let h = connect(ReconnectPolicy::default()).await;
    h.backend.take_down("db-1");
    h.discovery.set_endpoint("db-2", 5432);

    let response = h.client.call(&"ping".to_string()).await.unwrap();

    assert_eq!(response, "ping via db-2");
    assert_eq!(h.client.address().host, "db-2");
    assert_eq!(h.client.current().host(), "db-2");
}

#[tokio::test]
async fn test_reusing_cached_address_rebuilds_against_same_host() {
    let h = connect(ReconnectPolicy::default().reuse_cached_address()).await;
    h.backend.take_down("db-1");
    h.discovery.set_endpoint("db-2", 5432);

    let error = h.client.call(&"ping".to_string()).await.unwrap_err();

    assert!(matches!(error, ReconnectError::Operation(_)));
    assert_eq!(h.backend.builds(), 2);
    assert_eq!(h.discovery.lookups(), 1);
    assert_eq!(h.client.address().host, "db-1");
}

#[tokio::test]
async fn test_concurrent_failures_rebuild_once() {
    let h = connect(ReconnectPolicy::default()).await;
    h.backend.take_down("db-1");
    h.discovery.set_endpoint("db-2", 5432);

    let requests: Vec<String> = (0..4).map(|i| format!("q{i}")).collect();
    let results = join_all(requests.iter().map(|request| h.client.call(request))).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(h.client.reconnect_count(), 1);
    assert_eq!(h.backend.builds(), 2);
    assert_eq!(h.discovery.lookups(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_resolution_surfaces_as_recovery_failure() {
    let h = connect(ReconnectPolicy::default()).await;
    h.backend.fail_next([Scripted::Refused]);
    h.discovery.fail_all();

    let error = h.client.call(&"ping".to_string()).await.unwrap_err();

    assert!(matches!(error, ReconnectError::Resolution(_)));
    assert!(error.is_recovery_failure());
    assert_eq!(h.backend.builds(), 1);
    assert_eq!(h.client.address().host, "db-1");
}

#[tokio::test]
async fn test_current_handle_is_swapped_after_reconnect() {
    let h = connect(ReconnectPolicy::default()).await;
    let before = h.client.current();
    h.discovery.set_endpoint("db-3", 5432);

    h.client.reconnect().await.unwrap();

    assert_eq!(before.host(), "db-1");
    assert_eq!(h.client.current().host(), "db-3");
    assert_eq!(h.client.reconnect_count(), 1);
}

#[tokio::test]
async fn test_tower_service_runs_the_guarded_call() {
    let h = connect(ReconnectPolicy::default()).await;
    h.backend.fail_next([Scripted::Refused]);

    let mut service = h.client.clone();
    poll_fn(|cx| service.poll_ready(cx)).await.unwrap();
    let response = Service::call(&mut service, "ping".to_string()).await.unwrap();

    assert_eq!(response, "ping via db-1");
    assert_eq!(h.client.reconnect_count(), 1);
}
