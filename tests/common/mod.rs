#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use roomcast::api::AppState;
use roomcast::config::Settings;
use roomcast::store::MemoryLog;
use roomcast::subscription::Subscription;
use roomcast::{Message, Resolver};
use tokio_util::sync::CancellationToken;

/// Resolver over a fresh in-memory log, with ingestion running.
pub async fn start_resolver() -> (Resolver, MemoryLog, CancellationToken) {
    start_resolver_with(Settings::default()).await
}

pub async fn start_resolver_with(settings: Settings) -> (Resolver, MemoryLog, CancellationToken) {
    let log = MemoryLog::new();
    let resolver = Resolver::new(Arc::new(log.clone()), settings);
    let shutdown = CancellationToken::new();
    resolver
        .start_ingest(shutdown.clone())
        .expect("first ingest should start");
    // Let the tail park on its first read before anything is published.
    settle().await;
    (resolver, log, shutdown)
}

pub fn create_test_state() -> (AppState, MemoryLog, CancellationToken) {
    let log = MemoryLog::new();
    let resolver = Resolver::new(Arc::new(log.clone()), Settings::default());
    let shutdown = CancellationToken::new();
    let state = AppState::new(resolver, shutdown.clone());
    (state, log, shutdown)
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

pub async fn recv(sub: &mut Subscription) -> Message {
    tokio::time::timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("timed out waiting for message")
        .expect("subscription closed")
}

pub async fn assert_quiet(sub: &mut Subscription) {
    let res = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
    assert!(res.is_err(), "expected no message, got {:?}", res);
}
