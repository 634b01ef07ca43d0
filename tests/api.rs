//! HTTP and WebSocket surface over the resolver.

mod common;

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use futures::{SinkExt, StreamExt};
use roomcast::api::router;
use tokio_tungstenite::tungstenite;
use tower::ServiceExt;

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_message(text: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/messages")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "text": text }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let (state, _, _) = common::create_test_state();
    let response = router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn create_then_list_messages() {
    let (state, _, _) = common::create_test_state();
    let app = router(state);

    let response = app.clone().oneshot(post_message("hello")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["text"], "hello");
    assert!(created["id"].as_str().is_some_and(|id| !id.is_empty()));

    let response = app
        .oneshot(Request::builder().uri("/messages").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = json_body(response).await;
    assert_eq!(listed, serde_json::json!([created]));
}

#[tokio::test]
async fn empty_message_is_bad_request() {
    let (state, log, _) = common::create_test_state();
    let response = router(state).oneshot(post_message("")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"]
        .as_str()
        .unwrap()
        .contains("empty"));
    assert!(log.is_empty("room"));
}

#[tokio::test]
async fn closed_store_is_unavailable() {
    let (state, log, _) = common::create_test_state();
    log.close();
    let app = router(state);

    let response = app.clone().oneshot(post_message("hello")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let response = app
        .oneshot(Request::builder().uri("/messages").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test(flavor = "multi_thread")]
async fn websocket_streams_new_messages_and_cleans_up() {
    let (state, _, shutdown) = common::create_test_state();
    let resolver = state.resolver.clone();
    resolver.start_ingest(shutdown.clone()).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let graceful = shutdown.clone();
    tokio::spawn(async move {
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await
            .unwrap();
    });

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/messages"))
        .await
        .expect("websocket should connect");

    tokio::time::timeout(Duration::from_secs(2), async {
        while resolver.hub().subscriber_count() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("websocket should register a subscriber");

    let created = resolver.create_message("over the wire").await.unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await {
                Some(Ok(tungstenite::Message::Text(text))) => return text.to_string(),
                Some(Ok(_)) => continue,
                other => panic!("unexpected websocket item: {:?}", other),
            }
        }
    })
    .await
    .expect("message frame should arrive");

    let received: roomcast::Message = serde_json::from_str(&frame).unwrap();
    assert_eq!(received, created);

    ws.send(tungstenite::Message::Close(None)).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while resolver.hub().subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("closing the socket should unregister the subscriber");

    shutdown.cancel();
}
