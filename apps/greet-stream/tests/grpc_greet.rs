//! Greet and GreetStream Integration Tests
//!
//! Drives a real server through the generated client: names submitted with
//! `Greet` reach every open `GreetStream` call in order.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tonic::Request;
use tonic::transport::{Channel, Endpoint};

use greet_stream::{
    BroadcastConfig, Broadcaster, GreetServer, GreetServerConfig, HeuristicExtractor,
    SharedBroadcaster,
    proto::{GreetRequest, GreetStreamRequest, greet_service_client::GreetServiceClient},
    serve,
};

/// Start a test gRPC server on a random port.
async fn start_server(
    config: BroadcastConfig,
) -> (SocketAddr, SharedBroadcaster<String>, CancellationToken) {
    let broadcaster = Arc::new(Broadcaster::new(config));
    let shutdown = CancellationToken::new();

    let server = Arc::new(GreetServer::new(
        GreetServerConfig::default(),
        Arc::clone(&broadcaster),
        Arc::new(HeuristicExtractor::default()),
        shutdown.clone(),
    ));

    // Find an available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(serve(listener, server, shutdown.clone()));

    (addr, broadcaster, shutdown)
}

/// Start a test gRPC server on a random port and return the client.
async fn setup_test_server() -> (
    GreetServiceClient<Channel>,
    SharedBroadcaster<String>,
    CancellationToken,
) {
    let (addr, broadcaster, shutdown) = start_server(BroadcastConfig::default()).await;

    let client = GreetServiceClient::connect(format!("http://{addr}"))
        .await
        .unwrap();

    (client, broadcaster, shutdown)
}

async fn greet(client: &mut GreetServiceClient<Channel>, name: &str) -> String {
    client
        .greet(Request::new(GreetRequest {
            name: name.to_string(),
        }))
        .await
        .unwrap()
        .into_inner()
        .greeting
}

async fn wait_for_subscribers(broadcaster: &SharedBroadcaster<String>, expected: usize) {
    timeout(Duration::from_secs(2), async {
        while broadcaster.subscriber_count() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("subscriber count never settled");
}

// =============================================================================
// Greet Tests
// =============================================================================

#[tokio::test]
async fn test_greet_without_listeners() {
    let (mut client, broadcaster, shutdown) = setup_test_server().await;

    assert_eq!(greet(&mut client, "Ada").await, "Hello, Ada!");
    assert_eq!(greet(&mut client, "").await, "Hello, !");
    assert_eq!(broadcaster.stats().submitted, 2);

    shutdown.cancel();
}

#[tokio::test]
async fn test_greet_after_close_still_answers() {
    let (mut client, broadcaster, shutdown) = setup_test_server().await;
    broadcaster.close();

    assert_eq!(greet(&mut client, "Ada").await, "Hello, Ada!");
    assert_eq!(broadcaster.stats().submitted, 0);

    shutdown.cancel();
}

// =============================================================================
// GreetStream Tests
// =============================================================================

#[tokio::test]
async fn test_stream_receives_names_in_order() {
    let (mut client, broadcaster, shutdown) = setup_test_server().await;

    let mut stream = client
        .greet_stream(Request::new(GreetStreamRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(broadcaster.subscriber_count(), 1);

    for name in ["Ada", "Grace", "Barbara"] {
        greet(&mut client, name).await;
    }

    for expected in ["Ada", "Grace", "Barbara"] {
        let msg = timeout(Duration::from_secs(2), stream.message())
            .await
            .expect("timed out waiting for name")
            .unwrap()
            .expect("stream ended early");
        assert_eq!(msg.name, expected);
    }

    shutdown.cancel();
}

#[tokio::test]
async fn test_every_listener_receives_each_name() {
    let (mut client, broadcaster, shutdown) = setup_test_server().await;

    let mut first = client
        .greet_stream(Request::new(GreetStreamRequest {}))
        .await
        .unwrap()
        .into_inner();
    let mut second = client
        .greet_stream(Request::new(GreetStreamRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(broadcaster.subscriber_count(), 2);

    greet(&mut client, "Ada").await;

    for stream in [&mut first, &mut second] {
        let msg = timeout(Duration::from_secs(2), stream.message())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(msg.name, "Ada");
    }

    shutdown.cancel();
}

#[tokio::test]
async fn test_listener_only_sees_names_after_joining() {
    let (mut client, _broadcaster, shutdown) = setup_test_server().await;

    greet(&mut client, "before").await;

    let mut stream = client
        .greet_stream(Request::new(GreetStreamRequest {}))
        .await
        .unwrap()
        .into_inner();
    greet(&mut client, "after").await;

    let msg = timeout(Duration::from_secs(2), stream.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(msg.name, "after");

    shutdown.cancel();
}

#[tokio::test]
async fn test_cancelled_stream_unregisters() {
    let (mut client, broadcaster, shutdown) = setup_test_server().await;

    let stream = client
        .greet_stream(Request::new(GreetStreamRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(broadcaster.subscriber_count(), 1);

    drop(stream);
    wait_for_subscribers(&broadcaster, 0).await;

    // Later greets still succeed with nobody listening.
    assert_eq!(greet(&mut client, "Ada").await, "Hello, Ada!");

    shutdown.cancel();
}

#[tokio::test]
async fn test_close_ends_streams_cleanly() {
    let (mut client, broadcaster, shutdown) = setup_test_server().await;

    let mut stream = client
        .greet_stream(Request::new(GreetStreamRequest {}))
        .await
        .unwrap()
        .into_inner();

    greet(&mut client, "Ada").await;
    broadcaster.close();

    let msg = timeout(Duration::from_secs(2), stream.message())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(msg.name, "Ada");

    let end = timeout(Duration::from_secs(2), stream.message())
        .await
        .unwrap()
        .unwrap();
    assert!(end.is_none());

    shutdown.cancel();
}

#[tokio::test]
async fn test_stream_rejected_after_close() {
    let (mut client, broadcaster, shutdown) = setup_test_server().await;
    broadcaster.close();

    let status = client
        .greet_stream(Request::new(GreetStreamRequest {}))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::Unavailable);

    shutdown.cancel();
}

#[tokio::test]
async fn test_unread_stream_drops_past_subscriber_capacity() {
    let (addr, broadcaster, shutdown) = start_server(BroadcastConfig {
        subscriber_capacity: 2,
    })
    .await;

    // A listener on its own connection with a tiny receive window, so the
    // transport cannot soak up names it never reads.
    let listener_channel = Endpoint::from_shared(format!("http://{addr}"))
        .unwrap()
        .initial_stream_window_size(16_u32)
        .connect()
        .await
        .unwrap();
    let _stream = GreetServiceClient::new(listener_channel)
        .greet_stream(Request::new(GreetStreamRequest {}))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(broadcaster.subscriber_count(), 1);

    let mut client = GreetServiceClient::connect(format!("http://{addr}"))
        .await
        .unwrap();
    for i in 0..40 {
        greet(&mut client, &format!("name-{i}")).await;
    }

    let stats = broadcaster.stats();
    assert_eq!(stats.submitted, 40);
    assert_eq!(stats.delivered + stats.dropped, 40);
    assert!(stats.dropped >= 30, "expected drops near capacity, got {stats:?}");

    shutdown.cancel();
}
