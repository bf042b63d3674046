//! End-to-end tests for the auto-reconnecting client.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use metronome::client::{Client, ClientConfig, ClientError, ClientEvent, ConnectOutcome};

mod common;

async fn next_event(events: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a client event")
        .expect("event channel closed")
}

fn client_config(addr: std::net::SocketAddr) -> ClientConfig {
    ClientConfig::parse(&common::stats_url(addr))
        .unwrap()
        .with_reconnect_interval(Duration::from_millis(100))
}

#[tokio::test]
async fn test_connect_receive_and_disconnect() {
    let service = common::start_service(common::test_config()).await;
    let (client, mut events) = Client::spawn(client_config(service.local_addr()));

    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    assert_eq!(next_event(&mut events).await, ClientEvent::Incoming("{}".into()));
    assert!(client.is_connected().await);
    assert_eq!(client.connect_once().await.unwrap(), ConnectOutcome::AlreadyConnected);

    service
        .hub()
        .publish(metronome::wire::Frame::from_static(r#"{"metrics":{}}"#))
        .await
        .unwrap();
    assert_eq!(
        next_event(&mut events).await,
        ClientEvent::Incoming(r#"{"metrics":{}}"#.into())
    );

    service.stop().await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Disconnected);

    client.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_once_hub_appears() {
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let (client, mut events) = Client::spawn(client_config(addr));

    // Nothing listens yet: attempts fail quietly.
    let quiet = tokio::time::timeout(Duration::from_millis(350), events.recv()).await;
    assert!(quiet.is_err(), "unexpected event before the hub started");
    assert!(!client.is_connected().await);

    let mut config = common::test_config();
    config.server.bind_address = addr.to_string();
    let service = common::start_service(config).await;

    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    assert_eq!(next_event(&mut events).await, ClientEvent::Incoming("{}".into()));

    client.shutdown().await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Disconnected);
    service.stop().await;
}

#[tokio::test]
async fn test_rejected_credentials_surface_status() {
    let mut config = common::test_config();
    config.server.username = "ops".into();
    config.server.password = "hunter2".into();
    let service = common::start_service(config).await;

    let (anonymous, _events) = Client::spawn(client_config(service.local_addr()));
    match anonymous.connect_once().await {
        Err(ClientError::Rejected(401)) => {}
        other => panic!("expected 401 rejection, got {other:?}"),
    }
    anonymous.shutdown().await;

    let (wrong, _events) = Client::spawn(
        client_config(service.local_addr()).with_credentials("ops", "letmein"),
    );
    match wrong.connect_once().await {
        Err(ClientError::Rejected(403)) => {}
        other => panic!("expected 403 rejection, got {other:?}"),
    }
    wrong.shutdown().await;

    let (authorized, mut events) = Client::spawn(
        client_config(service.local_addr()).with_credentials("ops", "hunter2"),
    );
    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    authorized.shutdown().await;

    service.stop().await;
}

#[tokio::test]
async fn test_dropping_receiver_stops_client() {
    let service = common::start_service(common::test_config()).await;
    let (client, events) = Client::spawn(client_config(service.local_addr()));
    drop(events);

    // The loop notices the closed channel and exits on its own.
    tokio::time::timeout(Duration::from_secs(5), client.shutdown())
        .await
        .unwrap();
    service.stop().await;
}

#[tokio::test]
async fn test_shutdown_with_undrained_events() {
    let service = common::start_service(common::test_config()).await;
    let mut config = client_config(service.local_addr());
    config.event_capacity = 1;
    let (client, mut events) = Client::spawn(config);

    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    for round in 0..3 {
        let frame = format!(r#"{{"metrics":{{"round":{round}}}}}"#);
        service
            .hub()
            .publish(metronome::wire::Frame::from(frame))
            .await
            .unwrap();
    }
    // Let the inbound pump block on the full event channel.
    tokio::time::sleep(Duration::from_millis(200)).await;

    tokio::time::timeout(Duration::from_secs(3), client.shutdown())
        .await
        .expect("shutdown blocked on a full event channel");
    service.stop().await;
}

#[tokio::test]
async fn test_reconnects_after_hub_restart() {
    let service = common::start_service(common::test_config()).await;
    let addr = service.local_addr();
    let (client, mut events) = Client::spawn(client_config(addr));

    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    assert_eq!(next_event(&mut events).await, ClientEvent::Incoming("{}".into()));

    service.stop().await;
    assert_eq!(next_event(&mut events).await, ClientEvent::Disconnected);
    assert!(!client.is_connected().await);

    let mut config = common::test_config();
    config.server.bind_address = addr.to_string();
    let restarted = common::start_service(config).await;

    assert_eq!(next_event(&mut events).await, ClientEvent::Connected);
    assert_eq!(next_event(&mut events).await, ClientEvent::Incoming("{}".into()));
    assert!(client.is_connected().await);

    client.shutdown().await;
    restarted.stop().await;
}
