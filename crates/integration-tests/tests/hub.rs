//! Notification hub: registration, broadcast, eviction and the reader loop.
//!
//! Run with: cargo test -p widget-store-integration-tests --test hub

#![allow(clippy::unwrap_used)]

use axum::extract::ws::Message;

use widget_store_api::hub::{Hub, HubEvent, HubHandle, ServerMessage, read_loop};
use widget_store_core::UserId;
use widget_store_integration_tests::{RecordingSink, SinkProbe};

async fn connect(hub: &HubHandle) -> (widget_store_api::hub::ConnectionId, SinkProbe) {
    let (sink, probe) = RecordingSink::pair();
    let id = hub
        .register(Box::new(sink), Some("test".to_owned()))
        .await
        .unwrap()
        .expect("connection should be accepted");
    (id, probe)
}

fn logout(user_id: i32) -> ServerMessage {
    HubEvent::UserDeleted {
        user_id: UserId::new(user_id),
    }
    .to_message()
}

#[tokio::test]
async fn test_registration_is_acknowledged() {
    let (hub, _task) = Hub::spawn();

    let (_, probe) = connect(&hub).await;

    assert_eq!(probe.messages(), vec![ServerMessage::connected()]);
    assert_eq!(hub.connection_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_failed_acknowledgement_rejects_connection() {
    let (hub, _task) = Hub::spawn();
    let (sink, probe) = RecordingSink::failing_after(0);

    let id = hub.register(Box::new(sink), None).await.unwrap();

    assert!(id.is_none());
    assert!(probe.is_closed());
    assert_eq!(hub.connection_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_publish_reaches_every_connection() {
    let (hub, _task) = Hub::spawn();
    let (_, a) = connect(&hub).await;
    let (_, b) = connect(&hub).await;

    hub.publish(HubEvent::UserDeleted {
        user_id: UserId::new(9),
    })
    .unwrap();
    // Commands are processed in order, so this waits for the broadcast.
    assert_eq!(hub.connection_count().await.unwrap(), 2);

    for probe in [a, b] {
        assert_eq!(
            probe.messages(),
            vec![ServerMessage::connected(), logout(9)]
        );
    }
}

#[tokio::test]
async fn test_failed_write_evicts_only_that_connection() {
    let (hub, _task) = Hub::spawn();
    let (healthy_id, healthy) = connect(&hub).await;
    let (sink, broken) = RecordingSink::failing_after(1);
    hub.register(Box::new(sink), None).await.unwrap().unwrap();
    assert_eq!(hub.connection_count().await.unwrap(), 2);

    hub.publish(HubEvent::UserDeleted {
        user_id: UserId::new(4),
    })
    .unwrap();

    assert_eq!(hub.connection_count().await.unwrap(), 1);
    assert!(broken.is_closed());
    assert!(!healthy.is_closed());
    assert_eq!(healthy.messages().last(), Some(&logout(4)));

    hub.unregister(healthy_id).unwrap();
    assert_eq!(hub.connection_count().await.unwrap(), 0);
    assert!(healthy.is_closed());
}

#[tokio::test]
async fn test_unregister_unknown_connection_is_harmless() {
    let (hub, _task) = Hub::spawn();
    let (id, _) = connect(&hub).await;

    hub.unregister(id).unwrap();
    hub.unregister(id).unwrap();

    assert_eq!(hub.connection_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_read_loop_forwards_actions_and_unregisters() {
    let (hub, _task) = Hub::spawn();
    let (reader_id, reader) = connect(&hub).await;
    let (_, other) = connect(&hub).await;

    let frames = futures::stream::iter(vec![
        Ok::<_, String>(Message::Text("not json".into())),
        Ok(Message::Text(r#"{"action":"ping","message":"hi"}"#.into())),
        Ok(Message::Text(r#"{"action":"deleteUser","user_id":5}"#.into())),
        Ok(Message::Binary(vec![1, 2, 3].into())),
    ]);

    read_loop(reader_id, frames, &hub).await;

    assert_eq!(hub.connection_count().await.unwrap(), 1);
    assert!(reader.is_closed());
    assert_eq!(reader.messages(), vec![ServerMessage::connected(), logout(5)]);
    assert_eq!(other.messages(), vec![ServerMessage::connected(), logout(5)]);
}

#[tokio::test]
async fn test_read_loop_stops_at_close_frame() {
    let (hub, _task) = Hub::spawn();
    let (reader_id, reader) = connect(&hub).await;

    let frames = futures::stream::iter(vec![
        Ok::<_, String>(Message::Close(None)),
        Ok(Message::Text(r#"{"action":"deleteUser","user_id":5}"#.into())),
    ]);

    read_loop(reader_id, frames, &hub).await;

    assert_eq!(hub.connection_count().await.unwrap(), 0);
    assert_eq!(reader.messages(), vec![ServerMessage::connected()]);
}

#[tokio::test]
async fn test_read_error_ends_the_loop() {
    let (hub, _task) = Hub::spawn();
    let (reader_id, reader) = connect(&hub).await;

    let frames = futures::stream::iter(vec![Err::<Message, _>("connection reset".to_owned())]);

    read_loop(reader_id, frames, &hub).await;

    assert_eq!(hub.connection_count().await.unwrap(), 0);
    assert!(reader.is_closed());
}

#[tokio::test]
async fn test_handles_fail_once_dispatcher_is_gone() {
    let (hub, task) = Hub::spawn();
    task.abort();
    let _ = task.await;

    assert!(hub
        .publish(HubEvent::UserDeleted {
            user_id: UserId::new(1),
        })
        .is_err());
    assert!(hub.connection_count().await.is_err());
}
