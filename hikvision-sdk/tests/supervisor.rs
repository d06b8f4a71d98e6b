//! Connection lifecycle against a scripted transport on a paused clock

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use alert_stream::{event_types, ActiveEventTracker, SharedTracker};
use helpers::{
    alert_chunk, frame, offline, send, test_config, wait_until, Call, FakeTransport, RecordingSink,
};
use hikvision_sdk::{
    CameraConfig, ConnectionError, ConnectionStatus, ConnectionSupervisor, LinkState, OfflineDetail,
};
use rstest::rstest;
use tokio::time::sleep;

fn supervisor(
    config: &CameraConfig,
) -> (ConnectionSupervisor, Arc<FakeTransport>, Arc<RecordingSink>, SharedTracker) {
    let transport = FakeTransport::new();
    let sink = RecordingSink::new();
    let tracker = ActiveEventTracker::shared();
    let supervisor = ConnectionSupervisor::new(
        config,
        transport.clone(),
        Arc::clone(&tracker),
        sink.clone(),
    );
    (supervisor, transport, sink, tracker)
}

#[tokio::test(start_paused = true)]
async fn test_alerts_reach_sink_in_order() {
    let (supervisor, transport, sink, tracker) = supervisor(&test_config());
    let feed = transport.push_stream();

    supervisor.start().await.unwrap();
    assert!(supervisor.is_connected());

    send(&feed, alert_chunk(event_types::MOTION, "active", 1));
    send(&feed, alert_chunk(event_types::LINE_CROSSING, "active", 1));
    send(&feed, alert_chunk(event_types::VIDEO_LOSS, "inactive", 0));

    wait_until("activations and clear", || sink.events().len() == 4).await;
    assert_eq!(
        sink.events(),
        vec![
            Call::Activated(event_types::MOTION.to_string()),
            Call::Activated(event_types::LINE_CROSSING.to_string()),
            Call::Deactivated(event_types::MOTION.to_string()),
            Call::Deactivated(event_types::LINE_CROSSING.to_string()),
        ]
    );
    assert!(tracker.lock().is_empty());
    assert_eq!(sink.statuses(), vec![ConnectionStatus::Online]);
}

#[tokio::test(start_paused = true)]
async fn test_stream_drop_reports_offline_once_and_reconnects_per_tick() {
    let (supervisor, transport, sink, _tracker) = supervisor(&test_config());
    let first = transport.push_stream();
    transport.push_unreachable();
    transport.push_unreachable();
    let _second = transport.push_stream();

    supervisor.start().await.unwrap();
    drop(first);
    wait_until("read loop to end", || {
        supervisor.state().link == LinkState::Disconnected
    })
    .await;

    // Heartbeat ticks at 1s and 2s, both attempts fail
    sleep(Duration::from_millis(2400)).await;
    assert_eq!(transport.opens(), 3);
    assert_eq!(supervisor.state().reconnect_attempts, 2);
    assert!(!supervisor.is_connected());

    sleep(Duration::from_secs(1)).await;
    assert_eq!(transport.opens(), 4);
    assert!(supervisor.is_connected());
    assert_eq!(supervisor.state().reconnect_attempts, 0);

    let statuses = sink.statuses();
    assert_eq!(statuses.len(), 3, "{statuses:?}");
    assert!(statuses[0].is_online());
    assert!(offline(OfflineDetail::CommunicationError)(&statuses[1]));
    assert!(statuses[2].is_online());
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_on_start_is_retried() {
    let (supervisor, transport, sink, _tracker) = supervisor(&test_config());
    transport.push_unreachable();
    let _feed = transport.push_stream();

    let err = supervisor.start().await.unwrap_err();
    assert!(matches!(err, ConnectionError::Unreachable(_)));
    assert_eq!(supervisor.state().link, LinkState::Disconnected);

    sleep(Duration::from_millis(1500)).await;
    assert_eq!(transport.opens(), 2);
    assert!(supervisor.is_connected());

    let statuses = sink.statuses();
    assert_eq!(statuses.len(), 2);
    assert!(offline(OfflineDetail::CommunicationError)(&statuses[0]));
    assert!(statuses[1].is_online());
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_handshake_times_out_and_is_retried() {
    let config = test_config();
    let limit = config.connect_timeout;
    let (supervisor, transport, sink, _tracker) = supervisor(&config);
    transport.push_hang();
    let _feed = transport.push_stream();

    // Heartbeat ticks during the hung handshake must not start a second one
    let (result, opens_while_hung) = tokio::join!(supervisor.start(), async {
        sleep(limit - Duration::from_millis(500)).await;
        transport.opens()
    });
    assert!(matches!(result, Err(ConnectionError::Unreachable(_))));
    assert_eq!(opens_while_hung, 1);

    wait_until("reconnect", || supervisor.is_connected()).await;
    assert_eq!(transport.opens(), 2);
    assert_eq!(supervisor.state().reconnect_attempts, 0);

    let statuses = sink.statuses();
    assert_eq!(statuses.len(), 2, "{statuses:?}");
    match &statuses[0] {
        ConnectionStatus::Offline {
            detail: OfflineDetail::CommunicationError,
            reason: Some(reason),
        } => assert!(reason.contains(&format!("{limit:?}")), "{reason}"),
        other => panic!("unexpected status {other:?}"),
    }
    assert!(statuses[1].is_online());
}

#[rstest]
#[case::unauthorized(401)]
#[case::forbidden(403)]
#[case::not_found(404)]
#[tokio::test(start_paused = true)]
async fn test_rejected_handshake_is_not_retried(#[case] status: u16) {
    let (supervisor, transport, sink, _tracker) = supervisor(&test_config());
    transport.push_reject(status);

    let err = supervisor.start().await.unwrap_err();
    assert!(matches!(err, ConnectionError::Rejected { status: s, .. } if s == status));
    assert_eq!(supervisor.state().link, LinkState::Rejected);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.opens(), 1);

    let statuses = sink.statuses();
    assert_eq!(statuses.len(), 1);
    assert!(offline(OfflineDetail::ConfigurationError)(&statuses[0]));
}

#[tokio::test(start_paused = true)]
async fn test_connect_is_noop_while_streaming() {
    let (supervisor, transport, _sink, _tracker) = supervisor(&test_config());
    let _feed = transport.push_stream();

    supervisor.connect().await.unwrap();
    supervisor.connect().await.unwrap();

    assert_eq!(transport.opens(), 1);
    assert!(supervisor.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_read_loop_and_heartbeat() {
    let (supervisor, transport, sink, _tracker) = supervisor(&test_config());
    let feed = transport.push_stream();

    supervisor.start().await.unwrap();
    supervisor.disconnect().await;

    assert_eq!(supervisor.state().link, LinkState::Disconnected);
    assert!(feed.is_closed());

    // Idempotent
    supervisor.disconnect().await;

    sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.opens(), 1);
    assert_eq!(sink.statuses(), vec![ConnectionStatus::Online]);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_chunk_does_not_end_stream() {
    let (supervisor, transport, sink, _tracker) = supervisor(&test_config());
    let feed = transport.push_stream();

    supervisor.start().await.unwrap();
    send(&feed, alert_chunk(event_types::MOTION, "active", 1));
    send(
        &feed,
        frame(b"<EventNotificationAlert><activePostCount>many</activePostCount></EventNotificationAlert>"),
    );
    send(&feed, alert_chunk(event_types::INTRUSION, "active", 1));

    wait_until("second activation", || sink.events().len() == 2).await;
    assert_eq!(
        sink.events(),
        vec![
            Call::Activated(event_types::MOTION.to_string()),
            Call::Activated(event_types::INTRUSION.to_string()),
        ]
    );
    assert!(supervisor.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_active_events_survive_reconnect() {
    let (supervisor, transport, sink, tracker) = supervisor(&test_config());
    let first = transport.push_stream();
    let second = transport.push_stream();

    supervisor.start().await.unwrap();
    send(&first, alert_chunk(event_types::MOTION, "active", 1));
    wait_until("activation", || tracker.lock().contains(event_types::MOTION)).await;

    drop(first);
    wait_until("reconnect", || transport.opens() == 2 && supervisor.is_connected()).await;
    assert!(tracker.lock().contains(event_types::MOTION));

    send(&second, alert_chunk(event_types::VIDEO_LOSS, "inactive", 0));
    wait_until("deactivation", || sink.events().len() == 2).await;
    assert_eq!(
        sink.events(),
        vec![
            Call::Activated(event_types::MOTION.to_string()),
            Call::Deactivated(event_types::MOTION.to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_idle_stream_is_dropped() {
    let config = test_config().with_stream_idle_timeout(Some(Duration::from_secs(2)));
    let (supervisor, transport, sink, _tracker) = supervisor(&config);
    let _feed = transport.push_stream();

    supervisor.start().await.unwrap();
    wait_until("idle timeout", || sink.statuses().len() == 2).await;

    match &sink.statuses()[1] {
        ConnectionStatus::Offline {
            detail: OfflineDetail::CommunicationError,
            reason: Some(reason),
        } => assert!(reason.starts_with("No alert data received"), "{reason}"),
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unaccepted_types_are_ignored() {
    let config = test_config().with_event_types([event_types::MOTION]);
    let (supervisor, transport, sink, tracker) = supervisor(&config);
    let feed = transport.push_stream();

    supervisor.start().await.unwrap();
    send(&feed, alert_chunk(event_types::VIDEO_LOSS, "active", 1));
    send(&feed, alert_chunk(event_types::MOTION, "active", 1));

    wait_until("motion activation", || !sink.events().is_empty()).await;
    assert_eq!(
        sink.events(),
        vec![Call::Activated(event_types::MOTION.to_string())]
    );
    assert_eq!(tracker.lock().active_types(), vec![event_types::MOTION.to_string()]);
}
