use super::mock::ScriptedTransport;
use super::*;
use crate::protocol::Approach;
use serde_json::json;

fn config(max_attempts: i64) -> ConnectionConfig {
    ConnectionConfig {
        url: "ws://producer.test:8765".to_string(),
        retry_delay_seconds: 3.0,
        connect_timeout_seconds: 10.0,
        max_reconnect_attempts: max_attempts,
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn vehicles_frame(ids: &[&str]) -> serde_json::Value {
    let vehicles: Vec<_> = ids
        .iter()
        .map(|id| json!({"id": id, "x": 500.0, "y": 500.0}))
        .collect();
    json!({"type": "vehicle_update", "sim_time": 1.0, "vehicles": vehicles})
}

fn connected(max_attempts: i64) -> (
    ConnectionManager<ScriptedTransport>,
    mpsc::UnboundedReceiver<ConnectionEvent>,
    ScriptedTransport,
) {
    let transport = ScriptedTransport::new();
    transport.on_connect(vec![TransportEvent::Opened]);
    let (mut manager, mut rx) = ConnectionManager::new(config(max_attempts), transport.clone());
    manager.poll(0.0);
    assert_eq!(drain(&mut rx), vec![ConnectionEvent::Connected]);
    (manager, rx, transport)
}

#[test]
fn test_starts_disconnected_and_connects_on_first_poll() {
    let transport = ScriptedTransport::new();
    transport.on_connect(vec![TransportEvent::Opened]);
    let (mut manager, mut rx) = ConnectionManager::new(config(-1), transport.clone());

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(transport.connect_count(), 0);

    manager.poll(0.016);

    assert!(manager.is_connected());
    assert_eq!(manager.attempts(), 0);
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(drain(&mut rx), vec![ConnectionEvent::Connected]);
}

#[test]
fn test_stays_connecting_until_opened() {
    let transport = ScriptedTransport::new();
    let (mut manager, mut rx) = ConnectionManager::new(config(-1), transport.clone());

    manager.poll(0.0);
    assert_eq!(manager.state(), ConnectionState::Connecting);
    assert_eq!(manager.attempts(), 1);

    transport.push(TransportEvent::Opened);
    manager.poll(0.5);
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(drain(&mut rx), vec![ConnectionEvent::Connected]);
}

#[test]
fn test_messages_drained_in_arrival_order() {
    let (mut manager, mut rx, transport) = connected(-1);

    transport.push_json(vehicles_frame(&["a"]));
    transport.push_json(json!({"type": "sim_complete", "total_arrived": 10, "avg_wait": 2.5, "total_reward": -3.0}));
    transport.push_json(vehicles_frame(&["a", "b"]));

    manager.poll(0.016);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 3);
    match &events[0] {
        ConnectionEvent::Snapshot(s) => assert_eq!(s.entities.len(), 1),
        other => panic!("unexpected {:?}", other),
    }
    assert!(matches!(events[1], ConnectionEvent::RunCompleted(_)));
    match &events[2] {
        ConnectionEvent::Snapshot(s) => assert_eq!(s.entities.len(), 2),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(manager.stats().messages_received, 3);
    assert_eq!(manager.stats().snapshots, 2);
}

#[test]
fn test_bad_messages_counted_without_closing() {
    let (mut manager, mut rx, transport) = connected(-1);

    transport.push(TransportEvent::Text("{not json".to_string()));
    transport.push(TransportEvent::Text("[1, 2]".to_string()));
    transport.push_json(json!({"type": "telemetry", "value": 1}));
    transport.push_json(json!({"no_type": true}));
    transport.push(TransportEvent::Binary(vec![0xff, 0xfe]));
    transport.push_json(vehicles_frame(&["a"]));

    manager.poll(0.016);

    assert!(manager.is_connected());
    let stats = manager.stats();
    assert_eq!(stats.parse_faults, 3);
    assert_eq!(stats.protocol_faults, 2);
    assert_eq!(stats.messages_received, 6);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ConnectionEvent::Snapshot(_)));
}

#[test]
fn test_binary_utf8_frames_are_decoded() {
    let (mut manager, mut rx, transport) = connected(-1);

    let bytes = vehicles_frame(&["bin"]).to_string().into_bytes();
    transport.push(TransportEvent::Binary(bytes));
    manager.poll(0.0);

    match drain(&mut rx).as_slice() {
        [ConnectionEvent::Snapshot(s)] => assert_eq!(s.entities[0].id, "bin"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_messages_before_close_are_processed() {
    let (mut manager, mut rx, transport) = connected(-1);

    transport.push_json(vehicles_frame(&["a"]));
    transport.push(TransportEvent::Closed(Some("server shutdown".to_string())));

    manager.poll(0.016);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], ConnectionEvent::Snapshot(_)));
    assert_eq!(events[1], ConnectionEvent::Disconnected);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[test]
fn test_single_disconnected_per_loss() {
    let (mut manager, mut rx, transport) = connected(-1);

    transport.push(TransportEvent::Failed("reset by peer".to_string()));
    manager.poll(0.0);

    // Reconnect attempts keep failing; none of them report Disconnected again
    for _ in 0..3 {
        transport.on_connect(vec![TransportEvent::Failed("refused".to_string())]);
        manager.poll(3.0);
    }

    let events = drain(&mut rx);
    assert_eq!(events, vec![ConnectionEvent::Disconnected]);
    assert_eq!(manager.attempts(), 3);
}

#[test]
fn test_retry_waits_for_delay() {
    let transport = ScriptedTransport::new();
    transport.on_connect(vec![TransportEvent::Failed("refused".to_string())]);
    let (mut manager, _rx) = ConnectionManager::new(config(-1), transport.clone());

    manager.poll(0.0);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(transport.connect_count(), 1);

    manager.poll(1.0);
    manager.poll(1.0);
    assert_eq!(transport.connect_count(), 1);

    transport.on_connect(vec![TransportEvent::Opened]);
    manager.poll(1.0);
    assert_eq!(transport.connect_count(), 2);
    assert!(manager.is_connected());
}

#[test]
fn test_gives_up_exactly_once() {
    let transport = ScriptedTransport::new();
    let (mut manager, mut rx) = ConnectionManager::new(config(3), transport.clone());

    for _ in 0..10 {
        transport.on_connect(vec![TransportEvent::Failed("refused".to_string())]);
        manager.poll(5.0);
    }

    assert_eq!(transport.connect_count(), 3);
    assert!(manager.has_given_up());
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(drain(&mut rx), vec![ConnectionEvent::GaveUp { attempts: 3 }]);
}

#[test]
fn test_zero_attempts_never_connects() {
    let transport = ScriptedTransport::new();
    let (mut manager, mut rx) = ConnectionManager::new(config(0), transport.clone());

    manager.poll(0.0);
    manager.poll(10.0);

    assert_eq!(transport.connect_count(), 0);
    assert_eq!(drain(&mut rx), vec![ConnectionEvent::GaveUp { attempts: 0 }]);
}

#[test]
fn test_unlimited_attempts_keep_retrying() {
    let transport = ScriptedTransport::new();
    let (mut manager, mut rx) = ConnectionManager::new(config(-1), transport.clone());

    for _ in 0..50 {
        transport.on_connect(vec![TransportEvent::Failed("refused".to_string())]);
        manager.poll(3.0);
    }

    assert_eq!(transport.connect_count(), 50);
    assert!(!manager.has_given_up());
    assert!(drain(&mut rx).is_empty());
}

#[test]
fn test_successful_open_resets_attempt_count() {
    let transport = ScriptedTransport::new();
    let (mut manager, mut rx) = ConnectionManager::new(config(2), transport.clone());

    transport.on_connect(vec![TransportEvent::Failed("refused".to_string())]);
    manager.poll(0.0);
    assert_eq!(manager.attempts(), 1);

    transport.on_connect(vec![TransportEvent::Opened]);
    manager.poll(3.0);
    assert!(manager.is_connected());
    assert_eq!(manager.attempts(), 0);

    // A fresh loss gets the full budget again
    transport.push(TransportEvent::Closed(None));
    manager.poll(0.0);
    transport.on_connect(vec![TransportEvent::Failed("refused".to_string())]);
    manager.poll(3.0);

    assert!(!manager.has_given_up());
    assert_eq!(
        drain(&mut rx),
        vec![ConnectionEvent::Connected, ConnectionEvent::Disconnected]
    );
}

#[test]
fn test_connect_timeout_counts_as_failure() {
    let transport = ScriptedTransport::new();
    let (mut manager, _rx) = ConnectionManager::new(config(-1), transport.clone());

    manager.poll(0.0);
    manager.poll(6.0);
    assert_eq!(manager.state(), ConnectionState::Connecting);

    manager.poll(4.0);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(transport.closes() >= 1);

    manager.poll(3.0);
    assert_eq!(transport.connect_count(), 2);
}

#[test]
fn test_timed_out_attempts_spend_retry_budget() {
    let transport = ScriptedTransport::new();
    let (mut manager, mut rx) = ConnectionManager::new(config(2), transport.clone());

    // Attempt 1 never opens
    manager.poll(0.0);
    manager.poll(10.0);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(!manager.has_given_up());

    // Attempt 2 never opens either
    manager.poll(3.0);
    assert_eq!(manager.state(), ConnectionState::Connecting);
    manager.poll(10.0);
    assert!(manager.has_given_up());

    for _ in 0..5 {
        manager.poll(10.0);
    }

    assert_eq!(transport.connect_count(), 2);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(drain(&mut rx), vec![ConnectionEvent::GaveUp { attempts: 2 }]);
}

#[test]
fn test_send_command_when_disconnected_is_dropped() {
    let transport = ScriptedTransport::new();
    let (mut manager, _rx) = ConnectionManager::new(config(-1), transport.clone());

    manager.send_command(&ClientCommand::ForceGreen {
        approach: Approach::North,
    });

    assert!(transport.sent().is_empty());
    assert_eq!(manager.stats().commands_dropped, 1);
    assert_eq!(manager.stats().commands_sent, 0);
}

#[test]
fn test_send_command_when_connected() {
    let (mut manager, _rx, transport) = connected(-1);

    manager.send_command(&ClientCommand::ForceGreen {
        approach: Approach::West,
    });

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    let value: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(value, json!({"action": "force_green", "approach": "west"}));
    assert_eq!(manager.stats().commands_sent, 1);
}

#[test]
fn test_send_failure_counts_as_dropped() {
    let (mut manager, _rx, transport) = connected(-1);
    transport.reject_sends();

    manager.send_command(&ClientCommand::ForceGreen {
        approach: Approach::East,
    });

    assert!(manager.is_connected());
    assert_eq!(manager.stats().commands_dropped, 1);
}

#[test]
fn test_restart_clears_stats() {
    let (mut manager, mut rx, transport) = connected(-1);

    transport.push_json(vehicles_frame(&["a"]));
    transport.push(TransportEvent::Text("garbage".to_string()));
    manager.poll(0.0);
    assert_eq!(manager.stats().snapshots, 1);
    assert_eq!(manager.stats().parse_faults, 1);

    transport.push_json(json!({"type": "sim_restart", "run": 2, "seed": 99}));
    manager.poll(0.0);

    assert_eq!(manager.stats(), &ConnectionStats::default());
    let events = drain(&mut rx);
    assert_eq!(
        events.last(),
        Some(&ConnectionEvent::RunRestarted(RestartInfo { run: 2, seed: 99 }))
    );
}

#[test]
fn test_reset_clears_give_up() {
    let transport = ScriptedTransport::new();
    let (mut manager, mut rx) = ConnectionManager::new(config(1), transport.clone());

    transport.on_connect(vec![TransportEvent::Failed("refused".to_string())]);
    manager.poll(0.0);
    assert!(manager.has_given_up());

    manager.reset();
    assert!(!manager.has_given_up());
    assert_eq!(manager.attempts(), 0);

    transport.on_connect(vec![TransportEvent::Opened]);
    manager.poll(0.0);
    assert!(manager.is_connected());

    assert_eq!(
        drain(&mut rx),
        vec![
            ConnectionEvent::GaveUp { attempts: 1 },
            ConnectionEvent::Connected
        ]
    );
}
