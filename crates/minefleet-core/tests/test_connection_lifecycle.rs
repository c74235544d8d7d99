//! Integration tests for the connection lifecycle.
//!
//! Drives `ConnectionManager` against the mock session factory with a
//! manual clock, so backoff and keep-alive schedules are exact.

use minefleet_core::clock::ManualClock;
use minefleet_core::connection::{ConnectionEvent, ConnectionManager, Lifecycle};
use minefleet_core::ports::{ConnectParams, MockSessionFactory, SessionEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

struct Fixture {
    cm: ConnectionManager,
    factory: MockSessionFactory,
    clock: ManualClock,
    events: UnboundedReceiver<ConnectionEvent>,
}

fn fixture() -> Fixture {
    let factory = MockSessionFactory::new();
    let clock = ManualClock::new();
    let mut cm = ConnectionManager::new(
        ConnectParams::default(),
        Box::new(factory.clone()),
        Arc::new(clock.clone()),
    );
    let events = cm.subscribe();
    Fixture {
        cm,
        factory,
        clock,
        events,
    }
}

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

fn drain(rx: &mut UnboundedReceiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

fn reconnect_delays(events: &[ConnectionEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            ConnectionEvent::Reconnecting { delay_ms, .. } => Some(*delay_ms),
            _ => None,
        })
        .collect()
}

#[test]
fn test_three_failures_back_off_then_give_up_once() {
    let mut f = fixture();
    f.factory.fail_next(3, "connection refused");

    f.cm.auto_reconnect(3);
    assert_eq!(f.cm.next_timer_deadline(), Some(ms(1000)));

    f.clock.set(ms(1000));
    f.cm.poll();
    assert_eq!(f.cm.retry_count(), 1);
    assert_eq!(f.cm.next_timer_deadline(), Some(ms(3000)));

    f.clock.set(ms(3000));
    f.cm.poll();
    assert_eq!(f.cm.retry_count(), 2);
    assert_eq!(f.cm.next_timer_deadline(), Some(ms(7000)));

    f.clock.set(ms(7000));
    f.cm.poll();

    let events = drain(&mut f.events);
    assert_eq!(reconnect_delays(&events), vec![1000, 2000, 4000]);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ConnectionEvent::ReconnectFailed { .. }))
            .count(),
        1
    );
    assert_eq!(
        events.first(),
        Some(&ConnectionEvent::Reconnecting {
            attempt: 1,
            max_retries: 3,
            delay_ms: 1000
        })
    );
    assert_eq!(f.cm.retry_count(), 0);
    assert_eq!(f.cm.lifecycle(), Lifecycle::Disconnected);
    assert_eq!(f.factory.connect_count(), 3);
    assert_eq!(f.cm.next_timer_deadline(), None);
}

#[test]
fn test_clock_jump_replays_whole_cycle_in_order() {
    let mut f = fixture();
    f.factory.fail_next(3, "connection refused");

    f.cm.auto_reconnect(3);
    f.clock.set(ms(60_000));
    f.cm.poll();

    let events = drain(&mut f.events);
    assert_eq!(reconnect_delays(&events), vec![1000, 2000, 4000]);
    assert!(matches!(
        events.last(),
        Some(ConnectionEvent::ReconnectFailed { error }) if error.contains("connection refused")
    ));
}

#[test]
fn test_cycle_can_restart_after_giving_up() {
    let mut f = fixture();
    f.factory.fail_next(2, "down");

    f.cm.auto_reconnect(2);
    f.clock.set(ms(10_000));
    f.cm.poll();
    drain(&mut f.events);

    f.cm.auto_reconnect(2);
    assert_eq!(
        drain(&mut f.events),
        vec![ConnectionEvent::Reconnecting {
            attempt: 1,
            max_retries: 2,
            delay_ms: 1000
        }]
    );
    f.clock.advance(ms(1000));
    f.cm.poll();
    assert_eq!(f.cm.lifecycle(), Lifecycle::Connected);
}

#[test]
fn test_successful_reconnect_resets_counter() {
    let mut f = fixture();
    f.factory.fail_next(1, "busy");

    f.cm.auto_reconnect(5);
    f.clock.set(ms(1000));
    f.cm.poll();
    assert_eq!(f.cm.retry_count(), 1);
    assert_eq!(f.cm.lifecycle(), Lifecycle::Reconnecting);

    f.clock.set(ms(3000));
    f.cm.poll();
    assert_eq!(f.cm.retry_count(), 0);
    assert_eq!(f.cm.lifecycle(), Lifecycle::Connected);
    assert_eq!(
        drain(&mut f.events).last(),
        Some(&ConnectionEvent::Connected)
    );
}

#[test]
fn test_ping_timeout_disconnects_once_and_reconnects() {
    let mut f = fixture();
    f.cm.connect().unwrap();
    f.cm.keep_alive(ms(1000));
    drain(&mut f.events);

    f.clock.set(ms(2100));
    f.cm.poll();
    assert!(drain(&mut f.events).is_empty());
    assert!(f.cm.is_connected());

    f.clock.set(ms(3000));
    f.cm.poll();
    let events = drain(&mut f.events);
    assert_eq!(
        events,
        vec![
            ConnectionEvent::Disconnected {
                reason: Some("ping timeout".to_string())
            },
            ConnectionEvent::Reconnecting {
                attempt: 1,
                max_retries: 5,
                delay_ms: 1000
            },
        ]
    );
    let first = f.factory.sessions()[0].clone();
    assert!(first.is_closed());

    f.clock.set(ms(4000));
    f.cm.poll();
    assert_eq!(f.factory.connect_count(), 2);
    assert_eq!(drain(&mut f.events), vec![ConnectionEvent::Connected]);
}

#[test]
fn test_heartbeats_keep_session_alive() {
    let mut f = fixture();
    f.cm.connect().unwrap();
    f.cm.keep_alive(ms(1000));
    let session = f.factory.last_session().unwrap();

    for _ in 0..20 {
        f.clock.advance(ms(500));
        session.emit(SessionEvent::Heartbeat);
        f.cm.poll();
    }

    assert!(f.cm.is_connected());
    assert!(
        drain(&mut f.events)
            .iter()
            .all(|e| !matches!(e, ConnectionEvent::Disconnected { .. }))
    );
}

#[test]
fn test_session_end_events_trigger_reconnect() {
    let cases = [
        (SessionEvent::Ended, "server ended connection"),
        (
            SessionEvent::Errored {
                message: "socket reset".to_string(),
            },
            "connection error: socket reset",
        ),
        (SessionEvent::Closed, "connection closed"),
    ];

    for (event, reason) in cases {
        let mut f = fixture();
        f.cm.connect().unwrap();
        drain(&mut f.events);
        let session = f.factory.last_session().unwrap();

        session.emit(event);
        f.cm.poll();

        assert!(session.is_closed());
        assert!(session.subscriptions().is_empty());
        assert!(!f.cm.command_link().is_attached());
        assert_eq!(
            drain(&mut f.events),
            vec![
                ConnectionEvent::Disconnected {
                    reason: Some(reason.to_string())
                },
                ConnectionEvent::Reconnecting {
                    attempt: 1,
                    max_retries: 5,
                    delay_ms: 1000
                },
            ]
        );
    }
}

#[test]
fn test_disconnect_cancels_pending_reconnect() {
    let mut f = fixture();
    f.cm.auto_reconnect(5);
    f.cm.disconnect(None);

    f.clock.set(ms(60_000));
    f.cm.poll();
    assert_eq!(f.factory.connect_count(), 0);
    assert_eq!(f.cm.lifecycle(), Lifecycle::Disconnected);
    assert_eq!(
        drain(&mut f.events).last(),
        Some(&ConnectionEvent::Disconnected { reason: None })
    );
}

#[test]
fn test_manual_connect_during_backoff_wins() {
    let mut f = fixture();
    f.cm.auto_reconnect(5);
    f.cm.connect().unwrap();

    f.clock.set(ms(1000));
    f.cm.poll();
    assert_eq!(f.factory.connect_count(), 1);
    assert_eq!(f.cm.retry_count(), 0);
    assert_eq!(f.cm.lifecycle(), Lifecycle::Connected);
}

#[test]
fn test_configured_backoff_is_used() {
    let factory = MockSessionFactory::new();
    let clock = ManualClock::new();
    let mut cm = ConnectionManager::new(
        ConnectParams::default(),
        Box::new(factory.clone()),
        Arc::new(clock.clone()),
    )
    .with_backoff(ms(250), ms(600));
    let mut events = cm.subscribe();
    factory.fail_next(4, "nope");

    cm.auto_reconnect(4);
    clock.set(ms(60_000));
    cm.poll();

    assert_eq!(reconnect_delays(&drain(&mut events)), vec![250, 500, 600, 600]);
}
