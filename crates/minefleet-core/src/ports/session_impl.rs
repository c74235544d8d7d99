//! Offline loopback session.
//!
//! Stands in for a real server when running without a network: the agent
//! spawns immediately, every move is answered with a heartbeat and every
//! block break is acknowledged with a `BlockBroken` event. Used by the CLI
//! simulation and by integration tests that need a session which behaves
//! like a cooperative server.

use crate::error::{FleetError, Result};
use crate::ports::command::{Command, CommandSink};
use crate::ports::session::{
    ConnectParams, Session, SessionEvent, SessionEventKind, SessionFactory, Subscriptions,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Default number of empty polls between unsolicited heartbeats.
pub const DEFAULT_HEARTBEAT_EVERY: u32 = 20;

type EventQueue = Arc<Mutex<VecDeque<SessionEvent>>>;

/// Factory for loopback sessions.
#[derive(Debug, Clone)]
pub struct LoopbackSessionFactory {
    fail_remaining: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
    heartbeat_every: u32,
}

impl LoopbackSessionFactory {
    pub fn new() -> Self {
        Self {
            fail_remaining: Arc::new(AtomicUsize::new(0)),
            attempts: Arc::new(AtomicUsize::new(0)),
            heartbeat_every: DEFAULT_HEARTBEAT_EVERY,
        }
    }

    /// Makes the first `n` connects fail.
    pub fn failing_first(self, n: usize) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Emits a heartbeat every `polls` empty polls. Zero disables them.
    pub fn heartbeat_every(mut self, polls: u32) -> Self {
        self.heartbeat_every = polls;
        self
    }

    /// Number of connect attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for LoopbackSessionFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionFactory for LoopbackSessionFactory {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let failing = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            debug!(attempt, "loopback refusing connection");
            return Err(FleetError::SessionFailed(format!(
                "loopback {}:{} refused connection",
                params.host, params.port
            )));
        }

        info!(attempt, username = %params.username, "loopback session opened");
        let events: EventQueue = Arc::default();
        events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(SessionEvent::Spawn);
        let closed = Arc::new(AtomicBool::new(false));

        Ok(Box::new(LoopbackSession {
            subscriptions: Subscriptions::default(),
            sink: Arc::new(LoopbackSink {
                events: events.clone(),
                closed: closed.clone(),
            }),
            events,
            closed,
            heartbeat_every: self.heartbeat_every,
            idle_polls: 0,
        }))
    }
}

struct LoopbackSession {
    subscriptions: Subscriptions,
    events: EventQueue,
    sink: Arc<LoopbackSink>,
    closed: Arc<AtomicBool>,
    heartbeat_every: u32,
    idle_polls: u32,
}

impl Session for LoopbackSession {
    fn subscribe(&mut self, kind: SessionEventKind) {
        self.subscriptions.add(kind);
    }

    fn unsubscribe_all(&mut self) {
        self.subscriptions.clear();
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }

        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(event) = events.pop_front() {
            if self.subscriptions.accepts(&event) {
                return Some(event);
            }
        }
        drop(events);

        self.idle_polls = self.idle_polls.wrapping_add(1);
        let beat = SessionEvent::Heartbeat;
        if self.heartbeat_every > 0
            && self.idle_polls % self.heartbeat_every == 0
            && self.subscriptions.accepts(&beat)
        {
            return Some(beat);
        }
        None
    }

    fn command_sink(&self) -> Arc<dyn CommandSink> {
        self.sink.clone()
    }

    fn close(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("loopback session closed");
        }
    }
}

struct LoopbackSink {
    events: EventQueue,
    closed: Arc<AtomicBool>,
}

impl CommandSink for LoopbackSink {
    fn send(&self, command: Command) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        let reply = match command {
            Command::Move { .. } => SessionEvent::Heartbeat,
            Command::StartBreak { position, .. } => SessionEvent::BlockBroken { position },
            Command::Chat { message } => {
                info!(target: "minefleet::chat", "{message}");
                return;
            }
        };
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Coord;

    fn open(factory: &LoopbackSessionFactory) -> Box<dyn Session> {
        let mut session = factory.connect(&ConnectParams::default()).unwrap();
        for kind in SessionEventKind::ALL {
            session.subscribe(kind);
        }
        session
    }

    #[test]
    fn test_should_spawn_then_acknowledge_breaks() {
        let factory = LoopbackSessionFactory::new().heartbeat_every(0);
        let mut session = open(&factory);
        assert_eq!(session.poll_event(), Some(SessionEvent::Spawn));

        let target = Coord::new(0, 59, 0);
        session.command_sink().send(Command::StartBreak {
            position: target,
            face: None,
        });
        assert_eq!(
            session.poll_event(),
            Some(SessionEvent::BlockBroken { position: target })
        );
        assert_eq!(session.poll_event(), None);
    }

    #[test]
    fn test_should_fail_first_connects() {
        let factory = LoopbackSessionFactory::new().failing_first(2);
        assert!(factory.connect(&ConnectParams::default()).is_err());
        assert!(factory.connect(&ConnectParams::default()).is_err());
        assert!(factory.connect(&ConnectParams::default()).is_ok());
        assert_eq!(factory.attempts(), 3);
    }

    #[test]
    fn test_should_heartbeat_on_idle_polls() {
        let factory = LoopbackSessionFactory::new().heartbeat_every(3);
        let mut session = open(&factory);
        assert_eq!(session.poll_event(), Some(SessionEvent::Spawn));
        assert_eq!(session.poll_event(), None);
        assert_eq!(session.poll_event(), None);
        assert_eq!(session.poll_event(), Some(SessionEvent::Heartbeat));
    }

    #[test]
    fn test_closed_session_ignores_commands() {
        let factory = LoopbackSessionFactory::new().heartbeat_every(0);
        let mut session = open(&factory);
        let sink = session.command_sink();
        session.close();
        sink.send(Command::Move {
            position: Coord::new(1, 0, 0),
            on_ground: true,
        });
        assert_eq!(session.poll_event(), None);
    }
}
