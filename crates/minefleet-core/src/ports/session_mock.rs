//! Mock session factory and session for testing.
//!
//! The factory replays a scripted queue of connect outcomes and keeps a
//! handle to every session it opened, so a test can inject events into the
//! live session and inspect what the connection manager did to it.

use crate::error::{FleetError, Result};
use crate::ports::command::{Command, CommandSink};
use crate::ports::command_mock::MockCommandSink;
use crate::ports::session::{
    ConnectParams, Session, SessionEvent, SessionEventKind, SessionFactory, Subscriptions,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct SessionState {
    subscriptions: Subscriptions,
    pending: VecDeque<SessionEvent>,
    closed: bool,
    unsubscribe_calls: usize,
}

/// Mock session backed by shared state.
///
/// Clones observe the same session.
#[derive(Debug, Clone, Default)]
pub struct MockSession {
    state: Arc<Mutex<SessionState>>,
    sink: MockCommandSink,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues an event as if the server had raised it.
    pub fn emit(&self, event: SessionEvent) {
        self.lock().pending.push_back(event);
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Currently subscribed kinds.
    pub fn subscriptions(&self) -> Vec<SessionEventKind> {
        self.lock().subscriptions.kinds()
    }

    /// How many times `unsubscribe_all` was called.
    pub fn unsubscribe_calls(&self) -> usize {
        self.lock().unsubscribe_calls
    }

    /// Commands sent through this session's sink.
    pub fn commands(&self) -> Vec<Command> {
        self.sink.get_history()
    }
}

impl Session for MockSession {
    fn subscribe(&mut self, kind: SessionEventKind) {
        self.lock().subscriptions.add(kind);
    }

    fn unsubscribe_all(&mut self) {
        let mut state = self.lock();
        state.subscriptions.clear();
        state.unsubscribe_calls += 1;
    }

    fn poll_event(&mut self) -> Option<SessionEvent> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        while let Some(event) = state.pending.pop_front() {
            if state.subscriptions.accepts(&event) {
                return Some(event);
            }
        }
        None
    }

    fn command_sink(&self) -> Arc<dyn CommandSink> {
        Arc::new(self.sink.clone())
    }

    fn close(&mut self) {
        self.lock().closed = true;
    }
}

/// Mock session factory with scripted outcomes.
///
/// Each `connect` consumes the next scripted outcome; when the script is
/// empty the connect succeeds.
///
/// # Examples
///
/// ```
/// use minefleet_core::ports::{ConnectParams, MockSessionFactory, SessionFactory};
///
/// let factory = MockSessionFactory::new();
/// factory.push_failure("connection refused");
///
/// assert!(factory.connect(&ConnectParams::default()).is_err());
/// assert!(factory.connect(&ConnectParams::default()).is_ok());
/// assert_eq!(factory.connect_count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockSessionFactory {
    script: Arc<Mutex<VecDeque<std::result::Result<(), String>>>>,
    params: Arc<Mutex<Vec<ConnectParams>>>,
    sessions: Arc<Mutex<Vec<MockSession>>>,
}

impl MockSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the next unscripted connect to fail with `reason`.
    pub fn push_failure(&self, reason: &str) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(reason.to_string()));
    }

    /// Scripts `n` consecutive failures.
    pub fn fail_next(&self, n: usize, reason: &str) {
        for _ in 0..n {
            self.push_failure(reason);
        }
    }

    /// Scripts the next unscripted connect to succeed.
    pub fn push_success(&self) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Ok(()));
    }

    /// Number of connect attempts so far, successful or not.
    pub fn connect_count(&self) -> usize {
        self.params
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Parameters of every connect attempt, in order.
    pub fn get_history(&self) -> Vec<ConnectParams> {
        self.params
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Every session opened so far, oldest first.
    pub fn sessions(&self) -> Vec<MockSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recently opened session.
    pub fn last_session(&self) -> Option<MockSession> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl SessionFactory for MockSessionFactory {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>> {
        self.params
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(params.clone());

        let outcome = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Ok(()));
        outcome.map_err(FleetError::SessionFailed)?;

        let session = MockSession::new();
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session.clone());
        Ok(Box::new(session))
    }
}
