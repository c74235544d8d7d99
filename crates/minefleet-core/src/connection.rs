//! Session lifecycle: connect, disconnect, reconnect with backoff, keep-alive.
//!
//! [`ConnectionManager`] owns the only live session handle for an agent.
//! It never blocks and never spawns: deferred work (reconnect attempts and
//! keep-alive checks) sits in a [`TimerQueue`] and runs when the owner calls
//! [`ConnectionManager::poll`]. Lifecycle notifications go out over
//! unbounded channels handed out by [`ConnectionManager::subscribe`].

use crate::clock::Clock;
use crate::coord::Coord;
use crate::error::Result;
use crate::ports::session::{
    ConnectParams, Session, SessionEvent, SessionEventKind, SessionFactory, SessionLink,
};
use crate::timer::{Fired, TimerId, TimerQueue};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Retry limit used when the manager starts a reconnect cycle on its own.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Keep-alive interval used until [`ConnectionManager::keep_alive`] is called.
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_millis(10_000);

/// Delay before the first reconnect attempt.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1_000);

/// Upper bound on the reconnect delay.
pub const DEFAULT_BACKOFF_CAP: Duration = Duration::from_millis(16_000);

/// Lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConnectionEvent {
    /// A session was established.
    Connected,

    /// The session was torn down.
    Disconnected { reason: Option<String> },

    /// A reconnect attempt was scheduled.
    Reconnecting {
        attempt: u32,
        max_retries: u32,
        delay_ms: u64,
    },

    /// A reconnect cycle gave up.
    ReconnectFailed { error: String },

    /// The server confirmed a block break.
    ExtractionAcknowledged { position: Coord },
}

/// Coarse view of the lifecycle flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Disconnected,
    /// Only held for the duration of a `connect` call. Connecting is
    /// synchronous, so callers of [`ConnectionManager::lifecycle`] see
    /// `Connected`, `Reconnecting` or `Disconnected` once it returns.
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionTimer {
    Reconnect { max_retries: u32 },
    KeepAlive { interval: Duration },
}

/// Owns and supervises one agent's session.
pub struct ConnectionManager {
    params: ConnectParams,
    factory: Box<dyn SessionFactory>,
    clock: Arc<dyn Clock>,
    session: Option<Box<dyn Session>>,
    link: SessionLink,
    timers: TimerQueue<ConnectionTimer>,
    keep_alive_timer: Option<TimerId>,
    reconnect_timer: Option<TimerId>,
    keep_alive_interval: Duration,
    retry_count: u32,
    last_seen: Option<Duration>,
    connecting: bool,
    reconnecting: bool,
    listeners: Vec<UnboundedSender<ConnectionEvent>>,
    backoff_base: Duration,
    backoff_cap: Duration,
    max_retries: u32,
}

impl ConnectionManager {
    /// Creates a disconnected manager.
    ///
    /// # Arguments
    ///
    /// * `params` - Passed to the factory on every connect.
    /// * `factory` - Opens sessions.
    /// * `clock` - Time source for timers and liveness.
    pub fn new(
        params: ConnectParams,
        factory: Box<dyn SessionFactory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            params,
            factory,
            clock,
            session: None,
            link: SessionLink::new(),
            timers: TimerQueue::new(),
            keep_alive_timer: None,
            reconnect_timer: None,
            keep_alive_interval: DEFAULT_KEEP_ALIVE,
            retry_count: 0,
            last_seen: None,
            connecting: false,
            reconnecting: false,
            listeners: Vec::new(),
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_cap: DEFAULT_BACKOFF_CAP,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Sets the reconnect delay schedule.
    #[must_use]
    pub fn with_backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_cap = cap;
        self
    }

    /// Retry limit for reconnect cycles the manager starts itself.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Keep-alive interval applied from the next connect.
    #[must_use]
    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    /// Registers a listener for lifecycle notifications.
    pub fn subscribe(&mut self) -> UnboundedReceiver<ConnectionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push(tx);
        rx
    }

    /// Command sink that follows the live session across reconnects.
    pub fn command_link(&self) -> SessionLink {
        self.link.clone()
    }

    /// Opens a session.
    ///
    /// Does nothing if a connect is in flight or a session is already held.
    ///
    /// # Errors
    ///
    /// Returns the factory's error; the manager stays disconnected.
    #[tracing::instrument(skip_all, fields(username = %self.params.username))]
    pub fn connect(&mut self) -> Result<()> {
        let now = self.clock.now();
        self.connect_at(now)
    }

    /// Tears down the session and timers, then emits `Disconnected`.
    #[tracing::instrument(skip_all, fields(username = %self.params.username))]
    pub fn disconnect(&mut self, reason: Option<&str>) {
        self.cleanup();
        info!(reason = ?reason, "disconnected");
        self.emit(ConnectionEvent::Disconnected {
            reason: reason.map(str::to_string),
        });
    }

    /// Starts a reconnect cycle of at most `max_retries` attempts.
    ///
    /// Does nothing if a cycle is already running. Attempt failures never
    /// reach the caller; they only drive the backoff and, eventually, a
    /// `ReconnectFailed` notification.
    pub fn auto_reconnect(&mut self, max_retries: u32) {
        let now = self.clock.now();
        self.auto_reconnect_at(now, max_retries);
    }

    /// Sets the keep-alive interval and restarts the check if connected.
    pub fn keep_alive(&mut self, interval: Duration) {
        self.keep_alive_interval = interval;
        if self.is_connected() {
            let now = self.clock.now();
            self.start_keep_alive(now);
        }
    }

    /// Processes pending session events, then every timer that is due.
    ///
    /// # Returns
    ///
    /// Number of session events and timer firings handled.
    pub fn poll(&mut self) -> usize {
        let now = self.clock.now();
        let mut handled = self.drain_session(now);
        while let Some(fired) = self.timers.pop_due(now) {
            let at = fired.at;
            self.handle_timer(fired);
            handled += 1 + self.drain_session(at);
        }
        handled
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.connecting {
            Lifecycle::Connecting
        } else if self.session.is_some() {
            Lifecycle::Connected
        } else if self.reconnecting {
            Lifecycle::Reconnecting
        } else {
            Lifecycle::Disconnected
        }
    }

    /// Consecutive failed reconnect attempts in the current cycle.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// When the next timer is due, if any is armed.
    pub fn next_timer_deadline(&self) -> Option<Duration> {
        self.timers.next_deadline()
    }

    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }

    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    /// Reconnect delay after `failures` consecutive failures.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        let factor = 1u32.checked_shl(failures).unwrap_or(u32::MAX);
        self.backoff_base
            .saturating_mul(factor)
            .min(self.backoff_cap)
    }

    fn connect_at(&mut self, now: Duration) -> Result<()> {
        if self.connecting || self.session.is_some() {
            debug!("connect skipped, already connecting or connected");
            return Ok(());
        }

        self.connecting = true;
        let mut session = match self.factory.connect(&self.params) {
            Ok(session) => session,
            Err(e) => {
                self.connecting = false;
                return Err(e);
            }
        };

        for kind in SessionEventKind::ALL {
            session.subscribe(kind);
        }
        self.link.attach(session.command_sink());
        self.session = Some(session);
        self.retry_count = 0;
        self.connecting = false;
        self.last_seen = Some(now);

        info!(host = %self.params.host, port = self.params.port, "connected");
        self.emit(ConnectionEvent::Connected);
        self.start_keep_alive(now);
        Ok(())
    }

    fn auto_reconnect_at(&mut self, now: Duration, max_retries: u32) {
        if self.reconnecting {
            return;
        }
        if let Some(id) = self.reconnect_timer.take() {
            self.timers.cancel(id);
        }

        self.reconnecting = true;
        let delay = self.backoff_delay(self.retry_count);
        let attempt = self.retry_count + 1;
        info!(attempt, max_retries, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        self.emit(ConnectionEvent::Reconnecting {
            attempt,
            max_retries,
            delay_ms: delay.as_millis() as u64,
        });
        self.reconnect_timer = Some(self.timers.arm_once(
            now,
            delay,
            ConnectionTimer::Reconnect { max_retries },
        ));
    }

    fn handle_timer(&mut self, fired: Fired<ConnectionTimer>) {
        match fired.key {
            ConnectionTimer::Reconnect { max_retries } => {
                self.reconnect_timer = None;
                self.attempt_reconnect(fired.at, max_retries);
            }
            ConnectionTimer::KeepAlive { interval } => self.check_liveness(fired.at, interval),
        }
    }

    fn attempt_reconnect(&mut self, at: Duration, max_retries: u32) {
        self.retry_count += 1;
        match self.connect_at(at) {
            Ok(()) => {
                self.reconnecting = false;
                self.retry_count = 0;
            }
            Err(e) => {
                warn!(attempt = self.retry_count, max_retries, error = %e, "reconnect attempt failed");
                self.reconnecting = false;
                if self.retry_count >= max_retries {
                    warn!(max_retries, "giving up on reconnect");
                    self.emit(ConnectionEvent::ReconnectFailed {
                        error: e.to_string(),
                    });
                    self.retry_count = 0;
                } else {
                    self.auto_reconnect_at(at, max_retries);
                }
            }
        }
    }

    fn check_liveness(&mut self, at: Duration, interval: Duration) {
        if self.session.is_none() {
            return;
        }
        let Some(seen) = self.last_seen else {
            return;
        };
        let silent = at.saturating_sub(seen);
        if silent > interval.saturating_mul(2) {
            warn!(silent_ms = silent.as_millis() as u64, "ping timeout");
            self.disconnect(Some("ping timeout"));
            self.auto_reconnect_at(at, self.max_retries);
        }
    }

    fn start_keep_alive(&mut self, now: Duration) {
        if let Some(id) = self.keep_alive_timer.take() {
            self.timers.cancel(id);
        }
        let interval = self.keep_alive_interval;
        self.keep_alive_timer = Some(self.timers.arm_repeating(
            now,
            interval,
            ConnectionTimer::KeepAlive { interval },
        ));
    }

    fn drain_session(&mut self, at: Duration) -> usize {
        let mut handled = 0;
        while let Some(event) = self.session.as_mut().and_then(|s| s.poll_event()) {
            handled += 1;
            self.handle_session_event(at, event);
        }
        handled
    }

    fn handle_session_event(&mut self, at: Duration, event: SessionEvent) {
        match event {
            SessionEvent::Spawn | SessionEvent::Heartbeat => {
                self.last_seen = Some(self.last_seen.map_or(at, |seen| seen.max(at)));
            }
            SessionEvent::Ended => self.session_lost(at, "server ended connection".to_string()),
            SessionEvent::Errored { message } => {
                self.session_lost(at, format!("connection error: {message}"))
            }
            SessionEvent::Closed => self.session_lost(at, "connection closed".to_string()),
            SessionEvent::BlockBroken { position } => {
                self.emit(ConnectionEvent::ExtractionAcknowledged { position });
            }
        }
    }

    fn session_lost(&mut self, at: Duration, reason: String) {
        self.cleanup();
        warn!(reason = %reason, "session lost");
        self.emit(ConnectionEvent::Disconnected {
            reason: Some(reason),
        });
        self.auto_reconnect_at(at, self.max_retries);
    }

    fn cleanup(&mut self) {
        // timers first so nothing fires against a half torn-down session
        if let Some(id) = self.keep_alive_timer.take() {
            self.timers.cancel(id);
        }
        if let Some(id) = self.reconnect_timer.take() {
            self.timers.cancel(id);
        }
        if let Some(mut session) = self.session.take() {
            session.unsubscribe_all();
            session.close();
        }
        self.link.detach();
        self.connecting = false;
        self.reconnecting = false;
    }

    fn emit(&mut self, event: ConnectionEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("params", &self.params)
            .field("lifecycle", &self.lifecycle())
            .field("retry_count", &self.retry_count)
            .field("keep_alive_interval", &self.keep_alive_interval)
            .field("timers", &self.timers.len())
            .finish_non_exhaustive()
    }
}
