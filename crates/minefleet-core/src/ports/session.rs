//! Transport session port.
//!
//! A [`SessionFactory`] opens a [`Session`] from [`ConnectParams`]. The
//! session delivers [`SessionEvent`]s for the kinds it was subscribed to and
//! hands out a [`CommandSink`] for outbound commands. Wire encoding lives
//! entirely behind these traits.

use crate::coord::Coord;
use crate::error::Result;
use crate::ports::command::{Command, CommandSink};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

/// Parameters needed to open a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectParams {
    /// Server host name or address.
    pub host: String,

    /// Server port.
    pub port: u16,

    /// Identity the agent logs in as.
    pub username: String,

    /// Skip authentication (anonymous mode).
    pub offline: bool,
}

impl Default for ConnectParams {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 19132,
            username: "minefleet-bot".to_string(),
            offline: true,
        }
    }
}

/// Names of the session events an observer can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    Spawn,
    Heartbeat,
    Ended,
    Errored,
    Closed,
    BlockBroken,
}

impl SessionEventKind {
    /// Every kind, in declaration order.
    pub const ALL: [SessionEventKind; 6] = [
        SessionEventKind::Spawn,
        SessionEventKind::Heartbeat,
        SessionEventKind::Ended,
        SessionEventKind::Errored,
        SessionEventKind::Closed,
        SessionEventKind::BlockBroken,
    ];
}

/// Event raised by a live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// The agent entered the world.
    Spawn,
    /// The server showed signs of life.
    Heartbeat,
    /// The server ended the session.
    Ended,
    /// The transport failed.
    Errored { message: String },
    /// The transport was closed.
    Closed,
    /// A block the agent was breaking is gone.
    BlockBroken { position: Coord },
}

impl SessionEvent {
    pub fn kind(&self) -> SessionEventKind {
        match self {
            SessionEvent::Spawn => SessionEventKind::Spawn,
            SessionEvent::Heartbeat => SessionEventKind::Heartbeat,
            SessionEvent::Ended => SessionEventKind::Ended,
            SessionEvent::Errored { .. } => SessionEventKind::Errored,
            SessionEvent::Closed => SessionEventKind::Closed,
            SessionEvent::BlockBroken { .. } => SessionEventKind::BlockBroken,
        }
    }

    /// Whether the event counts as a liveness signal.
    pub fn is_liveness(&self) -> bool {
        matches!(self, SessionEvent::Spawn | SessionEvent::Heartbeat)
    }
}

/// Live session trait.
///
/// Only events whose kind has been subscribed are returned by
/// [`Session::poll_event`]; others are discarded.
pub trait Session: Send {
    /// Starts delivering events of `kind`.
    fn subscribe(&mut self, kind: SessionEventKind);

    /// Stops delivering every event kind.
    fn unsubscribe_all(&mut self);

    /// Returns the next pending subscribed event, if any.
    fn poll_event(&mut self) -> Option<SessionEvent>;

    /// Capability for sending commands over this session.
    fn command_sink(&self) -> Arc<dyn CommandSink>;

    /// Closes the transport. Idempotent.
    fn close(&mut self);
}

/// Session factory trait.
pub trait SessionFactory: Send {
    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::SessionFailed` if the server cannot be reached
    /// or refuses the login.
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>>;
}

/// Set of subscribed event kinds, shared by session implementations.
#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    kinds: HashSet<SessionEventKind>,
}

impl Subscriptions {
    pub fn add(&mut self, kind: SessionEventKind) {
        self.kinds.insert(kind);
    }

    pub fn clear(&mut self) {
        self.kinds.clear();
    }

    pub fn accepts(&self, event: &SessionEvent) -> bool {
        self.kinds.contains(&event.kind())
    }

    /// Subscribed kinds in declaration order.
    pub fn kinds(&self) -> Vec<SessionEventKind> {
        SessionEventKind::ALL
            .into_iter()
            .filter(|k| self.kinds.contains(k))
            .collect()
    }
}

/// Command sink that follows whichever session is currently live.
///
/// The connection manager attaches the session's sink on connect and
/// detaches it on every disconnect path. Commands sent while detached are
/// dropped with a warning. Clones share the same slot, so an engine built
/// against a link keeps working across reconnects.
#[derive(Clone, Default)]
pub struct SessionLink {
    slot: Arc<Mutex<Option<Arc<dyn CommandSink>>>>,
}

impl SessionLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, sink: Arc<dyn CommandSink>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(sink);
    }

    pub fn detach(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn is_attached(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl std::fmt::Debug for SessionLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLink")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl CommandSink for SessionLink {
    fn send(&self, command: Command) {
        // clone out so the slot is not held while the session handles the command
        let sink = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match sink {
            Some(sink) => sink.send(command),
            None => warn!(?command, "no live session, dropping command"),
        }
    }
}
