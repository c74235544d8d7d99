//! Mock command sink for testing.

use crate::coord::Coord;
use crate::ports::command::{Command, CommandSink};
use std::sync::{Arc, Mutex, PoisonError};

/// Mock command sink that records every command in send order.
///
/// Clones share the same history, so a test can keep one clone and hand
/// another to the engine.
///
/// # Examples
///
/// ```
/// use minefleet_core::Coord;
/// use minefleet_core::ports::{Command, CommandSink, MockCommandSink};
///
/// let sink = MockCommandSink::new();
/// sink.send(Command::Move { position: Coord::new(1, 60, 0), on_ground: true });
/// assert_eq!(sink.moves(), vec![Coord::new(1, 60, 0)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockCommandSink {
    history: Arc<Mutex<Vec<Command>>>,
}

impl MockCommandSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every command sent so far.
    pub fn get_history(&self) -> Vec<Command> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Destinations of every `Move` command, in order.
    pub fn moves(&self) -> Vec<Coord> {
        self.get_history()
            .into_iter()
            .filter_map(|c| match c {
                Command::Move { position, .. } => Some(position),
                _ => None,
            })
            .collect()
    }

    /// Targets of every `StartBreak` command, in order.
    pub fn breaks(&self) -> Vec<Coord> {
        self.get_history()
            .into_iter()
            .filter_map(|c| match c {
                Command::StartBreak { position, .. } => Some(position),
                _ => None,
            })
            .collect()
    }

    /// Clears the history.
    pub fn clear(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl CommandSink for MockCommandSink {
    fn send(&self, command: Command) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }
}
