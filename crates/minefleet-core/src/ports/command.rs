//! Outbound command port.
//!
//! Commands are fire-and-forget: the sink has no acknowledgment channel.
//! Extraction completion, when modeled, arrives later as a session event.

use crate::coord::Coord;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Face of a block an extraction is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockFace {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

/// Command sent to the remote server on behalf of one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Move the agent to `position`.
    Move {
        /// Destination cell.
        position: Coord,
        /// Whether the agent is standing on a block after the move.
        on_ground: bool,
    },

    /// Begin breaking the block at `position`.
    StartBreak {
        /// Block being extracted.
        position: Coord,
        /// Face the break is aimed at, if the server cares.
        face: Option<BlockFace>,
    },

    /// Post a chat line.
    Chat {
        /// Text to post.
        message: String,
    },
}

/// Command sink trait.
///
/// Implementations forward commands to a live session, record them for
/// tests, or drop them while no session exists. Sending never fails from
/// the caller's point of view.
pub trait CommandSink: Send + Sync {
    /// Sends one command.
    fn send(&self, command: Command);
}

impl<T: CommandSink + ?Sized> CommandSink for Arc<T> {
    fn send(&self, command: Command) {
        (**self).send(command)
    }
}

impl<T: CommandSink + ?Sized> CommandSink for Box<T> {
    fn send(&self, command: Command) {
        (**self).send(command)
    }
}
