//! Error types for minefleet operations.
//!
//! This module defines every error variant the agent control loop can
//! surface, from configuration loading to the transport session. All errors
//! use `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Error types for minefleet operations.
///
/// Only failures that a caller can act on are represented here. Absorbed
/// conditions (an empty path, a dropped reentrant step, a failed scheduled
/// reconnect) are reported through return values and events instead.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FleetError {
    // Session errors
    /// The session factory refused to produce a session.
    #[error("session failed: {0}")]
    SessionFailed(String),

    // Port errors
    /// The state store rejected a write.
    #[error("state store error: {0}")]
    StateStore(String),

    // Engine errors
    /// The engine is in the middle of a step on this thread.
    #[error("engine busy")]
    EngineBusy,

    /// A shared lock was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    // Input errors
    /// Text could not be parsed as a coordinate or region.
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    // Config errors
    /// Invalid configuration detected.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Error parsing configuration file.
    #[error("config parse error: {0}")]
    ConfigParseError(String),

    /// Configuration file not found at the expected location.
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    // Message errors
    /// Announcement template failed to load or render.
    #[error(transparent)]
    Message(#[from] minefleet_msg::MessageError),

    // System errors
    /// IO failure with context from anyhow, such as an unreadable config file.
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for minefleet operations.
pub type Result<T> = std::result::Result<T, FleetError>;
