//! Minefleet Core - autonomous control loop for mining agents.
//!
//! Each agent connects to a remote voxel-world server, walks to a work
//! area, and extracts blocks while keeping its tool and its session alive.
//! This crate holds that per-agent loop; wire encoding, fleet bookkeeping
//! and persistence sit behind the traits in [`ports`].
//!
//! # Architecture
//!
//! - [`pathfinder`]: A* over the 6-connected grid
//! - [`engine`]: tick-driven mining state machine and its busy guard
//! - [`tool`]: tool wear, reserve swap and exhaustion
//! - [`connection`]: session lifecycle with backoff and keep-alive
//! - [`runtime`]: one agent wired end to end
//! - [`ports`]: command sink, state store, notifier, inventory, session
//! - [`clock`] and [`timer`]: virtualizable time and cancellable timers
//! - [`config`], [`error`], [`progress`]: ambient pieces
//!
//! # Example
//!
//! ```
//! use minefleet_core::engine::{MiningEngine, StepOutcome};
//! use minefleet_core::ports::{MockCommandSink, MockStateStore};
//! use minefleet_core::tool::MockToolUsage;
//! use minefleet_core::{AgentState, Coord};
//!
//! let mut engine = MiningEngine::new(
//!     "bot-1",
//!     Coord::new(0, 60, 0),
//!     Box::new(MockCommandSink::new()),
//!     Box::new(MockStateStore::new()),
//!     Box::new(MockToolUsage::new()),
//! );
//! engine.set_target(Coord::new(2, 60, 0));
//! while engine.state() != AgentState::Idle {
//!     engine.step()?;
//! }
//! assert_eq!(engine.position(), Coord::new(2, 60, 0));
//! # Ok::<(), minefleet_core::FleetError>(())
//! ```

pub mod clock;
pub mod config;
pub mod connection;
pub mod coord;
pub mod engine;
pub mod error;
pub mod pathfinder;
pub mod ports;
pub mod progress;
pub mod runtime;
pub mod state;
pub mod timer;
pub mod tool;

// Re-export core types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::FleetConfig;
pub use connection::{ConnectionEvent, ConnectionManager, Lifecycle};
pub use coord::{Coord, Region};
pub use engine::{AckStrategy, EngineHandle, MiningEngine, StepOutcome};
pub use error::{FleetError, Result};
pub use progress::{MiningStats, ProgressReporter};
pub use runtime::{AgentPorts, AgentRuntime, TickReport};
pub use state::AgentState;
pub use tool::{Item, Tool, ToolManager, ToolOutcome, ToolUsage};
