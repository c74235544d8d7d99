//! Ports consumed by the agent control loop.
//!
//! Each port is a narrow trait at the boundary between the control loop and
//! an external collaborator. Every trait ships an in-memory or mock adapter
//! next to it (`*_mock.rs`) so the engine and connection manager can be
//! exercised without a live server.

pub mod command;
pub mod command_mock;
pub mod inventory;
pub mod notifier;
pub mod session;
pub mod session_impl;
pub mod session_mock;
pub mod state_store;
pub mod state_store_mock;

pub use command::{BlockFace, Command, CommandSink};
pub use command_mock::MockCommandSink;
pub use inventory::{Inventory, MemoryInventory};
pub use notifier::{ChatNotifier, MockNotifier, Notifier};
pub use session::{
    ConnectParams, Session, SessionEvent, SessionEventKind, SessionFactory, SessionLink,
    Subscriptions,
};
pub use session_impl::LoopbackSessionFactory;
pub use session_mock::{MockSession, MockSessionFactory};
pub use state_store::{AgentRecord, MemoryStateStore, StateStore};
pub use state_store_mock::{MockStateStore, StoreCall};
