//! Announcement templates for minefleet agents.
//!
//! Agents post short human-readable texts to the server chat: tool
//! status changes and progress reports. This crate keeps those texts as
//! minijinja templates so operators can reword them without rebuilding.
//!
//! # Examples
//!
//! ```
//! use minefleet_msg::{Announcement, MessageCatalog, ToolContext};
//!
//! let catalog = MessageCatalog::builtin();
//! let text = catalog.announce(Announcement::ToolExhausted, &ToolContext::default())?;
//! assert_eq!(text, "tool exhausted, halted");
//! # Ok::<(), minefleet_msg::MessageError>(())
//! ```

pub mod catalog;
pub mod context;
pub mod engine;
pub mod error;

pub use catalog::{Announcement, MessageCatalog};
pub use context::{ProgressContext, ToolContext};
pub use engine::MessageEngine;
pub use error::{MessageError, Result};
