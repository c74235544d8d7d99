//! Reserve tool inventory port.

use crate::tool::Tool;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Inventory trait.
///
/// Hands out reserve tools when the equipped one breaks.
pub trait Inventory: Send + Sync {
    /// Removes and returns the next usable reserve tool.
    fn next_usable_tool(&self) -> Option<Tool>;

    /// Number of reserve tools left.
    fn spare_count(&self) -> usize;
}

/// FIFO inventory held in memory.
///
/// Only tools with remaining durability are handed out; broken entries are
/// skipped and discarded. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryInventory {
    tools: Arc<Mutex<VecDeque<Tool>>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an inventory holding `tools` in hand-out order.
    pub fn with_tools(tools: impl IntoIterator<Item = Tool>) -> Self {
        Self {
            tools: Arc::new(Mutex::new(tools.into_iter().collect())),
        }
    }

    /// Appends a reserve tool.
    pub fn add(&self, tool: Tool) {
        self.tools
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(tool);
    }
}

impl Inventory for MemoryInventory {
    fn next_usable_tool(&self) -> Option<Tool> {
        let mut tools = self.tools.lock().unwrap_or_else(PoisonError::into_inner);
        while let Some(tool) = tools.pop_front() {
            if tool.is_usable() {
                return Some(tool);
            }
        }
        None
    }

    fn spare_count(&self) -> usize {
        self.tools
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| t.is_usable())
            .count()
    }
}
