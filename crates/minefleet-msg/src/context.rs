//! Context structures for announcement rendering.

use serde::Serialize;

/// Tool details exposed to the `tool_*` templates.
///
/// # Examples
///
/// ```
/// use minefleet_msg::ToolContext;
///
/// let ctx = ToolContext::new("pickaxe-1", 8, 10).with_name("Diamond Pickaxe");
/// assert_eq!(ctx.tool_name, "Diamond Pickaxe");
/// ```
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolContext {
    /// Stable identifier of the tool.
    pub tool_id: String,

    /// Display name; falls back to the identifier.
    pub tool_name: String,

    /// Remaining durability.
    pub durability: u32,

    /// Durability of a fresh tool.
    pub max_durability: u32,
}

impl ToolContext {
    /// Creates a context whose display name equals the identifier.
    #[must_use]
    pub fn new(tool_id: impl Into<String>, durability: u32, max_durability: u32) -> Self {
        let tool_id = tool_id.into();
        Self {
            tool_name: tool_id.clone(),
            tool_id,
            durability,
            max_durability,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self
    }
}

/// Values rendered by the `progress` template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressContext {
    /// Completion percentage in `0..=100`.
    pub progress: u32,

    /// Current Y level of the agent.
    pub current: i32,

    /// Y level the agent is working towards.
    pub target: i32,

    /// Remaining durability of the equipped tool.
    pub durability: u32,

    /// Durability of a fresh tool.
    pub max_durability: u32,

    /// Reserve tools left in the inventory.
    pub tool_count: usize,
}
