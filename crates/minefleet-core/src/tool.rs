//! Tool wear tracking and automatic failover.
//!
//! [`ToolManager`] owns the equipped tool and applies extraction cost to it.
//! When the tool breaks it pulls a reserve from the [`Inventory`] or, with
//! none left, reports exhaustion. The outcome is returned to the caller as a
//! [`ToolOutcome`] so the mining engine decides how to react; the manager
//! never reaches back into the engine.

use crate::ports::inventory::Inventory;
use crate::ports::notifier::Notifier;
use minefleet_msg::{Announcement, MessageCatalog, ToolContext};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Extraction implement with finite durability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tool {
    /// Stable identifier.
    pub id: String,

    /// Remaining uses. Never negative.
    pub durability: u32,

    /// Durability of a fresh tool.
    pub max_durability: u32,
}

impl Tool {
    /// Creates a fresh tool at full durability.
    pub fn new(id: impl Into<String>, max_durability: u32) -> Self {
        Self::with_durability(id, max_durability, max_durability)
    }

    /// Creates a tool with explicit remaining durability.
    pub fn with_durability(id: impl Into<String>, durability: u32, max_durability: u32) -> Self {
        Self {
            id: id.into(),
            durability,
            max_durability,
        }
    }

    /// Whether the tool has uses left.
    pub fn is_usable(&self) -> bool {
        self.durability > 0
    }
}

/// An item the agent picked up.
///
/// Only items that carry positive durability and positive max durability
/// are tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub durability: Option<u32>,
    pub max_durability: Option<u32>,
}

impl Item {
    /// Creates an item with no durability (not a tool).
    pub fn plain(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            durability: None,
            max_durability: None,
        }
    }

    /// Creates an item with durability values.
    pub fn tool(
        id: impl Into<String>,
        name: impl Into<String>,
        durability: u32,
        max_durability: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            durability: Some(durability),
            max_durability: Some(max_durability),
        }
    }

    /// The tool this item represents, if it qualifies as one.
    pub fn as_tool(&self) -> Option<Tool> {
        match (self.durability, self.max_durability) {
            (Some(d), Some(m)) if d > 0 && m > 0 => Some(Tool::with_durability(&self.id, d, m)),
            _ => None,
        }
    }
}

/// Result of applying extraction cost to the equipped tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Nothing happened: no tool, invalid cost or already broken.
    Ignored,

    /// The tool lost durability and is still usable.
    Worn { remaining: u32 },

    /// The tool broke and this reserve tool was equipped.
    Swapped(Tool),

    /// The tool broke and no reserve was available.
    Exhausted,
}

/// Receives extraction cost from the mining engine.
pub trait ToolUsage: Send {
    /// Applies `cost` units of wear.
    fn notify_use(&mut self, cost: f64) -> ToolOutcome;
}

impl<T: ToolUsage> ToolUsage for Arc<Mutex<T>> {
    fn notify_use(&mut self, cost: f64) -> ToolOutcome {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .notify_use(cost)
    }
}

/// Tracks the equipped tool for one agent.
pub struct ToolManager {
    agent_id: String,
    current: Option<Tool>,
    inventory: Arc<dyn Inventory>,
    notifier: Arc<dyn Notifier>,
    catalog: Arc<MessageCatalog>,
}

impl ToolManager {
    /// Creates a manager with no tool equipped and built-in announcement
    /// texts.
    ///
    /// # Arguments
    ///
    /// * `agent_id` - Agent the manager belongs to, used in log fields.
    /// * `inventory` - Source of reserve tools.
    /// * `notifier` - Destination of tool status announcements.
    pub fn new(
        agent_id: impl Into<String>,
        inventory: Arc<dyn Inventory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            current: None,
            inventory,
            notifier,
            catalog: Arc::new(MessageCatalog::builtin()),
        }
    }

    /// Replaces the announcement catalog.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<MessageCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Equips `tool` at construction time.
    #[must_use]
    pub fn with_tool(mut self, tool: Tool) -> Self {
        self.current = Some(tool);
        self
    }

    /// Copy of the equipped tool.
    pub fn current_tool(&self) -> Option<Tool> {
        self.current.clone()
    }

    /// Equips a copy of `tool`, replacing whatever was equipped.
    pub fn set_tool(&mut self, tool: &Tool) {
        self.current = Some(tool.clone());
    }

    /// Reserve tools left in the inventory.
    pub fn spare_tools(&self) -> usize {
        self.inventory.spare_count()
    }

    /// Offers a picked-up item to the manager.
    ///
    /// The item is equipped only when it qualifies as a tool and no tool is
    /// equipped. A broken tool left over from exhaustion still counts as
    /// equipped; replace it with [`ToolManager::set_tool`].
    ///
    /// # Returns
    ///
    /// The newly equipped tool, or `None` if the pickup changed nothing.
    #[tracing::instrument(skip_all, fields(agent_id = %self.agent_id, item = %item.id))]
    pub fn pickup(&mut self, item: &Item) -> Option<Tool> {
        if self.current.is_some() {
            return None;
        }
        let tool = item.as_tool()?;

        info!(tool = %tool.id, "auto-equipped picked up tool");
        self.current = Some(tool.clone());
        let ctx = ToolContext::new(&tool.id, tool.durability, tool.max_durability)
            .with_name(&item.name);
        self.announce(Announcement::ToolEquipped, &ctx);
        Some(tool)
    }

    fn handle_break(&mut self) -> ToolOutcome {
        match self.inventory.next_usable_tool() {
            Some(reserve) => {
                info!(tool = %reserve.id, "tool broke, swapped in reserve");
                self.current = Some(reserve.clone());
                let ctx =
                    ToolContext::new(&reserve.id, reserve.durability, reserve.max_durability);
                self.announce(Announcement::ToolSwapped, &ctx);
                ToolOutcome::Swapped(reserve)
            }
            None => {
                warn!("tool broke and no reserve is left");
                let ctx = self
                    .current
                    .as_ref()
                    .map(|t| ToolContext::new(&t.id, t.durability, t.max_durability))
                    .unwrap_or_default();
                self.announce(Announcement::ToolExhausted, &ctx);
                ToolOutcome::Exhausted
            }
        }
    }

    fn announce(&self, announcement: Announcement, ctx: &ToolContext) {
        match self.catalog.announce(announcement, ctx) {
            Ok(text) => self.notifier.notify(&text),
            Err(e) => warn!(
                template = announcement.template_name(),
                error = %e,
                "failed to render announcement"
            ),
        }
    }
}

impl ToolUsage for ToolManager {
    #[tracing::instrument(skip_all, fields(agent_id = %self.agent_id, cost = cost))]
    fn notify_use(&mut self, cost: f64) -> ToolOutcome {
        if !cost.is_finite() || cost <= 0.0 {
            return ToolOutcome::Ignored;
        }
        let Some(tool) = self.current.as_mut() else {
            return ToolOutcome::Ignored;
        };
        if tool.durability == 0 {
            return ToolOutcome::Ignored;
        }

        // float to int casts saturate
        let wear = cost.ceil() as u32;
        tool.durability = tool.durability.saturating_sub(wear);
        debug!(tool = %tool.id, remaining = tool.durability, "tool wear applied");

        if tool.durability > 0 {
            return ToolOutcome::Worn {
                remaining: tool.durability,
            };
        }
        self.handle_break()
    }
}

impl std::fmt::Debug for ToolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolManager")
            .field("agent_id", &self.agent_id)
            .field("current", &self.current)
            .field("inventory", &"Arc<dyn Inventory>")
            .field("notifier", &"Arc<dyn Notifier>")
            .finish()
    }
}

/// Mock tool usage that records costs and replays scripted outcomes.
///
/// With an empty script every call returns [`ToolOutcome::Ignored`].
#[derive(Debug, Clone, Default)]
pub struct MockToolUsage {
    costs: Arc<Mutex<Vec<f64>>>,
    script: Arc<Mutex<Vec<ToolOutcome>>>,
}

impl MockToolUsage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the outcome of the next unscripted call.
    pub fn push_outcome(&self, outcome: ToolOutcome) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(0, outcome);
    }

    /// Every cost reported so far.
    pub fn costs(&self) -> Vec<f64> {
        self.costs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ToolUsage for MockToolUsage {
    fn notify_use(&mut self, cost: f64) -> ToolOutcome {
        self.costs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cost);
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or(ToolOutcome::Ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::inventory::MemoryInventory;
    use crate::ports::notifier::MockNotifier;

    fn manager(spares: Vec<Tool>) -> (ToolManager, MockNotifier) {
        let notifier = MockNotifier::new();
        let manager = ToolManager::new(
            "bot-1",
            Arc::new(MemoryInventory::with_tools(spares)),
            Arc::new(notifier.clone()),
        );
        (manager, notifier)
    }

    #[test]
    fn test_should_ignore_use_without_tool() {
        let (mut tm, notifier) = manager(vec![]);
        assert_eq!(tm.notify_use(1.0), ToolOutcome::Ignored);
        assert!(tm.current_tool().is_none());
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn test_should_ignore_invalid_cost() {
        let (tm, _) = manager(vec![]);
        let mut tm = tm.with_tool(Tool::new("pick", 5));
        for cost in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert_eq!(tm.notify_use(cost), ToolOutcome::Ignored);
        }
        assert_eq!(tm.current_tool().unwrap().durability, 5);
    }

    #[test]
    fn test_should_wear_and_round_fractional_cost_up() {
        let (tm, _) = manager(vec![]);
        let mut tm = tm.with_tool(Tool::new("pick", 5));
        assert_eq!(tm.notify_use(1.0), ToolOutcome::Worn { remaining: 4 });
        assert_eq!(tm.notify_use(0.5), ToolOutcome::Worn { remaining: 3 });
    }

    #[test]
    fn test_should_swap_on_break_when_reserve_exists() {
        let (tm, notifier) = manager(vec![Tool::new("spare", 10)]);
        let mut tm = tm.with_tool(Tool::with_durability("pick", 1, 10));

        let outcome = tm.notify_use(1.0);
        assert_eq!(outcome, ToolOutcome::Swapped(Tool::new("spare", 10)));
        assert_eq!(tm.current_tool().unwrap().id, "spare");
        assert_eq!(
            notifier.messages(),
            vec!["tool swapped: now using spare (10/10)".to_string()]
        );
    }

    #[test]
    fn test_should_halt_once_when_no_reserve() {
        let (tm, notifier) = manager(vec![]);
        let mut tm = tm.with_tool(Tool::with_durability("pick", 1, 10));

        assert_eq!(tm.notify_use(3.0), ToolOutcome::Exhausted);
        assert_eq!(tm.current_tool().unwrap().durability, 0);
        // already broken: no second break handling
        assert_eq!(tm.notify_use(1.0), ToolOutcome::Ignored);
        assert_eq!(notifier.messages(), vec!["tool exhausted, halted".to_string()]);
    }

    #[test]
    fn test_should_auto_equip_qualifying_pickup() {
        let (mut tm, notifier) = manager(vec![]);
        let item = Item::tool("pick-7", "Iron Pickaxe", 200, 250);

        assert_eq!(tm.pickup(&item), Some(Tool::with_durability("pick-7", 200, 250)));
        assert_eq!(
            notifier.messages(),
            vec!["tool equipped: Iron Pickaxe".to_string()]
        );

        // already equipped
        assert_eq!(tm.pickup(&Item::tool("pick-8", "Stone Pickaxe", 5, 5)), None);
        assert_eq!(tm.current_tool().unwrap().id, "pick-7");
    }

    #[test]
    fn test_should_not_equip_pickup_over_broken_tool() {
        let (tm, notifier) = manager(vec![]);
        let mut tm = tm.with_tool(Tool::with_durability("pick", 1, 10));
        assert_eq!(tm.notify_use(1.0), ToolOutcome::Exhausted);

        assert_eq!(tm.pickup(&Item::tool("iron", "Iron Pickaxe", 250, 250)), None);
        assert_eq!(tm.current_tool(), Some(Tool::with_durability("pick", 0, 10)));
        assert_eq!(notifier.messages(), vec!["tool exhausted, halted".to_string()]);
    }

    #[test]
    fn test_should_ignore_pickup_that_is_not_a_tool() {
        let (mut tm, notifier) = manager(vec![]);
        let items = [
            Item::plain("dirt", "Dirt"),
            Item::tool("broken", "Broken Pickaxe", 0, 10),
            Item::tool("weird", "Weird Thing", 3, 0),
        ];
        for item in &items {
            assert_eq!(tm.pickup(item), None);
        }
        assert!(tm.current_tool().is_none());
        assert!(notifier.messages().is_empty());
    }

    #[test]
    fn test_value_semantics_on_get_and_set() {
        let (mut tm, _) = manager(vec![]);
        let mut tool = Tool::new("pick", 10);
        tm.set_tool(&tool);
        tool.durability = 1;

        let mut copy = tm.current_tool().unwrap();
        copy.durability = 0;
        assert_eq!(tm.current_tool().unwrap().durability, 10);
    }

    #[test]
    fn test_shared_manager_through_mutex() {
        let (tm, _) = manager(vec![]);
        let mut shared = Arc::new(Mutex::new(tm.with_tool(Tool::new("pick", 2))));
        assert_eq!(shared.notify_use(1.0), ToolOutcome::Worn { remaining: 1 });
    }

    #[test]
    fn test_mock_tool_usage_replays_script() {
        let mut mock = MockToolUsage::new();
        mock.push_outcome(ToolOutcome::Exhausted);
        assert_eq!(mock.notify_use(1.0), ToolOutcome::Exhausted);
        assert_eq!(mock.notify_use(1.0), ToolOutcome::Ignored);
        assert_eq!(mock.costs(), vec![1.0, 1.0]);
    }
}
