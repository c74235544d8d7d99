//! Tick-driven mining state machine.
//!
//! [`MiningEngine`] alternates between walking a route computed by the
//! pathfinder and extracting queued blocks. Each call to
//! [`MiningEngine::step`] performs at most one unit of work: one grid move,
//! or one extraction. Callers drive it from a timer; [`EngineHandle`] adds
//! the single-slot busy guard so an overlapping step is dropped instead of
//! queued.

use crate::coord::{Coord, Region};
use crate::error::{FleetError, Result};
use crate::pathfinder;
use crate::ports::command::{Command, CommandSink};
use crate::ports::state_store::StateStore;
use crate::state::AgentState;
use crate::tool::{Tool, ToolOutcome, ToolUsage};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, TryLockError};
use tracing::{debug, info, warn};

/// Wear applied to the equipped tool for every extracted block.
pub const EXTRACTION_COST: f64 = 1.0;

/// Predicate deciding whether the agent may enter a cell.
pub type Passability = Arc<dyn Fn(&Coord) -> bool + Send + Sync>;

/// How the engine learns that an extraction finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStrategy {
    /// Treat the extraction as done in the step that started it.
    #[default]
    Immediate,

    /// Stay in `Mining` until [`MiningEngine::acknowledge_extraction`] is
    /// called for the pending block.
    AwaitEvent,
}

/// What a single step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Another step was in progress; this one was dropped.
    Busy,
    /// Nothing to do.
    NoOp,
    /// Moved one cell along the route.
    Moved(Coord),
    /// Moved onto the route's goal.
    Arrived(Coord),
    /// Extracted a block.
    Mined(Coord),
    /// Started extracting a block; waiting for acknowledgment.
    ExtractionStarted(Coord),
    /// Still waiting for the pending extraction to be acknowledged.
    AwaitingAck,
    /// Blocks are queued but extraction is halted.
    Halted,
}

/// Point-in-time view of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineSnapshot {
    pub agent_id: String,
    pub state: AgentState,
    pub position: Coord,
    pub target: Option<Coord>,
    pub route_remaining: usize,
    pub queued: usize,
    pub mined_blocks: u64,
    pub halted: bool,
    pub equipped: Option<Tool>,
}

/// Per-agent mining state machine.
pub struct MiningEngine {
    agent_id: String,
    state: AgentState,
    position: Coord,
    target: Option<Coord>,
    route: VecDeque<Coord>,
    queue: VecDeque<Coord>,
    pending: Option<Coord>,
    mined_blocks: u64,
    halted: bool,
    equipped: Option<Tool>,
    ack: AckStrategy,
    report_mined: bool,
    passable: Passability,
    commands: Box<dyn CommandSink>,
    store: Box<dyn StateStore>,
    tools: Box<dyn ToolUsage>,
}

impl MiningEngine {
    /// Creates an idle engine at `initial_position`.
    ///
    /// # Arguments
    ///
    /// * `agent_id` - Key used for every state store write.
    /// * `initial_position` - Where the agent stands.
    /// * `commands` - Outbound command capability of the live session.
    /// * `store` - Receives state and position updates.
    /// * `tools` - Receives extraction cost after every mined block.
    pub fn new(
        agent_id: impl Into<String>,
        initial_position: Coord,
        commands: Box<dyn CommandSink>,
        store: Box<dyn StateStore>,
        tools: Box<dyn ToolUsage>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            state: AgentState::Idle,
            position: initial_position,
            target: None,
            route: VecDeque::new(),
            queue: VecDeque::new(),
            pending: None,
            mined_blocks: 0,
            halted: false,
            equipped: None,
            ack: AckStrategy::Immediate,
            report_mined: true,
            passable: Arc::new(|_| true),
            commands,
            store,
            tools,
        }
    }

    #[must_use]
    pub fn with_ack_strategy(mut self, ack: AckStrategy) -> Self {
        self.ack = ack;
        self
    }

    /// Whether mined blocks are reported to the state store.
    #[must_use]
    pub fn with_mined_reporting(mut self, enabled: bool) -> Self {
        self.report_mined = enabled;
        self
    }

    /// Default passability used by [`MiningEngine::set_target`].
    #[must_use]
    pub fn with_passability(mut self, passable: Passability) -> Self {
        self.passable = passable;
        self
    }

    /// Routes the agent to `goal` using the default passability.
    ///
    /// # Returns
    ///
    /// Number of moves queued; zero when already at `goal` or when no route
    /// exists.
    pub fn set_target(&mut self, goal: Coord) -> usize {
        let passable = self.passable.clone();
        self.set_target_with(goal, move |c| passable(c))
    }

    /// Routes the agent to `goal` through cells accepted by `passable`.
    ///
    /// The goal is remembered even when it cannot be reached. A pending
    /// extraction keeps the engine in `Mining`; the route is walked once it
    /// is acknowledged.
    #[tracing::instrument(skip_all, fields(agent_id = %self.agent_id, goal = %goal))]
    pub fn set_target_with<F>(&mut self, goal: Coord, passable: F) -> usize
    where
        F: Fn(&Coord) -> bool,
    {
        let path = pathfinder::find_path(self.position, goal, passable);
        self.target = Some(goal);
        self.route = path.into_iter().skip(1).collect();

        if self.route.is_empty() {
            debug!("no moves needed or no route found");
            if self.state != AgentState::Mining {
                self.state = AgentState::Idle;
            }
            return 0;
        }

        info!(hops = self.route.len(), "route planned");
        if self.state != AgentState::Mining {
            self.state = AgentState::Moving;
        }
        self.route.len()
    }

    /// Appends every cell of `region` to the extraction queue.
    ///
    /// Cells are queued x-outer, y-middle, z-inner. Earlier entries are kept
    /// and duplicates are not removed.
    pub fn set_mining_area(&mut self, region: Region) -> usize {
        let before = self.queue.len();
        self.queue.extend(region.blocks());
        let added = self.queue.len() - before;
        info!(agent_id = %self.agent_id, %region, added, "mining area queued");
        added
    }

    /// Performs one unit of work.
    ///
    /// # Errors
    ///
    /// Propagates state store failures. The engine's own state has already
    /// advanced when that happens.
    #[tracing::instrument(skip_all, fields(agent_id = %self.agent_id, state = %self.state))]
    pub fn step(&mut self) -> Result<StepOutcome> {
        match self.state {
            AgentState::Idle if !self.queue.is_empty() => self.begin_extraction(),
            AgentState::Mining => Ok(StepOutcome::AwaitingAck),
            AgentState::Moving => self.advance(),
            AgentState::Idle | AgentState::ToolSwap => Ok(StepOutcome::NoOp),
        }
    }

    fn advance(&mut self) -> Result<StepOutcome> {
        let Some(next) = self.route.pop_front() else {
            self.state = AgentState::Idle;
            return self.begin_extraction();
        };

        self.position = next;
        self.commands.send(Command::Move {
            position: next,
            on_ground: true,
        });
        self.store.upsert(&self.agent_id, AgentState::Moving, next)?;
        debug!(position = %next, remaining = self.route.len(), "moved");

        if !self.route.is_empty() {
            return Ok(StepOutcome::Moved(next));
        }

        self.state = AgentState::Idle;
        self.store.upsert(&self.agent_id, AgentState::Idle, next)?;
        self.target = None;
        info!(position = %next, "arrived");

        if self.queue.is_empty() {
            Ok(StepOutcome::Arrived(next))
        } else {
            self.begin_extraction()
        }
    }

    fn begin_extraction(&mut self) -> Result<StepOutcome> {
        if self.queue.is_empty() {
            return Ok(StepOutcome::NoOp);
        }
        if self.halted {
            debug!(queued = self.queue.len(), "extraction halted");
            return Ok(StepOutcome::Halted);
        }
        let Some(block) = self.queue.pop_front() else {
            return Ok(StepOutcome::NoOp);
        };

        self.state = AgentState::Mining;
        self.pending = Some(block);
        self.commands.send(Command::StartBreak {
            position: block,
            face: None,
        });
        debug!(block = %block, "extraction started");

        match self.ack {
            AckStrategy::Immediate => self.complete_extraction(block),
            AckStrategy::AwaitEvent => Ok(StepOutcome::ExtractionStarted(block)),
        }
    }

    fn complete_extraction(&mut self, block: Coord) -> Result<StepOutcome> {
        self.pending = None;
        match self.tools.notify_use(EXTRACTION_COST) {
            ToolOutcome::Swapped(tool) => self.equip(&tool),
            ToolOutcome::Exhausted => self.halt(),
            ToolOutcome::Worn { .. } | ToolOutcome::Ignored => {}
        }
        self.mined_blocks += 1;
        self.state = if self.route.is_empty() {
            AgentState::Idle
        } else {
            AgentState::Moving
        };

        if self.report_mined {
            self.store.increment_mined(&self.agent_id, 1)?;
        }
        debug!(block = %block, mined = self.mined_blocks, "block mined");
        Ok(StepOutcome::Mined(block))
    }

    /// Completes the pending extraction if `position` matches it.
    ///
    /// # Returns
    ///
    /// `true` if the acknowledgment matched and the block was counted.
    ///
    /// # Errors
    ///
    /// Propagates state store failures from mined-block reporting.
    pub fn acknowledge_extraction(&mut self, position: Coord) -> Result<bool> {
        if self.state != AgentState::Mining || self.pending != Some(position) {
            debug!(agent_id = %self.agent_id, position = %position, "ignoring unmatched acknowledgment");
            return Ok(false);
        }
        self.complete_extraction(position)?;
        Ok(true)
    }

    /// Abandons the pending extraction and puts its block back at the front
    /// of the queue.
    ///
    /// The engine resumes walking if a route remains, otherwise it goes
    /// Idle and restarts the block on the next step.
    ///
    /// # Returns
    ///
    /// The requeued block, or `None` if nothing was pending.
    pub fn requeue_pending(&mut self) -> Option<Coord> {
        if self.state != AgentState::Mining {
            return None;
        }
        let block = self.pending.take()?;
        self.queue.push_front(block);
        self.state = if self.route.is_empty() {
            AgentState::Idle
        } else {
            AgentState::Moving
        };
        debug!(agent_id = %self.agent_id, block = %block, "pending extraction requeued");
        Some(block)
    }

    /// Stops starting new extractions. Movement is unaffected.
    pub fn halt(&mut self) {
        if !self.halted {
            warn!(agent_id = %self.agent_id, "extraction halted");
        }
        self.halted = true;
    }

    /// Records a newly equipped tool and lifts any halt.
    pub fn equip(&mut self, tool: &Tool) {
        info!(agent_id = %self.agent_id, tool = %tool.id, "tool equipped");
        self.equipped = Some(tool.clone());
        self.halted = false;
    }

    /// Forces the state machine into `state`.
    ///
    /// This is the only way into `ToolSwap`. Leaving `Mining` this way drops
    /// the pending extraction.
    pub fn override_state(&mut self, state: AgentState) {
        info!(agent_id = %self.agent_id, from = %self.state, to = %state, "state overridden");
        if state != AgentState::Mining {
            self.pending = None;
        }
        self.state = state;
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn position(&self) -> Coord {
        self.position
    }

    pub fn target(&self) -> Option<Coord> {
        self.target
    }

    pub fn mined_blocks(&self) -> u64 {
        self.mined_blocks
    }

    /// Blocks still waiting in the extraction queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Last queued block, if any.
    pub fn last_queued(&self) -> Option<Coord> {
        self.queue.back().copied()
    }

    /// Block awaiting acknowledgment, if any.
    pub fn pending(&self) -> Option<Coord> {
        self.pending
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn equipped_tool(&self) -> Option<Tool> {
        self.equipped.clone()
    }

    pub fn ack_strategy(&self) -> AckStrategy {
        self.ack
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            agent_id: self.agent_id.clone(),
            state: self.state,
            position: self.position,
            target: self.target,
            route_remaining: self.route.len(),
            queued: self.queue.len(),
            mined_blocks: self.mined_blocks,
            halted: self.halted,
            equipped: self.equipped.clone(),
        }
    }
}

impl std::fmt::Debug for MiningEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiningEngine")
            .field("agent_id", &self.agent_id)
            .field("state", &self.state)
            .field("position", &self.position)
            .field("target", &self.target)
            .field("route", &self.route.len())
            .field("queue", &self.queue.len())
            .field("mined_blocks", &self.mined_blocks)
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}

/// Shared engine with a non-blocking busy guard.
///
/// A step that finds the engine already locked is dropped and reported as
/// [`StepOutcome::Busy`]; nothing is queued. Clones share the same engine.
///
/// # Examples
///
/// ```
/// use minefleet_core::engine::{EngineHandle, MiningEngine, StepOutcome};
/// use minefleet_core::ports::{MockCommandSink, MockStateStore};
/// use minefleet_core::tool::MockToolUsage;
/// use minefleet_core::Coord;
///
/// let engine = MiningEngine::new(
///     "bot-1",
///     Coord::new(0, 60, 0),
///     Box::new(MockCommandSink::new()),
///     Box::new(MockStateStore::new()),
///     Box::new(MockToolUsage::new()),
/// );
/// let handle = EngineHandle::new(engine);
///
/// let nested = handle.with(|_| handle.step()).unwrap().unwrap();
/// assert_eq!(nested, StepOutcome::Busy);
/// ```
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<Mutex<MiningEngine>>,
}

impl EngineHandle {
    pub fn new(engine: MiningEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Steps the engine unless a step is already running.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::LockPoisoned` if a previous holder panicked, or
    /// whatever [`MiningEngine::step`] returns.
    pub fn step(&self) -> Result<StepOutcome> {
        match self.inner.try_lock() {
            Ok(mut engine) => engine.step(),
            Err(TryLockError::WouldBlock) => {
                debug!("step already in progress, dropping");
                Ok(StepOutcome::Busy)
            }
            Err(TryLockError::Poisoned(e)) => Err(FleetError::LockPoisoned(e.to_string())),
        }
    }

    /// Runs `f` with exclusive access to the engine.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::EngineBusy` if the engine is locked, or
    /// `FleetError::LockPoisoned` if a previous holder panicked.
    pub fn with<R>(&self, f: impl FnOnce(&mut MiningEngine) -> R) -> Result<R> {
        match self.inner.try_lock() {
            Ok(mut engine) => Ok(f(&mut engine)),
            Err(TryLockError::WouldBlock) => Err(FleetError::EngineBusy),
            Err(TryLockError::Poisoned(e)) => Err(FleetError::LockPoisoned(e.to_string())),
        }
    }

    /// Snapshot of the engine.
    pub fn snapshot(&self) -> Result<EngineSnapshot> {
        self.with(|engine| engine.snapshot())
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::command_mock::MockCommandSink;
    use crate::ports::state_store_mock::MockStateStore;
    use crate::tool::MockToolUsage;

    struct Harness {
        engine: MiningEngine,
        sink: MockCommandSink,
        store: MockStateStore,
        tools: MockToolUsage,
    }

    fn harness(start: Coord) -> Harness {
        let sink = MockCommandSink::new();
        let store = MockStateStore::new();
        let tools = MockToolUsage::new();
        let engine = MiningEngine::new(
            "bot-1",
            start,
            Box::new(sink.clone()),
            Box::new(store.clone()),
            Box::new(tools.clone()),
        );
        Harness {
            engine,
            sink,
            store,
            tools,
        }
    }

    #[test]
    fn test_should_start_idle() {
        let h = harness(Coord::new(0, 60, 0));
        assert_eq!(h.engine.state(), AgentState::Idle);
        assert_eq!(h.engine.position(), Coord::new(0, 60, 0));
        assert_eq!(h.engine.target(), None);
        assert_eq!(h.engine.mined_blocks(), 0);
    }

    #[test]
    fn test_target_at_current_position_stays_idle() {
        let mut h = harness(Coord::new(0, 60, 0));
        assert_eq!(h.engine.set_target(Coord::new(0, 60, 0)), 0);
        assert_eq!(h.engine.state(), AgentState::Idle);
        assert_eq!(h.engine.step().unwrap(), StepOutcome::NoOp);
        assert!(h.sink.get_history().is_empty());
    }

    #[test]
    fn test_unreachable_target_keeps_goal_and_stays_idle() {
        let mut h = harness(Coord::new(0, 60, 0));
        let goal = Coord::new(3, 60, 0);
        let start = h.engine.position();
        assert_eq!(h.engine.set_target_with(goal, |c| *c == start), 0);
        assert_eq!(h.engine.state(), AgentState::Idle);
        assert_eq!(h.engine.target(), Some(goal));
    }

    #[test]
    fn test_should_walk_route_and_persist_each_move() {
        let mut h = harness(Coord::new(0, 60, 0));
        let goal = Coord::new(2, 60, 0);
        assert_eq!(h.engine.set_target(goal), 2);
        assert_eq!(h.engine.state(), AgentState::Moving);

        assert_eq!(h.engine.step().unwrap(), StepOutcome::Moved(Coord::new(1, 60, 0)));
        assert_eq!(h.engine.step().unwrap(), StepOutcome::Arrived(goal));
        assert_eq!(h.engine.state(), AgentState::Idle);
        assert_eq!(h.engine.target(), None);
        assert_eq!(h.sink.moves(), vec![Coord::new(1, 60, 0), goal]);
        assert_eq!(
            h.store.upserts(),
            vec![
                (AgentState::Moving, Coord::new(1, 60, 0)),
                (AgentState::Moving, goal),
                (AgentState::Idle, goal),
            ]
        );
    }

    #[test]
    fn test_single_block_area_mined_in_one_step() {
        let mut h = harness(Coord::new(0, 60, 0));
        let block = Coord::new(0, 59, 0);
        assert_eq!(h.engine.set_mining_area(Region::new(block, block)), 1);

        assert_eq!(h.engine.step().unwrap(), StepOutcome::Mined(block));
        assert_eq!(h.sink.breaks(), vec![block]);
        assert_eq!(h.tools.costs(), vec![EXTRACTION_COST]);
        assert_eq!(h.engine.mined_blocks(), 1);
        assert_eq!(h.engine.state(), AgentState::Idle);
        assert_eq!(h.store.mined_total(), 1);
    }

    #[test]
    fn test_extraction_takes_priority_over_idle_movement_check() {
        let mut h = harness(Coord::new(0, 60, 0));
        h.engine
            .set_mining_area(Region::new(Coord::new(0, 59, 0), Coord::new(0, 58, 0)));
        assert_eq!(h.engine.queued(), 2);

        assert_eq!(h.engine.step().unwrap(), StepOutcome::Mined(Coord::new(0, 58, 0)));
        assert_eq!(h.engine.step().unwrap(), StepOutcome::Mined(Coord::new(0, 59, 0)));
        assert_eq!(h.engine.step().unwrap(), StepOutcome::NoOp);
    }

    #[test]
    fn test_overlapping_areas_queue_duplicates() {
        let mut h = harness(Coord::new(0, 60, 0));
        let region = Region::new(Coord::new(0, 0, 0), Coord::new(1, 0, 0));
        h.engine.set_mining_area(region);
        h.engine.set_mining_area(region);
        assert_eq!(h.engine.queued(), 4);
    }

    #[test]
    fn test_arrival_mines_queued_block_in_same_step() {
        let mut h = harness(Coord::new(0, 60, 0));
        let block = Coord::new(5, 5, 5);
        h.engine.set_target(Coord::new(1, 60, 0));
        h.engine.set_mining_area(Region::new(block, block));

        // Moving: extraction waits for the route
        assert_eq!(h.engine.step().unwrap(), StepOutcome::Mined(block));
        assert_eq!(h.sink.moves(), vec![Coord::new(1, 60, 0)]);
        assert_eq!(h.engine.state(), AgentState::Idle);
    }

    #[test]
    fn test_await_event_keeps_mining_until_acknowledged() {
        let mut h = harness(Coord::new(0, 60, 0));
        h.engine = h.engine.with_ack_strategy(AckStrategy::AwaitEvent);
        let block = Coord::new(0, 59, 0);
        h.engine.set_mining_area(Region::new(block, block));

        assert_eq!(h.engine.step().unwrap(), StepOutcome::ExtractionStarted(block));
        assert_eq!(h.engine.step().unwrap(), StepOutcome::AwaitingAck);
        assert_eq!(h.engine.state(), AgentState::Mining);

        assert!(!h.engine.acknowledge_extraction(Coord::new(9, 9, 9)).unwrap());
        assert!(h.engine.acknowledge_extraction(block).unwrap());
        assert_eq!(h.engine.state(), AgentState::Idle);
        assert_eq!(h.engine.mined_blocks(), 1);
        assert!(!h.engine.acknowledge_extraction(block).unwrap());
    }

    #[test]
    fn test_requeue_pending_restarts_interrupted_extraction() {
        let mut h = harness(Coord::new(0, 60, 0));
        h.engine = h.engine.with_ack_strategy(AckStrategy::AwaitEvent);
        let first = Coord::new(0, 59, 0);
        let second = Coord::new(0, 58, 0);
        h.engine.set_mining_area(Region::new(first, second));
        assert_eq!(h.engine.requeue_pending(), None);

        assert_eq!(h.engine.step().unwrap(), StepOutcome::ExtractionStarted(second));
        assert_eq!(h.engine.requeue_pending(), Some(second));
        assert_eq!(h.engine.state(), AgentState::Idle);
        assert_eq!(h.engine.pending(), None);
        assert_eq!(h.engine.queued(), 2);
        assert_eq!(h.engine.mined_blocks(), 0);

        // the same block is started again
        assert_eq!(h.engine.step().unwrap(), StepOutcome::ExtractionStarted(second));
        assert_eq!(h.sink.breaks(), vec![second, second]);
    }

    #[test]
    fn test_requeue_pending_resumes_route() {
        let mut h = harness(Coord::new(0, 60, 0));
        h.engine = h.engine.with_ack_strategy(AckStrategy::AwaitEvent);
        let block = Coord::new(0, 59, 0);
        h.engine.set_mining_area(Region::new(block, block));
        assert_eq!(h.engine.step().unwrap(), StepOutcome::ExtractionStarted(block));

        // the route is planned while the break is pending
        assert_eq!(h.engine.set_target(Coord::new(2, 60, 0)), 2);
        assert_eq!(h.engine.requeue_pending(), Some(block));
        assert_eq!(h.engine.state(), AgentState::Moving);
        assert_eq!(h.engine.step().unwrap(), StepOutcome::Moved(Coord::new(1, 60, 0)));
    }

    #[test]
    fn test_exhausted_tool_halts_extraction_until_equipped() {
        let mut h = harness(Coord::new(0, 60, 0));
        h.tools.push_outcome(ToolOutcome::Exhausted);
        h.engine
            .set_mining_area(Region::new(Coord::new(0, 59, 0), Coord::new(0, 58, 0)));

        assert!(matches!(h.engine.step().unwrap(), StepOutcome::Mined(_)));
        assert!(h.engine.is_halted());
        assert_eq!(h.engine.step().unwrap(), StepOutcome::Halted);
        assert_eq!(h.engine.queued(), 1);

        h.engine.equip(&Tool::new("spare", 10));
        assert!(matches!(h.engine.step().unwrap(), StepOutcome::Mined(_)));
        assert_eq!(h.engine.queued(), 0);
    }

    #[test]
    fn test_swapped_tool_is_equipped() {
        let mut h = harness(Coord::new(0, 60, 0));
        let spare = Tool::new("spare", 10);
        h.tools.push_outcome(ToolOutcome::Swapped(spare.clone()));
        let block = Coord::new(0, 59, 0);
        h.engine.set_mining_area(Region::new(block, block));

        h.engine.step().unwrap();
        assert_eq!(h.engine.equipped_tool(), Some(spare));
        assert!(!h.engine.is_halted());
    }

    #[test]
    fn test_tool_swap_state_is_inert() {
        let mut h = harness(Coord::new(0, 60, 0));
        h.engine.override_state(AgentState::ToolSwap);
        assert_eq!(h.engine.step().unwrap(), StepOutcome::NoOp);
        assert_eq!(h.engine.state(), AgentState::ToolSwap);
    }

    #[test]
    fn test_mined_reporting_can_be_disabled() {
        let mut h = harness(Coord::new(0, 60, 0));
        h.engine = h.engine.with_mined_reporting(false);
        let block = Coord::new(0, 59, 0);
        h.engine.set_mining_area(Region::new(block, block));
        h.engine.step().unwrap();
        assert_eq!(h.store.mined_total(), 0);
        assert_eq!(h.engine.mined_blocks(), 1);
    }

    #[test]
    fn test_store_failure_propagates() {
        let mut h = harness(Coord::new(0, 60, 0));
        h.store.fail_with("disk full");
        h.engine.set_target(Coord::new(1, 60, 0));
        assert!(matches!(h.engine.step(), Err(FleetError::StateStore(_))));
        assert_eq!(h.engine.position(), Coord::new(1, 60, 0));
    }

    #[test]
    fn test_handle_drops_reentrant_step() {
        let h = harness(Coord::new(0, 60, 0));
        let handle = EngineHandle::new(h.engine);
        let nested = handle
            .with(|engine| {
                engine.set_target(Coord::new(1, 60, 0));
                handle.step()
            })
            .unwrap()
            .unwrap();
        assert_eq!(nested, StepOutcome::Busy);
        assert!(h.sink.moves().is_empty());

        assert_eq!(handle.step().unwrap(), StepOutcome::Arrived(Coord::new(1, 60, 0)));
        assert!(matches!(
            handle.with(|_| handle.with(|_| ())),
            Ok(Err(FleetError::EngineBusy))
        ));
    }
}
