//! Per-agent runtime.
//!
//! [`AgentRuntime`] wires one agent together: a [`ConnectionManager`] for
//! the session, a [`MiningEngine`] that sends commands through the
//! connection's link, a shared [`ToolManager`] and a [`ProgressReporter`].
//! The owner drives everything by calling [`AgentRuntime::tick`] on a
//! fixed interval.

use crate::clock::Clock;
use crate::config::FleetConfig;
use crate::connection::{ConnectionEvent, ConnectionManager, Lifecycle};
use crate::coord::{Coord, Region};
use crate::engine::{EngineHandle, EngineSnapshot, MiningEngine, StepOutcome};
use crate::error::{FleetError, Result};
use crate::ports::inventory::Inventory;
use crate::ports::notifier::{ChatNotifier, Notifier};
use crate::ports::session::SessionFactory;
use crate::ports::state_store::StateStore;
use crate::progress::{MiningStats, ProgressReporter};
use crate::state::AgentState;
use crate::tool::{Item, Tool, ToolManager};
use minefleet_msg::MessageCatalog;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

/// External collaborators an agent runs against.
pub struct AgentPorts {
    /// Opens sessions to the server.
    pub factory: Box<dyn SessionFactory>,

    /// Time source for the connection's timers.
    pub clock: Arc<dyn Clock>,

    /// Receives state, position and mined counts.
    pub store: Arc<dyn StateStore>,

    /// Reserve tools.
    pub inventory: Arc<dyn Inventory>,

    /// Announcement destination. Defaults to chat over the live session.
    pub notifier: Option<Arc<dyn Notifier>>,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Session events and timer firings handled by the connection.
    pub polled: usize,

    /// Lifecycle notifications raised during the tick, in order.
    pub events: Vec<ConnectionEvent>,

    /// Extraction acknowledgments the engine accepted.
    pub acknowledged: usize,

    /// Engine step result; `None` while disconnected.
    pub step: Option<StepOutcome>,

    /// Connection state after the tick.
    pub lifecycle: Lifecycle,
}

/// One agent's control loop.
pub struct AgentRuntime {
    agent_id: String,
    connection: ConnectionManager,
    events: UnboundedReceiver<ConnectionEvent>,
    engine: EngineHandle,
    tools: Arc<Mutex<ToolManager>>,
    reporter: ProgressReporter,
    max_retries: u32,
}

impl AgentRuntime {
    /// Builds a disconnected runtime.
    ///
    /// # Arguments
    ///
    /// * `agent_id` - Identity used for state store writes and logs.
    /// * `start` - Initial position.
    /// * `config` - Connection, engine and message settings.
    /// * `ports` - External collaborators.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::Message` if the configured template directory
    /// cannot be loaded.
    pub fn new(
        agent_id: impl Into<String>,
        start: Coord,
        config: &FleetConfig,
        ports: AgentPorts,
    ) -> Result<Self> {
        let agent_id = agent_id.into();
        let catalog = Arc::new(match &config.messages.templates_dir {
            Some(dir) => MessageCatalog::with_overrides(dir)?,
            None => MessageCatalog::builtin(),
        });

        let mut connection =
            ConnectionManager::new(config.connect_params(), ports.factory, ports.clock)
                .with_backoff(
                    config.connection.backoff_base(),
                    config.connection.backoff_cap(),
                )
                .with_max_retries(config.connection.max_retries)
                .with_keep_alive_interval(config.connection.keep_alive());
        let events = connection.subscribe();
        let link = connection.command_link();

        let notifier: Arc<dyn Notifier> = match ports.notifier {
            Some(notifier) => notifier,
            None => Arc::new(ChatNotifier::new(Arc::new(link.clone()))),
        };
        let tools = Arc::new(Mutex::new(
            ToolManager::new(&agent_id, ports.inventory, notifier.clone())
                .with_catalog(catalog.clone()),
        ));

        let engine = MiningEngine::new(
            &agent_id,
            start,
            Box::new(link),
            Box::new(ports.store),
            Box::new(tools.clone()),
        )
        .with_ack_strategy(config.engine.ack)
        .with_mined_reporting(config.engine.report_mined);

        Ok(Self {
            agent_id,
            connection,
            events,
            engine: EngineHandle::new(engine),
            tools,
            reporter: ProgressReporter::new(notifier, catalog),
            max_retries: config.connection.max_retries,
        })
    }

    /// Connects, falling back to a reconnect cycle if the first attempt
    /// fails.
    #[tracing::instrument(skip_all, fields(agent_id = %self.agent_id))]
    pub fn start(&mut self) {
        if let Err(e) = self.connection.connect() {
            warn!(error = %e, "initial connect failed, retrying in background");
            self.connection.auto_reconnect(self.max_retries);
        }
    }

    /// Polls the connection, routes acknowledgments to the engine and, if
    /// connected, steps the engine once.
    ///
    /// Losing the session puts an unacknowledged extraction back at the
    /// front of the queue.
    ///
    /// # Errors
    ///
    /// Propagates engine and state store failures.
    pub fn tick(&mut self) -> Result<TickReport> {
        let polled = self.connection.poll();

        let mut events = Vec::new();
        let mut acknowledged = 0;
        while let Ok(event) = self.events.try_recv() {
            match &event {
                ConnectionEvent::ExtractionAcknowledged { position } => {
                    if self
                        .engine
                        .with(|engine| engine.acknowledge_extraction(*position))??
                    {
                        acknowledged += 1;
                    }
                }
                ConnectionEvent::Disconnected { .. } => {
                    // the ack for a break sent on the old session never comes
                    if let Some(block) = self.engine.with(|engine| engine.requeue_pending())? {
                        warn!(agent_id = %self.agent_id, %block, "extraction interrupted, block requeued");
                    }
                }
                _ => {}
            }
            events.push(event);
        }

        let step = if self.connection.is_connected() {
            Some(self.engine.step()?)
        } else {
            None
        };

        Ok(TickReport {
            polled,
            events,
            acknowledged,
            step,
            lifecycle: self.connection.lifecycle(),
        })
    }

    /// Routes the agent to `goal`.
    pub fn set_target(&self, goal: Coord) -> Result<usize> {
        self.engine.with(|engine| engine.set_target(goal))
    }

    /// Queues every block in `region` for extraction.
    pub fn set_mining_area(&self, region: Region) -> Result<usize> {
        self.engine.with(|engine| engine.set_mining_area(region))
    }

    /// Equips `tool` on both the tool manager and the engine.
    pub fn set_tool(&self, tool: &Tool) -> Result<()> {
        self.lock_tools()?.set_tool(tool);
        self.engine.with(|engine| engine.equip(tool))
    }

    /// Offers a picked-up item; equips the engine when it is auto-equipped.
    #[tracing::instrument(skip_all, fields(agent_id = %self.agent_id))]
    pub fn pickup(&self, item: &Item) -> Result<Option<Tool>> {
        let equipped = self.lock_tools()?.pickup(item);
        if let Some(tool) = &equipped {
            self.engine.with(|engine| engine.equip(tool))?;
        }
        Ok(equipped)
    }

    /// Figures for a progress report.
    ///
    /// The target level is the y of the navigation goal if one is set,
    /// otherwise the y of the last queued block, otherwise the current y.
    pub fn mining_stats(&self) -> Result<MiningStats> {
        let (snapshot, last_queued) = self
            .engine
            .with(|engine| (engine.snapshot(), engine.last_queued()))?;
        let tools = self.lock_tools()?;
        let tool = tools.current_tool();

        Ok(MiningStats {
            mined_blocks: snapshot.mined_blocks,
            durability: tool.as_ref().map_or(0, |t| t.durability),
            max_durability: tool.as_ref().map_or(0, |t| t.max_durability),
            tool_count: tools.spare_tools(),
            current_y: snapshot.position.y,
            target_y: snapshot
                .target
                .or(last_queued)
                .map_or(snapshot.position.y, |c| c.y),
        })
    }

    /// Posts a progress report and returns its text.
    pub fn report_progress(&self) -> Result<String> {
        let stats = self.mining_stats()?;
        self.reporter.report(&stats)
    }

    /// Whether the agent has nothing left to do.
    ///
    /// A goal that needs no moves, or that cannot be reached, leaves no work
    /// behind even though the engine still reports it as the target.
    pub fn is_finished(&self) -> Result<bool> {
        let snapshot = self.snapshot()?;
        Ok(snapshot.route_remaining == 0
            && (snapshot.queued == 0 || snapshot.halted)
            && !matches!(snapshot.state, AgentState::Moving | AgentState::Mining))
    }

    /// Disconnects for good.
    pub fn shutdown(&mut self) {
        info!(agent_id = %self.agent_id, "shutting down agent");
        self.connection.disconnect(Some("shutdown"));
    }

    pub fn snapshot(&self) -> Result<EngineSnapshot> {
        self.engine.snapshot()
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager {
        &mut self.connection
    }

    /// Copy of the equipped tool.
    pub fn current_tool(&self) -> Result<Option<Tool>> {
        Ok(self.lock_tools()?.current_tool())
    }

    fn lock_tools(&self) -> Result<MutexGuard<'_, ToolManager>> {
        self.tools
            .lock()
            .map_err(|e| FleetError::LockPoisoned(e.to_string()))
    }
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("agent_id", &self.agent_id)
            .field("connection", &self.connection)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
