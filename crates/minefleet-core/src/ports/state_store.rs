//! Agent state persistence port.

use crate::coord::Coord;
use crate::error::Result;
use crate::state::AgentState;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// State store trait.
///
/// Receives the agent's state and position after every move and at every
/// resting point, plus an optional mined-block counter. Implementations
/// must apply calls for the same agent in the order they are made.
pub trait StateStore: Send + Sync {
    /// Records the agent's current state and position.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::StateStore` if the write is rejected.
    fn upsert(&self, agent_id: &str, state: AgentState, position: Coord) -> Result<()>;

    /// Adds `n` to the agent's mined-block counter.
    ///
    /// Stores that do not track mining totals keep the default no-op.
    fn increment_mined(&self, agent_id: &str, n: u64) -> Result<()> {
        let _ = (agent_id, n);
        Ok(())
    }
}

impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn upsert(&self, agent_id: &str, state: AgentState, position: Coord) -> Result<()> {
        (**self).upsert(agent_id, state, position)
    }

    fn increment_mined(&self, agent_id: &str, n: u64) -> Result<()> {
        (**self).increment_mined(agent_id, n)
    }
}

/// Latest persisted view of one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRecord {
    pub state: AgentState,
    pub position: Coord,
    pub mined: u64,
    pub updated_at: DateTime<Utc>,
}

/// In-process state store keyed by agent id.
///
/// Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    records: Arc<Mutex<HashMap<String, AgentRecord>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest record for `agent_id`, if any write was made.
    pub fn get(&self, agent_id: &str) -> Option<AgentRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(agent_id)
            .cloned()
    }

    /// Ids of every agent with a record, sorted.
    pub fn agents(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

impl StateStore for MemoryStateStore {
    fn upsert(&self, agent_id: &str, state: AgentState, position: Coord) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        records
            .entry(agent_id.to_string())
            .and_modify(|r| {
                r.state = state;
                r.position = position;
                r.updated_at = now;
            })
            .or_insert(AgentRecord {
                state,
                position,
                mined: 0,
                updated_at: now,
            });
        Ok(())
    }

    fn increment_mined(&self, agent_id: &str, n: u64) -> Result<()> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        records
            .entry(agent_id.to_string())
            .and_modify(|r| {
                r.mined = r.mined.saturating_add(n);
                r.updated_at = now;
            })
            .or_insert(AgentRecord {
                state: AgentState::Idle,
                position: Coord::default(),
                mined: n,
                updated_at: now,
            });
        Ok(())
    }
}
