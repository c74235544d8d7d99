//! Mock state store for testing.

use crate::coord::Coord;
use crate::error::{FleetError, Result};
use crate::ports::state_store::StateStore;
use crate::state::AgentState;
use std::sync::{Arc, Mutex, PoisonError};

/// One recorded state store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Upsert {
        agent_id: String,
        state: AgentState,
        position: Coord,
    },
    IncrementMined {
        agent_id: String,
        n: u64,
    },
}

/// Mock state store that records calls in order.
///
/// Can be told to reject every write, which lets tests check that the
/// engine propagates store failures to its caller.
#[derive(Debug, Clone, Default)]
pub struct MockStateStore {
    calls: Arc<Mutex<Vec<StoreCall>>>,
    fail_with: Arc<Mutex<Option<String>>>,
}

impl MockStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call fail with `FleetError::StateStore(reason)`.
    pub fn fail_with(&self, reason: &str) {
        *self.fail_with.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.to_string());
    }

    /// Returns every call recorded so far.
    pub fn get_history(&self) -> Vec<StoreCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `(state, position)` of every upsert, in order.
    pub fn upserts(&self) -> Vec<(AgentState, Coord)> {
        self.get_history()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Upsert {
                    state, position, ..
                } => Some((state, position)),
                StoreCall::IncrementMined { .. } => None,
            })
            .collect()
    }

    /// Sum of every `increment_mined` call.
    pub fn mined_total(&self) -> u64 {
        self.get_history()
            .into_iter()
            .map(|c| match c {
                StoreCall::IncrementMined { n, .. } => n,
                StoreCall::Upsert { .. } => 0,
            })
            .sum()
    }

    fn record(&self, call: StoreCall) -> Result<()> {
        if let Some(reason) = self
            .fail_with
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(FleetError::StateStore(reason));
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        Ok(())
    }
}

impl StateStore for MockStateStore {
    fn upsert(&self, agent_id: &str, state: AgentState, position: Coord) -> Result<()> {
        self.record(StoreCall::Upsert {
            agent_id: agent_id.to_string(),
            state,
            position,
        })
    }

    fn increment_mined(&self, agent_id: &str, n: u64) -> Result<()> {
        self.record(StoreCall::IncrementMined {
            agent_id: agent_id.to_string(),
            n,
        })
    }
}
