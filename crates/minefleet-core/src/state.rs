//! Agent state tracked by the mining engine and persisted to the state store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What an agent is currently doing.
///
/// `Idle` is both the initial state and the resting state between work
/// items. `Mining` only persists across steps when extraction is
/// acknowledged asynchronously. `ToolSwap` is never entered by the engine's
/// own transitions; an operator can set it through
/// [`MiningEngine::override_state`](crate::engine::MiningEngine::override_state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Waiting for work.
    #[default]
    Idle,

    /// Walking a computed route.
    Moving,

    /// Extracting a block.
    Mining,

    /// Replacing the equipped tool.
    ToolSwap,
}

impl AgentState {
    /// Returns the string representation used for persistence and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Moving => "moving",
            AgentState::Mining => "mining",
            AgentState::ToolSwap => "toolswap",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(AgentState::Idle),
            "moving" => Ok(AgentState::Moving),
            "mining" => Ok(AgentState::Mining),
            "toolswap" => Ok(AgentState::ToolSwap),
            _ => Err(format!("invalid agent state: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_default_to_idle() {
        assert_eq!(AgentState::default(), AgentState::Idle);
    }

    #[test]
    fn test_should_parse_state_from_string() {
        assert_eq!("idle".parse::<AgentState>(), Ok(AgentState::Idle));
        assert_eq!("moving".parse::<AgentState>(), Ok(AgentState::Moving));
        assert_eq!("mining".parse::<AgentState>(), Ok(AgentState::Mining));
        assert_eq!("toolswap".parse::<AgentState>(), Ok(AgentState::ToolSwap));
        assert!("digging".parse::<AgentState>().is_err());
    }

    #[test]
    fn test_should_display_state() {
        assert_eq!(format!("{}", AgentState::Idle), "idle");
        assert_eq!(format!("{}", AgentState::ToolSwap), "toolswap");
    }
}
