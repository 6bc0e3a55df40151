//! Synchronizer state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

/// Phase of a synchronizer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncState {
    Idle,
    Draining,
    Serializing,
    Pushing,
    Confirming,
    /// The current batch was given up; its entries are pending again
    Failed,
}

impl SyncState {
    /// Whether the machine may move from `self` to `next`
    pub fn can_transition_to(&self, next: SyncState) -> bool {
        use SyncState::*;
        matches!(
            (self, next),
            (Idle, Draining)
                | (Draining, Serializing)
                | (Draining, Idle)
                | (Serializing, Pushing)
                | (Pushing, Confirming)
                | (Confirming, Draining)
                | (Confirming, Idle)
                | (Draining, Failed)
                | (Serializing, Failed)
                | (Pushing, Failed)
                | (Confirming, Failed)
                | (Failed, Idle)
        )
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, SyncState::Idle | SyncState::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: SyncState,
    pub to: SyncState,
    pub timestamp: DateTime<Utc>,
}

/// Current state with its bookkeeping
#[derive(Debug, Clone)]
pub struct StateData {
    pub state: SyncState,
    pub last_state_change: DateTime<Utc>,
    pub transition_count: u64,
}

impl StateData {
    pub fn new() -> Self {
        Self {
            state: SyncState::Idle,
            last_state_change: Utc::now(),
            transition_count: 0,
        }
    }

    /// Move to `next`; `None` when the move is not allowed, leaving the state unchanged
    pub fn transition_to(&mut self, next: SyncState) -> Option<StateTransition> {
        if !self.state.can_transition_to(next) {
            return None;
        }

        let transition = StateTransition {
            from: self.state,
            to: next,
            timestamp: Utc::now(),
        };
        self.state = next;
        self.last_state_change = transition.timestamp;
        self.transition_count += 1;
        Some(transition)
    }
}

impl Default for StateData {
    fn default() -> Self {
        Self::new()
    }
}
