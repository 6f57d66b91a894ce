//! Operation lifecycle.

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// Lifecycle state of an operation inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    /// Parsed and handed to the engine; pre-store jobs run now.
    Surfaced,
    /// Persisted; notification jobs run now.
    Stored,
    /// Confirmed by an operator.
    Acknowledged,
}

impl OperationState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: OperationState) -> bool {
        use OperationState::*;

        matches!((self, target), (Surfaced, Stored) | (Stored, Acknowledged))
    }

    /// State recorded on an operation: no id yet means surfaced.
    pub fn of(operation: &Operation) -> Self {
        match (operation.id, operation.is_acknowledged) {
            (None, _) => Self::Surfaced,
            (Some(_), false) => Self::Stored,
            (Some(_), true) => Self::Acknowledged,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Acknowledged)
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Surfaced => "surfaced",
            Self::Stored => "stored",
            Self::Acknowledged => "acknowledged",
        };
        write!(f, "{s}")
    }
}
