//! Errors surfaced to callers of the session layer

use std::fmt;

use crate::persistence::StoreError;
use crate::physics::SimulationError;
use crate::table::{TableError, TableId};

/// Session failures, by what the caller should do about them
#[derive(Debug, Clone, PartialEq)]
pub enum GameError {
    /// Malformed or missing request values; fix the request
    InvalidInput(String),
    /// The identifier was never issued; retrying will not help
    NotFound(TableId),
    /// The referenced table cannot support the operation (e.g. cue ball pocketed)
    InvalidState(String),
    /// Persistence failed; may succeed on retry
    StoreUnavailable(String),
    /// Simulation failed; may succeed on retry
    EngineUnavailable(String),
}

impl GameError {
    /// Short machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::EngineUnavailable(_) => "engine_unavailable",
        }
    }

    /// Infrastructure failures that may be transient
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::EngineUnavailable(_))
    }
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(reason) => write!(f, "invalid input: {reason}"),
            Self::NotFound(id) => write!(f, "table {id} not found"),
            Self::InvalidState(reason) => write!(f, "invalid table state: {reason}"),
            Self::StoreUnavailable(reason) => write!(f, "table store unavailable: {reason}"),
            Self::EngineUnavailable(reason) => write!(f, "physics engine unavailable: {reason}"),
        }
    }
}

impl std::error::Error for GameError {}

impl From<StoreError> for GameError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Unavailable(reason) => Self::StoreUnavailable(reason),
        }
    }
}

impl From<SimulationError> for GameError {
    fn from(err: SimulationError) -> Self {
        match err {
            SimulationError::InvalidInput(reason) => Self::InvalidInput(reason),
            other @ SimulationError::DidNotSettle { .. } => {
                Self::EngineUnavailable(other.to_string())
            }
        }
    }
}

impl From<TableError> for GameError {
    fn from(err: TableError) -> Self {
        Self::InvalidState(err.to_string())
    }
}
