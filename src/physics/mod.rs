//! Shot simulation
//!
//! The session layer only sees the [`Simulate`] capability: hand it a settled
//! table and a cue velocity, get back the settled successor plus the frames
//! in between. [`PoolEngine`] is the built-in implementation.

pub mod collision;
pub mod engine;

use std::fmt;

use glam::DVec2;

use crate::table::TableState;

pub use collision::{Body, Contact, find_contact, resolve};
pub use engine::{EngineConfig, PoolEngine};

/// Intermediate snapshot during a shot
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Seconds since the cue ball was struck
    pub time: f64,
    pub table: TableState,
}

/// Ordered frames of one shot; empty when nothing moved
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trace {
    pub frames: Vec<Frame>,
}

impl Trace {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Time of the last frame
    pub fn duration(&self) -> f64 {
        self.frames.last().map(|f| f.time).unwrap_or(0.0)
    }
}

/// Result of a simulated shot
#[derive(Debug, Clone, PartialEq)]
pub struct ShotOutcome {
    /// Every remaining ball at rest
    pub settled: TableState,
    pub trace: Trace,
}

/// Simulation failures
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    /// Table or velocity the engine cannot work with
    InvalidInput(String),
    /// Balls still moving after the segment cap
    DidNotSettle { segments: usize },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput(reason) => write!(f, "invalid shot: {reason}"),
            Self::DidNotSettle { segments } => {
                write!(f, "table did not settle after {segments} segments")
            }
        }
    }
}

impl std::error::Error for SimulationError {}

/// Physics capability
pub trait Simulate: Send + Sync {
    /// Strike the cue ball of `table` with `cue_velocity` and run until rest
    fn simulate(&self, table: &TableState, cue_velocity: DVec2)
    -> Result<ShotOutcome, SimulationError>;
}
