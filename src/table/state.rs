//! Table snapshots
//!
//! A `TableState` is never mutated after construction: a shot produces a
//! successor snapshot instead.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::consts::CUE_BALL;

/// Opaque handle for a stored table snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(u64);

impl TableId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TableId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Ball motion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Motion {
    Still,
    Rolling { vel: DVec2 },
}

/// A numbered ball (0 is the cue ball)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub number: u8,
    pub pos: DVec2,
    pub motion: Motion,
}

impl Ball {
    pub fn still(number: u8, pos: DVec2) -> Self {
        Self {
            number,
            pos,
            motion: Motion::Still,
        }
    }

    pub fn rolling(number: u8, pos: DVec2, vel: DVec2) -> Self {
        Self {
            number,
            pos,
            motion: Motion::Rolling { vel },
        }
    }

    pub fn is_cue(&self) -> bool {
        self.number == CUE_BALL
    }

    pub fn is_rolling(&self) -> bool {
        matches!(self.motion, Motion::Rolling { .. })
    }

    /// Current velocity (zero when still)
    pub fn velocity(&self) -> DVec2 {
        match self.motion {
            Motion::Still => DVec2::ZERO,
            Motion::Rolling { vel } => vel,
        }
    }
}

/// How a snapshot came to exist
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Origin {
    /// Opening rack
    Break,
    /// Result of shooting the cue ball on `parent`
    Shot { parent: TableId, velocity: DVec2 },
}

/// Invariant violations when assembling a snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    /// Two balls share an identity
    DuplicateBall(u8),
    /// A position or velocity is NaN or infinite
    NonFinite { number: u8 },
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateBall(number) => write!(f, "ball {number} appears more than once"),
            Self::NonFinite { number } => write!(f, "ball {number} has a non-finite coordinate"),
        }
    }
}

impl std::error::Error for TableError {}

/// Immutable snapshot of every ball on the table plus display labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTableState")]
pub struct TableState {
    game_name: String,
    player1: String,
    player2: String,
    origin: Origin,
    balls: Vec<Ball>,
}

impl TableState {
    /// Assemble a snapshot, rejecting duplicate identities and non-finite values
    pub fn new(
        game_name: impl Into<String>,
        player1: impl Into<String>,
        player2: impl Into<String>,
        origin: Origin,
        balls: Vec<Ball>,
    ) -> Result<Self, TableError> {
        let mut seen = HashSet::with_capacity(balls.len());
        for ball in &balls {
            if !seen.insert(ball.number) {
                return Err(TableError::DuplicateBall(ball.number));
            }
            if !ball.pos.is_finite() || !ball.velocity().is_finite() {
                return Err(TableError::NonFinite {
                    number: ball.number,
                });
            }
        }

        Ok(Self {
            game_name: game_name.into(),
            player1: player1.into(),
            player2: player2.into(),
            origin,
            balls,
        })
    }

    /// New snapshot with the same labels and a different set of balls
    pub fn successor(&self, origin: Origin, balls: Vec<Ball>) -> Result<Self, TableError> {
        Self::new(
            self.game_name.clone(),
            self.player1.clone(),
            self.player2.clone(),
            origin,
            balls,
        )
    }

    pub fn game_name(&self) -> &str {
        &self.game_name
    }

    pub fn player1(&self) -> &str {
        &self.player1
    }

    pub fn player2(&self) -> &str {
        &self.player2
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Balls in insertion order
    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    pub fn len(&self) -> usize {
        self.balls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balls.is_empty()
    }

    pub fn ball(&self, number: u8) -> Option<&Ball> {
        self.balls.iter().find(|b| b.number == number)
    }

    pub fn cue_ball(&self) -> Option<&Ball> {
        self.ball(CUE_BALL)
    }

    /// True when nothing is rolling
    pub fn is_settled(&self) -> bool {
        self.balls.iter().all(|b| !b.is_rolling())
    }

    /// Same ball identities at the same positions (labels and origin ignored)
    pub fn same_layout(&self, other: &TableState) -> bool {
        self.balls.len() == other.balls.len()
            && self.balls.iter().all(|b| {
                other
                    .ball(b.number)
                    .is_some_and(|o| o.pos == b.pos && o.motion == b.motion)
            })
    }
}

/// Unchecked wire form, validated on the way in
#[derive(Deserialize)]
struct RawTableState {
    game_name: String,
    player1: String,
    player2: String,
    origin: Origin,
    balls: Vec<Ball>,
}

impl TryFrom<RawTableState> for TableState {
    type Error = TableError;

    fn try_from(raw: RawTableState) -> Result<Self, Self::Error> {
        Self::new(raw.game_name, raw.player1, raw.player2, raw.origin, raw.balls)
    }
}
