//! Pool Hall - a two-player pool table served over HTTP
//!
//! Core modules:
//! - `table`: Immutable table snapshots and the opening rack
//! - `persistence`: Append-only table store (in-memory or on disk)
//! - `physics`: Shot simulation (cushions, pockets, ball contacts)
//! - `renderer`: SVG snapshots of tables and shot traces
//! - `session`: StartSession / ApplyShot orchestration
//! - `http`: axum transport for `/start` and `/shoot`

pub mod error;
pub mod http;
pub mod persistence;
pub mod physics;
pub mod renderer;
pub mod session;
pub mod settings;
pub mod table;

pub use error::GameError;
pub use session::{SessionManager, SessionStart, ShotReceipt};
pub use settings::{Settings, StoreBackend};
pub use table::{Ball, Motion, Origin, TableId, TableState};

use glam::DVec2;

/// Table geometry and physics constants (table-space units, seconds)
pub mod consts {
    /// Playing surface dimensions
    pub const TABLE_WIDTH: f64 = 1350.0;
    pub const TABLE_LENGTH: f64 = 2700.0;

    /// Ball geometry
    pub const BALL_RADIUS: f64 = 28.5;
    pub const BALL_DIAMETER: f64 = 2.0 * BALL_RADIUS;

    /// Pocket capture radius (two ball diameters)
    pub const HOLE_RADIUS: f64 = 2.0 * BALL_DIAMETER;

    /// Rolling friction deceleration (units/s²)
    pub const DRAG: f64 = 150.0;
    /// Below this speed a rolling ball is considered still
    pub const VEL_EPSILON: f64 = 0.01;

    /// Integration step inside a segment
    pub const SIM_RATE: f64 = 0.0001;
    /// Longest single segment before it is cut off
    pub const MAX_SEGMENT_TIME: f64 = 600.0;
    /// Default spacing between rendered trace frames
    pub const FRAME_INTERVAL: f64 = 0.01;
    /// Finest frame spacing accepted from configuration
    pub const MIN_FRAME_INTERVAL: f64 = 0.005;

    /// Identity reserved for the cue ball
    pub const CUE_BALL: u8 = 0;
}

/// Returns true when a ball centred at `pos` lies fully on the playing surface
#[inline]
pub fn on_table(pos: DVec2) -> bool {
    use consts::*;
    pos.is_finite()
        && pos.x >= BALL_RADIUS
        && pos.x <= TABLE_WIDTH - BALL_RADIUS
        && pos.y >= BALL_RADIUS
        && pos.y <= TABLE_LENGTH - BALL_RADIUS
}
