//! Table snapshots and the opening rack
//!
//! Everything here is plain data: no I/O, no physics. The session layer
//! builds snapshots, the store keeps them, the engine derives successors.

pub mod rack;
pub mod state;

pub use rack::{MAX_RACK_ROWS, RackLayout, foot_spot, head_spot, layout_is_valid};
pub use state::{Ball, Motion, Origin, TableError, TableId, TableState};
