//! Rendering module
//!
//! Turns table snapshots and shot traces into documents a browser can show
//! directly. The session layer depends only on the [`Render`] capability.

pub mod svg;

use crate::physics::Trace;
use crate::table::TableState;

pub use svg::SvgRenderer;

/// Rendering capability
pub trait Render: Send + Sync {
    /// One self-contained document for a single snapshot
    fn render_table(&self, table: &TableState) -> String;

    /// One document per trace frame, in order
    fn render_trace(&self, trace: &Trace) -> Vec<String> {
        trace
            .frames
            .iter()
            .map(|frame| self.render_table(&frame.table))
            .collect()
    }
}
