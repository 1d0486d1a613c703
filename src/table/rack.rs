//! Opening rack construction
//!
//! The apex ball sits on the foot spot; every other object ball gets a small
//! random nudge so no two breaks are identical. The random source is passed
//! in by the caller, so a seeded `Pcg32` reproduces a rack exactly.

use glam::DVec2;
use rand::Rng;

use super::state::Ball;
use crate::consts::*;
use crate::on_table;

/// Largest supported rack (15 object balls)
pub const MAX_RACK_ROWS: u8 = 5;

/// Attempts at a valid nudged layout before falling back to the exact rack
const MAX_RACK_ATTEMPTS: u32 = 16;

/// Triangular rack parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RackLayout {
    /// Number of rows (row r holds r + 1 balls)
    pub rows: u8,
    /// Half-width of the uniform nudge applied to each coordinate
    pub jitter: f64,
    /// Clearance between neighbouring balls before the nudge
    pub gap: f64,
}

impl Default for RackLayout {
    fn default() -> Self {
        Self {
            rows: 2,
            jitter: 1.5,
            gap: 4.0,
        }
    }
}

impl RackLayout {
    /// Build a layout, clamping out-of-range values
    pub fn new(rows: u8, jitter: f64) -> Self {
        let defaults = Self::default();
        let clamped_rows = rows.clamp(1, MAX_RACK_ROWS);
        if clamped_rows != rows {
            log::warn!("Rack rows {} out of range, using {}", rows, clamped_rows);
        }
        let clamped_jitter = if jitter.is_finite() {
            jitter.clamp(0.0, defaults.gap)
        } else {
            defaults.jitter
        };
        if clamped_jitter != jitter {
            log::warn!("Rack jitter {} out of range, using {}", jitter, clamped_jitter);
        }
        Self {
            rows: clamped_rows,
            jitter: clamped_jitter,
            gap: defaults.gap,
        }
    }

    /// Balls in a full rack, cue ball included
    pub fn ball_count(&self) -> usize {
        let rows = self.rows as usize;
        rows * (rows + 1) / 2 + 1
    }

    /// Place the object balls and the cue ball
    pub fn build<R: Rng>(&self, rng: &mut R) -> Vec<Ball> {
        if self.jitter > 0.0 {
            for attempt in 0..MAX_RACK_ATTEMPTS {
                let balls = self.place(|| rng.random_range(-self.jitter..=self.jitter));
                if layout_is_valid(&balls) {
                    return balls;
                }
                log::debug!("Rack draw {} overlapped, redrawing", attempt + 1);
            }
            log::warn!("No valid nudged rack after {} draws, using exact rack", MAX_RACK_ATTEMPTS);
        }
        self.place(|| 0.0)
    }

    fn place(&self, mut nudge: impl FnMut() -> f64) -> Vec<Ball> {
        let spacing = BALL_DIAMETER + self.gap;
        let apex = foot_spot();
        let row_height = 3.0_f64.sqrt() / 2.0 * spacing;

        let mut balls = Vec::with_capacity(self.ball_count());
        let mut number = 1u8;
        for row in 0..self.rows {
            for k in 0..=row {
                let mut pos = DVec2::new(
                    apex.x + (k as f64 - row as f64 / 2.0) * spacing,
                    apex.y - row as f64 * row_height,
                );
                if row > 0 {
                    pos.x += nudge();
                    pos.y += nudge();
                }
                balls.push(Ball::still(number, pos));
                number += 1;
            }
        }
        balls.push(Ball::still(CUE_BALL, head_spot()));
        balls
    }
}

/// Apex position of the rack
pub fn foot_spot() -> DVec2 {
    DVec2::new(TABLE_WIDTH / 2.0, TABLE_WIDTH / 2.0)
}

/// Cue ball starting position
pub fn head_spot() -> DVec2 {
    DVec2::new(TABLE_WIDTH / 2.0, TABLE_LENGTH - TABLE_WIDTH / 2.0)
}

/// Every ball on the surface and no two overlapping
pub fn layout_is_valid(balls: &[Ball]) -> bool {
    if !balls.iter().all(|b| on_table(b.pos)) {
        return false;
    }
    balls.iter().enumerate().all(|(i, a)| {
        balls[i + 1..]
            .iter()
            .all(|b| a.pos.distance(b.pos) >= BALL_DIAMETER)
    })
}
