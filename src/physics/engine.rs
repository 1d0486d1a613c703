//! Event-driven shot engine
//!
//! A shot is a chain of segments. Each segment rolls every moving ball from
//! the segment start in fixed `SIM_RATE` steps until the first event (a
//! contact or a ball coming to rest), applies it, and hands the result to the
//! next segment. Frames for rendering are sampled across each segment.

use glam::DVec2;

use super::collision::{Body, find_contact, resolve};
use super::{Frame, ShotOutcome, SimulationError, Simulate, Trace};
use crate::consts::*;
use crate::table::TableState;

/// Engine tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Seconds between rendered frames
    pub frame_interval: f64,
    /// Segments allowed before a shot is abandoned
    pub max_segments: usize,
    /// Cue speeds above this are scaled down to it
    pub max_cue_speed: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_interval: FRAME_INTERVAL,
            max_segments: 10_000,
            max_cue_speed: 10_000.0,
        }
    }
}

/// Outcome of one segment
#[derive(Debug, Clone)]
struct Segment {
    bodies: Vec<Body>,
    /// Seconds from segment start to the event
    elapsed: f64,
}

/// Built-in pool physics
#[derive(Debug, Clone, Default)]
pub struct PoolEngine {
    config: EngineConfig,
}

impl PoolEngine {
    pub fn new(config: EngineConfig) -> Self {
        let mut config = config;
        if !(config.frame_interval.is_finite() && config.frame_interval > 0.0) {
            log::warn!(
                "Frame interval {} invalid, using {}",
                config.frame_interval,
                FRAME_INTERVAL
            );
            config.frame_interval = FRAME_INTERVAL;
        } else if config.frame_interval < MIN_FRAME_INTERVAL {
            log::warn!(
                "Frame interval {} too fine, using {}",
                config.frame_interval,
                MIN_FRAME_INTERVAL
            );
            config.frame_interval = MIN_FRAME_INTERVAL;
        }
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Roll until the next event. `None` when nothing is moving.
fn segment(bodies: &[Body]) -> Option<Segment> {
    if !bodies.iter().any(|b| b.rolling) {
        return None;
    }

    let max_steps = (MAX_SEGMENT_TIME / SIM_RATE) as u64;
    let mut next = Vec::with_capacity(bodies.len());
    let mut time = SIM_RATE;
    for step in 1..=max_steps {
        time = step as f64 * SIM_RATE;
        next.clear();
        next.extend(bodies.iter().map(|b| b.roll(time)));

        for i in 0..next.len() {
            if !next[i].rolling {
                continue;
            }
            if let Some(contact) = find_contact(&next, i) {
                resolve(&mut next, i, contact);
                return Some(Segment {
                    bodies: next,
                    elapsed: time,
                });
            }
            if next[i].settle_if_slow() {
                return Some(Segment {
                    bodies: next,
                    elapsed: time,
                });
            }
        }
    }

    log::warn!("Segment hit the {}s cap", MAX_SEGMENT_TIME);
    Some(Segment {
        bodies: next,
        elapsed: time,
    })
}

/// Positions `t` seconds into a segment, for display only
fn sample(bodies: &[Body], t: f64) -> Vec<Body> {
    bodies
        .iter()
        .map(|b| {
            let mut rolled = b.roll(t);
            rolled.settle_if_slow();
            rolled
        })
        .collect()
}

fn snapshot(template: &TableState, bodies: &[Body]) -> Result<TableState, SimulationError> {
    template
        .successor(template.origin(), bodies.iter().map(Body::to_ball).collect())
        .map_err(|e| SimulationError::InvalidInput(e.to_string()))
}

impl Simulate for PoolEngine {
    fn simulate(
        &self,
        table: &TableState,
        cue_velocity: DVec2,
    ) -> Result<ShotOutcome, SimulationError> {
        if !cue_velocity.is_finite() {
            return Err(SimulationError::InvalidInput(format!(
                "non-finite cue velocity {cue_velocity:?}"
            )));
        }

        let mut bodies: Vec<Body> = table.balls().iter().map(Body::from_ball).collect();
        let cue = bodies
            .iter_mut()
            .find(|b| b.number == CUE_BALL)
            .ok_or_else(|| SimulationError::InvalidInput("no cue ball on the table".into()))?;

        // Too weak to move anything
        if cue_velocity.length() > VEL_EPSILON {
            let clamped = cue_velocity.clamp_length_max(self.config.max_cue_speed);
            if clamped != cue_velocity {
                log::debug!("Cue velocity {:?} clamped to {:?}", cue_velocity, clamped);
            }
            cue.strike(clamped);
        }

        let mut frames = Vec::new();
        let mut clock = 0.0;
        let mut segments = 0;
        while let Some(next) = segment(&bodies) {
            segments += 1;
            if segments > self.config.max_segments {
                return Err(SimulationError::DidNotSettle { segments });
            }

            let count = (next.elapsed / self.config.frame_interval).floor() as usize;
            for k in 0..count {
                let t = k as f64 * self.config.frame_interval;
                frames.push(Frame {
                    time: clock + t,
                    table: snapshot(table, &sample(&bodies, t))?,
                });
            }

            clock += next.elapsed;
            bodies = next.bodies;
        }

        let settled = snapshot(table, &bodies)?;
        if segments > 0 {
            frames.push(Frame {
                time: clock,
                table: settled.clone(),
            });
        }

        log::debug!(
            "Shot settled after {} segments, {:.2}s, {} frames",
            segments,
            clock,
            frames.len()
        );

        Ok(ShotOutcome {
            settled,
            trace: Trace { frames },
        })
    }
}
