//! Contact detection and response
//!
//! Balls roll under constant drag between events. An event is the first
//! contact a rolling ball makes with a cushion, a pocket or another ball.
//! Contacts only count while the two bodies are closing on each other, so a
//! ball that just bounced cannot re-trigger on its way out.

use glam::DVec2;

use crate::consts::*;
use crate::table::{Ball, Motion};

/// Fixed table furniture
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Obstacle {
    /// Cushion along a line of constant y
    HCushion(f64),
    /// Cushion along a line of constant x
    VCushion(f64),
    /// Pocket centre
    Pocket(DVec2),
}

/// Cushions first, then the six pockets
pub const OBSTACLES: [Obstacle; 10] = [
    Obstacle::HCushion(0.0),
    Obstacle::HCushion(TABLE_LENGTH),
    Obstacle::VCushion(0.0),
    Obstacle::VCushion(TABLE_WIDTH),
    Obstacle::Pocket(DVec2::new(0.0, 0.0)),
    Obstacle::Pocket(DVec2::new(TABLE_WIDTH, 0.0)),
    Obstacle::Pocket(DVec2::new(0.0, TABLE_LENGTH / 2.0)),
    Obstacle::Pocket(DVec2::new(0.0, TABLE_LENGTH)),
    Obstacle::Pocket(DVec2::new(TABLE_WIDTH, TABLE_LENGTH / 2.0)),
    Obstacle::Pocket(DVec2::new(TABLE_WIDTH, TABLE_LENGTH)),
];

/// Drag deceleration opposing `vel` (zero when effectively still)
pub fn drag_for(vel: DVec2) -> DVec2 {
    let speed = vel.length();
    if speed > VEL_EPSILON {
        -vel / speed * DRAG
    } else {
        DVec2::ZERO
    }
}

/// A ball with full kinematic state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub number: u8,
    pub pos: DVec2,
    pub vel: DVec2,
    pub acc: DVec2,
    pub rolling: bool,
}

impl Body {
    pub fn from_ball(ball: &Ball) -> Self {
        let vel = ball.velocity();
        Self {
            number: ball.number,
            pos: ball.pos,
            vel,
            acc: drag_for(vel),
            rolling: ball.is_rolling(),
        }
    }

    pub fn to_ball(&self) -> Ball {
        Ball {
            number: self.number,
            pos: self.pos,
            motion: if self.rolling {
                Motion::Rolling { vel: self.vel }
            } else {
                Motion::Still
            },
        }
    }

    /// Set in motion with `vel`
    pub fn strike(&mut self, vel: DVec2) {
        self.vel = vel;
        self.acc = drag_for(vel);
        self.rolling = true;
    }

    /// State after rolling `t` seconds from this one.
    ///
    /// A velocity component that changes sign has run out: it is zeroed
    /// along with its acceleration.
    pub fn roll(&self, t: f64) -> Body {
        if !self.rolling {
            return *self;
        }
        let mut next = *self;
        next.pos = self.pos + self.vel * t + 0.5 * self.acc * t * t;
        next.vel = self.vel + self.acc * t;
        if next.vel.x * self.vel.x < 0.0 {
            next.vel.x = 0.0;
            next.acc.x = 0.0;
        }
        if next.vel.y * self.vel.y < 0.0 {
            next.vel.y = 0.0;
            next.acc.y = 0.0;
        }
        next
    }

    /// Bring a slow rolling ball to rest. Returns true if it just stopped.
    pub fn settle_if_slow(&mut self) -> bool {
        if self.rolling && self.vel.length() < VEL_EPSILON {
            self.rolling = false;
            self.vel = DVec2::ZERO;
            self.acc = DVec2::ZERO;
            true
        } else {
            false
        }
    }
}

/// What a rolling ball ran into
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Contact {
    /// Cushion parallel to the x axis (reflects y)
    HCushion,
    /// Cushion parallel to the y axis (reflects x)
    VCushion,
    Pocket,
    /// Index of the other ball
    Ball(usize),
}

/// First contact of rolling body `i`, checking furniture before other balls
pub fn find_contact(bodies: &[Body], i: usize) -> Option<Contact> {
    let body = bodies.get(i)?;
    if !body.rolling {
        return None;
    }

    for obstacle in &OBSTACLES {
        match *obstacle {
            Obstacle::HCushion(y) => {
                let toward = (y - body.pos.y) * body.vel.y > 0.0;
                if (body.pos.y - y).abs() < BALL_RADIUS && toward {
                    return Some(Contact::HCushion);
                }
            }
            Obstacle::VCushion(x) => {
                let toward = (x - body.pos.x) * body.vel.x > 0.0;
                if (body.pos.x - x).abs() < BALL_RADIUS && toward {
                    return Some(Contact::VCushion);
                }
            }
            Obstacle::Pocket(centre) => {
                if body.pos.distance(centre) < HOLE_RADIUS {
                    return Some(Contact::Pocket);
                }
            }
        }
    }

    bodies.iter().enumerate().find_map(|(j, other)| {
        if j == i {
            return None;
        }
        let offset = body.pos - other.pos;
        let closing = (body.vel - other.vel).dot(offset) < 0.0;
        (offset.length() < BALL_DIAMETER && closing).then_some(Contact::Ball(j))
    })
}

/// Apply the response for `contact` on body `i`.
///
/// A pocketed ball is removed from `bodies`, which shifts later indices.
pub fn resolve(bodies: &mut Vec<Body>, i: usize, contact: Contact) {
    match contact {
        Contact::HCushion => {
            bodies[i].vel.y = -bodies[i].vel.y;
            bodies[i].acc.y = -bodies[i].acc.y;
        }
        Contact::VCushion => {
            bodies[i].vel.x = -bodies[i].vel.x;
            bodies[i].acc.x = -bodies[i].acc.x;
        }
        Contact::Pocket => {
            let pocketed = bodies.remove(i);
            log::debug!("Ball {} pocketed at {:?}", pocketed.number, pocketed.pos);
        }
        Contact::Ball(j) => {
            if !bodies[j].rolling {
                bodies[j].rolling = true;
                bodies[j].vel = DVec2::ZERO;
                bodies[j].acc = DVec2::ZERO;
            }
            let (a, b) = (bodies[i], bodies[j]);
            let normal = (a.pos - b.pos).normalize_or_zero();
            let exchange = (a.vel - b.vel).dot(normal) * normal;

            let a = &mut bodies[i];
            a.vel -= exchange;
            a.acc = drag_for(a.vel);
            let b = &mut bodies[j];
            b.vel += exchange;
            b.acc = drag_for(b.vel);
        }
    }
}
