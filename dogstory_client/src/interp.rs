//! Interpolation.
//!
//! The server sends discrete snapshots a few times per second.
//! The client renders at its own rate and fills the gaps locally:
//! - `MovingObject`: exponential approach of carried loot toward its slot.
//! - `Rotation`: constant-rate, shortest-path turning toward the reported facing.
//! - `correct_velocity`: dead-reckoning smoothing when a snapshot disagrees with
//!   the locally extrapolated position.

use std::f64::consts::{PI, TAU};

use dogstory_shared::{
    config::Tuning,
    math::{Vec2, Vec3},
};

/// A point that chases a target, covering a fixed fraction of the remaining
/// distance per millisecond. Never overshoots, slows down near the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingObject {
    pub pos: Vec3,
    pub target: Vec3,
    rate: f64,
}

impl MovingObject {
    pub fn new(rate: f64, initial: Vec3) -> Self {
        Self {
            pos: initial,
            target: initial,
            rate,
        }
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn advance(&mut self, elapsed_ms: f64) {
        let step = (self.rate * elapsed_ms).clamp(0.0, 1.0);
        self.pos = self.pos + (self.target - self.pos) * step;
    }
}

/// Facing angle that turns toward a desired angle at a bounded rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    /// Angle currently shown.
    pub converted: f64,
    /// Angle being turned toward.
    pub desired: f64,
    /// Angle at which the current turn started.
    pub base: f64,
    /// Clock time (ms) at which the current turn started.
    pub started_at: f64,
}

impl Rotation {
    /// A rotation already at rest on `angle`.
    pub fn settled(angle: f64, now: f64) -> Self {
        Self {
            converted: angle,
            desired: angle,
            base: angle,
            started_at: now,
        }
    }

    /// Points the rotation at `desired`. A new target restarts the turn from the
    /// angle currently shown; the same target leaves the turn untouched.
    /// Returns whether a new turn started.
    pub fn retarget(&mut self, desired: f64, now: f64) -> bool {
        if self.desired == desired {
            return false;
        }
        self.base = self.converted;
        self.desired = desired;
        self.started_at = now;
        true
    }

    /// Recomputes the shown angle for clock time `now`.
    pub fn advance(&mut self, now: f64, speed: f64) {
        let (direction, path) = shortest_turn(self.base, self.desired);
        let travelled = speed * (now - self.started_at).max(0.0);
        self.converted = if travelled >= path {
            self.desired
        } else {
            (self.base + direction * travelled).rem_euclid(TAU)
        };
    }
}

/// Direction (`1.0` increasing, `-1.0` decreasing) and length of the shortest
/// turn from `from` to `to`, both in `[0, 2π)`.
pub fn shortest_turn(from: f64, to: f64) -> (f64, f64) {
    let delta = to - from;
    let direction = if delta <= -PI || (0.0..PI).contains(&delta) {
        1.0
    } else {
        -1.0
    };
    let magnitude = delta.abs();
    let path = if magnitude >= PI {
        TAU - magnitude
    } else {
        magnitude
    };
    (direction, path)
}

/// Velocity that carries `local` onto the authoritative trajectory within the
/// correction window, or `None` when the two agree closely enough (or the
/// player is effectively idle) and the snapshot can be taken as-is.
pub fn correct_velocity(local: Vec2, authoritative: Vec2, speed: Vec2, tuning: &Tuning) -> Option<Vec2> {
    if speed.norm() < tuning.correction_min_speed {
        return None;
    }
    if local.distance(authoritative) <= tuning.correction_min_error {
        return None;
    }
    let window = tuning.correction_window_secs;
    let projected = authoritative + speed * window;
    Some((projected - local) / window)
}
