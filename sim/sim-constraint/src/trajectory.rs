//! Trajectory constraint: a point that must ride along a moving target on a path.

use nalgebra::{Point3, Vector3};
use sim_path::{AbscissaFunction, PathCurve};
use sim_types::BodyId;

use crate::joint::{Attachment, RowBuffer};
use crate::types::{BodyState, ConstraintRow};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Drives a point on body A along a path expressed in the frame of body B.
///
/// At simulation time `t` the target is
/// `q = frame_B * path.position_at_time(abscissa(t))`. The three rows keep
/// `p_A - q = 0`, and feed the target's motion over the step forward as a
/// velocity so the point tracks without lag.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathFollowerConstraint {
    /// The following point (frame origin) on body A.
    pub point: Attachment,
    /// Frame the path is expressed in, usually on a fixed body.
    pub reference: Attachment,
    /// The path to follow.
    pub path: PathCurve,
    /// Map from simulation time to path time.
    pub abscissa: AbscissaFunction,
}

impl PathFollowerConstraint {
    /// Create a path follower with path time equal to simulation time.
    #[must_use]
    pub fn new(point: Attachment, reference: Attachment, path: PathCurve) -> Self {
        Self {
            point,
            reference,
            path,
            abscissa: AbscissaFunction::default(),
        }
    }

    /// Set the time-to-abscissa function.
    #[must_use]
    pub fn with_abscissa(mut self, abscissa: AbscissaFunction) -> Self {
        self.abscissa = abscissa;
        self
    }

    /// Bodies referenced by the constraint.
    #[must_use]
    pub const fn bodies(&self) -> [Option<BodyId>; 2] {
        [self.point.body, self.reference.body]
    }

    /// Target point in world coordinates at simulation time `time`.
    #[must_use]
    pub fn target(&self, bodies: &[BodyState], time: f64) -> Option<Point3<f64>> {
        let frame = self.reference.world_frame(bodies)?;
        let local = self.path.position_at_time(self.abscissa.evaluate(time));
        Some(frame.transform_point(&local))
    }

    /// Distance between the following point and its target.
    #[must_use]
    pub fn tracking_error(&self, bodies: &[BodyState], time: f64) -> Option<f64> {
        let point = self.point.world_frame(bodies)?.position;
        Some((point - self.target(bodies, time)?).norm())
    }

    /// Velocity of the target in the reference frame, over `[time, time + dt]`.
    ///
    /// Uses the secant of the path so a full step lands exactly on the next
    /// target; falls back to the tangent when `dt` is not positive.
    fn target_velocity_local(&self, time: f64, dt: f64) -> Vector3<f64> {
        let tau = self.abscissa.evaluate(time);
        if dt > 0.0 {
            let next = self.path.position_at_time(self.abscissa.evaluate(time + dt));
            (next - self.path.position_at_time(tau)) / dt
        } else {
            self.path
                .velocity_at_time(tau, self.abscissa.derivative(time))
        }
    }

    /// Append the three rows of this constraint.
    pub fn rows(&self, bodies: &[BodyState], time: f64, dt: f64, rows: &mut RowBuffer) {
        let (Some(a), Some(b)) = (self.point.resolve(bodies), self.reference.resolve(bodies)) else {
            return;
        };

        let p = a.world.position;
        let q = b
            .world
            .transform_point(&self.path.position_at_time(self.abscissa.evaluate(time)));
        let r_a = a.arm(&p);
        let r_q = b.arm(&q);
        let feed = b.world.transform_vector(&self.target_velocity_local(time, dt));
        let delta = p - q;

        for e in [Vector3::x(), Vector3::y(), Vector3::z()] {
            rows.push(ConstraintRow {
                body_a: a.body,
                linear_a: e,
                angular_a: r_a.cross(&e),
                body_b: b.body,
                linear_b: -e,
                angular_b: -r_q.cross(&e),
                error: e.dot(&delta),
                target_velocity: e.dot(&feed),
            });
        }
    }
}
