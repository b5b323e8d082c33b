//! Semi-implicit Euler integration for rigid bodies.
//!
//! Velocities are advanced first (and then corrected by the constraint
//! solver), positions are advanced with the corrected velocities:
//!
//! ```text
//! v(t+h) = v(t) + h (g + F/m)                         (then constrained)
//! ω(t+h) = ω(t) + h I_w⁻¹ (τ - ω × I_w ω)             (then constrained)
//! x(t+h) = x(t) + h v(t+h)
//! q(t+h) = exp(h ω(t+h)) ⊗ q(t)                      (renormalized)
//! ```
//!
//! Angular velocity is expressed in world coordinates, so the incremental
//! rotation is applied on the left.
//!
//! # Example
//!
//! ```
//! use sim_core::integrators::integrate_pose;
//! use sim_types::{Pose, Twist};
//! use nalgebra::Vector3;
//!
//! let mut pose = Pose::identity();
//! let twist = Twist::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 1.0));
//! integrate_pose(&mut pose, &twist, 0.5);
//!
//! assert!((pose.position.x - 0.5).abs() < 1e-12);
//! assert!((pose.rotation.angle() - 0.5).abs() < 1e-12);
//! ```

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use sim_types::{Pose, Twist};

/// Advance an orientation by a world-frame angular velocity over `dt`.
///
/// The result is renormalized so drift never accumulates.
pub fn integrate_rotation(rotation: &mut UnitQuaternion<f64>, omega: &Vector3<f64>, dt: f64) {
    let angle = omega.norm() * dt;
    if angle < 1e-15 {
        return;
    }

    let delta = UnitQuaternion::from_scaled_axis(omega * dt);
    *rotation = delta * *rotation;
    rotation.renormalize();
}

/// Advance a pose with constant velocity over `dt`.
pub fn integrate_pose(pose: &mut Pose, twist: &Twist, dt: f64) {
    pose.position += twist.linear * dt;
    integrate_rotation(&mut pose.rotation, &twist.angular, dt);
}

/// Velocity after `dt` under a constant load, ignoring constraints.
///
/// `linear_acceleration` already includes gravity and `F/m`.
///
/// `world_inertia` is the inertia tensor in world coordinates and
/// `inv_world_inertia` its inverse. The gyroscopic term `ω × I ω` is
/// included so a freely spinning body keeps its angular momentum.
#[must_use]
pub fn free_velocity(
    twist: &Twist,
    world_inertia: &Matrix3<f64>,
    inv_world_inertia: &Matrix3<f64>,
    linear_acceleration: &Vector3<f64>,
    torque: &Vector3<f64>,
    dt: f64,
) -> Twist {
    let gyroscopic = twist.angular.cross(&(world_inertia * twist.angular));
    Twist::new(
        twist.linear + linear_acceleration * dt,
        twist.angular + inv_world_inertia * (torque - gyroscopic) * dt,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_rotation_stays_unit() {
        let mut q = UnitQuaternion::identity();
        let omega = Vector3::new(3.0, -7.0, 11.0);
        for _ in 0..10_000 {
            integrate_rotation(&mut q, &omega, 1e-3);
        }
        assert_relative_eq!(q.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_world_frame_rotation_order() {
        // Body already turned 90° about Z; a world-X spin must still turn about world X.
        let mut q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        integrate_rotation(&mut q, &Vector3::new(FRAC_PI_2, 0.0, 0.0), 1.0);

        // Body X axis was world Y; a quarter turn about world X sends it to world Z.
        assert_relative_eq!(q * Vector3::x(), Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_semi_implicit_position_update() {
        let mut pose = Pose::from_position(Point3::new(0.0, 0.0, 10.0));
        let twist = free_velocity(
            &Twist::zero(),
            &Matrix3::identity(),
            &Matrix3::identity(),
            &Vector3::new(0.0, 0.0, -9.81),
            &Vector3::zeros(),
            1.0,
        );
        integrate_pose(&mut pose, &twist, 1.0);

        // Velocity updated first, then position uses the new velocity.
        assert_relative_eq!(twist.linear.z, -9.81, epsilon = 1e-12);
        assert_relative_eq!(pose.position.z, 10.0 - 9.81, epsilon = 1e-12);
    }

    #[test]
    fn test_gyroscopic_term_vanishes_about_principal_axis() {
        let inertia = Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0));
        let inverse = Matrix3::from_diagonal(&Vector3::new(1.0, 0.5, 1.0 / 3.0));
        let spin = Twist::angular(Vector3::new(0.0, 0.0, 4.0));

        let next = free_velocity(
            &spin,
            &inertia,
            &inverse,
            &Vector3::zeros(),
            &Vector3::zeros(),
            0.01,
        );
        assert_relative_eq!(next.angular, spin.angular, epsilon = 1e-12);
    }
}
