//! Solver-side body state, constraint rows and reaction forces.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use sim_types::{BodyId, MassProperties, Pose, Twist};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Body state needed for constraint solving.
///
/// Slices of `BodyState` are indexed by [`BodyId::index`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    /// Pose of the centre of mass.
    pub pose: Pose,
    /// Linear and angular velocity (world frame).
    pub twist: Twist,
    /// Inverse mass (0 for fixed bodies).
    pub inv_mass: f64,
    /// Inverse inertia tensor in world frame (zero for fixed bodies).
    pub inv_inertia: Matrix3<f64>,
}

impl BodyState {
    /// A fixed body: infinite mass, never moves.
    #[must_use]
    pub fn fixed(pose: Pose) -> Self {
        Self {
            pose,
            twist: Twist::zero(),
            inv_mass: 0.0,
            inv_inertia: Matrix3::zeros(),
        }
    }

    /// A movable body with the given mass properties.
    ///
    /// A singular inertia tensor locks rotation (zero inverse inertia).
    #[must_use]
    pub fn dynamic(pose: Pose, twist: Twist, mass: &MassProperties) -> Self {
        let inv_inertia_body = mass.inverse_inertia().unwrap_or_else(|| {
            tracing::warn!(mass = mass.mass, "singular inertia tensor, rotation locked");
            Matrix3::zeros()
        });
        let r = pose.rotation.to_rotation_matrix();
        Self {
            pose,
            twist,
            inv_mass: mass.inverse_mass(),
            inv_inertia: r.matrix() * inv_inertia_body * r.matrix().transpose(),
        }
    }

    /// Whether the body is immovable.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_fixed(&self) -> bool {
        self.inv_mass == 0.0 && self.inv_inertia.iter().all(|&x| x == 0.0)
    }

    /// Centre of mass in world coordinates.
    #[must_use]
    pub fn center_of_mass(&self) -> Point3<f64> {
        self.pose.position
    }

    /// Apply an impulse through the given linear/angular Jacobian blocks.
    pub fn apply_impulse(&mut self, linear: &Vector3<f64>, angular: &Vector3<f64>, lambda: f64) {
        self.twist.linear += linear * (self.inv_mass * lambda);
        self.twist.angular += self.inv_inertia * angular * lambda;
    }

    /// Move the pose directly through the given Jacobian blocks.
    ///
    /// Used by position projection: the displacement is `m⁻¹ J_lin Δλ` and the
    /// rotation vector `I⁻¹ J_ang Δλ`.
    pub fn apply_displacement(&mut self, linear: &Vector3<f64>, angular: &Vector3<f64>, lambda: f64) {
        self.pose.position += linear * (self.inv_mass * lambda);
        let rotation = self.inv_inertia * angular * lambda;
        self.pose.rotation = UnitQuaternion::from_scaled_axis(rotation) * self.pose.rotation;
        self.pose.rotation.renormalize();
    }
}

/// One scalar row of a constraint: residual plus Jacobian blocks.
///
/// The velocity-level form of the row is
/// `J_a · [v_a; ω_a] + J_b · [v_b; ω_b] = target_velocity`, with the position
/// residual `error` driven to zero by stabilization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintRow {
    /// First body (None for the world frame).
    pub body_a: Option<BodyId>,
    /// Linear Jacobian block of body A.
    pub linear_a: Vector3<f64>,
    /// Angular Jacobian block of body A.
    pub angular_a: Vector3<f64>,
    /// Second body (None for the world frame).
    pub body_b: Option<BodyId>,
    /// Linear Jacobian block of body B.
    pub linear_b: Vector3<f64>,
    /// Angular Jacobian block of body B.
    pub angular_b: Vector3<f64>,
    /// Position-level residual.
    pub error: f64,
    /// Prescribed value of `J v` before stabilization (non-zero for moving targets).
    pub target_velocity: f64,
}

impl ConstraintRow {
    /// Current `J v`.
    #[must_use]
    pub fn velocity(&self, bodies: &[BodyState]) -> f64 {
        let mut v = 0.0;
        if let Some(a) = self.body_a.and_then(|id| bodies.get(id.index())) {
            v += self.linear_a.dot(&a.twist.linear) + self.angular_a.dot(&a.twist.angular);
        }
        if let Some(b) = self.body_b.and_then(|id| bodies.get(id.index())) {
            v += self.linear_b.dot(&b.twist.linear) + self.angular_b.dot(&b.twist.angular);
        }
        v
    }

    /// Diagonal of the effective mass, `J M⁻¹ Jᵀ`, for this row alone.
    #[must_use]
    pub fn effective_mass(&self, bodies: &[BodyState]) -> f64 {
        self.coupling(self, bodies)
    }

    /// Off-diagonal entry `J_self M⁻¹ J_otherᵀ` between two rows.
    ///
    /// Only Jacobian blocks acting on the same body contribute.
    #[must_use]
    pub fn coupling(&self, other: &Self, bodies: &[BodyState]) -> f64 {
        let mut k = 0.0;
        for (body, linear, angular) in self.blocks() {
            for (other_body, other_linear, other_angular) in other.blocks() {
                if body != other_body {
                    continue;
                }
                let Some(state) = body.and_then(|id| bodies.get(id.index())) else {
                    continue;
                };
                k += state.inv_mass * linear.dot(other_linear)
                    + angular.dot(&(state.inv_inertia * other_angular));
            }
        }
        k
    }

    fn blocks(&self) -> [(Option<BodyId>, &Vector3<f64>, &Vector3<f64>); 2] {
        [
            (self.body_a, &self.linear_a, &self.angular_a),
            (self.body_b, &self.linear_b, &self.angular_b),
        ]
    }
}

/// Reaction wrench a constraint exerts on its bodies, about their centres of mass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintForce {
    /// Force on body A (N).
    pub force_a: Vector3<f64>,
    /// Torque on body A (N·m).
    pub torque_a: Vector3<f64>,
    /// Force on body B (N).
    pub force_b: Vector3<f64>,
    /// Torque on body B (N·m).
    pub torque_b: Vector3<f64>,
}

impl Default for ConstraintForce {
    fn default() -> Self {
        Self::zero()
    }
}

impl ConstraintForce {
    /// No reaction.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            force_a: Vector3::zeros(),
            torque_a: Vector3::zeros(),
            force_b: Vector3::zeros(),
            torque_b: Vector3::zeros(),
        }
    }

    /// Accumulate one row's impulse, converted to a force over `dt`.
    pub fn accumulate(&mut self, row: &ConstraintRow, lambda: f64, dt: f64) {
        let scale = lambda / dt;
        self.force_a += row.linear_a * scale;
        self.torque_a += row.angular_a * scale;
        self.force_b += row.linear_b * scale;
        self.torque_b += row.angular_b * scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fixed_body_state() {
        let state = BodyState::fixed(Pose::identity());
        assert!(state.is_fixed());
        assert_relative_eq!(state.inv_mass, 0.0);
    }

    #[test]
    fn test_dynamic_body_inverse_inertia() {
        let mass = MassProperties::diagonal(2.0, Vector3::new(1.0, 2.0, 4.0));
        let state = BodyState::dynamic(Pose::identity(), Twist::zero(), &mass);

        assert!(!state.is_fixed());
        assert_relative_eq!(state.inv_mass, 0.5);
        assert_relative_eq!(state.inv_inertia[(2, 2)], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_row_effective_mass_and_impulse() {
        let mass = MassProperties::sphere(2.0, 0.5);
        let mut bodies = vec![
            BodyState::fixed(Pose::identity()),
            BodyState::dynamic(Pose::identity(), Twist::zero(), &mass),
        ];

        let row = ConstraintRow {
            body_a: Some(BodyId::new(0)),
            linear_a: -Vector3::x(),
            angular_a: Vector3::zeros(),
            body_b: Some(BodyId::new(1)),
            linear_b: Vector3::x(),
            angular_b: Vector3::zeros(),
            error: 0.0,
            target_velocity: 0.0,
        };

        assert_relative_eq!(row.effective_mass(&bodies), 0.5, epsilon = 1e-12);

        bodies[1].apply_impulse(&row.linear_b, &row.angular_b, 4.0);
        assert_relative_eq!(row.velocity(&bodies), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_row_coupling_through_shared_body() {
        // Sphere: m = 2, I = 2/5 m r² = 0.2, so I⁻¹ = 5.
        let mass = MassProperties::sphere(2.0, 0.5);
        let bodies = vec![
            BodyState::dynamic(Pose::identity(), Twist::zero(), &mass),
            BodyState::dynamic(Pose::identity(), Twist::zero(), &mass),
        ];
        let row = |body: usize, linear: Vector3<f64>| ConstraintRow {
            body_a: None,
            linear_a: Vector3::zeros(),
            angular_a: Vector3::zeros(),
            body_b: Some(BodyId::new(body)),
            linear_b: linear,
            angular_b: Vector3::z(),
            error: 0.0,
            target_velocity: 0.0,
        };
        let x = row(0, Vector3::x());
        let y = row(0, Vector3::y());
        let other = row(1, Vector3::x());

        assert_relative_eq!(x.coupling(&y, &bodies), 5.0, epsilon = 1e-12);
        assert_relative_eq!(x.coupling(&x, &bodies), 5.5, epsilon = 1e-12);
        assert_relative_eq!(x.effective_mass(&bodies), 5.5, epsilon = 1e-12);
        assert_relative_eq!(x.coupling(&other, &bodies), 0.0);
    }

    #[test]
    fn test_force_accumulation() {
        let row = ConstraintRow {
            body_a: None,
            linear_a: Vector3::zeros(),
            angular_a: Vector3::zeros(),
            body_b: Some(BodyId::new(0)),
            linear_b: Vector3::z(),
            angular_b: Vector3::zeros(),
            error: 0.0,
            target_velocity: 0.0,
        };
        let mut force = ConstraintForce::zero();
        force.accumulate(&row, 0.0981, 0.01);
        assert_relative_eq!(force.force_b.z, 9.81, epsilon = 1e-12);
    }
}
