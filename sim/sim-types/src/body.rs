//! Rigid body state types.
//!
//! This module provides the frame algebra ([`Pose`]), velocities ([`Twist`]),
//! per-body state and mass properties used across the simulation crates.

use nalgebra::{Matrix3, Point3, Unit, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of a rigid body in a world's body arena.
///
/// Ids are handed out densely by the world in insertion order, so
/// `id.index()` can be used directly to index per-body arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub usize);

impl BodyId {
    /// Create a new body ID.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for BodyId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Position and orientation of a frame.
///
/// Used both for body poses (world frame of the centre of mass) and for
/// attachment frames expressed in a body's local coordinates.
///
/// # Example
///
/// ```
/// use sim_types::Pose;
/// use nalgebra::Point3;
///
/// let pose = Pose::from_position(Point3::new(1.0, 2.0, 3.0));
///
/// let local = Point3::new(1.0, 0.0, 0.0);
/// let world = pose.transform_point(&local);
/// assert_eq!(world, Point3::new(2.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position in parent coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Create an identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position only (identity rotation).
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from position and rotation.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self { position, rotation }
    }

    /// Create a pure rotation of `angle` radians about `axis`.
    #[must_use]
    pub fn from_axis_angle(axis: &Unit<Vector3<f64>>, angle: f64) -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::from_axis_angle(axis, angle),
        }
    }

    /// Transform a point from local to parent coordinates.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Transform a vector from local to parent coordinates (rotation only).
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Transform a point from parent to local coordinates.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation.inverse() * (world - self.position))
    }

    /// Transform a vector from parent to local coordinates.
    #[must_use]
    pub fn inverse_transform_vector(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse() * world
    }

    /// Local +X in parent coordinates.
    #[must_use]
    pub fn axis_x(&self) -> Vector3<f64> {
        self.transform_vector(&Vector3::x())
    }

    /// Local +Y in parent coordinates.
    #[must_use]
    pub fn axis_y(&self) -> Vector3<f64> {
        self.transform_vector(&Vector3::y())
    }

    /// Local +Z in parent coordinates.
    ///
    /// Joint frames use this as the joint axis.
    #[must_use]
    pub fn axis_z(&self) -> Vector3<f64> {
        self.transform_vector(&Vector3::z())
    }

    /// Compute the inverse pose.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.inverse();
        Self {
            position: Point3::from(-(inv_rotation * self.position.coords)),
            rotation: inv_rotation,
        }
    }

    /// Compose two poses: `self * other`.
    ///
    /// If `other` is expressed in the frame described by `self`, the result
    /// is `other` expressed in `self`'s parent frame.
    #[must_use]
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            position: self.transform_point(&other.position),
            rotation: self.rotation * other.rotation,
        }
    }

    /// Express this pose in the frame given by `reference`.
    ///
    /// Both poses must share the same parent frame. The result satisfies
    /// `reference.compose(&self.relative_to(reference)) == *self`.
    #[must_use]
    pub fn relative_to(&self, reference: &Self) -> Self {
        reference.inverse().compose(self)
    }

    /// Check if the pose contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|x| x.is_finite())
            && self.rotation.coords.iter().all(|x| x.is_finite())
    }
}

/// Linear and angular velocity of a rigid body.
///
/// # Example
///
/// ```
/// use sim_types::Twist;
/// use nalgebra::Vector3;
///
/// let twist = Twist::linear(Vector3::new(1.0, 0.0, 0.0));
/// assert_eq!(twist.linear.x, 1.0);
/// assert_eq!(twist.angular.norm(), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Linear velocity of the centre of mass in world coordinates (m/s).
    pub linear: Vector3<f64>,
    /// Angular velocity in world coordinates (rad/s).
    pub angular: Vector3<f64>,
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

impl Twist {
    /// Create a twist with specified linear and angular velocity.
    #[must_use]
    pub const fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    /// Create a zero twist (at rest).
    #[must_use]
    pub fn zero() -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: Vector3::zeros(),
        }
    }

    /// Create a twist with linear velocity only.
    #[must_use]
    pub fn linear(v: Vector3<f64>) -> Self {
        Self {
            linear: v,
            angular: Vector3::zeros(),
        }
    }

    /// Create a twist with angular velocity only.
    #[must_use]
    pub fn angular(omega: Vector3<f64>) -> Self {
        Self {
            linear: Vector3::zeros(),
            angular: omega,
        }
    }

    /// Velocity of a point at `offset` from the centre of mass.
    ///
    /// `v_point` = `v_linear` + omega × r
    #[must_use]
    pub fn velocity_at_point(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        self.linear + self.angular.cross(offset)
    }

    /// Kinetic energy given mass and world-frame inertia.
    #[must_use]
    pub fn kinetic_energy(&self, mass: f64, inertia: &Matrix3<f64>) -> f64 {
        let linear_ke = 0.5 * mass * self.linear.norm_squared();
        let angular_ke = 0.5 * self.angular.dot(&(inertia * self.angular));
        linear_ke + angular_ke
    }

    /// Scale the twist by a factor.
    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            linear: self.linear * factor,
            angular: self.angular * factor,
        }
    }

    /// Check if the twist contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.linear.iter().all(|x| x.is_finite()) && self.angular.iter().all(|x| x.is_finite())
    }

    /// Linear speed.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.linear.norm()
    }

    /// Angular speed.
    #[must_use]
    pub fn angular_speed(&self) -> f64 {
        self.angular.norm()
    }
}

/// Complete kinematic state of a rigid body.
///
/// # Example
///
/// ```
/// use sim_types::{Pose, RigidBodyState};
/// use nalgebra::Point3;
///
/// let state = RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 0.0, 1.0)));
/// assert_eq!(state.pose.position.z, 1.0);
/// assert!(state.twist.speed() < 1e-10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBodyState {
    /// Position and orientation of the centre of mass frame.
    pub pose: Pose,
    /// Linear and angular velocity.
    pub twist: Twist,
}

impl RigidBodyState {
    /// Create a state from pose and twist.
    #[must_use]
    pub const fn new(pose: Pose, twist: Twist) -> Self {
        Self { pose, twist }
    }

    /// Create a state at rest at the given pose.
    #[must_use]
    pub fn at_rest(pose: Pose) -> Self {
        Self {
            pose,
            twist: Twist::zero(),
        }
    }

    /// Check if the state contains `NaN` or `Inf` values.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.pose.is_finite() && self.twist.is_finite()
    }
}

/// Mass properties of a rigid body.
///
/// The inertia tensor is taken about the centre of mass, in body
/// coordinates. Body poses always locate the centre of mass, so no
/// separate offset is stored.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Total mass in kg.
    pub mass: f64,
    /// Inertia tensor about the centre of mass in body coordinates (kg·m²).
    pub inertia: Matrix3<f64>,
}

impl MassProperties {
    /// Create mass properties with given values.
    #[must_use]
    pub const fn new(mass: f64, inertia: Matrix3<f64>) -> Self {
        Self { mass, inertia }
    }

    /// Mass properties with a diagonal inertia tensor.
    #[must_use]
    pub fn diagonal(mass: f64, principal: Vector3<f64>) -> Self {
        Self {
            mass,
            inertia: Matrix3::from_diagonal(&principal),
        }
    }

    /// Create mass properties for a uniform sphere.
    ///
    /// Inertia of a solid sphere: I = (2/5) * m * r²
    #[must_use]
    pub fn sphere(mass: f64, radius: f64) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self::diagonal(mass, Vector3::new(i, i, i))
    }

    /// Create mass properties for a uniform box.
    ///
    /// - Ixx = (1/12) * m * (y² + z²)
    /// - Iyy = (1/12) * m * (x² + z²)
    /// - Izz = (1/12) * m * (x² + y²)
    #[must_use]
    pub fn box_shape(mass: f64, half_extents: Vector3<f64>) -> Self {
        let x2 = 4.0 * half_extents.x * half_extents.x;
        let y2 = 4.0 * half_extents.y * half_extents.y;
        let z2 = 4.0 * half_extents.z * half_extents.z;

        Self::diagonal(
            mass,
            Vector3::new(
                mass * (y2 + z2) / 12.0,
                mass * (x2 + z2) / 12.0,
                mass * (x2 + y2) / 12.0,
            ),
        )
    }

    /// Create mass properties for a uniform cylinder (aligned with Z axis).
    ///
    /// - Ixx = Iyy = (1/12) * m * (3r² + h²)
    /// - Izz = (1/2) * m * r²
    #[must_use]
    pub fn cylinder(mass: f64, radius: f64, half_height: f64) -> Self {
        let r2 = radius * radius;
        let h2 = 4.0 * half_height * half_height;
        let ixx = mass * (3.0 * r2 + h2) / 12.0;

        Self::diagonal(mass, Vector3::new(ixx, ixx, 0.5 * mass * r2))
    }

    /// Scale mass and inertia by a common factor (e.g. a density).
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            mass: self.mass * factor,
            inertia: self.inertia * factor,
        }
    }

    /// Inverse mass (0 for non-positive or infinite mass).
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.mass <= 0.0 || self.mass.is_infinite() {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Inverse of the body-frame inertia tensor.
    ///
    /// Returns None if the inertia is singular.
    #[must_use]
    pub fn inverse_inertia(&self) -> Option<Matrix3<f64>> {
        self.inertia.try_inverse()
    }

    /// Inertia tensor rotated into world coordinates: `R I Rᵀ`.
    #[must_use]
    pub fn world_inertia(&self, rotation: &UnitQuaternion<f64>) -> Matrix3<f64> {
        let r = rotation.to_rotation_matrix();
        r.matrix() * self.inertia * r.matrix().transpose()
    }

    /// Validate mass properties for a body that is free to move.
    ///
    /// Mass must be positive and finite, and the inertia tensor finite,
    /// symmetric and positive definite.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.mass.is_finite() || self.mass <= 0.0 {
            return Err(crate::SimError::invalid_mass(format!(
                "mass must be positive and finite for a movable body, got {}",
                self.mass
            )));
        }

        if !self.inertia.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_mass("inertia must be finite"));
        }

        if (self.inertia - self.inertia.transpose()).abs().max() > 1e-9 * self.inertia.abs().max()
        {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be symmetric",
            ));
        }

        let eigenvalues = self.inertia.symmetric_eigenvalues();
        if eigenvalues.iter().any(|&e| e <= 0.0) {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be positive definite",
            ));
        }

        Ok(())
    }
}
