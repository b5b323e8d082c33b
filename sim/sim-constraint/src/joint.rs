//! Joints between rigid bodies.
//!
//! Every joint connects two [`Attachment`]s: a frame fixed on a body (or on
//! the world) at which the joint acts. Joint axes follow the attachment
//! frames' local +Z.
//!
//! | Joint | Rows | Keeps |
//! |-------|------|-------|
//! | [`RevoluteJoint`] | 5 | origins coincident, Z axes aligned |
//! | [`SphericalJoint`] | 3 | origins coincident |
//! | [`ParallelOrientationConstraint`] | 2 | Z axes parallel |
//! | [`DistanceConstraint`] | 1 | origins at fixed distance |
//!
//! # Row Formulation
//!
//! Point coincidence, for each world axis `e`:
//!
//! ```text
//! C = e · (p_b - p_a)
//! J_a = [-e, -(r_a × e)]     J_b = [e, r_b × e]
//! ```
//!
//! Axis alignment, with `a` the Z axis of frame A and `b` the X or Y axis of frame B:
//!
//! ```text
//! C = a · b
//! J_a = [0, a × b]           J_b = [0, b × a]
//! ```

use nalgebra::{Point3, Vector3};
use sim_types::{BodyId, Pose};
use smallvec::SmallVec;

use crate::types::{BodyState, ConstraintRow};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rows produced by one constraint.
pub type RowBuffer = SmallVec<[ConstraintRow; 6]>;

// ============================================================================
// Attachment
// ============================================================================

/// A frame rigidly attached to a body, or to the world when `body` is None.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Attachment {
    /// Owning body, or None for the world frame.
    pub body: Option<BodyId>,
    /// Frame in the body's local coordinates (world coordinates for the world).
    pub frame: Pose,
}

/// An attachment resolved against current body poses.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedFrame {
    pub body: Option<BodyId>,
    /// Centre of mass of the owning body (origin for the world).
    pub center: Point3<f64>,
    /// Attachment frame in world coordinates.
    pub world: Pose,
}

impl ResolvedFrame {
    /// Lever arm from the centre of mass to a world point.
    pub fn arm(&self, point: &Point3<f64>) -> Vector3<f64> {
        point - self.center
    }
}

impl Attachment {
    /// Attach a local frame to a body.
    #[must_use]
    pub const fn body(body: BodyId, frame: Pose) -> Self {
        Self {
            body: Some(body),
            frame,
        }
    }

    /// A frame fixed in the world.
    #[must_use]
    pub const fn world(frame: Pose) -> Self {
        Self { body: None, frame }
    }

    /// Attach a frame given in world coordinates to a body at `body_pose`.
    #[must_use]
    pub fn from_world_frame(body: BodyId, body_pose: &Pose, world_frame: &Pose) -> Self {
        Self::body(body, world_frame.relative_to(body_pose))
    }

    /// Resolve against the current body states.
    ///
    /// Returns None if the body index is out of range.
    pub(crate) fn resolve(&self, bodies: &[BodyState]) -> Option<ResolvedFrame> {
        match self.body {
            Some(id) => {
                let state = bodies.get(id.index())?;
                Some(ResolvedFrame {
                    body: Some(id),
                    center: state.pose.position,
                    world: state.pose.compose(&self.frame),
                })
            }
            None => Some(ResolvedFrame {
                body: None,
                center: Point3::origin(),
                world: self.frame,
            }),
        }
    }

    /// Current world frame of the attachment.
    #[must_use]
    pub fn world_frame(&self, bodies: &[BodyState]) -> Option<Pose> {
        self.resolve(bodies).map(|r| r.world)
    }
}

// ============================================================================
// Row builders
// ============================================================================

/// Three rows keeping the origins of two frames coincident.
pub(crate) fn point_rows(a: &ResolvedFrame, b: &ResolvedFrame, rows: &mut RowBuffer) {
    let p_a = a.world.position;
    let p_b = b.world.position;
    let r_a = a.arm(&p_a);
    let r_b = b.arm(&p_b);
    let delta = p_b - p_a;

    for e in [Vector3::x(), Vector3::y(), Vector3::z()] {
        rows.push(ConstraintRow {
            body_a: a.body,
            linear_a: -e,
            angular_a: -r_a.cross(&e),
            body_b: b.body,
            linear_b: e,
            angular_b: r_b.cross(&e),
            error: e.dot(&delta),
            target_velocity: 0.0,
        });
    }
}

/// Two rows keeping the Z axis of frame A parallel to the Z axis of frame B.
pub(crate) fn alignment_rows(a: &ResolvedFrame, b: &ResolvedFrame, rows: &mut RowBuffer) {
    let axis = a.world.axis_z();
    for perpendicular in [b.world.axis_x(), b.world.axis_y()] {
        let n = axis.cross(&perpendicular);
        rows.push(ConstraintRow {
            body_a: a.body,
            linear_a: Vector3::zeros(),
            angular_a: n,
            body_b: b.body,
            linear_b: Vector3::zeros(),
            angular_b: -n,
            error: axis.dot(&perpendicular),
            target_velocity: 0.0,
        });
    }
}

// ============================================================================
// Revolute Joint
// ============================================================================

/// A hinge: frames share their origin and Z axis, rotation about Z is free.
///
/// # Example
///
/// ```
/// use sim_constraint::{Attachment, RevoluteJoint};
/// use sim_types::{BodyId, Pose};
/// use nalgebra::Point3;
///
/// let hinge = Pose::from_position(Point3::new(0.0, 0.0, 1.0));
/// let joint = RevoluteJoint::new(
///     Attachment::world(hinge),
///     Attachment::from_world_frame(BodyId::new(0), &Pose::identity(), &hinge),
/// );
/// assert_eq!(joint.bodies(), [None, Some(BodyId::new(0))]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RevoluteJoint {
    /// Frame on the first body.
    pub a: Attachment,
    /// Frame on the second body.
    pub b: Attachment,
}

impl RevoluteJoint {
    /// Create a revolute joint between two attachment frames.
    #[must_use]
    pub const fn new(a: Attachment, b: Attachment) -> Self {
        Self { a, b }
    }

    /// Hinge two bodies at a shared frame given in world coordinates.
    ///
    /// The bodies' current poses are used to express the frame locally, so
    /// the joint starts satisfied.
    #[must_use]
    pub fn from_world_frame(
        body_a: BodyId,
        pose_a: &Pose,
        body_b: BodyId,
        pose_b: &Pose,
        world_frame: &Pose,
    ) -> Self {
        Self::new(
            Attachment::from_world_frame(body_a, pose_a, world_frame),
            Attachment::from_world_frame(body_b, pose_b, world_frame),
        )
    }

    /// Bodies referenced by the joint.
    #[must_use]
    pub const fn bodies(&self) -> [Option<BodyId>; 2] {
        [self.a.body, self.b.body]
    }

    /// Append the five rows of this joint.
    pub fn rows(&self, bodies: &[BodyState], rows: &mut RowBuffer) {
        let (Some(a), Some(b)) = (self.a.resolve(bodies), self.b.resolve(bodies)) else {
            return;
        };
        point_rows(&a, &b, rows);
        alignment_rows(&a, &b, rows);
    }

    /// Joint angle: rotation of frame B's X axis about frame A's Z axis,
    /// measured from frame A's X axis.
    #[must_use]
    pub fn relative_angle(&self, bodies: &[BodyState]) -> Option<f64> {
        let a = self.a.world_frame(bodies)?;
        let b = self.b.world_frame(bodies)?;
        let x_a = a.axis_x();
        let x_b = b.axis_x();
        Some(a.axis_z().dot(&x_a.cross(&x_b)).atan2(x_a.dot(&x_b)))
    }
}

// ============================================================================
// Spherical Joint
// ============================================================================

/// A ball joint: frame origins coincide, rotation is free.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SphericalJoint {
    /// Frame on the first body.
    pub a: Attachment,
    /// Frame on the second body.
    pub b: Attachment,
}

impl SphericalJoint {
    /// Create a spherical joint between two attachment frames.
    #[must_use]
    pub const fn new(a: Attachment, b: Attachment) -> Self {
        Self { a, b }
    }

    /// Bodies referenced by the joint.
    #[must_use]
    pub const fn bodies(&self) -> [Option<BodyId>; 2] {
        [self.a.body, self.b.body]
    }

    /// Append the three rows of this joint.
    pub fn rows(&self, bodies: &[BodyState], rows: &mut RowBuffer) {
        if let (Some(a), Some(b)) = (self.a.resolve(bodies), self.b.resolve(bodies)) {
            point_rows(&a, &b, rows);
        }
    }
}

// ============================================================================
// Parallel Orientation
// ============================================================================

/// Keeps the Z axes of two frames parallel; translation and spin about Z are free.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParallelOrientationConstraint {
    /// Frame on the first body.
    pub a: Attachment,
    /// Frame on the second body.
    pub b: Attachment,
}

impl ParallelOrientationConstraint {
    /// Create a parallel-orientation constraint between two attachment frames.
    #[must_use]
    pub const fn new(a: Attachment, b: Attachment) -> Self {
        Self { a, b }
    }

    /// Bodies referenced by the constraint.
    #[must_use]
    pub const fn bodies(&self) -> [Option<BodyId>; 2] {
        [self.a.body, self.b.body]
    }

    /// Append the two rows of this constraint.
    pub fn rows(&self, bodies: &[BodyState], rows: &mut RowBuffer) {
        if let (Some(a), Some(b)) = (self.a.resolve(bodies), self.b.resolve(bodies)) {
            alignment_rows(&a, &b, rows);
        }
    }
}

// ============================================================================
// Distance Constraint
// ============================================================================

/// Keeps the origins of two frames at a fixed distance.
///
/// When the two points coincide the direction is undefined; the row then
/// has a zero Jacobian and the solver skips it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DistanceConstraint {
    /// Point on the first body.
    pub a: Attachment,
    /// Point on the second body.
    pub b: Attachment,
    /// Rest distance (m).
    pub distance: f64,
}

impl DistanceConstraint {
    /// Create a distance constraint with an explicit rest distance.
    #[must_use]
    pub const fn new(a: Attachment, b: Attachment, distance: f64) -> Self {
        Self { a, b, distance }
    }

    /// Bodies referenced by the constraint.
    #[must_use]
    pub const fn bodies(&self) -> [Option<BodyId>; 2] {
        [self.a.body, self.b.body]
    }

    /// Current distance between the two points.
    #[must_use]
    pub fn current_distance(&self, bodies: &[BodyState]) -> Option<f64> {
        let a = self.a.world_frame(bodies)?;
        let b = self.b.world_frame(bodies)?;
        Some((b.position - a.position).norm())
    }

    /// Append the single row of this constraint.
    pub fn rows(&self, bodies: &[BodyState], rows: &mut RowBuffer) {
        let (Some(a), Some(b)) = (self.a.resolve(bodies), self.b.resolve(bodies)) else {
            return;
        };
        let p_a = a.world.position;
        let p_b = b.world.position;
        let delta = p_b - p_a;
        let length = delta.norm();
        let n = delta.try_normalize(1e-12).unwrap_or_else(Vector3::zeros);

        rows.push(ConstraintRow {
            body_a: a.body,
            linear_a: -n,
            angular_a: -a.arm(&p_a).cross(&n),
            body_b: b.body,
            linear_b: n,
            angular_b: b.arm(&p_b).cross(&n),
            error: length - self.distance,
            target_velocity: 0.0,
        });
    }
}
