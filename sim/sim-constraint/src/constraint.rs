//! The closed set of constraint kinds and their shared row contract.

use sim_types::BodyId;
use smallvec::SmallVec;

use crate::joint::{
    DistanceConstraint, ParallelOrientationConstraint, RevoluteJoint, RowBuffer, SphericalJoint,
};
use crate::trajectory::PathFollowerConstraint;
use crate::types::BodyState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Index of a constraint within a world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConstraintId(pub usize);

impl ConstraintId {
    /// Create a constraint ID from an index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Index into the constraint arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Constraint({})", self.0)
    }
}

/// A bilateral constraint between one or two bodies.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Constraint {
    /// Hinge.
    Revolute(RevoluteJoint),
    /// Ball joint.
    Spherical(SphericalJoint),
    /// Parallel Z axes.
    ParallelOrientation(ParallelOrientationConstraint),
    /// Point follows a path.
    PathFollower(PathFollowerConstraint),
    /// Fixed point-to-point distance.
    Distance(DistanceConstraint),
}

impl Constraint {
    /// Short name of the constraint kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Revolute(_) => "revolute",
            Self::Spherical(_) => "spherical",
            Self::ParallelOrientation(_) => "parallel",
            Self::PathFollower(_) => "path-follower",
            Self::Distance(_) => "distance",
        }
    }

    /// Number of scalar rows (degrees of freedom removed).
    #[must_use]
    pub const fn row_count(&self) -> usize {
        match self {
            Self::Revolute(_) => 5,
            Self::Spherical(_) | Self::PathFollower(_) => 3,
            Self::ParallelOrientation(_) => 2,
            Self::Distance(_) => 1,
        }
    }

    /// Bodies the constraint acts on; the world frame is not listed.
    #[must_use]
    pub fn bodies(&self) -> SmallVec<[BodyId; 2]> {
        let pair = match self {
            Self::Revolute(c) => c.bodies(),
            Self::Spherical(c) => c.bodies(),
            Self::ParallelOrientation(c) => c.bodies(),
            Self::PathFollower(c) => c.bodies(),
            Self::Distance(c) => c.bodies(),
        };
        pair.into_iter().flatten().collect()
    }

    /// Evaluate the rows at simulation time `time` for a step of length `dt`.
    ///
    /// Returns fewer than [`row_count`](Self::row_count) rows only when a
    /// referenced body is missing from `bodies`.
    #[must_use]
    pub fn rows(&self, bodies: &[BodyState], time: f64, dt: f64) -> RowBuffer {
        let mut rows = RowBuffer::new();
        match self {
            Self::Revolute(c) => c.rows(bodies, &mut rows),
            Self::Spherical(c) => c.rows(bodies, &mut rows),
            Self::ParallelOrientation(c) => c.rows(bodies, &mut rows),
            Self::PathFollower(c) => c.rows(bodies, time, dt, &mut rows),
            Self::Distance(c) => c.rows(bodies, &mut rows),
        }
        rows
    }

    /// Euclidean norm of the position residual.
    #[must_use]
    pub fn residual(&self, bodies: &[BodyState], time: f64) -> f64 {
        self.rows(bodies, time, 0.0)
            .iter()
            .map(|row| row.error * row.error)
            .sum::<f64>()
            .sqrt()
    }
}

impl From<RevoluteJoint> for Constraint {
    fn from(joint: RevoluteJoint) -> Self {
        Self::Revolute(joint)
    }
}

impl From<SphericalJoint> for Constraint {
    fn from(joint: SphericalJoint) -> Self {
        Self::Spherical(joint)
    }
}

impl From<ParallelOrientationConstraint> for Constraint {
    fn from(constraint: ParallelOrientationConstraint) -> Self {
        Self::ParallelOrientation(constraint)
    }
}

impl From<PathFollowerConstraint> for Constraint {
    fn from(constraint: PathFollowerConstraint) -> Self {
        Self::PathFollower(constraint)
    }
}

impl From<DistanceConstraint> for Constraint {
    fn from(constraint: DistanceConstraint) -> Self {
        Self::Distance(constraint)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::joint::Attachment;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use sim_path::{LineSegment, PathCurve};
    use sim_types::{MassProperties, Pose, Twist};

    fn bodies() -> Vec<BodyState> {
        vec![
            BodyState::fixed(Pose::identity()),
            BodyState::dynamic(
                Pose::from_position(Point3::new(0.0, 0.0, -1.0)),
                Twist::zero(),
                &MassProperties::sphere(1.0, 0.1),
            ),
        ]
    }

    fn all_kinds() -> Vec<Constraint> {
        let a = Attachment::body(BodyId::new(0), Pose::identity());
        let b = Attachment::body(BodyId::new(1), Pose::from_position(Point3::new(0.0, 0.0, 1.0)));
        let path = PathCurve::open(vec![
            LineSegment::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0)).into(),
        ])
        .unwrap();

        vec![
            RevoluteJoint::new(a, b).into(),
            SphericalJoint::new(a, b).into(),
            ParallelOrientationConstraint::new(a, b).into(),
            PathFollowerConstraint::new(b, a, path).into(),
            DistanceConstraint::new(a, b, 0.0).into(),
        ]
    }

    #[test]
    fn test_row_counts_match_rows() {
        let bodies = bodies();
        for constraint in all_kinds() {
            let rows = constraint.rows(&bodies, 0.0, 0.01);
            assert_eq!(rows.len(), constraint.row_count(), "{}", constraint.kind());
        }
    }

    #[test]
    fn test_residuals_start_at_zero() {
        let bodies = bodies();
        for constraint in all_kinds() {
            assert_relative_eq!(constraint.residual(&bodies, 0.0), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_world_frame_not_listed_in_bodies() {
        let joint: Constraint = RevoluteJoint::new(
            Attachment::world(Pose::identity()),
            Attachment::body(BodyId::new(3), Pose::identity()),
        )
        .into();
        assert_eq!(joint.bodies().as_slice(), &[BodyId::new(3)]);
    }
}
