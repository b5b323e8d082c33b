//! Bilateral constraints and their iterative solver.
//!
//! This crate turns joints between rigid bodies into scalar constraint rows
//! and solves for the impulses that keep those rows satisfied.
//!
//! # Constraint Kinds
//!
//! - [`RevoluteJoint`]: Hinge about the attachment frames' Z axis (5 rows)
//! - [`SphericalJoint`]: Ball joint (3 rows)
//! - [`ParallelOrientationConstraint`]: Z axes kept parallel (2 rows)
//! - [`PathFollowerConstraint`]: Point driven along a [`PathCurve`] (3 rows)
//! - [`DistanceConstraint`]: Fixed point-to-point distance (1 row)
//!
//! All kinds are gathered in the closed enum [`Constraint`], which yields
//! [`ConstraintRow`]s through one contract: residual, Jacobian blocks for
//! both bodies, and an optional prescribed velocity.
//!
//! # Constraint Formulation
//!
//! ```text
//! C(q) = 0                           (position constraint)
//! J v = v_target - (β/h) C           (velocity constraint, J = dC/dq)
//! ```
//!
//! [`GaussSeidelSolver`] assembles `J M⁻¹ Jᵀ` for the whole system and relaxes
//! the multipliers, warm-started from the previous step. Closed kinematic
//! loops make the system rank-deficient; regularization and a bounded number
//! of sweeps give a best-effort answer that is reported, never raised.
//!
//! # Example
//!
//! ```
//! use sim_constraint::{Attachment, BodyState, Constraint, GaussSeidelSolver, RevoluteJoint};
//! use sim_types::{BodyId, MassProperties, Pose, Twist};
//! use nalgebra::{Point3, Vector3};
//!
//! let ground = Pose::identity();
//! let link = Pose::from_position(Point3::new(0.5, 0.0, 0.0));
//! let mut bodies = vec![
//!     BodyState::fixed(ground),
//!     BodyState::dynamic(link, Twist::linear(Vector3::new(0.0, 0.0, -1.0)), &MassProperties::sphere(1.0, 0.05)),
//! ];
//!
//! // Hinge at the origin about world Y.
//! let hinge = Pose::from_axis_angle(&Vector3::x_axis(), -std::f64::consts::FRAC_PI_2);
//! let joint: Constraint =
//!     RevoluteJoint::from_world_frame(BodyId::new(0), &ground, BodyId::new(1), &link, &hinge).into();
//!
//! let report = GaussSeidelSolver::default().solve(&[joint], &mut bodies, 0.0, 0.01);
//! assert!(report.converged);
//! assert_eq!(report.rows, 5);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-constraint/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::missing_errors_doc,
)]

mod constraint;
mod joint;
mod solver;
mod trajectory;
mod types;

pub use constraint::{Constraint, ConstraintId};
pub use joint::{
    Attachment, DistanceConstraint, ParallelOrientationConstraint, RevoluteJoint, RowBuffer,
    SphericalJoint,
};
pub use solver::{GaussSeidelSolver, SINGULAR_THRESHOLD, SolverReport};
pub use trajectory::PathFollowerConstraint;
pub use types::{BodyState, ConstraintForce, ConstraintRow};

// Re-export types needed to describe constraints
pub use sim_path::{AbscissaFunction, PathCurve};
pub use sim_types::{BodyId, Pose, SolverConfig, SolverType};
