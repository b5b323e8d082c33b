//! Constraint-based rigid multibody simulation.
//!
//! This crate owns the simulation [`World`]: an arena of rigid bodies and
//! bilateral constraints, stepped forward with semi-implicit Euler
//! integration and an iterative velocity-level constraint solver.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Assembler / PartSource                    │
//! │  Named parts + markers → bodies (density mass) + joints      │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         World                                │
//! │  Bodies, constraints, configuration, time                    │
//! │  step(dt): free velocity → solve → integrate → project       │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              sim-constraint::GaussSeidelSolver               │
//! │  Rows → J M⁻¹ Jᵀ λ = b → corrected velocities                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Conventions
//!
//! - Z is up; [`Gravity::earth`](sim_types::Gravity::earth) points along −Z.
//! - A body's pose is the pose of its centre of mass.
//! - Linear and angular velocities are expressed in world coordinates.
//! - Fixed bodies never move and take no part in the dynamics except as
//!   anchors.
//!
//! # Quick Start
//!
//! ```
//! use sim_core::World;
//! use sim_types::{MassProperties, Pose, RigidBodyState, SimulationConfig};
//! use nalgebra::{Point3, Vector3};
//! use std::f64::consts::FRAC_PI_2;
//!
//! let mut world = World::new(SimulationConfig::default());
//! let ground = world.add_fixed_body(Pose::identity()).unwrap();
//! let bob = world
//!     .add_body(
//!         RigidBodyState::at_rest(Pose::from_position(Point3::new(1.0, 0.0, 0.0))),
//!         MassProperties::sphere(1.0, 0.1),
//!     )
//!     .unwrap();
//!
//! // Pendulum hinge at the origin, axis along world Y.
//! let hinge = Pose::from_axis_angle(&Vector3::x_axis(), -FRAC_PI_2);
//! world.add_revolute(ground, bob, &hinge).unwrap();
//!
//! world.run_for(0.5).unwrap();
//!
//! let position = world.body(bob).unwrap().pose().position;
//! assert!(position.z < 0.0);
//! assert!((position.coords.norm() - 1.0).abs() < 1e-2);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-core/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::missing_errors_doc,
)]

pub mod assembly;
pub mod integrators;
mod stepper;
mod world;

pub use assembly::{
    Assembler, DEFAULT_DENSITY, PartCatalog, PartGeometry, PartShape, PartSource,
};
pub use stepper::StepReport;
pub use world::{Body, World};

// Re-export the constraint vocabulary so callers need only this crate
pub use sim_constraint::{
    AbscissaFunction, Attachment, Constraint, ConstraintForce, ConstraintId, DistanceConstraint,
    GaussSeidelSolver, ParallelOrientationConstraint, PathCurve, PathFollowerConstraint,
    RevoluteJoint, SolverReport, SphericalJoint,
};
pub use sim_types::{
    BodyId, ExternalForce, Gravity, MassProperties, Pose, RigidBodyState, SimError,
    SimulationConfig, SolverConfig, SolverType, Twist,
};
