//! Core types for rigid multibody simulation.
//!
//! This crate provides the foundational types shared by the constraint solver,
//! the path utilities and the world/stepper:
//!
//! - [`Pose`] - Position and orientation (frame algebra)
//! - [`Twist`] - Linear and angular velocity
//! - [`RigidBodyState`] - Pose plus twist of one rigid body
//! - [`MassProperties`] - Mass and inertia about the centre of mass
//! - [`SimulationConfig`] / [`SolverConfig`] - Timestep, gravity, solver settings
//! - [`SimError`] - Construction-time configuration errors
//!
//! # Design Philosophy
//!
//! These types are **pure data** plus the small amount of frame algebra every
//! other crate needs. Numerical problems inside a step (singular constraint rows,
//! solver non-convergence) are not errors; they are reported as diagnostics by
//! the solver. Only assembly mistakes produce a [`SimError`].
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: forward
//! - Z: up
//! - Right-handed
//!
//! Body poses locate the centre of mass. Linear and angular velocities are
//! expressed in world coordinates.
//!
//! # Example
//!
//! ```
//! use sim_types::{Pose, RigidBodyState, Twist};
//! use nalgebra::{Point3, UnitQuaternion, Vector3};
//!
//! let state = RigidBodyState::new(
//!     Pose::from_position(Point3::new(0.0, 0.0, 1.0)),
//!     Twist::zero(),
//! );
//!
//! assert_eq!(state.pose.position.z, 1.0);
//! assert!(state.twist.linear.norm() < 1e-10);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::cast_precision_loss,       // usize to f64 is fine for counts
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod config;
mod dynamics;
mod error;

pub use body::{BodyId, MassProperties, Pose, RigidBodyState, Twist};
pub use config::{SimulationConfig, SolverConfig, SolverType};
pub use dynamics::{ExternalForce, Gravity};
pub use error::SimError;

// Re-export math types for convenience
pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
