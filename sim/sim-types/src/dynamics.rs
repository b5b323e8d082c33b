//! External loads: gravity and per-body forces.

use crate::BodyId;
use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An external force applied to a rigid body for one step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExternalForce {
    /// The body to apply the force to.
    pub body: BodyId,
    /// Force vector in world coordinates (Newtons).
    pub force: Vector3<f64>,
    /// Torque vector in world coordinates (Newton-meters).
    pub torque: Vector3<f64>,
    /// Point of application in world coordinates.
    /// If None, the force acts at the centre of mass.
    pub point: Option<Point3<f64>>,
}

impl ExternalForce {
    /// Create a force applied at the centre of mass.
    #[must_use]
    pub fn at_com(body: BodyId, force: Vector3<f64>) -> Self {
        Self {
            body,
            force,
            torque: Vector3::zeros(),
            point: None,
        }
    }

    /// Create a pure torque.
    #[must_use]
    pub fn torque_only(body: BodyId, torque: Vector3<f64>) -> Self {
        Self {
            body,
            force: Vector3::zeros(),
            torque,
            point: None,
        }
    }

    /// Create a force applied at a world point.
    #[must_use]
    pub fn at_point(body: BodyId, force: Vector3<f64>, point: Point3<f64>) -> Self {
        Self {
            body,
            force,
            torque: Vector3::zeros(),
            point: Some(point),
        }
    }

    /// Create both force and torque at the centre of mass.
    #[must_use]
    pub fn full(body: BodyId, force: Vector3<f64>, torque: Vector3<f64>) -> Self {
        Self {
            body,
            force,
            torque,
            point: None,
        }
    }

    /// Total torque about the centre of mass located at `com`.
    #[must_use]
    pub fn torque_about(&self, com: &Point3<f64>) -> Vector3<f64> {
        match self.point {
            Some(point) => self.torque + (point - com).cross(&self.force),
            None => self.torque,
        }
    }
}

/// Gravity configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gravity {
    /// Acceleration due to gravity (m/s²).
    pub acceleration: Vector3<f64>,
}

impl Default for Gravity {
    fn default() -> Self {
        Self::earth()
    }
}

impl Gravity {
    /// Standard Earth gravity (9.81 m/s² in -Z direction).
    #[must_use]
    pub fn earth() -> Self {
        Self {
            acceleration: Vector3::new(0.0, 0.0, -9.81),
        }
    }

    /// Zero gravity.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            acceleration: Vector3::zeros(),
        }
    }

    /// Custom gravity vector.
    #[must_use]
    pub const fn new(acceleration: Vector3<f64>) -> Self {
        Self { acceleration }
    }

    /// Gravitational force on a mass.
    #[must_use]
    pub fn force_on_mass(&self, mass: f64) -> Vector3<f64> {
        self.acceleration * mass
    }
}
