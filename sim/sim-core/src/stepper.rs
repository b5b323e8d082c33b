//! Time stepping.
//!
//! [`World::step`] advances the world by one step, split into
//! `config.substeps` equal substeps of length `h`. Each substep:
//!
//! 1. predicts free velocities from gravity and the accumulated loads,
//! 2. lets the constraint solver correct them,
//! 3. integrates poses with the corrected velocities,
//! 4. optionally projects positions back onto the constraint manifold,
//! 5. advances the clock by `h`.
//!
//! Accumulated forces are cleared once the whole step is done.
//!
//! # Example
//!
//! ```
//! use sim_core::World;
//! use sim_types::{MassProperties, Pose, RigidBodyState, SimulationConfig};
//! use nalgebra::Point3;
//!
//! let mut world = World::new(SimulationConfig::default());
//! let ball = world
//!     .add_body(
//!         RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 0.0, 10.0))),
//!         MassProperties::sphere(1.0, 0.5),
//!     )
//!     .unwrap();
//!
//! let reports = world.run_for(1.0).unwrap();
//! assert_eq!(reports.len(), 100);
//! assert!(world.body(ball).unwrap().pose().position.z < 10.0);
//! ```

use sim_constraint::SolverReport;
use sim_types::SimError;
use tracing::trace;

use crate::world::World;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Diagnostics for one call to [`World::step`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StepReport {
    /// Simulation time after the step.
    pub time: f64,
    /// Step length.
    pub dt: f64,
    /// Number of substeps taken.
    pub substeps: usize,
    /// Solver sweeps summed over all substeps.
    pub solver_iterations: usize,
    /// Whether the solver converged in every substep.
    pub converged: bool,
    /// Singular rows skipped, summed over all substeps.
    pub skipped_rows: usize,
    /// Largest constraint residual after the step.
    pub max_position_error: f64,
    /// Solver report of the last substep.
    pub solver: SolverReport,
}

impl World {
    /// Advance the simulation by `dt`.
    ///
    /// Solver non-convergence is not an error; it is reported in the
    /// returned [`StepReport`].
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidTimestep`] if `dt` is not positive and
    /// finite, or a configuration error if the world's configuration is
    /// invalid. The world is unchanged on error.
    pub fn step(&mut self, dt: f64) -> sim_types::Result<StepReport> {
        if !dt.is_finite() || dt <= 0.0 {
            return Err(SimError::InvalidTimestep(dt));
        }
        self.config.validate()?;

        let substeps = self.config.substeps;
        #[allow(clippy::cast_precision_loss)]
        let h = dt / substeps as f64;

        let mut solver_iterations = 0;
        let mut converged = true;
        let mut skipped_rows = 0;
        let mut last = SolverReport::empty(self.constraints.len());
        for _ in 0..substeps {
            let report = self.substep(h);
            solver_iterations += report.iterations;
            converged &= report.converged;
            skipped_rows += report.skipped_rows;
            last = report;
        }

        self.clear_forces();
        self.step_count += 1;

        let max_position_error = self.max_constraint_residual();
        trace!(
            step = self.step_count,
            time = self.time,
            solver_iterations,
            converged,
            max_position_error,
            "step complete"
        );

        let report = StepReport {
            time: self.time,
            dt,
            substeps,
            solver_iterations,
            converged,
            skipped_rows,
            max_position_error,
            solver: last,
        };
        self.last_report = Some(report.clone());
        Ok(report)
    }

    /// Step with the configured timestep until `duration` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] for a negative or non-finite
    /// duration, and propagates any error from [`World::step`].
    pub fn run_for(&mut self, duration: f64) -> sim_types::Result<Vec<StepReport>> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(SimError::invalid_config(format!(
                "duration must be non-negative, got {duration}"
            )));
        }

        let dt = self.timestep();
        // Bounded: duration and dt are finite and positive.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps = (duration / dt - 1e-9).ceil().max(0.0) as usize;

        let mut reports = Vec::with_capacity(steps);
        for _ in 0..steps {
            reports.push(self.step(dt)?);
        }
        Ok(reports)
    }

    fn substep(&mut self, h: f64) -> SolverReport {
        let gravity = self.config.gravity;
        let mut states: Vec<_> = self
            .bodies
            .iter()
            .map(|body| body.solver_state(body.predicted_velocity(h, &gravity)))
            .collect();

        let report = self
            .solver
            .solve(&self.constraints, &mut states, self.time, h);

        for (body, state) in self.bodies.iter_mut().zip(&states) {
            body.integrate_pose(h, state.twist);
        }

        let end = self.time + h;
        if self.solver.config().position_iterations > 0 {
            let mut states = self.body_states();
            let remaining = self
                .solver
                .project_positions(&self.constraints, &mut states, end);
            for (body, state) in self.bodies.iter_mut().zip(&states) {
                if !body.is_fixed {
                    body.state.pose = state.pose;
                }
            }
            trace!(remaining, "position projection");
        }
        self.time = end;

        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use sim_types::{ExternalForce, MassProperties, Pose, RigidBodyState, SimulationConfig};

    fn falling_world(config: SimulationConfig) -> (World, sim_types::BodyId) {
        let mut world = World::new(config);
        let id = world
            .add_body(
                RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 0.0, 10.0))),
                MassProperties::sphere(1.0, 0.5),
            )
            .unwrap();
        (world, id)
    }

    #[test]
    fn test_invalid_timestep_leaves_world_untouched() {
        let (mut world, id) = falling_world(SimulationConfig::default());
        for dt in [0.0, -0.01, f64::NAN, f64::INFINITY] {
            assert!(matches!(world.step(dt), Err(SimError::InvalidTimestep(_))));
        }
        assert_eq!(world.step_count(), 0);
        assert_relative_eq!(world.time(), 0.0);
        assert_relative_eq!(world.body(id).unwrap().pose().position.z, 10.0);
    }

    #[test]
    fn test_free_fall_semi_implicit() {
        let (mut world, id) = falling_world(SimulationConfig::default());
        let report = world.step(0.1).unwrap();

        let body = world.body(id).unwrap();
        assert_relative_eq!(body.twist().linear.z, -0.981, epsilon = 1e-12);
        assert_relative_eq!(body.pose().position.z, 10.0 - 0.0981, epsilon = 1e-12);
        assert_relative_eq!(report.time, 0.1, epsilon = 1e-12);
        assert_eq!(world.step_count(), 1);
        assert!(report.converged);
    }

    #[test]
    fn test_substeps_split_the_step() {
        let (mut world, id) = falling_world(SimulationConfig::default().substeps(4));
        let report = world.step(0.1).unwrap();

        // Four substeps of 0.025: z = 10 - g h² (1 + 2 + 3 + 4)
        let expected = 10.0 - 9.81 * 0.025 * 0.025 * 10.0;
        assert_relative_eq!(
            world.body(id).unwrap().pose().position.z,
            expected,
            epsilon = 1e-12
        );
        assert_eq!(report.substeps, 4);
        assert_eq!(world.step_count(), 1);
    }

    #[test]
    fn test_forces_cleared_after_step() {
        let (mut world, id) = falling_world(SimulationConfig::default().zero_gravity());
        world
            .apply_external_force(&ExternalForce::at_com(id, Vector3::new(10.0, 0.0, 0.0)))
            .unwrap();

        world.step(0.1).unwrap();
        assert_relative_eq!(world.body(id).unwrap().twist().linear.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(world.body(id).unwrap().accumulated_force, Vector3::zeros());

        world.step(0.1).unwrap();
        assert_relative_eq!(world.body(id).unwrap().twist().linear.x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_run_for_step_count() {
        let (mut world, _) = falling_world(SimulationConfig::default());
        let reports = world.run_for(0.5).unwrap();

        assert_eq!(reports.len(), 50);
        assert_relative_eq!(world.time(), 0.5, epsilon = 1e-9);
        assert!(world.last_report().is_some());
        assert!(world.run_for(-1.0).is_err());
    }
}
