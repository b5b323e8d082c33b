//! Configuration types for simulation.
//!
//! This module provides configuration types that control how the simulation
//! runs: timestep, gravity, substepping and constraint solver settings.

use crate::dynamics::Gravity;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main configuration for a simulation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Default timestep used by `run_for` (seconds).
    pub timestep: f64,
    /// Gravity configuration.
    pub gravity: Gravity,
    /// Constraint solver configuration.
    pub solver: SolverConfig,
    /// Number of substeps each step is divided into.
    pub substeps: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 0.01,
            gravity: Gravity::earth(),
            solver: SolverConfig::default(),
            substeps: 1,
        }
    }
}

impl SimulationConfig {
    /// Create a new simulation config with the given timestep.
    #[must_use]
    pub fn with_timestep(timestep: f64) -> Self {
        Self {
            timestep,
            ..Default::default()
        }
    }

    /// Configuration for accurate linkage tracking: 240 Hz with position projection.
    #[must_use]
    pub fn high_fidelity() -> Self {
        Self {
            timestep: 1.0 / 240.0,
            solver: SolverConfig::high_accuracy(),
            ..Default::default()
        }
    }

    /// Set the gravity.
    #[must_use]
    pub fn gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity.
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Gravity::zero();
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Set the number of substeps per step.
    #[must_use]
    pub fn substeps(mut self, substeps: usize) -> Self {
        self.substeps = substeps;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.timestep.is_finite() || self.timestep <= 0.0 {
            return Err(crate::SimError::InvalidTimestep(self.timestep));
        }

        if self.timestep > 1.0 {
            return Err(crate::SimError::invalid_config(
                "timestep > 1 second is likely an error",
            ));
        }

        if self.substeps == 0 {
            return Err(crate::SimError::invalid_config(
                "substeps must be at least 1",
            ));
        }

        if !self.gravity.acceleration.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }

        self.solver.validate()?;

        Ok(())
    }

    /// Get the frequency in Hz.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        1.0 / self.timestep
    }
}

/// Relaxation scheme used to solve for constraint impulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverType {
    /// Gauss-Seidel: each row sees the impulses already updated in this sweep.
    #[default]
    GaussSeidel,
    /// Jacobi: every row is updated from the previous sweep's impulses.
    Jacobi,
}

impl std::fmt::Display for SolverType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GaussSeidel => write!(f, "Gauss-Seidel"),
            Self::Jacobi => write!(f, "Jacobi"),
        }
    }
}

/// Configuration for the constraint solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// Relaxation scheme.
    pub solver_type: SolverType,

    /// Maximum number of sweeps over all constraint rows.
    pub max_iterations: usize,

    /// Minimum sweeps before convergence is checked.
    pub min_iterations: usize,

    /// Convergence tolerance on the largest per-row update in a sweep,
    /// measured as a velocity change (m/s or rad/s).
    pub tolerance: f64,

    /// Baumgarte stabilization factor (0-1).
    /// Fraction of the position error fed back as velocity each step.
    pub baumgarte_factor: f64,

    /// Largest position error (m or rad) fed back per row in one step.
    pub max_position_correction: f64,

    /// Small positive value added to the diagonal of the effective mass.
    /// Keeps redundant rows (closed loops) from blowing up.
    pub regularization: f64,

    /// Successive over-relaxation factor.
    /// - 1.0: Standard Gauss-Seidel
    /// - < 1.0: Under-relaxation (more stable)
    /// - > 1.0: Over-relaxation (faster, up to ~1.9)
    pub sor_factor: f64,

    /// Initialize impulses from the previous step's solution.
    pub warm_starting: bool,

    /// Scaling factor for warm start impulses (0-1).
    pub warm_start_factor: f64,

    /// Sweeps of position projection after integration (0 disables it).
    pub position_iterations: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solver_type: SolverType::GaussSeidel,
            max_iterations: 300,
            min_iterations: 2,
            tolerance: 1e-8,
            baumgarte_factor: 0.2,
            max_position_correction: 0.2,
            regularization: 1e-10,
            sor_factor: 1.0,
            warm_starting: true,
            warm_start_factor: 0.9,
            position_iterations: 0,
        }
    }
}

impl SolverConfig {
    /// High-accuracy configuration: tighter tolerance plus position projection.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-10,
            regularization: 1e-12,
            position_iterations: 4,
            ..Default::default()
        }
    }

    /// Fast configuration for interactive use.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            max_iterations: 40,
            tolerance: 1e-5,
            baumgarte_factor: 0.3,
            regularization: 1e-8,
            sor_factor: 1.3,
            ..Default::default()
        }
    }

    /// Set the relaxation scheme.
    #[must_use]
    pub fn solver_type(mut self, solver_type: SolverType) -> Self {
        self.solver_type = solver_type;
        self
    }

    /// Set the maximum number of sweeps.
    #[must_use]
    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    #[must_use]
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the Baumgarte factor.
    #[must_use]
    pub fn baumgarte_factor(mut self, factor: f64) -> Self {
        self.baumgarte_factor = factor;
        self
    }

    /// Set the SOR factor.
    #[must_use]
    pub fn sor_factor(mut self, factor: f64) -> Self {
        self.sor_factor = factor;
        self
    }

    /// Enable or disable warm starting.
    #[must_use]
    pub fn warm_starting(mut self, enabled: bool) -> Self {
        self.warm_starting = enabled;
        self
    }

    /// Set the number of position projection sweeps.
    #[must_use]
    pub fn position_iterations(mut self, iterations: usize) -> Self {
        self.position_iterations = iterations;
        self
    }

    /// Validate the solver configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_iterations == 0 {
            return Err(crate::SimError::invalid_config(
                "max_iterations must be at least 1",
            ));
        }

        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "tolerance must be positive",
            ));
        }

        if !(0.0..=1.0).contains(&self.baumgarte_factor) {
            return Err(crate::SimError::invalid_config(
                "baumgarte factor must be in range [0, 1]",
            ));
        }

        if self.sor_factor <= 0.0 || self.sor_factor >= 2.0 {
            return Err(crate::SimError::invalid_config(
                "SOR factor must be in range (0, 2)",
            ));
        }

        if !(0.0..=1.0).contains(&self.warm_start_factor) {
            return Err(crate::SimError::invalid_config(
                "warm start factor must be in range [0, 1]",
            ));
        }

        if self.regularization < 0.0 || self.max_position_correction <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "regularization must be non-negative and position correction positive",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_relative_eq!(config.timestep, 0.01, epsilon = 1e-12);
        assert_eq!(config.substeps, 1);
        assert_eq!(config.solver.solver_type, SolverType::GaussSeidel);
    }

    #[test]
    fn test_config_builder() {
        let config = SimulationConfig::with_timestep(0.001)
            .zero_gravity()
            .substeps(4)
            .solver(SolverConfig::default().max_iterations(50).sor_factor(1.2));

        assert_relative_eq!(config.timestep, 0.001, epsilon = 1e-12);
        assert_relative_eq!(config.gravity.acceleration.norm(), 0.0);
        assert_eq!(config.substeps, 4);
        assert_eq!(config.solver.max_iterations, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SimulationConfig::default();

        config.timestep = -0.01;
        assert_eq!(
            config.validate(),
            Err(crate::SimError::InvalidTimestep(-0.01))
        );

        config.timestep = f64::NAN;
        assert!(config.validate().is_err());

        config.timestep = 0.01;
        config.substeps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_solver_validation() {
        assert!(SolverConfig::default().validate().is_ok());
        assert!(SolverConfig::high_accuracy().validate().is_ok());
        assert!(SolverConfig::fast().validate().is_ok());

        assert!(SolverConfig::default().sor_factor(2.0).validate().is_err());
        assert!(SolverConfig::default().tolerance(0.0).validate().is_err());
        assert!(SolverConfig::default().max_iterations(0).validate().is_err());
        assert!(
            SolverConfig::default()
                .baumgarte_factor(1.5)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_solver_type_display() {
        assert_eq!(SolverType::GaussSeidel.to_string(), "Gauss-Seidel");
        assert_eq!(SolverType::Jacobi.to_string(), "Jacobi");
    }
}
