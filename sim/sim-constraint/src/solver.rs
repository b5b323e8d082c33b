//! Gauss-Seidel impulse solver for bilateral constraints.
//!
//! Each step assembles the system `A λ = b` with
//!
//! ```text
//! A = J M⁻¹ Jᵀ + ε I
//! b = v_target - J v_free - (β / h) clamp(C)
//! ```
//!
//! and relaxes λ row by row:
//!
//! ```text
//! x_i = (b_i - Σ_{j≠i} A_ij λ_j) / A_ii
//! λ_i ← (1 - ω) λ_i + ω x_i
//! ```
//!
//! Gauss-Seidel uses the freshest λ_j; Jacobi uses the previous sweep's.
//! Corrected velocities are `v = v_free + M⁻¹ Jᵀ λ`.
//!
//! Rows with a vanishing diagonal (zero Jacobian or only fixed bodies) are
//! skipped and counted. Running out of iterations is not an error: the
//! best iterate is applied and the report says so.

use nalgebra::{DMatrix, DVector};
use sim_types::{SolverConfig, SolverType};
use std::ops::Range;

use crate::constraint::Constraint;
use crate::types::{BodyState, ConstraintForce, ConstraintRow};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Diagonal entries of `J M⁻¹ Jᵀ` below this are treated as singular.
pub const SINGULAR_THRESHOLD: f64 = 1e-15;

/// Outcome of one velocity solve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverReport {
    /// Sweeps performed.
    pub iterations: usize,
    /// Whether the update fell below tolerance.
    pub converged: bool,
    /// Largest per-row update in the last sweep, in velocity units.
    pub max_update: f64,
    /// `|b - A λ|` after the last sweep.
    pub residual_norm: f64,
    /// `|b - A λ|` before the first sweep.
    pub initial_residual_norm: f64,
    /// Number of scalar rows assembled.
    pub rows: usize,
    /// Rows skipped as singular.
    pub skipped_rows: usize,
    /// Whether λ was seeded from the previous solve.
    pub used_warm_start: bool,
    /// Reaction of each constraint, in constraint order.
    pub forces: Vec<ConstraintForce>,
}

impl SolverReport {
    /// Report for a system with no rows.
    #[must_use]
    pub fn empty(constraints: usize) -> Self {
        Self {
            iterations: 0,
            converged: true,
            max_update: 0.0,
            residual_norm: 0.0,
            initial_residual_norm: 0.0,
            rows: 0,
            skipped_rows: 0,
            used_warm_start: false,
            forces: vec![ConstraintForce::zero(); constraints],
        }
    }

    /// Final residual relative to the initial one.
    #[must_use]
    pub fn convergence_ratio(&self) -> f64 {
        if self.initial_residual_norm > SINGULAR_THRESHOLD {
            self.residual_norm / self.initial_residual_norm
        } else {
            0.0
        }
    }
}

/// Iterative solver for the velocity-level constraint system.
///
/// Keeps the last multipliers to warm-start the next solve.
///
/// # Example
///
/// ```
/// use sim_constraint::{Attachment, BodyState, Constraint, GaussSeidelSolver, SphericalJoint};
/// use sim_types::{BodyId, MassProperties, Pose, SolverConfig, Twist};
/// use nalgebra::{Point3, Vector3};
///
/// // A ball hanging from a world pivot, currently moving downward.
/// let mut bodies = vec![BodyState::dynamic(
///     Pose::from_position(Point3::new(0.0, 0.0, -1.0)),
///     Twist::linear(Vector3::new(0.0, 0.0, -0.1)),
///     &MassProperties::sphere(1.0, 0.1),
/// )];
/// let joint: Constraint = SphericalJoint::new(
///     Attachment::world(Pose::identity()),
///     Attachment::body(BodyId::new(0), Pose::from_position(Point3::new(0.0, 0.0, 1.0))),
/// )
/// .into();
///
/// let mut solver = GaussSeidelSolver::new(SolverConfig::default());
/// let report = solver.solve(&[joint], &mut bodies, 0.0, 0.01);
/// assert!(report.converged);
/// assert!(bodies[0].twist.linear.z.abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct GaussSeidelSolver {
    config: SolverConfig,
    cached_lambda: Vec<f64>,
}

impl Default for GaussSeidelSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl GaussSeidelSolver {
    /// Create a solver with the given configuration.
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            cached_lambda: Vec::new(),
        }
    }

    /// The solver configuration.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Replace the configuration; the warm-start cache is kept.
    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }

    /// Forget the cached multipliers.
    pub fn clear_warm_start(&mut self) {
        self.cached_lambda.clear();
    }

    /// Multipliers of the last solve.
    #[must_use]
    pub fn last_lambda(&self) -> &[f64] {
        &self.cached_lambda
    }

    /// Correct the free velocities in `bodies` so the constraints hold.
    ///
    /// `bodies` is indexed by `BodyId`; on entry its twists are the
    /// unconstrained velocities, on return the corrected ones. `time` is the
    /// simulation time at the start of the step and `dt` the step length.
    pub fn solve(
        &mut self,
        constraints: &[Constraint],
        bodies: &mut [BodyState],
        time: f64,
        dt: f64,
    ) -> SolverReport {
        let (rows, spans) = assemble_rows(constraints, bodies, time, dt);
        let n = rows.len();
        if n == 0 || dt <= 0.0 {
            self.cached_lambda.clear();
            return SolverReport::empty(constraints.len());
        }

        let jacobian = build_jacobian(&rows, bodies.len());
        let inv_mass = build_inverse_mass_matrix(bodies);
        let mut effective_mass = &jacobian * &inv_mass * jacobian.transpose();

        let active: Vec<bool> = (0..n)
            .map(|i| effective_mass[(i, i)] >= SINGULAR_THRESHOLD)
            .collect();
        let skipped_rows = active.iter().filter(|&&a| !a).count();
        if skipped_rows > 0 {
            tracing::trace!(skipped_rows, "skipping singular constraint rows");
        }
        for i in 0..n {
            effective_mass[(i, i)] += self.config.regularization;
        }

        let rhs = self.compute_rhs(&rows, &jacobian, bodies, dt);

        let used_warm_start = self.config.warm_starting && self.cached_lambda.len() == n;
        let mut lambda = if used_warm_start {
            DVector::from_iterator(
                n,
                self.cached_lambda
                    .iter()
                    .zip(&active)
                    .map(|(&l, &a)| if a { l * self.config.warm_start_factor } else { 0.0 }),
            )
        } else {
            DVector::zeros(n)
        };

        let initial_residual_norm = residual(&effective_mass, &lambda, &rhs, &active);

        let mut iterations = 0;
        let mut converged = false;
        let mut max_update = 0.0;
        for iter in 0..self.config.max_iterations {
            iterations = iter + 1;
            max_update = match self.config.solver_type {
                SolverType::GaussSeidel => {
                    self.gauss_seidel_sweep(&effective_mass, &rhs, &active, &mut lambda)
                }
                SolverType::Jacobi => self.jacobi_sweep(&effective_mass, &rhs, &active, &mut lambda),
            };

            if !max_update.is_finite() {
                break;
            }
            if iterations >= self.config.min_iterations && max_update < self.config.tolerance {
                converged = true;
                break;
            }
        }

        let residual_norm = residual(&effective_mass, &lambda, &rhs, &active);
        if !converged {
            tracing::debug!(
                iterations,
                max_update,
                residual_norm,
                rows = n,
                "constraint solver did not converge"
            );
        }

        // v = v_free + M⁻¹ Jᵀ λ, applied row by row.
        let mut forces = vec![ConstraintForce::zero(); constraints.len()];
        for (force, span) in forces.iter_mut().zip(&spans) {
            for i in span.clone() {
                let (Some(row), Some(&l)) = (rows.get(i), lambda.get(i)) else {
                    continue;
                };
                if let Some(body) = row.body_a.and_then(|id| bodies.get_mut(id.index())) {
                    body.apply_impulse(&row.linear_a, &row.angular_a, l);
                }
                if let Some(body) = row.body_b.and_then(|id| bodies.get_mut(id.index())) {
                    body.apply_impulse(&row.linear_b, &row.angular_b, l);
                }
                force.accumulate(row, l, dt);
            }
        }

        self.cached_lambda.clear();
        self.cached_lambda.extend(lambda.iter());

        SolverReport {
            iterations,
            converged,
            max_update,
            residual_norm,
            initial_residual_norm,
            rows: n,
            skipped_rows,
            used_warm_start,
            forces,
        }
    }

    /// Nonlinear block Gauss-Seidel on the position residual.
    ///
    /// Runs `position_iterations` sweeps over the constraints. The rows of one
    /// constraint are corrected together, solving `K Δλ = -C` with `K` the
    /// constraint's block of `J M⁻¹ Jᵀ`, then moving poses along `M⁻¹ Jᵀ Δλ`.
    /// Returns the largest remaining row residual, or 0 when there is nothing
    /// to project.
    pub fn project_positions(
        &self,
        constraints: &[Constraint],
        bodies: &mut [BodyState],
        time: f64,
    ) -> f64 {
        for _ in 0..self.config.position_iterations {
            for constraint in constraints {
                let rows = constraint.rows(bodies, time, 0.0);
                let Some(delta) = block_correction(&rows, bodies, self.config.regularization)
                else {
                    continue;
                };
                for (row, &d) in rows.iter().zip(delta.iter()) {
                    if let Some(body) = row.body_a.and_then(|id| bodies.get_mut(id.index())) {
                        body.apply_displacement(&row.linear_a, &row.angular_a, d);
                    }
                    if let Some(body) = row.body_b.and_then(|id| bodies.get_mut(id.index())) {
                        body.apply_displacement(&row.linear_b, &row.angular_b, d);
                    }
                }
            }
        }

        constraints
            .iter()
            .flat_map(|c| c.rows(bodies, time, 0.0))
            .map(|row| row.error.abs())
            .fold(0.0, f64::max)
    }

    /// Right-hand side `b = v_target - J v - (β/h) clamp(C)`.
    fn compute_rhs(
        &self,
        rows: &[ConstraintRow],
        jacobian: &DMatrix<f64>,
        bodies: &[BodyState],
        dt: f64,
    ) -> DVector<f64> {
        let mut velocities = DVector::zeros(6 * bodies.len());
        for (b, body) in bodies.iter().enumerate() {
            velocities
                .fixed_rows_mut::<3>(6 * b)
                .copy_from(&body.twist.linear);
            velocities
                .fixed_rows_mut::<3>(6 * b + 3)
                .copy_from(&body.twist.angular);
        }
        let jv = jacobian * velocities;
        let limit = self.config.max_position_correction;
        let stiffness = self.config.baumgarte_factor / dt;

        DVector::from_iterator(
            rows.len(),
            rows.iter().zip(jv.iter()).map(|(row, &v)| {
                row.target_velocity - v - stiffness * row.error.clamp(-limit, limit)
            }),
        )
    }

    /// One Gauss-Seidel sweep with SOR. Returns the largest `|Δλ_i| A_ii`.
    fn gauss_seidel_sweep(
        &self,
        a: &DMatrix<f64>,
        b: &DVector<f64>,
        active: &[bool],
        x: &mut DVector<f64>,
    ) -> f64 {
        let omega = self.config.sor_factor;
        let mut max_update: f64 = 0.0;

        for (i, _) in active.iter().enumerate().filter(|(_, on)| **on) {
            let a_ii = a[(i, i)];
            let mut sum = 0.0;
            for j in 0..a.ncols() {
                if j != i {
                    sum += a[(i, j)] * x[j];
                }
            }
            let x_gs = (b[i] - sum) / a_ii;
            let updated = (1.0 - omega).mul_add(x[i], omega * x_gs);
            max_update = max_update.max((updated - x[i]).abs() * a_ii);
            x[i] = updated;
        }

        max_update
    }

    /// One Jacobi sweep with relaxation. Returns the largest `|Δλ_i| A_ii`.
    fn jacobi_sweep(
        &self,
        a: &DMatrix<f64>,
        b: &DVector<f64>,
        active: &[bool],
        x: &mut DVector<f64>,
    ) -> f64 {
        let omega = self.config.sor_factor;
        let previous = x.clone();
        let mut max_update: f64 = 0.0;

        for (i, _) in active.iter().enumerate().filter(|(_, on)| **on) {
            let a_ii = a[(i, i)];
            let off_diagonal = a.row(i).dot(&previous.transpose()) - a_ii * previous[i];
            let x_j = (b[i] - off_diagonal) / a_ii;
            let updated = (1.0 - omega).mul_add(previous[i], omega * x_j);
            max_update = max_update.max((updated - previous[i]).abs() * a_ii);
            x[i] = updated;
        }

        max_update
    }
}

/// Evaluate every constraint's rows, recording which rows belong to which constraint.
fn assemble_rows(
    constraints: &[Constraint],
    bodies: &[BodyState],
    time: f64,
    dt: f64,
) -> (Vec<ConstraintRow>, Vec<Range<usize>>) {
    let mut rows = Vec::with_capacity(constraints.iter().map(Constraint::row_count).sum());
    let mut spans = Vec::with_capacity(constraints.len());
    for constraint in constraints {
        let start = rows.len();
        rows.extend(constraint.rows(bodies, time, dt));
        spans.push(start..rows.len());
    }
    (rows, spans)
}

/// Multipliers removing one constraint's position residual to first order.
///
/// Singular rows are decoupled and left at zero. None when no row is active
/// or the block cannot be solved.
fn block_correction(
    rows: &[ConstraintRow],
    bodies: &[BodyState],
    regularization: f64,
) -> Option<DVector<f64>> {
    let active: Vec<bool> = rows
        .iter()
        .map(|row| row.effective_mass(bodies) >= SINGULAR_THRESHOLD)
        .collect();
    if !active.contains(&true) {
        return None;
    }

    let n = rows.len();
    let k = DMatrix::from_fn(n, n, |i, j| match (active[i], active[j]) {
        (true, true) if i == j => rows[i].effective_mass(bodies) + regularization,
        (true, true) => rows[i].coupling(&rows[j], bodies),
        _ if i == j => 1.0,
        _ => 0.0,
    });
    let rhs = DVector::from_fn(n, |i, _| if active[i] { -rows[i].error } else { 0.0 });

    k.clone()
        .cholesky()
        .map(|c| c.solve(&rhs))
        .or_else(|| k.lu().solve(&rhs))
        .filter(|delta| delta.iter().all(|d| d.is_finite()))
}

/// Dense Jacobian, one row per constraint row and six columns `[v, ω]` per body.
fn build_jacobian(rows: &[ConstraintRow], num_bodies: usize) -> DMatrix<f64> {
    let mut jacobian = DMatrix::zeros(rows.len(), 6 * num_bodies);

    for (i, row) in rows.iter().enumerate() {
        let blocks = [
            (row.body_a, &row.linear_a, &row.angular_a),
            (row.body_b, &row.linear_b, &row.angular_b),
        ];
        for (body, linear, angular) in blocks {
            let Some(body) = body.filter(|id| id.index() < num_bodies) else {
                continue;
            };
            let col = 6 * body.index();
            for k in 0..3 {
                jacobian[(i, col + k)] += linear[k];
                jacobian[(i, col + 3 + k)] += angular[k];
            }
        }
    }

    jacobian
}

/// Block-diagonal inverse mass matrix; fixed bodies contribute zero blocks.
fn build_inverse_mass_matrix(bodies: &[BodyState]) -> DMatrix<f64> {
    let n = 6 * bodies.len();
    let mut inv_mass = DMatrix::zeros(n, n);

    for (b, body) in bodies.iter().enumerate() {
        let base = 6 * b;
        for k in 0..3 {
            inv_mass[(base + k, base + k)] = body.inv_mass;
        }
        for r in 0..3 {
            for c in 0..3 {
                inv_mass[(base + 3 + r, base + 3 + c)] = body.inv_inertia[(r, c)];
            }
        }
    }

    inv_mass
}

/// `|b - A x|` over the active rows.
fn residual(a: &DMatrix<f64>, x: &DVector<f64>, b: &DVector<f64>, active: &[bool]) -> f64 {
    let r = b - a * x;
    r.iter()
        .zip(active)
        .filter(|(_, on)| **on)
        .map(|(v, _)| v * v)
        .sum::<f64>()
        .sqrt()
}
