//! World management: bodies, constraints and queries.

use hashbrown::HashMap;
use nalgebra::{Matrix3, Point3, Vector3};
use sim_constraint::{
    BodyState, Constraint, ConstraintId, GaussSeidelSolver, RevoluteJoint,
};
use sim_types::{
    BodyId, ExternalForce, Gravity, MassProperties, Pose, RigidBodyState, SimError,
    SimulationConfig, Twist,
};

use crate::integrators::{free_velocity, integrate_pose};
use crate::stepper::StepReport;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A rigid body in the simulation world.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Body {
    /// Arena index; assigned when the body is inserted.
    pub id: BodyId,
    /// Optional unique name.
    pub name: Option<String>,
    /// Current state (pose of the centre of mass + twist).
    pub state: RigidBodyState,
    /// Mass and inertia about the centre of mass.
    pub mass_props: MassProperties,
    /// Whether this body is fixed (infinite mass, never integrated).
    pub is_fixed: bool,
    /// Accumulated external force (cleared each step).
    pub accumulated_force: Vector3<f64>,
    /// Accumulated external torque about the centre of mass (cleared each step).
    pub accumulated_torque: Vector3<f64>,
}

impl Body {
    /// Create a movable body.
    #[must_use]
    pub fn new(state: RigidBodyState, mass_props: MassProperties) -> Self {
        Self {
            id: BodyId::new(0),
            name: None,
            state,
            mass_props,
            is_fixed: false,
            accumulated_force: Vector3::zeros(),
            accumulated_torque: Vector3::zeros(),
        }
    }

    /// Create a fixed body at the given pose.
    #[must_use]
    pub fn fixed(pose: Pose) -> Self {
        Self {
            is_fixed: true,
            ..Self::new(
                RigidBodyState::at_rest(pose),
                MassProperties::new(0.0, Matrix3::zeros()),
            )
        }
    }

    /// Set the body name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the mass properties (kept for reporting on fixed bodies).
    #[must_use]
    pub fn with_mass_properties(mut self, mass_props: MassProperties) -> Self {
        self.mass_props = mass_props;
        self
    }

    /// Current pose of the centre of mass.
    #[must_use]
    pub fn pose(&self) -> &Pose {
        &self.state.pose
    }

    /// Current velocity; always zero for fixed bodies.
    #[must_use]
    pub fn twist(&self) -> &Twist {
        &self.state.twist
    }

    /// Apply a force at the centre of mass.
    pub fn apply_force(&mut self, force: Vector3<f64>) {
        if !self.is_fixed {
            self.accumulated_force += force;
        }
    }

    /// Apply a torque.
    pub fn apply_torque(&mut self, torque: Vector3<f64>) {
        if !self.is_fixed {
            self.accumulated_torque += torque;
        }
    }

    /// Apply a force at a world-space point.
    pub fn apply_force_at_point(&mut self, force: Vector3<f64>, point: Point3<f64>) {
        if !self.is_fixed {
            self.accumulated_force += force;
            let r = point - self.state.pose.position;
            self.accumulated_torque += r.cross(&force);
        }
    }

    /// Apply a force at the centre of mass together with a torque.
    pub fn apply_external_force(&mut self, force: Vector3<f64>, torque: Vector3<f64>) {
        self.apply_force(force);
        self.apply_torque(torque);
    }

    /// Clear accumulated forces and torques.
    pub fn clear_forces(&mut self) {
        self.accumulated_force = Vector3::zeros();
        self.accumulated_torque = Vector3::zeros();
    }

    /// Inverse inertia tensor in world coordinates, `R I⁻¹ Rᵀ`.
    ///
    /// Zero for fixed bodies and for a singular inertia.
    #[must_use]
    pub fn world_inverse_inertia(&self) -> Matrix3<f64> {
        if self.is_fixed {
            return Matrix3::zeros();
        }
        let r = self.state.pose.rotation.to_rotation_matrix();
        self.mass_props
            .inverse_inertia()
            .map_or_else(Matrix3::zeros, |inv| r.matrix() * inv * r.matrix().transpose())
    }

    /// Unconstrained velocity after `dt` under gravity and the accumulated load.
    #[must_use]
    pub fn predicted_velocity(&self, dt: f64, gravity: &Gravity) -> Twist {
        if self.is_fixed {
            return Twist::zero();
        }
        let acceleration =
            gravity.acceleration + self.accumulated_force * self.mass_props.inverse_mass();
        free_velocity(
            &self.state.twist,
            &self.mass_props.world_inertia(&self.state.pose.rotation),
            &self.world_inverse_inertia(),
            &acceleration,
            &self.accumulated_torque,
            dt,
        )
    }

    /// Take `twist` as the new velocity and advance the pose by `dt`.
    ///
    /// Fixed bodies keep their pose and a zero velocity.
    pub fn integrate_pose(&mut self, dt: f64, twist: Twist) {
        if self.is_fixed {
            self.state.twist = Twist::zero();
            return;
        }
        self.state.twist = twist;
        integrate_pose(&mut self.state.pose, &twist, dt);
    }

    /// Translational plus rotational kinetic energy.
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        if self.is_fixed {
            return 0.0;
        }
        self.state.twist.kinetic_energy(
            self.mass_props.mass,
            &self.mass_props.world_inertia(&self.state.pose.rotation),
        )
    }

    /// State handed to the constraint solver, carrying `twist` as velocity.
    #[must_use]
    pub fn solver_state(&self, twist: Twist) -> BodyState {
        if self.is_fixed {
            BodyState::fixed(self.state.pose)
        } else {
            BodyState::dynamic(self.state.pose, twist, &self.mass_props)
        }
    }
}

/// The simulation world: body and constraint arenas plus the clock.
///
/// Bodies and constraints are only ever added, so [`BodyId`] and
/// [`ConstraintId`] stay valid for the life of the world.
#[derive(Debug, Clone)]
pub struct World {
    /// Simulation configuration.
    pub(crate) config: SimulationConfig,
    /// Current simulation time.
    pub(crate) time: f64,
    /// Step counter.
    pub(crate) step_count: u64,
    /// All rigid bodies, indexed by `BodyId`.
    pub(crate) bodies: Vec<Body>,
    /// All constraints, indexed by `ConstraintId`.
    pub(crate) constraints: Vec<Constraint>,
    /// Body name to ID mapping.
    body_names: HashMap<String, BodyId>,
    /// Constraint solver with its warm-start cache.
    pub(crate) solver: GaussSeidelSolver,
    /// Diagnostics of the last step.
    pub(crate) last_report: Option<StepReport>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl World {
    /// Create a new empty world with the given configuration.
    ///
    /// The configuration is validated on every step.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        let solver = GaussSeidelSolver::new(config.solver);
        Self {
            config,
            time: 0.0,
            step_count: 0,
            bodies: Vec::new(),
            constraints: Vec::new(),
            body_names: HashMap::new(),
            solver,
            last_report: None,
        }
    }

    /// Get the simulation configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the configuration.
    ///
    /// # Errors
    ///
    /// Returns the validation error and keeps the old configuration if the
    /// new one is invalid.
    pub fn set_config(&mut self, config: SimulationConfig) -> sim_types::Result<()> {
        config.validate()?;
        self.solver.set_config(config.solver);
        self.config = config;
        Ok(())
    }

    /// Get the current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Get the step count.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Get the timestep from configuration.
    #[must_use]
    pub fn timestep(&self) -> f64 {
        self.config.timestep
    }

    /// Get the number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Get the number of constraints.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Diagnostics of the most recent step.
    #[must_use]
    pub fn last_report(&self) -> Option<&StepReport> {
        self.last_report.as_ref()
    }

    // =========================================================================
    // Body Management
    // =========================================================================

    /// Add a movable body and return its ID.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidMassProperties`] for a non-positive mass or
    /// an inertia that is not positive definite, and
    /// [`SimError::InvalidConfig`] for a non-finite state.
    pub fn add_body(
        &mut self,
        state: RigidBodyState,
        mass_props: MassProperties,
    ) -> sim_types::Result<BodyId> {
        self.insert_body(Body::new(state, mass_props))
    }

    /// Add a fixed body at the given pose.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] for a non-finite pose.
    pub fn add_fixed_body(&mut self, pose: Pose) -> sim_types::Result<BodyId> {
        self.insert_body(Body::fixed(pose))
    }

    /// Add a pre-built body, assigning it the next ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is movable with invalid mass properties,
    /// its state is not finite, or its name is already taken. The world is
    /// unchanged on error.
    pub fn insert_body(&mut self, mut body: Body) -> sim_types::Result<BodyId> {
        if !body.is_fixed {
            body.mass_props.validate()?;
        }
        if !body.state.is_finite() {
            return Err(SimError::invalid_config("body state must be finite"));
        }
        if let Some(name) = &body.name {
            if self.body_names.contains_key(name) {
                return Err(SimError::DuplicateBodyName { name: name.clone() });
            }
        }

        let id = BodyId::new(self.bodies.len());
        body.id = id;
        if body.is_fixed {
            body.state.twist = Twist::zero();
        }
        if let Some(name) = &body.name {
            self.body_names.insert(name.clone(), id);
        }
        self.bodies.push(body);
        Ok(id)
    }

    /// Get a body by ID.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id.index())
    }

    /// Get a mutable reference to a body by ID.
    #[must_use]
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(id.index())
    }

    /// Get a body by name.
    #[must_use]
    pub fn body_by_name(&self, name: &str) -> Option<&Body> {
        self.body_names.get(name).and_then(|id| self.body(*id))
    }

    /// Look up a body ID by name.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::BodyNotFound`] if no body has that name.
    pub fn body_id(&self, name: &str) -> sim_types::Result<BodyId> {
        self.body_names
            .get(name)
            .copied()
            .ok_or_else(|| SimError::BodyNotFound {
                name: name.to_owned(),
            })
    }

    /// Iterate over all bodies in ID order.
    pub fn bodies(&self) -> impl Iterator<Item = &Body> {
        self.bodies.iter()
    }

    /// Whether `id` refers to a body of this world.
    #[must_use]
    pub fn contains_body(&self, id: BodyId) -> bool {
        id.index() < self.bodies.len()
    }

    // =========================================================================
    // Constraint Management
    // =========================================================================

    /// Add a constraint between bodies of this world.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyId`] if the constraint references a body
    /// that is not part of this world; the world is unchanged on error.
    pub fn add_constraint(
        &mut self,
        constraint: impl Into<Constraint>,
    ) -> sim_types::Result<ConstraintId> {
        let constraint = constraint.into();
        if let Some(missing) = constraint
            .bodies()
            .into_iter()
            .find(|id| !self.contains_body(*id))
        {
            return Err(SimError::InvalidBodyId(missing));
        }
        validate_constraint(&constraint)?;

        let id = ConstraintId::new(self.constraints.len());
        tracing::trace!(%id, kind = constraint.kind(), "constraint added");
        self.constraints.push(constraint);
        Ok(id)
    }

    /// Hinge two bodies at a frame given in world coordinates.
    ///
    /// The frame's Z axis is the hinge axis. The joint is expressed in each
    /// body's current pose, so it starts satisfied.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyId`] if either body is missing.
    pub fn add_revolute(
        &mut self,
        body_a: BodyId,
        body_b: BodyId,
        world_frame: &Pose,
    ) -> sim_types::Result<ConstraintId> {
        let pose_a = *self
            .body(body_a)
            .ok_or(SimError::InvalidBodyId(body_a))?
            .pose();
        let pose_b = *self
            .body(body_b)
            .ok_or(SimError::InvalidBodyId(body_b))?
            .pose();
        self.add_constraint(RevoluteJoint::from_world_frame(
            body_a,
            &pose_a,
            body_b,
            &pose_b,
            world_frame,
        ))
    }

    /// Get a constraint by ID.
    #[must_use]
    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(id.index())
    }

    /// Iterate over all constraints in ID order.
    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    // =========================================================================
    // Force Application
    // =========================================================================

    /// Accumulate an external force for the next step.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyId`] if the body does not exist.
    pub fn apply_external_force(&mut self, force: &ExternalForce) -> sim_types::Result<()> {
        let body = self
            .body_mut(force.body)
            .ok_or(SimError::InvalidBodyId(force.body))?;
        let com = body.state.pose.position;
        body.apply_force(force.force);
        body.apply_torque(force.torque_about(&com));
        Ok(())
    }

    /// Clear all accumulated forces on all bodies.
    pub fn clear_forces(&mut self) {
        for body in &mut self.bodies {
            body.clear_forces();
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Solver view of every body at its current velocity.
    #[must_use]
    pub fn body_states(&self) -> Vec<BodyState> {
        self.bodies
            .iter()
            .map(|b| b.solver_state(b.state.twist))
            .collect()
    }

    /// Position residual of every constraint at the current time.
    #[must_use]
    pub fn constraint_residuals(&self) -> Vec<f64> {
        let states = self.body_states();
        self.constraints
            .iter()
            .map(|c| c.residual(&states, self.time))
            .collect()
    }

    /// Largest constraint residual at the current time.
    #[must_use]
    pub fn max_constraint_residual(&self) -> f64 {
        self.constraint_residuals()
            .into_iter()
            .fold(0.0, f64::max)
    }

    /// Compute the total kinetic energy of all bodies.
    #[must_use]
    pub fn total_kinetic_energy(&self) -> f64 {
        self.bodies.iter().map(Body::kinetic_energy).sum()
    }

    /// Compute the total linear momentum of all movable bodies.
    #[must_use]
    pub fn total_linear_momentum(&self) -> Vector3<f64> {
        self.bodies
            .iter()
            .filter(|b| !b.is_fixed)
            .map(|b| b.state.twist.linear * b.mass_props.mass)
            .sum()
    }

    /// Compute the centre of mass of all movable bodies.
    #[must_use]
    pub fn center_of_mass(&self) -> Option<Point3<f64>> {
        let (weighted, total) = self
            .bodies
            .iter()
            .filter(|b| !b.is_fixed)
            .fold((Vector3::zeros(), 0.0), |(sum, mass), b| {
                (
                    sum + b.state.pose.position.coords * b.mass_props.mass,
                    mass + b.mass_props.mass,
                )
            });
        (total > 0.0).then(|| Point3::from(weighted / total))
    }

    /// Check that every body state is finite.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] naming the first body with a
    /// `NaN` or infinite state.
    pub fn validate(&self) -> sim_types::Result<()> {
        match self.bodies.iter().find(|b| !b.state.is_finite()) {
            Some(body) => Err(SimError::invalid_config(format!(
                "{} has a non-finite state",
                body.id
            ))),
            None => Ok(()),
        }
    }
}

/// Parameter checks that do not depend on the world.
fn validate_constraint(constraint: &Constraint) -> sim_types::Result<()> {
    match constraint {
        Constraint::PathFollower(follower) if !follower.abscissa.is_finite() => Err(
            SimError::invalid_config("path follower abscissa function must be finite"),
        ),
        Constraint::Distance(distance)
            if !distance.distance.is_finite() || distance.distance < 0.0 =>
        {
            Err(SimError::invalid_config(format!(
                "distance must be non-negative, got {}",
                distance.distance
            )))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sim_constraint::{Attachment, DistanceConstraint, SphericalJoint};

    fn ball() -> MassProperties {
        MassProperties::sphere(2.0, 0.5)
    }

    #[test]
    fn test_add_bodies_and_lookup() {
        let mut world = World::default();
        let ground = world.add_fixed_body(Pose::identity()).unwrap();
        let arm = world
            .insert_body(
                Body::new(
                    RigidBodyState::at_rest(Pose::from_position(Point3::new(0.0, 0.0, 1.0))),
                    ball(),
                )
                .with_name("arm"),
            )
            .unwrap();

        assert_eq!(ground, BodyId::new(0));
        assert_eq!(arm, BodyId::new(1));
        assert_eq!(world.body_count(), 2);
        assert_eq!(world.body_id("arm").unwrap(), arm);
        assert!(world.body_by_name("arm").is_some());
        assert!(matches!(
            world.body_id("leg"),
            Err(SimError::BodyNotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut world = World::default();
        let body = Body::new(RigidBodyState::default(), ball()).with_name("link");
        world.insert_body(body.clone()).unwrap();

        let result = world.insert_body(body);
        assert!(matches!(result, Err(SimError::DuplicateBodyName { .. })));
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_invalid_mass_rejected() {
        let mut world = World::default();
        let result = world.add_body(
            RigidBodyState::default(),
            MassProperties::new(0.0, Matrix3::identity()),
        );
        assert!(matches!(
            result,
            Err(SimError::InvalidMassProperties { .. })
        ));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_non_finite_fixed_body_rejected() {
        let mut world = World::default();
        let result = world.add_fixed_body(Pose::from_position(Point3::new(f64::NAN, 0.0, 0.0)));

        assert!(matches!(result, Err(SimError::InvalidConfig { .. })));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_constraint_with_missing_body_leaves_world_unchanged() {
        let mut world = World::default();
        let a = world.add_body(RigidBodyState::default(), ball()).unwrap();

        let joint = SphericalJoint::new(
            Attachment::body(a, Pose::identity()),
            Attachment::body(BodyId::new(5), Pose::identity()),
        );
        let result = world.add_constraint(joint);

        assert_eq!(result, Err(SimError::InvalidBodyId(BodyId::new(5))));
        assert_eq!(world.constraint_count(), 0);
        assert!(world.add_revolute(a, BodyId::new(9), &Pose::identity()).is_err());
        assert_eq!(world.constraint_count(), 0);
    }

    #[test]
    fn test_negative_distance_rejected() {
        let mut world = World::default();
        let a = world.add_body(RigidBodyState::default(), ball()).unwrap();
        let result = world.add_constraint(DistanceConstraint::new(
            Attachment::world(Pose::identity()),
            Attachment::body(a, Pose::identity()),
            -1.0,
        ));
        assert!(result.is_err());
    }

    #[test]
    fn test_fixed_body_ignores_forces() {
        let mut body = Body::fixed(Pose::identity());
        body.apply_force(Vector3::new(1e6, 0.0, 0.0));
        body.apply_torque(Vector3::new(0.0, 1e6, 0.0));

        assert_relative_eq!(body.accumulated_force, Vector3::zeros());
        let twist = body.predicted_velocity(0.01, &Gravity::earth());
        assert_relative_eq!(twist.linear, Vector3::zeros());

        body.integrate_pose(0.01, Twist::linear(Vector3::x()));
        assert_relative_eq!(body.pose().position, Point3::origin());
        assert_relative_eq!(body.twist().linear, Vector3::zeros());
    }

    #[test]
    fn test_force_at_point_produces_torque() {
        let mut body = Body::new(RigidBodyState::default(), ball());
        body.apply_force_at_point(Vector3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 0.0));

        assert_relative_eq!(body.accumulated_torque, Vector3::new(0.0, -1.0, 0.0));
    }

    #[test]
    fn test_predicted_velocity_under_gravity_and_force() {
        let mut body = Body::new(RigidBodyState::default(), ball());
        body.apply_external_force(Vector3::new(4.0, 0.0, 0.0), Vector3::zeros());

        let twist = body.predicted_velocity(0.5, &Gravity::earth());
        assert_relative_eq!(twist.linear, Vector3::new(1.0, 0.0, -4.905), epsilon = 1e-12);
    }

    #[test]
    fn test_external_force_on_missing_body() {
        let mut world = World::default();
        let force = ExternalForce::at_com(BodyId::new(3), Vector3::x());
        assert!(world.apply_external_force(&force).is_err());
    }

    #[test]
    fn test_diagnostics() {
        let mut world = World::default();
        world
            .add_body(
                RigidBodyState::new(
                    Pose::from_position(Point3::new(1.0, 0.0, 0.0)),
                    Twist::linear(Vector3::new(1.0, 0.0, 0.0)),
                ),
                ball(),
            )
            .unwrap();
        world.add_fixed_body(Pose::identity()).unwrap();

        // KE = 0.5 * m * v² = 0.5 * 2 * 1 = 1
        assert_relative_eq!(world.total_kinetic_energy(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(world.total_linear_momentum().x, 2.0, epsilon = 1e-12);
        assert_relative_eq!(
            world.center_of_mass().unwrap(),
            Point3::new(1.0, 0.0, 0.0),
            epsilon = 1e-12
        );
        assert!(world.validate().is_ok());
        assert_relative_eq!(world.max_constraint_residual(), 0.0);
    }
}
