//! Industrial robot arm driven along a closed path.
//!
//! Nine parts (base, turret, bicep, elbow, forearm, wrist, hand and the
//! balancer cylinder and rod) are joined by nine revolute joints. Turret,
//! cylinder, rod and bicep form a closed parallelogram loop. All joints are
//! passive: the hand is pulled around a circle by a path follower attached
//! to the floor, and a parallel-orientation constraint keeps its roll axis
//! fixed, so the rest of the arm moves as in inverse kinematics.
//!
//! Part geometry is authored in CAD coordinates (Y up, arm reaching along
//! +X) and rotated into the simulation frame (Z up) by [`root_frame`].

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_core::{
    AbscissaFunction, Assembler, Attachment, Body, BodyId, Constraint, ConstraintId, MassProperties,
    ParallelOrientationConstraint, PartCatalog, PartGeometry, PartShape, PartSource, PathCurve,
    PathFollowerConstraint, Pose, SimError, SimulationConfig, SolverConfig, World,
};
use sim_path::ArcSegment;

/// Density of every part, kg/m³.
pub const DENSITY: f64 = 1000.0;

/// Radius of the hand's circular path, m.
pub const PATH_RADIUS: f64 = 0.3;

/// Time for one lap of the path at unit rate, s.
pub const PATH_DURATION: f64 = 2.0;

/// Path time advanced per second of simulation time.
pub const PATH_RATE: f64 = 0.5;

/// Names of the catalog parts, in insertion order.
pub const PARTS: [&str; 9] = [
    "base", "turret", "bicep", "elbow", "forearm", "wrist", "hand", "cylinder", "rod",
];

/// Revolute joints as `(parent, child, marker)`.
pub const JOINTS: [(&str, &str, &str); 9] = [
    ("base", "turret", "base_turret"),
    ("turret", "bicep", "turret_bicep"),
    ("bicep", "elbow", "bicep_elbow"),
    ("elbow", "forearm", "elbow_forearm"),
    ("forearm", "wrist", "forearm_wrist"),
    ("wrist", "hand", "wrist_hand"),
    ("turret", "cylinder", "turret_cylinder"),
    ("cylinder", "rod", "cylinder_rod"),
    ("rod", "bicep", "rod_bicep"),
];

fn cad_frame(x: f64, y: f64, z: f64, rotation: UnitQuaternion<f64>) -> Pose {
    Pose::from_position_rotation(Point3::new(x, y, z), rotation)
}

/// Local Z along CAD Y.
fn vertical() -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -FRAC_PI_2)
}

/// Local Z along CAD X.
fn along_arm() -> UnitQuaternion<f64> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_2)
}

/// Local Z along CAD Z.
fn lateral() -> UnitQuaternion<f64> {
    UnitQuaternion::identity()
}

/// Parts and joint markers of the arm in CAD coordinates.
#[must_use]
pub fn arm_catalog() -> PartCatalog {
    let cuboid = |hx, hy, hz| PartShape::cuboid(Vector3::new(hx, hy, hz));

    PartCatalog::new()
        .with_part(
            "base",
            PartGeometry::new(cuboid(0.4, 0.2, 0.4), cad_frame(0.0, 0.2, 0.0, lateral())),
        )
        .with_part(
            "turret",
            PartGeometry::new(cuboid(0.3, 0.25, 0.3), cad_frame(0.0, 0.65, 0.0, lateral())),
        )
        .with_part(
            "bicep",
            PartGeometry::new(cuboid(0.1, 0.6, 0.1), cad_frame(0.2, 1.5, 0.0, lateral())),
        )
        .with_part(
            "elbow",
            PartGeometry::new(cuboid(0.15, 0.15, 0.15), cad_frame(0.2, 2.1, 0.0, lateral())),
        )
        .with_part(
            "forearm",
            PartGeometry::new(
                PartShape::cylinder(0.08, 0.6),
                cad_frame(0.95, 2.1, 0.0, along_arm()),
            ),
        )
        .with_part(
            "wrist",
            PartGeometry::new(cuboid(0.08, 0.08, 0.08), cad_frame(1.65, 2.1, 0.0, lateral())),
        )
        .with_part(
            "hand",
            PartGeometry::new(cuboid(0.05, 0.1, 0.1), cad_frame(1.8, 2.1, 0.0, lateral())),
        )
        .with_part(
            "cylinder",
            PartGeometry::new(
                PartShape::cylinder(0.06, 0.25),
                cad_frame(-0.2, 1.15, 0.0, vertical()),
            ),
        )
        .with_part(
            "rod",
            PartGeometry::new(cuboid(0.2, 0.03, 0.03), cad_frame(0.0, 1.4, 0.0, lateral())),
        )
        .with_marker("base_turret", cad_frame(0.0, 0.4, 0.0, vertical()))
        .with_marker("turret_bicep", cad_frame(0.2, 0.9, 0.0, lateral()))
        .with_marker("bicep_elbow", cad_frame(0.2, 2.1, 0.0, lateral()))
        .with_marker("elbow_forearm", cad_frame(0.35, 2.1, 0.0, along_arm()))
        .with_marker("forearm_wrist", cad_frame(1.55, 2.1, 0.0, lateral()))
        .with_marker("wrist_hand", cad_frame(1.75, 2.1, 0.0, along_arm()))
        .with_marker("turret_cylinder", cad_frame(-0.2, 0.9, 0.0, lateral()))
        .with_marker("cylinder_rod", cad_frame(-0.2, 1.4, 0.0, lateral()))
        .with_marker("rod_bicep", cad_frame(0.2, 1.4, 0.0, lateral()))
}

/// CAD to simulation transform: a quarter turn about X brings CAD Y up,
/// then a half turn about the new vertical.
#[must_use]
pub fn root_frame() -> Pose {
    let tilt = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2);
    let turn = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI);
    Pose::from_position_rotation(Point3::origin(), turn * tilt)
}

/// Pose of the fixed floor slab (5 m × 5 m × 1 m, top face at z = 0).
#[must_use]
pub fn floor_pose() -> Pose {
    Pose::from_position(Point3::new(0.0, 0.0, -0.5))
}

/// Step configuration: 100 Hz and at most 300 solver sweeps.
#[must_use]
pub fn arm_config() -> SimulationConfig {
    SimulationConfig::with_timestep(0.01).solver(SolverConfig::default().max_iterations(300))
}

/// Closed circular path for the hand, in floor coordinates.
///
/// The circle lies in the vertical plane through the arm and starts at the
/// hand's current position.
///
/// # Errors
///
/// Returns [`sim_core::SimError::InvalidPath`] for a degenerate radius.
pub fn hand_path(hand: &Pose, floor: &Pose) -> sim_types::Result<PathCurve> {
    // Local X along world X, local Y up.
    let plane = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2);
    let center = hand.position + Vector3::z() * PATH_RADIUS;
    let frame = Pose::from_position_rotation(center, plane).relative_to(floor);

    let arc = ArcSegment::new(frame, PATH_RADIUS, -FRAC_PI_2, -FRAC_PI_2 + TAU, true);
    PathCurve::closed(vec![arc.into()])?.with_duration(PATH_DURATION)
}

/// Body IDs of the assembled arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmBodies {
    /// Fixed base.
    pub base: BodyId,
    /// Turret, yawing on the base.
    pub turret: BodyId,
    /// Upper arm.
    pub bicep: BodyId,
    /// Elbow housing.
    pub elbow: BodyId,
    /// Forearm, rolling about its own axis.
    pub forearm: BodyId,
    /// Wrist.
    pub wrist: BodyId,
    /// End effector.
    pub hand: BodyId,
    /// Balancer cylinder.
    pub cylinder: BodyId,
    /// Balancer rod.
    pub rod: BodyId,
    /// Fixed floor carrying the hand path.
    pub floor: BodyId,
}

/// The assembled arm and its world.
#[derive(Debug, Clone)]
pub struct RobotArm {
    /// Simulation world holding the arm.
    pub world: World,
    /// Body IDs.
    pub bodies: ArmBodies,
    /// Revolute joints in [`JOINTS`] order.
    pub joints: Vec<ConstraintId>,
    /// Hand path follower.
    pub trajectory: ConstraintId,
    /// Hand orientation constraint.
    pub parallel: ConstraintId,
}

impl RobotArm {
    /// Assemble the arm from [`arm_catalog`].
    ///
    /// # Errors
    ///
    /// Propagates assembly errors; none are expected for the built-in catalog.
    pub fn build(config: SimulationConfig) -> sim_types::Result<Self> {
        Self::build_from(&arm_catalog(), config)
    }

    /// Assemble the arm from any part source with the expected names.
    ///
    /// # Errors
    ///
    /// Returns [`sim_core::SimError::PartNotFound`] for a missing part or
    /// marker, or a validation error from the world.
    pub fn build_from<S: PartSource + ?Sized>(
        source: &S,
        config: SimulationConfig,
    ) -> sim_types::Result<Self> {
        let mut world = World::new(config);
        let assembler = Assembler::new(source, root_frame()).with_density(DENSITY);

        let mut ids = Vec::with_capacity(PARTS.len());
        for name in PARTS {
            let id = if name == "base" {
                assembler.add_fixed_part(&mut world, name)?
            } else {
                assembler.add_part(&mut world, name)?
            };
            ids.push(id);
        }

        let floor_shape = PartShape::cuboid(Vector3::new(2.5, 2.5, 0.5));
        let floor = world.insert_body(
            Body::fixed(floor_pose())
                .with_mass_properties(floor_shape.mass_properties(DENSITY))
                .with_name("floor"),
        )?;

        let mut joints = Vec::with_capacity(JOINTS.len());
        for (parent, child, marker) in JOINTS {
            let a = world.body_id(parent)?;
            let b = world.body_id(child)?;
            joints.push(assembler.add_revolute(&mut world, a, b, marker)?);
        }

        let bodies = ArmBodies {
            base: ids[0],
            turret: ids[1],
            bicep: ids[2],
            elbow: ids[3],
            forearm: ids[4],
            wrist: ids[5],
            hand: ids[6],
            cylinder: ids[7],
            rod: ids[8],
            floor,
        };

        let hand_pose = *world
            .body(bodies.hand)
            .ok_or(SimError::InvalidBodyId(bodies.hand))?
            .pose();
        let trajectory = world.add_constraint(
            PathFollowerConstraint::new(
                Attachment::body(bodies.hand, Pose::identity()),
                Attachment::body(floor, Pose::identity()),
                hand_path(&hand_pose, &floor_pose())?,
            )
            .with_abscissa(AbscissaFunction::ramp(0.0, PATH_RATE)),
        )?;

        let wrist_frame = assembler.marker_frame("wrist_hand")?;
        let parallel = world.add_constraint(ParallelOrientationConstraint::new(
            Attachment::from_world_frame(bodies.hand, &hand_pose, &wrist_frame),
            Attachment::from_world_frame(floor, &floor_pose(), &wrist_frame),
        ))?;

        tracing::debug!(
            bodies = world.body_count(),
            constraints = world.constraint_count(),
            "robot arm assembled"
        );

        Ok(Self {
            world,
            bodies,
            joints,
            trajectory,
            parallel,
        })
    }

    /// Current target of the hand on its path.
    #[must_use]
    pub fn hand_target(&self) -> Option<Point3<f64>> {
        match self.world.constraint(self.trajectory)? {
            Constraint::PathFollower(follower) => {
                follower.target(&self.world.body_states(), self.world.time())
            }
            _ => None,
        }
    }

    /// Distance between the hand and its target.
    #[must_use]
    pub fn hand_tracking_error(&self) -> Option<f64> {
        match self.world.constraint(self.trajectory)? {
            Constraint::PathFollower(follower) => {
                follower.tracking_error(&self.world.body_states(), self.world.time())
            }
            _ => None,
        }
    }

    /// Total mass of the movable parts.
    #[must_use]
    pub fn moving_mass(&self) -> f64 {
        self.world
            .bodies()
            .filter(|b| !b.is_fixed)
            .map(|b| b.mass_props.mass)
            .sum()
    }

    /// Mass properties of a body, if it exists.
    #[must_use]
    pub fn mass_of(&self, id: BodyId) -> Option<MassProperties> {
        self.world.body(id).map(|b| b.mass_props)
    }
}
