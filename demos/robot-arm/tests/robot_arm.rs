//! Assembly and stepping of the robot arm.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use approx::assert_relative_eq;
use nalgebra::Point3;
use robot_arm::{DENSITY, JOINTS, PARTS, RobotArm, arm_catalog, arm_config, root_frame};
use sim_core::{PartCatalog, PartGeometry, PartSource, Pose, SimError};

/// Catalog with one part hidden.
struct Without<'a> {
    catalog: &'a PartCatalog,
    hidden: &'a str,
}

impl PartSource for Without<'_> {
    fn part(&self, name: &str) -> Option<PartGeometry> {
        if name == self.hidden {
            None
        } else {
            self.catalog.part(name)
        }
    }

    fn marker(&self, name: &str) -> Option<Pose> {
        self.catalog.marker(name)
    }
}

#[test]
fn builds_bodies_and_constraints() {
    let arm = RobotArm::build(arm_config()).unwrap();

    assert_eq!(arm.world.body_count(), PARTS.len() + 1);
    assert_eq!(arm.joints.len(), JOINTS.len());
    // Nine revolutes, the path follower and the parallel constraint.
    assert_eq!(arm.world.constraint_count(), 11);

    assert!(arm.world.body(arm.bodies.base).unwrap().is_fixed);
    assert!(arm.world.body(arm.bodies.floor).unwrap().is_fixed);
    assert!(!arm.world.body(arm.bodies.hand).unwrap().is_fixed);
}

#[test]
fn starts_with_every_constraint_satisfied() {
    let arm = RobotArm::build(arm_config()).unwrap();

    for (i, residual) in arm.world.constraint_residuals().into_iter().enumerate() {
        assert!(residual < 1e-9, "constraint {i} starts violated by {residual}");
    }
    assert_relative_eq!(arm.hand_tracking_error().unwrap(), 0.0, epsilon = 1e-9);
}

#[test]
fn root_frame_stands_the_arm_up() {
    let arm = RobotArm::build(arm_config()).unwrap();

    // CAD (1.8, 2.1, 0): reach along CAD X, height along CAD Y.
    let hand = arm.world.body(arm.bodies.hand).unwrap().pose().position;
    assert_relative_eq!(hand, Point3::new(-1.8, 0.0, 2.1), epsilon = 1e-9);
    assert_relative_eq!(
        root_frame().transform_vector(&nalgebra::Vector3::y()),
        nalgebra::Vector3::z(),
        epsilon = 1e-12
    );
}

#[test]
fn masses_follow_density() {
    let arm = RobotArm::build(arm_config()).unwrap();

    // Bicep is a 0.2 × 1.2 × 0.2 m box.
    let bicep = arm.mass_of(arm.bodies.bicep).unwrap();
    assert_relative_eq!(bicep.mass, 0.048 * DENSITY, epsilon = 1e-9);
    assert!(arm.moving_mass() > bicep.mass);
}

#[test]
fn missing_part_is_reported() {
    let catalog = arm_catalog();
    let source = Without {
        catalog: &catalog,
        hidden: "rod",
    };

    let result = RobotArm::build_from(&source, arm_config());
    assert_eq!(
        result.err(),
        Some(SimError::PartNotFound {
            name: "rod".to_owned()
        })
    );
}

#[test]
fn steps_stably_along_the_path() {
    let mut arm = RobotArm::build(arm_config()).unwrap();
    let base = *arm.world.body(arm.bodies.base).unwrap().pose();
    let start = arm.world.body(arm.bodies.hand).unwrap().pose().position;

    for _ in 0..100 {
        let report = arm.world.step(0.01).unwrap();
        assert!(report.max_position_error.is_finite());
        assert!(report.max_position_error < 0.2, "{report:?}");
    }

    for body in arm.world.bodies() {
        assert!(body.state.is_finite(), "{} diverged", body.id);
        assert!((body.pose().rotation.norm() - 1.0).abs() < 1e-9);
    }
    assert_eq!(*arm.world.body(arm.bodies.base).unwrap().pose(), base);

    // A quarter lap in: the hand has moved well away from where it started.
    let hand = arm.world.body(arm.bodies.hand).unwrap().pose().position;
    assert!((hand - start).norm() > 0.2, "hand stayed at {hand}");
    assert!(arm.hand_tracking_error().unwrap() < 0.1);
}
