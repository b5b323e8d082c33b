//! Solver behaviour on small linkages: chains, closed loops and path followers.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_precision_loss)]

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use sim_constraint::{
    Attachment, BodyState, Constraint, GaussSeidelSolver, PathFollowerConstraint, RevoluteJoint,
};
use sim_path::{AbscissaFunction, ArcSegment, PathCurve};
use sim_types::{BodyId, MassProperties, Pose, SolverConfig, Twist};
use std::f64::consts::FRAC_PI_2;

const DT: f64 = 0.01;
const G: f64 = 9.81;

fn hinge_at(position: Point3<f64>) -> Pose {
    // Local Z along world Y.
    let mut frame = Pose::from_axis_angle(&Vector3::x_axis(), -FRAC_PI_2);
    frame.position = position;
    frame
}

fn link_mass() -> MassProperties {
    MassProperties::box_shape(1.0, Vector3::new(0.05, 0.05, 0.5))
}

/// Ground plus `n` unit links hanging straight down, each hinged about world Y.
fn hanging_chain(n: usize) -> (Vec<BodyState>, Vec<Constraint>) {
    let mut bodies = vec![BodyState::fixed(Pose::identity())];
    let mut constraints = Vec::new();

    for i in 0..n {
        let top = -(i as f64);
        let pose = Pose::from_position(Point3::new(0.0, 0.0, top - 0.5));
        bodies.push(BodyState::dynamic(
            pose,
            Twist::linear(Vector3::new(0.0, 0.0, -G * DT)),
            &link_mass(),
        ));

        let hinge = hinge_at(Point3::new(0.0, 0.0, top));
        constraints.push(
            RevoluteJoint::from_world_frame(
                BodyId::new(i),
                &bodies[i].pose,
                BodyId::new(i + 1),
                &pose,
                &hinge,
            )
            .into(),
        );
    }

    (bodies, constraints)
}

#[test]
fn hanging_chain_is_held_still() {
    let (mut bodies, constraints) = hanging_chain(3);
    let report = GaussSeidelSolver::default().solve(&constraints, &mut bodies, 0.0, DT);

    assert!(report.converged, "{report:?}");
    assert_eq!(report.rows, 15);
    for body in &bodies[1..] {
        assert!(body.twist.linear.norm() < 1e-6);
        assert!(body.twist.angular.norm() < 1e-6);
    }

    // The top hinge carries the weight of all three links.
    assert_relative_eq!(report.forces[0].force_b.z, 3.0 * G, epsilon = 1e-4);
    assert_relative_eq!(report.forces[2].force_b.z, G, epsilon = 1e-4);
}

#[test]
fn warm_start_reduces_iterations() {
    let (bodies, constraints) = hanging_chain(3);
    let config = SolverConfig {
        warm_start_factor: 1.0,
        ..SolverConfig::default()
    };
    let mut solver = GaussSeidelSolver::new(config);

    let cold = solver.solve(&constraints, &mut bodies.clone(), 0.0, DT);
    let warm = solver.solve(&constraints, &mut bodies.clone(), 0.0, DT);

    assert!(!cold.used_warm_start);
    assert!(warm.used_warm_start);
    assert!(
        warm.iterations < cold.iterations,
        "warm {} vs cold {}",
        warm.iterations,
        cold.iterations
    );
}

#[test]
fn closed_loop_stays_finite() {
    // A parallelogram four-bar: ground, two cranks, coupler. Four planar
    // hinges over-constrain the loop, so the rows are linearly dependent.
    let crank_mass = link_mass();
    let coupler_mass = MassProperties::box_shape(1.0, Vector3::new(0.5, 0.05, 0.05));

    let left = Pose::from_position(Point3::new(0.0, 0.0, -0.5));
    let right = Pose::from_position(Point3::new(1.0, 0.0, -0.5));
    let coupler = Pose::from_position(Point3::new(0.5, 0.0, -1.0));

    let mut bodies = vec![
        BodyState::fixed(Pose::identity()),
        BodyState::dynamic(left, Twist::linear(Vector3::new(0.3, 0.0, 0.0)), &crank_mass),
        BodyState::dynamic(right, Twist::zero(), &crank_mass),
        BodyState::dynamic(coupler, Twist::zero(), &coupler_mass),
    ];

    let ground = Pose::identity();
    let hinges: [(usize, usize, Point3<f64>); 4] = [
        (0, 1, Point3::new(0.0, 0.0, 0.0)),
        (0, 2, Point3::new(1.0, 0.0, 0.0)),
        (1, 3, Point3::new(0.0, 0.0, -1.0)),
        (2, 3, Point3::new(1.0, 0.0, -1.0)),
    ];
    let poses = [ground, left, right, coupler];
    let constraints: Vec<Constraint> = hinges
        .iter()
        .map(|&(a, b, at)| {
            RevoluteJoint::from_world_frame(
                BodyId::new(a),
                &poses[a],
                BodyId::new(b),
                &poses[b],
                &hinge_at(at),
            )
            .into()
        })
        .collect();

    let config = SolverConfig::default().max_iterations(50);
    let report = GaussSeidelSolver::new(config).solve(&constraints, &mut bodies, 0.0, DT);

    assert_eq!(report.rows, 20);
    assert!(report.iterations <= 50);
    assert!(report.residual_norm.is_finite());
    assert!(bodies.iter().all(|b| b.twist.is_finite()));
    // The loop still moves as a mechanism: the coupler translates with the cranks.
    assert!(bodies[3].twist.linear.x > 0.0);
}

#[test]
fn path_follower_velocity_matches_target() {
    let path = PathCurve::closed(vec![
        ArcSegment::circle(Pose::identity(), 0.3, -FRAC_PI_2).into(),
    ])
    .unwrap()
    .with_duration(2.0)
    .unwrap();

    let start = path.position_at_time(0.0);
    let mut bodies = vec![
        BodyState::fixed(Pose::identity()),
        BodyState::dynamic(
            Pose::from_position(start),
            Twist::zero(),
            &MassProperties::sphere(1.0, 0.1),
        ),
    ];
    let follower: Constraint = PathFollowerConstraint::new(
        Attachment::body(BodyId::new(1), Pose::identity()),
        Attachment::body(BodyId::new(0), Pose::identity()),
        path.clone(),
    )
    .with_abscissa(AbscissaFunction::ramp(0.0, 1.0))
    .into();

    let report = GaussSeidelSolver::default().solve(&[follower], &mut bodies, 0.0, DT);
    assert!(report.converged);

    let expected = (path.position_at_time(DT) - start) / DT;
    assert_relative_eq!(bodies[1].twist.linear, expected, epsilon = 1e-6);
}
