//! Robot Arm: passive linkage driven along a closed path.
//!
//! Assembles the arm, steps it for two laps of the hand path and prints the
//! hand position, tracking error and solver effort as it goes.

use nalgebra::Point3;
use robot_arm::{PATH_DURATION, PATH_RATE, RobotArm, arm_config};

const REPORT_EVERY: usize = 25;

fn main() -> anyhow::Result<()> {
    println!("=== Robot Arm: closed-loop linkage on a path ===");
    println!();

    let mut arm = RobotArm::build(arm_config())?;
    println!(
        "Assembled {} bodies, {} constraints ({} revolute joints)",
        arm.world.body_count(),
        arm.world.constraint_count(),
        arm.joints.len()
    );
    println!("Moving mass: {:.1} kg", arm.moving_mass());
    println!();

    let dt = arm.world.timestep();
    let lap = PATH_DURATION / PATH_RATE;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let steps = (2.0 * lap / dt).round() as usize;

    println!(
        "{:>7}  {:>26}  {:>10}  {:>6}  {:>9}",
        "time", "hand position [m]", "track [m]", "iters", "converged"
    );

    let mut worst_tracking: f64 = 0.0;
    let mut unconverged = 0_usize;
    for step in 1..=steps {
        let report = arm.world.step(dt)?;
        if !report.converged {
            unconverged += 1;
        }

        let tracking = arm.hand_tracking_error().unwrap_or(f64::NAN);
        worst_tracking = worst_tracking.max(tracking);

        if step % REPORT_EVERY == 0 {
            let hand = arm
                .world
                .body(arm.bodies.hand)
                .map(|b| b.pose().position)
                .unwrap_or_else(Point3::origin);
            println!(
                "{:>7.2}  ({:>7.3}, {:>7.3}, {:>7.3})  {:>10.2e}  {:>6}  {:>9}",
                report.time,
                hand.x,
                hand.y,
                hand.z,
                tracking,
                report.solver_iterations,
                report.converged
            );
        }
    }

    println!();
    println!("Simulated {:.2} s in {} steps", arm.world.time(), arm.world.step_count());
    println!("Worst hand tracking error: {worst_tracking:.3e} m");
    println!("Max joint residual:        {:.3e}", arm.world.max_constraint_residual());
    println!("Steps without convergence: {unconverged}/{steps}");

    Ok(())
}
