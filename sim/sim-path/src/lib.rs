//! Trajectory paths for path-following constraints.
//!
//! A [`PathCurve`] is an ordered chain of [`SubCurve`]s (circular arcs and
//! straight lines) addressed by a global arc-length abscissa. Closed paths
//! wrap, so the target of a follower never jumps when it completes a lap.
//!
//! An [`AbscissaFunction`] maps simulation time to *path time*. One full
//! traversal of a path takes [`PathCurve::duration`] path-time units.
//!
//! # Parameterizations
//!
//! | Accessor | Domain | Meaning |
//! |----------|--------|---------|
//! | [`PathCurve::position_at`] | `[0, length]` | arc length |
//! | [`PathCurve::position_at_fraction`] | `[0, 1]` | fraction of the length |
//! | [`PathCurve::position_at_time`] | `[0, duration]` | path time |
//!
//! # Example
//!
//! ```
//! use sim_path::{AbscissaFunction, ArcSegment, PathCurve, SubCurve};
//! use sim_types::Pose;
//! use std::f64::consts::{FRAC_PI_2, TAU};
//!
//! // Full circle of radius 0.3, starting at the bottom.
//! let arc = ArcSegment::new(Pose::identity(), 0.3, -FRAC_PI_2, -FRAC_PI_2 + TAU, true);
//! let path = PathCurve::closed(vec![SubCurve::Arc(arc)])
//!     .unwrap()
//!     .with_duration(2.0)
//!     .unwrap();
//!
//! let s = AbscissaFunction::ramp(0.0, 0.5);
//! let target = path.position_at_time(s.evaluate(4.0));
//! assert!((target - path.position_at(0.0)).norm() < 1e-12);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-path/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::suboptimal_flops,
    clippy::cast_precision_loss,
    clippy::missing_errors_doc
)]

mod abscissa;
mod path;
mod segment;

pub use abscissa::AbscissaFunction;
pub use path::{CONTINUITY_TOLERANCE, PathCurve};
pub use segment::{ArcSegment, Curve, LineSegment, SubCurve};
