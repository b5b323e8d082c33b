//! Sub-curves a path is built from.
//!
//! Each sub-curve is evaluated at a local parameter `u ∈ [0, 1]` with
//! closed-form expressions. Arcs are defined in the XY plane of their own
//! frame, which places the centre and orients the plane in path space.

use nalgebra::{Point3, Vector3};
use sim_types::Pose;
use std::f64::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A curve evaluated at a parameter `u ∈ [0, 1]`.
pub trait Curve {
    /// Position at parameter `u`.
    fn point_at(&self, u: f64) -> Point3<f64>;

    /// Derivative of the position with respect to `u`.
    fn derivative_at(&self, u: f64) -> Vector3<f64>;

    /// Total arc length.
    fn length(&self) -> f64;

    /// Position at `u = 0`.
    fn start(&self) -> Point3<f64> {
        self.point_at(0.0)
    }

    /// Position at `u = 1`.
    fn end(&self) -> Point3<f64> {
        self.point_at(1.0)
    }

    /// Unit tangent at parameter `u` (zero for degenerate curves).
    fn tangent_at(&self, u: f64) -> Vector3<f64> {
        self.derivative_at(u)
            .try_normalize(1e-12)
            .unwrap_or_else(Vector3::zeros)
    }
}

/// A straight segment between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineSegment {
    /// Start point.
    pub start: Point3<f64>,
    /// End point.
    pub end: Point3<f64>,
}

impl LineSegment {
    /// Create a segment from two endpoints.
    #[must_use]
    pub const fn new(start: Point3<f64>, end: Point3<f64>) -> Self {
        Self { start, end }
    }
}

impl Curve for LineSegment {
    fn point_at(&self, u: f64) -> Point3<f64> {
        let u = u.clamp(0.0, 1.0);
        self.start + (self.end - self.start) * u
    }

    fn derivative_at(&self, _u: f64) -> Vector3<f64> {
        self.end - self.start
    }

    fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }
}

/// A circular arc in the XY plane of `frame`.
///
/// Angles are measured from the frame's +X axis towards +Y. A
/// counter-clockwise arc always sweeps with increasing angle: when
/// `end_angle < start_angle` a full turn is added to the end angle.
/// Clockwise arcs do the opposite.
///
/// # Example
///
/// ```
/// use sim_path::{ArcSegment, Curve};
/// use sim_types::Pose;
/// use std::f64::consts::PI;
///
/// let arc = ArcSegment::new(Pose::identity(), 2.0, 0.0, PI, true);
/// assert!((arc.length() - 2.0 * PI).abs() < 1e-12);
/// assert!((arc.end().x + 2.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArcSegment {
    /// Centre and plane orientation; the arc lies in the local XY plane.
    pub frame: Pose,
    /// Radius.
    pub radius: f64,
    /// Start angle in radians.
    pub start_angle: f64,
    /// End angle in radians.
    pub end_angle: f64,
    /// Sweep direction, viewed from the frame's +Z axis.
    pub counterclockwise: bool,
}

impl ArcSegment {
    /// Create an arc.
    #[must_use]
    pub const fn new(
        frame: Pose,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        counterclockwise: bool,
    ) -> Self {
        Self {
            frame,
            radius,
            start_angle,
            end_angle,
            counterclockwise,
        }
    }

    /// Create a full counter-clockwise circle starting at `start_angle`.
    #[must_use]
    pub const fn circle(frame: Pose, radius: f64, start_angle: f64) -> Self {
        Self::new(frame, radius, start_angle, start_angle + TAU, true)
    }

    /// Signed sweep angle after applying the direction rule.
    #[must_use]
    pub fn sweep(&self) -> f64 {
        let mut end = self.end_angle;
        if self.counterclockwise {
            if end < self.start_angle {
                end += TAU;
            }
        } else if end > self.start_angle {
            end -= TAU;
        }
        end - self.start_angle
    }

    fn angle_at(&self, u: f64) -> f64 {
        self.start_angle + u.clamp(0.0, 1.0) * self.sweep()
    }
}

impl Curve for ArcSegment {
    fn point_at(&self, u: f64) -> Point3<f64> {
        let (sin, cos) = self.angle_at(u).sin_cos();
        self.frame
            .transform_point(&Point3::new(self.radius * cos, self.radius * sin, 0.0))
    }

    fn derivative_at(&self, u: f64) -> Vector3<f64> {
        let (sin, cos) = self.angle_at(u).sin_cos();
        let sweep = self.sweep();
        self.frame.transform_vector(&Vector3::new(
            -self.radius * sin * sweep,
            self.radius * cos * sweep,
            0.0,
        ))
    }

    fn length(&self) -> f64 {
        self.radius.abs() * self.sweep().abs()
    }
}

/// One piece of a composite path.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SubCurve {
    /// Circular arc.
    Arc(ArcSegment),
    /// Straight segment.
    Line(LineSegment),
}

impl From<ArcSegment> for SubCurve {
    fn from(arc: ArcSegment) -> Self {
        Self::Arc(arc)
    }
}

impl From<LineSegment> for SubCurve {
    fn from(line: LineSegment) -> Self {
        Self::Line(line)
    }
}

impl Curve for SubCurve {
    fn point_at(&self, u: f64) -> Point3<f64> {
        match self {
            Self::Arc(arc) => arc.point_at(u),
            Self::Line(line) => line.point_at(u),
        }
    }

    fn derivative_at(&self, u: f64) -> Vector3<f64> {
        match self {
            Self::Arc(arc) => arc.derivative_at(u),
            Self::Line(line) => line.derivative_at(u),
        }
    }

    fn length(&self) -> f64 {
        match self {
            Self::Arc(arc) => arc.length(),
            Self::Line(line) => line.length(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::UnitQuaternion;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_line_segment() {
        let line = LineSegment::new(Point3::origin(), Point3::new(3.0, 4.0, 0.0));
        assert_relative_eq!(line.length(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(line.point_at(0.5), Point3::new(1.5, 2.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(line.tangent_at(0.2), Vector3::new(0.6, 0.8, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_arc_direction_rule() {
        // Counter-clockwise from 3π/2 to π/2 wraps through zero.
        let ccw = ArcSegment::new(Pose::identity(), 1.0, 1.5 * PI, 0.5 * PI, true);
        assert_relative_eq!(ccw.sweep(), PI, epsilon = 1e-12);
        assert_relative_eq!(ccw.point_at(0.5), Point3::new(1.0, 0.0, 0.0), epsilon = 1e-12);

        // Clockwise over the same endpoints goes through π.
        let cw = ArcSegment::new(Pose::identity(), 1.0, 1.5 * PI, 0.5 * PI, false);
        assert_relative_eq!(cw.sweep(), -PI, epsilon = 1e-12);
        assert_relative_eq!(cw.point_at(0.5), Point3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_arc_in_rotated_frame() {
        // Rotate the arc plane so the local XY plane becomes the world XZ plane.
        let frame = Pose::from_position_rotation(
            Point3::new(0.0, 1.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2),
        );
        let arc = ArcSegment::circle(frame, 0.3, -FRAC_PI_2);

        let start = arc.start();
        assert_relative_eq!(start, Point3::new(0.0, 1.0, -0.3), epsilon = 1e-12);
        assert_relative_eq!(arc.length(), 0.6 * PI, epsilon = 1e-12);
        for u in [0.0, 0.3, 0.7] {
            assert_relative_eq!(arc.point_at(u).y, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_arc_derivative_matches_finite_difference() {
        let arc = ArcSegment::new(Pose::identity(), 0.7, 0.2, 2.0, true);
        let h = 1e-6;
        let u = 0.4;
        let numeric = (arc.point_at(u + h) - arc.point_at(u - h)) / (2.0 * h);
        assert_relative_eq!(arc.derivative_at(u), numeric, epsilon = 1e-6);
    }

    #[test]
    fn test_sub_curve_dispatch() {
        let curve: SubCurve = LineSegment::new(Point3::origin(), Point3::new(0.0, 0.0, 2.0)).into();
        assert_relative_eq!(curve.length(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(curve.end(), Point3::new(0.0, 0.0, 2.0), epsilon = 1e-12);
    }
}
