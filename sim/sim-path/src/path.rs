//! Composite paths with global abscissa.

use nalgebra::{Point3, Vector3};
use sim_types::{Result, SimError};

use crate::segment::{Curve, SubCurve};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest gap allowed between the end of one sub-curve and the start of the next.
pub const CONTINUITY_TOLERANCE: f64 = 1e-6;

/// An ordered chain of sub-curves addressed by arc length.
///
/// The global abscissa `s` runs from 0 at the start of the first sub-curve
/// to [`length`](Self::length) at the end of the last. On a closed path `s`
/// wraps modulo the length, so `position_at(0.0) == position_at(length)`.
/// On an open path it is clamped to the ends.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathCurve {
    segments: Vec<SubCurve>,
    /// Abscissa at which each segment starts.
    offsets: Vec<f64>,
    length: f64,
    closed: bool,
    duration: f64,
}

impl PathCurve {
    /// Build a path from contiguous sub-curves.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidPath`] if there are no sub-curves, a
    /// sub-curve has zero or non-finite length, consecutive sub-curves do
    /// not meet, or a closed path does not end where it starts.
    pub fn new(segments: Vec<SubCurve>, closed: bool) -> Result<Self> {
        if segments.is_empty() {
            return Err(SimError::invalid_path("a path needs at least one sub-curve"));
        }

        let mut offsets = Vec::with_capacity(segments.len());
        let mut length = 0.0;
        for (i, segment) in segments.iter().enumerate() {
            let segment_length = segment.length();
            if !segment_length.is_finite() || segment_length <= 0.0 {
                return Err(SimError::invalid_path(format!(
                    "sub-curve {i} has degenerate length {segment_length}"
                )));
            }

            if let Some(previous) = i.checked_sub(1).and_then(|p| segments.get(p)) {
                let gap = (segment.start() - previous.end()).norm();
                if gap > CONTINUITY_TOLERANCE {
                    return Err(SimError::invalid_path(format!(
                        "sub-curve {i} starts {gap:.3e} away from the end of sub-curve {}",
                        i - 1
                    )));
                }
            }

            offsets.push(length);
            length += segment_length;
        }

        if closed {
            if let (Some(first), Some(last)) = (segments.first(), segments.last()) {
                let gap = (first.start() - last.end()).norm();
                if gap > CONTINUITY_TOLERANCE {
                    return Err(SimError::invalid_path(format!(
                        "closed path ends {gap:.3e} away from its start"
                    )));
                }
            }
        }

        Ok(Self {
            segments,
            offsets,
            length,
            closed,
            duration: 1.0,
        })
    }

    /// Build an open path.
    pub fn open(segments: Vec<SubCurve>) -> Result<Self> {
        Self::new(segments, false)
    }

    /// Build a closed path.
    pub fn closed(segments: Vec<SubCurve>) -> Result<Self> {
        Self::new(segments, true)
    }

    /// Set the path time needed for one full traversal.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidPath`] unless `duration` is positive and finite.
    pub fn with_duration(mut self, duration: f64) -> Result<Self> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(SimError::invalid_path(format!(
                "duration must be positive, got {duration}"
            )));
        }
        self.duration = duration;
        Ok(self)
    }

    /// Total arc length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Whether the abscissa wraps.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Path time for one full traversal.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// The sub-curves in order.
    #[must_use]
    pub fn segments(&self) -> &[SubCurve] {
        &self.segments
    }

    /// Map any abscissa onto `[0, length)` (closed) or `[0, length]` (open).
    #[must_use]
    pub fn wrap_abscissa(&self, s: f64) -> f64 {
        if self.closed {
            let wrapped = s.rem_euclid(self.length);
            // rem_euclid can round up to the modulus for tiny negative inputs
            if wrapped >= self.length { 0.0 } else { wrapped }
        } else {
            s.clamp(0.0, self.length)
        }
    }

    /// Locate the sub-curve containing abscissa `s` and the local parameter within it.
    fn locate(&self, s: f64) -> (&SubCurve, f64, f64) {
        let s = self.wrap_abscissa(s);
        let index = self
            .offsets
            .partition_point(|&offset| offset <= s)
            .saturating_sub(1);

        let segment = &self.segments[index];
        let segment_length = segment.length();
        (segment, (s - self.offsets[index]) / segment_length, segment_length)
    }

    /// Position at arc length `s`.
    #[must_use]
    pub fn position_at(&self, s: f64) -> Point3<f64> {
        let (segment, u, _) = self.locate(s);
        segment.point_at(u)
    }

    /// Derivative of the position with respect to arc length (unit tangent).
    #[must_use]
    pub fn tangent_at(&self, s: f64) -> Vector3<f64> {
        let (segment, u, segment_length) = self.locate(s);
        segment.derivative_at(u) / segment_length
    }

    /// Position at a fraction `f` of the total length.
    #[must_use]
    pub fn position_at_fraction(&self, f: f64) -> Point3<f64> {
        self.position_at(f * self.length)
    }

    /// Position at path time `tau`; one traversal takes [`duration`](Self::duration).
    #[must_use]
    pub fn position_at_time(&self, tau: f64) -> Point3<f64> {
        self.position_at(tau / self.duration * self.length)
    }

    /// Velocity of the target point when path time advances at `tau_rate`.
    #[must_use]
    pub fn velocity_at_time(&self, tau: f64, tau_rate: f64) -> Vector3<f64> {
        let s = tau / self.duration * self.length;
        self.tangent_at(s) * (self.length / self.duration * tau_rate)
    }
}

impl Curve for PathCurve {
    fn point_at(&self, u: f64) -> Point3<f64> {
        self.position_at_fraction(u)
    }

    fn derivative_at(&self, u: f64) -> Vector3<f64> {
        self.tangent_at(u * self.length) * self.length
    }

    fn length(&self) -> f64 {
        self.length
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::segment::{ArcSegment, LineSegment};
    use approx::assert_relative_eq;
    use sim_types::Pose;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn stadium() -> PathCurve {
        // Two straights joined by two half circles, radius 1, straights of length 2.
        let right = Pose::from_position(Point3::new(1.0, 0.0, 0.0));
        let left = Pose::from_position(Point3::new(-1.0, 0.0, 0.0));
        PathCurve::closed(vec![
            LineSegment::new(Point3::new(-1.0, -1.0, 0.0), Point3::new(1.0, -1.0, 0.0)).into(),
            ArcSegment::new(right, 1.0, -FRAC_PI_2, FRAC_PI_2, true).into(),
            LineSegment::new(Point3::new(1.0, 1.0, 0.0), Point3::new(-1.0, 1.0, 0.0)).into(),
            ArcSegment::new(left, 1.0, FRAC_PI_2, 3.0 * FRAC_PI_2, true).into(),
        ])
        .unwrap()
    }

    #[test]
    fn test_stadium_length_and_lookup() {
        let path = stadium();
        assert_relative_eq!(path.length(), 4.0 + 2.0 * PI, epsilon = 1e-12);

        // Halfway along the first straight.
        assert_relative_eq!(path.position_at(1.0), Point3::new(0.0, -1.0, 0.0), epsilon = 1e-12);
        // Apex of the right half circle.
        assert_relative_eq!(
            path.position_at(2.0 + FRAC_PI_2),
            Point3::new(2.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_closed_wraps() {
        let path = stadium();
        let l = path.length();
        assert_relative_eq!(path.position_at(0.0), path.position_at(l), epsilon = 1e-12);
        assert_relative_eq!(path.position_at(0.5), path.position_at(l + 0.5), epsilon = 1e-12);
        assert_relative_eq!(path.position_at(-0.5), path.position_at(l - 0.5), epsilon = 1e-12);
    }

    #[test]
    fn test_open_clamps() {
        let path = PathCurve::open(vec![
            LineSegment::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0)).into(),
            LineSegment::new(Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0)).into(),
        ])
        .unwrap();

        assert_relative_eq!(path.position_at(-3.0), Point3::origin(), epsilon = 1e-12);
        assert_relative_eq!(path.position_at(5.0), Point3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(path.tangent_at(1.5), Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_gaps() {
        let result = PathCurve::open(vec![
            LineSegment::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0)).into(),
            LineSegment::new(Point3::new(1.5, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)).into(),
        ]);
        assert!(matches!(result, Err(SimError::InvalidPath { .. })));

        let not_closed = PathCurve::closed(vec![
            LineSegment::new(Point3::origin(), Point3::new(1.0, 0.0, 0.0)).into(),
        ]);
        assert!(not_closed.is_err());

        assert!(PathCurve::open(Vec::new()).is_err());
    }

    #[test]
    fn test_duration_and_time_parameterization() {
        let circle = ArcSegment::circle(Pose::identity(), 0.5, 0.0);
        let path = PathCurve::closed(vec![circle.into()])
            .unwrap()
            .with_duration(2.0)
            .unwrap();

        assert_relative_eq!(path.position_at_time(0.5), Point3::new(0.0, 0.5, 0.0), epsilon = 1e-12);
        assert_relative_eq!(path.position_at_time(2.0), path.position_at_time(0.0), epsilon = 1e-12);

        // One lap of length π in 2 time units: speed π/2.
        let v = path.velocity_at_time(0.0, 1.0);
        assert_relative_eq!(v, Vector3::new(0.0, FRAC_PI_2, 0.0), epsilon = 1e-12);

        assert!(PathCurve::closed(vec![circle.into()]).unwrap().with_duration(0.0).is_err());
    }
}
