//! Time-to-abscissa functions.
//!
//! A path follower asks its function for the path time at the current
//! simulation time, `tau = s(t)`, and looks up the target with
//! [`PathCurve::position_at_time`](crate::PathCurve::position_at_time).

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maps simulation time `t` to path time `s(t)`.
///
/// # Example
///
/// ```
/// use sim_path::AbscissaFunction;
///
/// let s = AbscissaFunction::ramp(0.0, 0.5);
/// assert_eq!(s.evaluate(2.0), 1.0);
/// assert_eq!(s.derivative(2.0), 0.5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AbscissaFunction {
    /// `s(t) = value`: the target stays put.
    Constant(f64),
    /// `s(t) = offset + rate * t`.
    Ramp {
        /// Path time at `t = 0`.
        offset: f64,
        /// Path time advanced per unit of simulation time.
        rate: f64,
    },
    /// `s(t) = offset + amplitude * sin(2π * frequency * t + phase)`.
    Sine {
        /// Mean path time.
        offset: f64,
        /// Amplitude in path time.
        amplitude: f64,
        /// Frequency in Hz.
        frequency: f64,
        /// Phase in radians.
        phase: f64,
    },
}

impl Default for AbscissaFunction {
    /// Path time equals simulation time.
    fn default() -> Self {
        Self::ramp(0.0, 1.0)
    }
}

impl AbscissaFunction {
    /// Linear ramp `offset + rate * t`.
    #[must_use]
    pub const fn ramp(offset: f64, rate: f64) -> Self {
        Self::Ramp { offset, rate }
    }

    /// Back-and-forth motion around `offset`.
    #[must_use]
    pub const fn sine(offset: f64, amplitude: f64, frequency: f64, phase: f64) -> Self {
        Self::Sine {
            offset,
            amplitude,
            frequency,
            phase,
        }
    }

    /// Path time at simulation time `t`.
    #[must_use]
    pub fn evaluate(&self, t: f64) -> f64 {
        match *self {
            Self::Constant(value) => value,
            Self::Ramp { offset, rate } => rate.mul_add(t, offset),
            Self::Sine {
                offset,
                amplitude,
                frequency,
                phase,
            } => amplitude.mul_add((std::f64::consts::TAU * frequency * t + phase).sin(), offset),
        }
    }

    /// Rate of change `ds/dt` at simulation time `t`.
    #[must_use]
    pub fn derivative(&self, t: f64) -> f64 {
        match *self {
            Self::Constant(_) => 0.0,
            Self::Ramp { rate, .. } => rate,
            Self::Sine {
                amplitude,
                frequency,
                phase,
                ..
            } => {
                let omega = std::f64::consts::TAU * frequency;
                amplitude * omega * (omega * t + phase).cos()
            }
        }
    }

    /// Check that every parameter is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match *self {
            Self::Constant(value) => value.is_finite(),
            Self::Ramp { offset, rate } => offset.is_finite() && rate.is_finite(),
            Self::Sine {
                offset,
                amplitude,
                frequency,
                phase,
            } => [offset, amplitude, frequency, phase]
                .iter()
                .all(|x| x.is_finite()),
        }
    }
}
