//! Error types for simulation operations.
//!
//! Every variant is a construction-time problem: a world is assembled
//! incorrectly or a configuration is out of range. Numerical trouble during
//! a step is reported through solver diagnostics instead.

use crate::BodyId;
use thiserror::Error;

/// Errors that can occur while assembling or configuring a simulation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    /// A body id that is not part of the world.
    #[error("invalid body ID: {0} is not part of this world")]
    InvalidBodyId(BodyId),

    /// A named part could not be resolved by the geometry source.
    #[error("part not found: {name}")]
    PartNotFound {
        /// Name of the missing part or marker.
        name: String,
    },

    /// Body not found by name.
    #[error("body not found: {name}")]
    BodyNotFound {
        /// Name of the missing body.
        name: String,
    },

    /// A body name that is already in use.
    #[error("duplicate body name: {name}")]
    DuplicateBodyName {
        /// The name that was reused.
        name: String,
    },

    /// Invalid timestep.
    #[error("invalid timestep: {0} (must be positive and finite)")]
    InvalidTimestep(f64),

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// Invalid mass properties.
    #[error("invalid mass properties: {reason}")]
    InvalidMassProperties {
        /// Description of what's wrong.
        reason: String,
    },

    /// Invalid path definition.
    #[error("invalid path: {reason}")]
    InvalidPath {
        /// Description of what's wrong.
        reason: String,
    },
}

impl SimError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create an invalid mass properties error.
    #[must_use]
    pub fn invalid_mass(reason: impl Into<String>) -> Self {
        Self::InvalidMassProperties {
            reason: reason.into(),
        }
    }

    /// Create an invalid path error.
    #[must_use]
    pub fn invalid_path(reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            reason: reason.into(),
        }
    }

    /// Create a part-not-found error.
    #[must_use]
    pub fn part_not_found(name: impl Into<String>) -> Self {
        Self::PartNotFound { name: name.into() }
    }

    /// Check if this error describes a badly assembled world.
    ///
    /// Covers unknown bodies, unresolved parts and invalid mass
    /// properties, i.e. everything that must be fixed before stepping.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBodyId(_)
                | Self::PartNotFound { .. }
                | Self::BodyNotFound { .. }
                | Self::DuplicateBodyName { .. }
                | Self::InvalidConfig { .. }
                | Self::InvalidMassProperties { .. }
                | Self::InvalidPath { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SimError::InvalidBodyId(BodyId::new(42));
        assert!(err.to_string().contains("Body(42)"));

        let err = SimError::part_not_found("Assem10/Assem8");
        assert!(err.to_string().contains("Assem10/Assem8"));

        let err = SimError::invalid_mass("mass must be positive");
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn test_error_predicates() {
        assert!(SimError::InvalidBodyId(BodyId::new(3)).is_config_error());
        assert!(SimError::invalid_path("gap").is_config_error());
        assert!(!SimError::InvalidTimestep(-1.0).is_config_error());
    }
}
