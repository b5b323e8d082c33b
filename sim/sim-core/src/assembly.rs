//! Building a world from named parts.
//!
//! A [`PartSource`] resolves part names to geometry and marker names to
//! frames, both relative to the assembly root. The [`Assembler`] applies the
//! root transform, derives mass from shape and density, and inserts bodies
//! and joints into a [`World`].
//!
//! # Example
//!
//! ```
//! use sim_core::{Assembler, PartCatalog, PartGeometry, PartShape, World};
//! use sim_types::Pose;
//! use nalgebra::{Point3, Vector3};
//!
//! let catalog = PartCatalog::new()
//!     .with_part(
//!         "base",
//!         PartGeometry::new(PartShape::cuboid(Vector3::new(0.5, 0.5, 0.1)), Pose::identity()),
//!     )
//!     .with_part(
//!         "arm",
//!         PartGeometry::new(
//!             PartShape::cylinder(0.05, 0.5),
//!             Pose::from_position(Point3::new(0.0, 0.0, 0.6)),
//!         ),
//!     )
//!     .with_marker("shoulder", Pose::from_position(Point3::new(0.0, 0.0, 0.1)));
//!
//! let mut world = World::default();
//! let assembler = Assembler::new(&catalog, Pose::identity()).with_density(1000.0);
//! let base = assembler.add_fixed_part(&mut world, "base").unwrap();
//! let arm = assembler.add_part(&mut world, "arm").unwrap();
//! assembler.add_revolute(&mut world, base, arm, "shoulder").unwrap();
//!
//! assert_eq!(world.body_count(), 2);
//! assert_eq!(world.constraint_count(), 1);
//! ```

use std::f64::consts::PI;

use hashbrown::HashMap;
use nalgebra::Vector3;
use sim_constraint::ConstraintId;
use sim_types::{BodyId, MassProperties, Pose, RigidBodyState, SimError};

use crate::world::{Body, World};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Density of water in kg/m³, the default for assembled parts.
pub const DEFAULT_DENSITY: f64 = 1000.0;

/// Solid shape of a part, centred on its centre of mass.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PartShape {
    /// Box with the given half extents.
    Box {
        /// Half extents along local X, Y, Z.
        half_extents: Vector3<f64>,
    },
    /// Cylinder along local Z.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Half of the length along Z.
        half_height: f64,
    },
    /// Sphere.
    Sphere {
        /// Radius.
        radius: f64,
    },
    /// Mass properties of the part at unit density (mass equals volume).
    Explicit(MassProperties),
}

impl PartShape {
    /// Box with the given half extents.
    #[must_use]
    pub const fn cuboid(half_extents: Vector3<f64>) -> Self {
        Self::Box { half_extents }
    }

    /// Cylinder along local Z.
    #[must_use]
    pub const fn cylinder(radius: f64, half_height: f64) -> Self {
        Self::Cylinder {
            radius,
            half_height,
        }
    }

    /// Sphere with the given radius.
    #[must_use]
    pub const fn sphere(radius: f64) -> Self {
        Self::Sphere { radius }
    }

    /// Volume in m³.
    #[must_use]
    pub fn volume(&self) -> f64 {
        match self {
            Self::Box { half_extents } => 8.0 * half_extents.x * half_extents.y * half_extents.z,
            Self::Cylinder {
                radius,
                half_height,
            } => PI * radius * radius * 2.0 * half_height,
            Self::Sphere { radius } => 4.0 / 3.0 * PI * radius.powi(3),
            Self::Explicit(unit) => unit.mass,
        }
    }

    /// Mass properties at the given density.
    #[must_use]
    pub fn mass_properties(&self, density: f64) -> MassProperties {
        let mass = self.volume() * density;
        match self {
            Self::Box { half_extents } => MassProperties::box_shape(mass, *half_extents),
            Self::Cylinder {
                radius,
                half_height,
            } => MassProperties::cylinder(mass, *radius, *half_height),
            Self::Sphere { radius } => MassProperties::sphere(mass, *radius),
            Self::Explicit(unit) => unit.scaled(density),
        }
    }
}

/// Geometry of one part relative to the assembly root.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartGeometry {
    /// Solid shape.
    pub shape: PartShape,
    /// Centre-of-mass frame relative to the root.
    pub pose: Pose,
}

impl PartGeometry {
    /// Create part geometry.
    #[must_use]
    pub const fn new(shape: PartShape, pose: Pose) -> Self {
        Self { shape, pose }
    }
}

/// Resolves part and marker names, e.g. from a CAD export.
///
/// Frames are relative to the assembly root.
pub trait PartSource {
    /// Geometry of the named part, if known.
    fn part(&self, name: &str) -> Option<PartGeometry>;

    /// Frame of the named marker, if known.
    fn marker(&self, name: &str) -> Option<Pose>;
}

/// In-memory [`PartSource`].
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartCatalog {
    parts: HashMap<String, PartGeometry>,
    markers: HashMap<String, Pose>,
}

impl PartCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a part.
    #[must_use]
    pub fn with_part(mut self, name: impl Into<String>, geometry: PartGeometry) -> Self {
        self.insert_part(name, geometry);
        self
    }

    /// Add a marker.
    #[must_use]
    pub fn with_marker(mut self, name: impl Into<String>, frame: Pose) -> Self {
        self.insert_marker(name, frame);
        self
    }

    /// Add or replace a part.
    pub fn insert_part(&mut self, name: impl Into<String>, geometry: PartGeometry) {
        self.parts.insert(name.into(), geometry);
    }

    /// Add or replace a marker.
    pub fn insert_marker(&mut self, name: impl Into<String>, frame: Pose) {
        self.markers.insert(name.into(), frame);
    }

    /// Number of parts.
    #[must_use]
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }
}

impl PartSource for PartCatalog {
    fn part(&self, name: &str) -> Option<PartGeometry> {
        self.parts.get(name).copied()
    }

    fn marker(&self, name: &str) -> Option<Pose> {
        self.markers.get(name).copied()
    }
}

/// Inserts parts from a [`PartSource`] into a [`World`].
#[derive(Debug)]
pub struct Assembler<'a, S: PartSource + ?Sized> {
    source: &'a S,
    root: Pose,
    density: f64,
}

impl<'a, S: PartSource + ?Sized> Assembler<'a, S> {
    /// Create an assembler placing the source's root frame at `root`.
    #[must_use]
    pub fn new(source: &'a S, root: Pose) -> Self {
        Self {
            source,
            root,
            density: DEFAULT_DENSITY,
        }
    }

    /// Set the material density in kg/m³.
    #[must_use]
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    /// Material density in kg/m³.
    #[must_use]
    pub fn density(&self) -> f64 {
        self.density
    }

    /// World pose of a part's centre of mass, and its mass properties.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::PartNotFound`] if the source does not know the part.
    pub fn resolve_part(&self, name: &str) -> sim_types::Result<(Pose, MassProperties)> {
        let geometry = self
            .source
            .part(name)
            .ok_or_else(|| SimError::part_not_found(name))?;
        Ok((
            self.root.compose(&geometry.pose),
            geometry.shape.mass_properties(self.density),
        ))
    }

    /// World frame of a marker.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::PartNotFound`] if the source does not know the marker.
    pub fn marker_frame(&self, name: &str) -> sim_types::Result<Pose> {
        self.source
            .marker(name)
            .map(|frame| self.root.compose(&frame))
            .ok_or_else(|| SimError::part_not_found(name))
    }

    /// Add a movable body for the named part, at rest.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::PartNotFound`] for an unknown part, and the
    /// world's errors for a non-positive density or a reused name.
    pub fn add_part(&self, world: &mut World, name: &str) -> sim_types::Result<BodyId> {
        let (pose, mass) = self.resolve_part(name)?;
        world.insert_body(Body::new(RigidBodyState::at_rest(pose), mass).with_name(name))
    }

    /// Add a fixed body for the named part.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::PartNotFound`] for an unknown part, or
    /// [`SimError::DuplicateBodyName`] for a reused name.
    pub fn add_fixed_part(&self, world: &mut World, name: &str) -> sim_types::Result<BodyId> {
        let (pose, mass) = self.resolve_part(name)?;
        world.insert_body(Body::fixed(pose).with_mass_properties(mass).with_name(name))
    }

    /// Hinge two bodies about the Z axis of the named marker.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::PartNotFound`] for an unknown marker or
    /// [`SimError::InvalidBodyId`] for a body not in the world.
    pub fn add_revolute(
        &self,
        world: &mut World,
        body_a: BodyId,
        body_b: BodyId,
        marker: &str,
    ) -> sim_types::Result<ConstraintId> {
        let frame = self.marker_frame(marker)?;
        world.add_revolute(body_a, body_b, &frame)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Point3};
    use std::f64::consts::FRAC_PI_2;

    fn catalog() -> PartCatalog {
        PartCatalog::new()
            .with_part(
                "block",
                PartGeometry::new(
                    PartShape::cuboid(Vector3::new(0.5, 0.5, 0.5)),
                    Pose::from_position(Point3::new(1.0, 0.0, 0.0)),
                ),
            )
            .with_marker("pin", Pose::from_position(Point3::new(0.0, 1.0, 0.0)))
    }

    #[test]
    fn test_shape_volumes() {
        assert_relative_eq!(PartShape::cuboid(Vector3::new(0.5, 1.0, 1.5)).volume(), 6.0);
        assert_relative_eq!(PartShape::cylinder(1.0, 0.5).volume(), PI, epsilon = 1e-12);
        assert_relative_eq!(
            PartShape::sphere(1.0).volume(),
            4.0 / 3.0 * PI,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_density_derived_mass() {
        let props = PartShape::cuboid(Vector3::new(0.5, 0.5, 0.5)).mass_properties(1000.0);
        assert_relative_eq!(props.mass, 1000.0, epsilon = 1e-9);
        // (1/12) m (1 + 1)
        assert_relative_eq!(props.inertia[(0, 0)], 1000.0 / 6.0, epsilon = 1e-9);

        let unit = MassProperties::new(0.002, Matrix3::identity() * 1e-4);
        let explicit = PartShape::Explicit(unit).mass_properties(500.0);
        assert_relative_eq!(explicit.mass, 1.0, epsilon = 1e-12);
        assert_relative_eq!(explicit.inertia[(2, 2)], 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_root_transform_applied() {
        let catalog = catalog();
        let root = Pose::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2);
        let assembler = Assembler::new(&catalog, root);

        let (pose, _) = assembler.resolve_part("block").unwrap();
        assert_relative_eq!(pose.position, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-12);

        let pin = assembler.marker_frame("pin").unwrap();
        assert_relative_eq!(pin.position, Point3::new(-1.0, 0.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_unknown_names_rejected() {
        let catalog = catalog();
        let mut world = World::default();
        let assembler = Assembler::new(&catalog, Pose::identity());

        assert_eq!(
            assembler.add_part(&mut world, "gear"),
            Err(SimError::PartNotFound {
                name: "gear".to_owned()
            })
        );
        let block = assembler.add_part(&mut world, "block").unwrap();
        let ground = world.add_fixed_body(Pose::identity()).unwrap();
        assert!(matches!(
            assembler.add_revolute(&mut world, ground, block, "socket"),
            Err(SimError::PartNotFound { .. })
        ));
        assert_eq!(world.constraint_count(), 0);
    }

    #[test]
    fn test_parts_are_named_bodies() {
        let catalog = catalog();
        let mut world = World::default();
        let assembler = Assembler::new(&catalog, Pose::identity()).with_density(2.0);

        let id = assembler.add_fixed_part(&mut world, "block").unwrap();
        let body = world.body_by_name("block").unwrap();
        assert_eq!(body.id, id);
        assert!(body.is_fixed);
        assert_relative_eq!(body.mass_props.mass, 2.0, epsilon = 1e-12);

        assert!(matches!(
            assembler.add_part(&mut world, "block"),
            Err(SimError::DuplicateBodyName { .. })
        ));
    }
}
