use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("Cavity dimension '{name}' must be positive, got {value}")]
    NonPositiveDimension { name: &'static str, value: f64 },
}

fn ensure_positive(name: &'static str, value: f64) -> Result<f64, GeometryError> {
    if value > 0.0 {
        Ok(value)
    } else {
        Err(GeometryError::NonPositiveDimension { name, value })
    }
}

/// An axis-aligned rectangular cavity described by its per-axis half-lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    half_lengths: [f64; 3],
    centre: Point3<f64>,
}

impl Cuboid {
    /// Creates a cuboid centred at the origin.
    ///
    /// # Errors
    ///
    /// Every half-length must be positive.
    pub fn new(half_lengths: [f64; 3]) -> Result<Self, GeometryError> {
        ensure_positive("half_length_x", half_lengths[0])?;
        ensure_positive("half_length_y", half_lengths[1])?;
        ensure_positive("half_length_z", half_lengths[2])?;
        Ok(Self {
            half_lengths,
            centre: Point3::origin(),
        })
    }

    pub fn half_lengths(&self) -> [f64; 3] {
        self.half_lengths
    }

    /// Replaces the half-lengths, leaving the cavity untouched on error.
    pub fn set_half_lengths(&mut self, half_lengths: [f64; 3]) -> Result<(), GeometryError> {
        ensure_positive("half_length_x", half_lengths[0])?;
        ensure_positive("half_length_y", half_lengths[1])?;
        ensure_positive("half_length_z", half_lengths[2])?;
        self.half_lengths = half_lengths;
        Ok(())
    }
}

impl Default for Cuboid {
    /// A 10 x 10 x 10 box centred at the origin.
    fn default() -> Self {
        Self {
            half_lengths: [5.0, 5.0, 5.0],
            centre: Point3::origin(),
        }
    }
}

/// A spherical cavity. The only shape accepted by the SCAAS boundary term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    radius: f64,
    centre: Point3<f64>,
}

impl Sphere {
    /// Creates a sphere centred at the origin.
    ///
    /// # Errors
    ///
    /// The radius must be positive.
    pub fn new(radius: f64) -> Result<Self, GeometryError> {
        ensure_positive("radius", radius)?;
        Ok(Self {
            radius,
            centre: Point3::origin(),
        })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Replaces the radius, leaving the cavity untouched on error.
    pub fn set_radius(&mut self, radius: f64) -> Result<(), GeometryError> {
        self.radius = ensure_positive("radius", radius)?;
        Ok(())
    }
}

impl Default for Sphere {
    /// A sphere of radius 10 centred at the origin.
    fn default() -> Self {
        Self {
            radius: 10.0,
            centre: Point3::origin(),
        }
    }
}

/// An axis-aligned ellipsoidal cavity with semi-axes (a, b, c).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    semi_axes: [f64; 3],
    centre: Point3<f64>,
}

impl Ellipsoid {
    /// Creates an ellipsoid centred at the origin.
    ///
    /// # Errors
    ///
    /// Every semi-axis must be positive.
    pub fn new(semi_axes: [f64; 3]) -> Result<Self, GeometryError> {
        ensure_positive("semi_axis_a", semi_axes[0])?;
        ensure_positive("semi_axis_b", semi_axes[1])?;
        ensure_positive("semi_axis_c", semi_axes[2])?;
        Ok(Self {
            semi_axes,
            centre: Point3::origin(),
        })
    }

    pub fn semi_axes(&self) -> [f64; 3] {
        self.semi_axes
    }

    /// Replaces the semi-axes, leaving the cavity untouched on error.
    pub fn set_semi_axes(&mut self, semi_axes: [f64; 3]) -> Result<(), GeometryError> {
        ensure_positive("semi_axis_a", semi_axes[0])?;
        ensure_positive("semi_axis_b", semi_axes[1])?;
        ensure_positive("semi_axis_c", semi_axes[2])?;
        self.semi_axes = semi_axes;
        Ok(())
    }
}

impl Default for Ellipsoid {
    /// An ellipsoid with semi-axes (10, 5, 4) centred at the origin.
    fn default() -> Self {
        Self {
            semi_axes: [10.0, 5.0, 4.0],
            centre: Point3::origin(),
        }
    }
}

/// A bounded volume that defines where solvent may be placed.
///
/// The fixed set of shape variants replaces an open inheritance hierarchy:
/// a new shape is a new variant, and every consumer (grids, containers,
/// restraint selections) matches exhaustively. Each variant answers the same
/// four questions analytically: volume, containment, centre, and
/// axis-aligned extremes.
///
/// Only the shape parameters and centre are serialized; anything derived
/// from them (lattices in particular) is rebuilt on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum Cavity {
    Cuboid(Cuboid),
    Sphere(Sphere),
    Ellipsoid(Ellipsoid),
}

impl Cavity {
    /// The analytic volume of the cavity.
    pub fn volume(&self) -> f64 {
        match self {
            Cavity::Cuboid(c) => {
                8.0 * c.half_lengths[0] * c.half_lengths[1] * c.half_lengths[2]
            }
            Cavity::Sphere(s) => 4.0 / 3.0 * PI * s.radius.powi(3),
            Cavity::Ellipsoid(e) => {
                4.0 / 3.0 * PI * e.semi_axes[0] * e.semi_axes[1] * e.semi_axes[2]
            }
        }
    }

    /// Whether `point` lies inside the cavity (boundary inclusive).
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        self.contains_within(point, 0.0)
    }

    /// Whether `point` lies inside the cavity inflated by `margin` on every
    /// size parameter.
    ///
    /// Grids use this to retain "extension" points: lattice positions just
    /// outside the volume that may still win nearest-point queries.
    pub fn contains_within(&self, point: &Point3<f64>, margin: f64) -> bool {
        match self {
            Cavity::Cuboid(c) => {
                let d = point - c.centre;
                (0..3).all(|axis| d[axis].abs() <= c.half_lengths[axis] + margin)
            }
            Cavity::Sphere(s) => (point - s.centre).norm() <= s.radius + margin,
            Cavity::Ellipsoid(e) => {
                let d = point - e.centre;
                (0..3)
                    .map(|axis| (d[axis] / (e.semi_axes[axis] + margin)).powi(2))
                    .sum::<f64>()
                    <= 1.0
            }
        }
    }

    pub fn centre(&self) -> Point3<f64> {
        match self {
            Cavity::Cuboid(c) => c.centre,
            Cavity::Sphere(s) => s.centre,
            Cavity::Ellipsoid(e) => e.centre,
        }
    }

    /// Moves the cavity. A grid built against this cavity must be told via
    /// [`SpatialGrid::cavity_did_move`](super::grid::SpatialGrid::cavity_did_move);
    /// size changes instead require
    /// [`SpatialGrid::reset_cavity`](super::grid::SpatialGrid::reset_cavity).
    pub fn set_centre(&mut self, centre: Point3<f64>) {
        match self {
            Cavity::Cuboid(c) => c.centre = centre,
            Cavity::Sphere(s) => s.centre = centre,
            Cavity::Ellipsoid(e) => e.centre = centre,
        }
    }

    /// Per-axis (min, max) extremes of the axis-aligned bounding box.
    pub fn extremes(&self) -> [(f64, f64); 3] {
        let centre = self.centre();
        let spans = match self {
            Cavity::Cuboid(c) => c.half_lengths,
            Cavity::Sphere(s) => [s.radius; 3],
            Cavity::Ellipsoid(e) => e.semi_axes,
        };
        [
            (centre.x - spans[0], centre.x + spans[0]),
            (centre.y - spans[1], centre.y + spans[1]),
            (centre.z - spans[2], centre.z + spans[2]),
        ]
    }

    /// A short human-readable name for the variant, used in diagnostics.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Cavity::Cuboid(_) => "cuboid",
            Cavity::Sphere(_) => "sphere",
            Cavity::Ellipsoid(_) => "ellipsoid",
        }
    }

    /// The sphere parameters when this cavity is spherical.
    pub fn as_sphere(&self) -> Option<&Sphere> {
        match self {
            Cavity::Sphere(s) => Some(s),
            _ => None,
        }
    }
}
