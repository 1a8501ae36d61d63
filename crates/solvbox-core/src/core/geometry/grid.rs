use super::cavity::Cavity;
use itertools::iproduct;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default margin within which off-lattice points are still assigned to a
/// grid point by the nearest-point queries.
pub const DEFAULT_SEARCH_CUTOFF: f64 = 1.0;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("Grid spacing on axis {axis} must be positive, got {value}")]
    NonPositiveSpacing { axis: usize, value: f64 },

    #[error("Grid point density must be positive, got {0}")]
    NonPositiveDensity(f64),

    #[error("Grid divisions on axis {axis} must be at least 1")]
    ZeroDivisions { axis: usize },
}

/// One retained lattice point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    /// Cartesian position of the point.
    pub position: Point3<f64>,
    /// Per-axis tick indices of the point within the full lattice.
    pub ticks: [usize; 3],
    /// Interior points lie inside the cavity and are valid solvent
    /// placement sites. Non-interior ("extension") points lie within the
    /// search cutoff of the boundary and only serve nearest-point queries.
    pub interior: bool,
}

/// A regular 3-D lattice spanning the volume of a [`Cavity`].
///
/// The lattice block is centred on the cavity centre; candidate points are
/// generated as the full Cartesian product of the per-axis ticks in row-major
/// order (x outermost, then y, then z) and filtered through the cavity's
/// containment predicate, so retained indices are stable and reproducible
/// for a given cavity and spacing.
///
/// The grid does not observe the cavity. After mutating the cavity the owner
/// must call [`SpatialGrid::reset_cavity`] (size change, full rebuild; all
/// previously obtained indices become invalid) or
/// [`SpatialGrid::cavity_did_move`] (pure translation, points shift in place
/// and indices stay valid).
///
/// Only the lattice parameters are serialized; the point buffer is rebuilt
/// with [`SpatialGrid::rebuild`] after deserialization, reproducing
/// bit-identical geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialGrid {
    spacing: [f64; 3],
    ticks: [usize; 3],
    search_cutoff: f64,
    centre: Point3<f64>,
    #[serde(skip)]
    points: Vec<GridPoint>,
}

impl SpatialGrid {
    /// Builds a grid with explicit per-axis tick spacing.
    pub fn with_spacing(spacing: [f64; 3], cavity: &Cavity) -> Result<Self, GridError> {
        for (axis, &value) in spacing.iter().enumerate() {
            if value <= 0.0 {
                return Err(GridError::NonPositiveSpacing { axis, value });
            }
        }
        let mut grid = Self {
            spacing,
            ticks: [1; 3],
            search_cutoff: DEFAULT_SEARCH_CUTOFF,
            centre: cavity.centre(),
            points: Vec::new(),
        };
        grid.reset_cavity(cavity);
        Ok(grid)
    }

    /// Builds a grid whose points have the given target density
    /// (points per unit volume); the spacing is the isotropic cube-root
    /// spacing corresponding to that density.
    pub fn with_density(density: f64, cavity: &Cavity) -> Result<Self, GridError> {
        if density <= 0.0 {
            return Err(GridError::NonPositiveDensity(density));
        }
        let spacing = (1.0 / density).cbrt();
        Self::with_spacing([spacing; 3], cavity)
    }

    /// Builds a grid with the given number of ticks on each axis; the
    /// spacing is derived from the cavity extremes.
    pub fn with_divisions(divisions: [usize; 3], cavity: &Cavity) -> Result<Self, GridError> {
        let extremes = cavity.extremes();
        let mut spacing = [0.0; 3];
        for axis in 0..3 {
            if divisions[axis] == 0 {
                return Err(GridError::ZeroDivisions { axis });
            }
            let span = extremes[axis].1 - extremes[axis].0;
            spacing[axis] = if divisions[axis] > 1 {
                span / (divisions[axis] - 1) as f64
            } else {
                // A spacing wider than the span collapses the axis to its
                // single centre tick on rebuild.
                2.0 * span
            };
        }
        Self::with_spacing(spacing, cavity)
    }

    /// Discards and fully rebuilds the retained point set against `cavity`.
    ///
    /// Use after any change to the cavity's size parameters. Every
    /// previously returned point index or reference is invalidated.
    pub fn reset_cavity(&mut self, cavity: &Cavity) {
        let extremes = cavity.extremes();
        self.centre = cavity.centre();
        for axis in 0..3 {
            let span = extremes[axis].1 - extremes[axis].0;
            self.ticks[axis] = ((span / self.spacing[axis]).floor() as usize + 1).max(1);
        }

        let start = Point3::new(
            self.centre.x - self.spacing[0] * (self.ticks[0] - 1) as f64 / 2.0,
            self.centre.y - self.spacing[1] * (self.ticks[1] - 1) as f64 / 2.0,
            self.centre.z - self.spacing[2] * (self.ticks[2] - 1) as f64 / 2.0,
        );

        self.points.clear();
        for (i, j, k) in iproduct!(0..self.ticks[0], 0..self.ticks[1], 0..self.ticks[2]) {
            let position = Point3::new(
                start.x + i as f64 * self.spacing[0],
                start.y + j as f64 * self.spacing[1],
                start.z + k as f64 * self.spacing[2],
            );
            let interior = cavity.contains(&position);
            if interior || cavity.contains_within(&position, self.search_cutoff) {
                self.points.push(GridPoint {
                    position,
                    ticks: [i, j, k],
                    interior,
                });
            }
        }
        debug!(
            ticks = ?self.ticks,
            retained = self.points.len(),
            "Rebuilt spatial grid"
        );
    }

    /// Translates every retained point by the delta between the cavity's
    /// current centre and the centre recorded at the last rebuild.
    ///
    /// Valid only when the cavity's shape and size are unchanged; the
    /// retained/excluded classification and all indices are preserved.
    pub fn cavity_did_move(&mut self, cavity: &Cavity) {
        let delta: Vector3<f64> = cavity.centre() - self.centre;
        for point in &mut self.points {
            point.position += delta;
        }
        self.centre = cavity.centre();
    }

    /// Rebuilds the point buffer after deserialization.
    ///
    /// The persisted parameters reproduce bit-identical geometry provided
    /// the same cavity is supplied.
    pub fn rebuild(&mut self, cavity: &Cavity) {
        self.reset_cavity(cavity);
    }

    /// The number of retained points (interior plus extension).
    pub fn number_of_points(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    /// Indices of the points that are valid solvent placement sites.
    pub fn interior_points(&self) -> impl Iterator<Item = (usize, &GridPoint)> {
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.interior)
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// The number of ticks on each axis before containment filtering.
    pub fn divisions(&self) -> [usize; 3] {
        self.ticks
    }

    pub fn search_cutoff(&self) -> f64 {
        self.search_cutoff
    }

    /// Changes the search cutoff and re-filters the lattice, since the
    /// extension-point classification depends on it.
    pub fn set_search_cutoff(&mut self, value: f64, cavity: &Cavity) {
        self.search_cutoff = value.max(0.0);
        self.reset_cavity(cavity);
    }

    /// The index of the retained point nearest to `point`, or `None` when
    /// `point` is farther than `spacing + search_cutoff` on some axis from
    /// every retained point (i.e. not in or near the lattice).
    ///
    /// "Nearest" minimises the Chebyshev distance (the largest per-axis
    /// separation); ties resolve to the lowest index.
    pub fn nearest_point(&self, point: &Point3<f64>) -> Option<usize> {
        self.nearest_point_with_ticks(point).map(|(index, _)| index)
    }

    /// As [`SpatialGrid::nearest_point`], also yielding the per-axis tick
    /// indices of the matched point.
    pub fn nearest_point_with_ticks(&self, point: &Point3<f64>) -> Option<(usize, [usize; 3])> {
        let mut best: Option<(usize, f64)> = None;
        for (index, grid_point) in self.points.iter().enumerate() {
            let dx = (point.x - grid_point.position.x).abs();
            let dy = (point.y - grid_point.position.y).abs();
            let dz = (point.z - grid_point.position.z).abs();
            if dx > self.spacing[0] + self.search_cutoff
                || dy > self.spacing[1] + self.search_cutoff
                || dz > self.spacing[2] + self.search_cutoff
            {
                continue;
            }
            let chebyshev = dx.max(dy).max(dz);
            if best.is_none_or(|(_, current)| chebyshev < current) {
                best = Some((index, chebyshev));
            }
        }
        best.map(|(index, _)| (index, self.points[index].ticks))
    }
}
