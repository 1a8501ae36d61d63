use nalgebra::{Point3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TermError {
    #[error("Configuration holds {actual} coordinates but the term expects {expected}")]
    ConfigurationMismatch { expected: usize, actual: usize },

    #[error("Force buffer holds {actual} slots but the term expects {expected}")]
    BufferMismatch { expected: usize, actual: usize },
}

/// A snapshot of the system state handed to force-field terms for one
/// evaluation: current coordinates and, when the integrator provides them,
/// current velocities.
///
/// Velocities are optional because only dissipative terms (the boundary
/// shell friction) consume them; purely conservative terms ignore them.
#[derive(Debug, Clone, Copy)]
pub struct Configuration<'a> {
    pub positions: &'a [Point3<f64>],
    pub velocities: Option<&'a [Vector3<f64>]>,
}

impl<'a> Configuration<'a> {
    pub fn positions_only(positions: &'a [Point3<f64>]) -> Self {
        Self {
            positions,
            velocities: None,
        }
    }

    pub fn with_velocities(positions: &'a [Point3<f64>], velocities: &'a [Vector3<f64>]) -> Self {
        Self {
            positions,
            velocities: Some(velocities),
        }
    }
}

/// The shared per-atom force accumulation buffer.
///
/// The aggregate force-field evaluator owns one buffer per timestep and
/// passes it to each term in turn; terms add their contributions and never
/// zero or overwrite slots they did not write.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceBuffer {
    forces: Vec<Vector3<f64>>,
}

impl ForceBuffer {
    pub fn zeroed(count: usize) -> Self {
        Self {
            forces: vec![Vector3::zeros(); count],
        }
    }

    pub fn len(&self) -> usize {
        self.forces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forces.is_empty()
    }

    pub fn reset(&mut self) {
        self.forces.fill(Vector3::zeros());
    }

    #[inline]
    pub fn add(&mut self, index: usize, force: Vector3<f64>) {
        self.forces[index] += force;
    }

    pub fn as_slice(&self) -> &[Vector3<f64>] {
        &self.forces
    }
}

/// A force-field contribution evaluated once per timestep by the external
/// aggregator.
///
/// Implementations take `&mut self` because evaluation may use internal
/// scratch arenas or draw from an owned random stream; both entry points
/// return the term's total energy.
pub trait ForceFieldTerm {
    /// Computes the term's energy for `configuration` without touching any
    /// force buffer.
    fn energy(&mut self, configuration: &Configuration) -> Result<f64, TermError>;

    /// Computes the term's energy and adds its force contributions into
    /// `forces`.
    fn accumulate_forces(
        &mut self,
        configuration: &Configuration,
        forces: &mut ForceBuffer,
    ) -> Result<f64, TermError>;
}
