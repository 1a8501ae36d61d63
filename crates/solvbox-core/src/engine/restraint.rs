use nalgebra::Point3;
use tracing::{info, instrument};

use super::container::SolventContainer;
use super::error::RestraintError;
use crate::core::forcefield::term::{Configuration, ForceBuffer, ForceFieldTerm, TermError};
use crate::core::geometry::cavity::Cavity;

/// Default restraint force constant, kcal/(mol A^2).
const DEFAULT_FORCE_CONSTANT: f64 = 1000.0;

/// Which atoms of a container a restraint pins.
///
/// Cavity and name selections are resolved against the container's state at
/// construction time; the resolved index set does not track later container
/// changes.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Every atom in the container.
    All,
    /// Explicit flat atom indices.
    Indices(Vec<usize>),
    /// Atoms currently inside the given volume.
    InsideCavity(Cavity),
    /// Atoms currently outside the given volume.
    OutsideCavity(Cavity),
    /// Atoms whose template record carries this name.
    AtomName(String),
    /// Reserved for a selection-string language. Construction rejects it.
    Expression(String),
}

/// Harmonic pinning of selected atoms to snapshot positions.
///
/// Each selected atom contributes `k/2 * |r - r_ref|^2`, where `r_ref` is
/// the atom's position when the restraint was built. The force on a
/// selected atom is `-k (r - r_ref)`; unselected atoms feel nothing.
#[derive(Debug, Clone)]
pub struct HarmonicRestraint {
    force_constant: f64,
    selected: Vec<usize>,
    reference: Vec<Point3<f64>>,
    expected: usize,
}

impl HarmonicRestraint {
    /// Restrains every atom of `container` at its current position with the
    /// default force constant.
    pub fn restrain_all(container: &SolventContainer) -> Self {
        // Selection::All with a positive default cannot fail.
        match Self::new(container, Selection::All, DEFAULT_FORCE_CONSTANT) {
            Ok(restraint) => restraint,
            Err(_) => unreachable!("default restraint construction is infallible"),
        }
    }

    /// Builds a restraint over `selection`, snapshotting the container's
    /// current coordinates as the reference.
    ///
    /// # Errors
    ///
    /// Rejects non-positive force constants, out-of-range explicit indices
    /// and `Selection::Expression`, which is reserved and unimplemented.
    #[instrument(skip(container), fields(container = container.name()))]
    pub fn new(
        container: &SolventContainer,
        selection: Selection,
        force_constant: f64,
    ) -> Result<Self, RestraintError> {
        if force_constant <= 0.0 {
            return Err(RestraintError::NonPositiveForceConstant(force_constant));
        }

        let positions = container.positions();
        let count = positions.len();
        let selected = match selection {
            Selection::All => (0..count).collect(),
            Selection::Indices(indices) => {
                if let Some(&index) = indices.iter().find(|&&i| i >= count) {
                    return Err(RestraintError::IndexOutOfRange { index, count });
                }
                indices
            }
            Selection::InsideCavity(cavity) => (0..count)
                .filter(|&i| cavity.contains(&positions[i]))
                .collect(),
            Selection::OutsideCavity(cavity) => (0..count)
                .filter(|&i| !cavity.contains(&positions[i]))
                .collect(),
            Selection::AtomName(name) => {
                let per = container.atoms_per_molecule();
                (0..count)
                    .filter(|&i| container.template().atoms()[i % per].name == name)
                    .collect()
            }
            Selection::Expression(expression) => {
                return Err(RestraintError::UnsupportedExpression(expression));
            }
        };

        let reference = selected.iter().map(|&i| positions[i]).collect();
        info!(
            selected = selected.len(),
            total = count,
            force_constant,
            "Built harmonic restraint"
        );
        Ok(Self {
            force_constant,
            selected,
            reference,
            expected: count,
        })
    }

    pub fn force_constant(&self) -> f64 {
        self.force_constant
    }

    /// # Errors
    ///
    /// The force constant must stay positive; on rejection the current
    /// value is kept.
    pub fn set_force_constant(&mut self, value: f64) -> Result<(), RestraintError> {
        if value <= 0.0 {
            return Err(RestraintError::NonPositiveForceConstant(value));
        }
        self.force_constant = value;
        Ok(())
    }

    /// The number of atoms the restraint acts on.
    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// The restrained atom indices, in the order they were resolved.
    pub fn selected_indices(&self) -> &[usize] {
        &self.selected
    }

    fn evaluate(
        &self,
        configuration: &Configuration,
        mut forces: Option<&mut ForceBuffer>,
    ) -> Result<f64, TermError> {
        if configuration.positions.len() != self.expected {
            return Err(TermError::ConfigurationMismatch {
                expected: self.expected,
                actual: configuration.positions.len(),
            });
        }
        if let Some(buffer) = forces.as_ref() {
            if buffer.len() != self.expected {
                return Err(TermError::BufferMismatch {
                    expected: self.expected,
                    actual: buffer.len(),
                });
            }
        }

        let mut energy = 0.0;
        for (&index, reference) in self.selected.iter().zip(&self.reference) {
            let displacement = configuration.positions[index] - reference;
            energy += 0.5 * self.force_constant * displacement.norm_squared();
            if let Some(buffer) = forces.as_deref_mut() {
                buffer.add(index, -self.force_constant * displacement);
            }
        }
        Ok(energy)
    }
}

impl ForceFieldTerm for HarmonicRestraint {
    fn energy(&mut self, configuration: &Configuration) -> Result<f64, TermError> {
        self.evaluate(configuration, None)
    }

    fn accumulate_forces(
        &mut self,
        configuration: &Configuration,
        forces: &mut ForceBuffer,
    ) -> Result<f64, TermError> {
        self.evaluate(configuration, Some(forces))
    }
}
