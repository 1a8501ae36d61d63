use super::atom::AtomRecord;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum StructureError {
    #[error("Structure '{0}' has no atoms")]
    Empty(String),

    #[error("Structure '{name}' has {atoms} property rows but {positions} coordinates")]
    LengthMismatch {
        name: String,
        atoms: usize,
        positions: usize,
    },
}

/// A named, immutable molecular fragment: one property row and one reference
/// coordinate per atom.
///
/// `Structure` is the structure-source capability consumed throughout the
/// library. A solvent container replicates one structure (the template, e.g.
/// a single water molecule) across its lattice, and accepts further
/// structures as solutes to insert. Restraint terms resolve property-based
/// selections against a structure's atom table.
///
/// Validation happens once at construction; afterwards the tables cannot be
/// resized, so consumers may cache the atom count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    name: String,
    atoms: Vec<AtomRecord>,
    positions: Vec<Point3<f64>>,
}

impl Structure {
    /// Creates a structure from parallel property and coordinate tables.
    ///
    /// # Errors
    ///
    /// Returns [`StructureError::Empty`] for a zero-atom structure and
    /// [`StructureError::LengthMismatch`] when the tables disagree in length.
    pub fn new(
        name: &str,
        atoms: Vec<AtomRecord>,
        positions: Vec<Point3<f64>>,
    ) -> Result<Self, StructureError> {
        if atoms.is_empty() {
            return Err(StructureError::Empty(name.to_string()));
        }
        if atoms.len() != positions.len() {
            return Err(StructureError::LengthMismatch {
                name: name.to_string(),
                atoms: atoms.len(),
                positions: positions.len(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            atoms,
            positions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn atoms(&self) -> &[AtomRecord] {
        &self.atoms
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// The sum of the partial charges, in elementary charge units.
    pub fn net_charge(&self) -> f64 {
        self.atoms.iter().map(|a| a.partial_charge).sum()
    }

    /// The total mass in amu.
    pub fn total_mass(&self) -> f64 {
        self.atoms.iter().map(|a| a.mass).sum()
    }

    /// The index of the first atom without Lennard-Jones parameters, if any.
    ///
    /// Solute insertion rejects structures with such atoms, since the
    /// occlusion criterion is the van der Waals radius sum.
    pub fn first_atom_without_lennard_jones(&self) -> Option<usize> {
        self.atoms.iter().position(|a| a.lennard_jones.is_none())
    }

    /// The mass-weighted centre of the reference coordinates.
    pub fn centre_of_mass(&self) -> Point3<f64> {
        let total = self.total_mass();
        let weighted: Vector3<f64> = self
            .atoms
            .iter()
            .zip(self.positions.iter())
            .map(|(a, p)| p.coords * a.mass)
            .sum();
        Point3::from(weighted / total)
    }
}
