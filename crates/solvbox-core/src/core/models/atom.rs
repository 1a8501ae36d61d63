use serde::{Deserialize, Serialize};

/// Lennard-Jones parameters for a single atom.
///
/// These feed the van der Waals overlap criterion used when solutes are
/// inserted into a solvent container: two atoms clash when their separation
/// is below the sum of their radii.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LennardJonesParams {
    /// The van der Waals radius in Angstroms.
    pub radius: f64,
    /// The well depth parameter (epsilon) in kcal/mol.
    pub well_depth: f64,
}

/// Per-atom property record for a structure.
///
/// This is the row of the property table exposed by every structure source:
/// the solvent template, inserted solutes, and restraint targets all carry
/// one record per atom. Coordinates live separately in the owning
/// [`Structure`](super::structure::Structure) so that property tables stay
/// immutable while configurations evolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomRecord {
    /// The name of the atom (e.g., "OW", "HW1").
    pub name: String,
    /// The atomic mass in amu.
    pub mass: f64,
    /// The partial atomic charge in elementary charge units.
    pub partial_charge: f64,
    /// Lennard-Jones parameters, if the parent force field assigned them.
    pub lennard_jones: Option<LennardJonesParams>,
}

impl AtomRecord {
    /// Creates a record with no Lennard-Jones parameters assigned.
    pub fn new(name: &str, mass: f64, partial_charge: f64) -> Self {
        Self {
            name: name.to_string(),
            mass,
            partial_charge,
            lennard_jones: None,
        }
    }

    /// Attaches Lennard-Jones parameters to the record.
    pub fn with_lennard_jones(mut self, radius: f64, well_depth: f64) -> Self {
        self.lennard_jones = Some(LennardJonesParams { radius, well_depth });
        self
    }

    /// The van der Waals radius, or zero when no parameters are assigned.
    #[inline]
    pub fn vdw_radius(&self) -> f64 {
        self.lennard_jones.map_or(0.0, |lj| lj.radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_has_no_lennard_jones_parameters() {
        let atom = AtomRecord::new("OW", 15.9994, -0.834);
        assert_eq!(atom.name, "OW");
        assert_eq!(atom.mass, 15.9994);
        assert_eq!(atom.partial_charge, -0.834);
        assert!(atom.lennard_jones.is_none());
        assert_eq!(atom.vdw_radius(), 0.0);
    }

    #[test]
    fn with_lennard_jones_sets_radius_and_well_depth() {
        let atom = AtomRecord::new("OW", 15.9994, -0.834).with_lennard_jones(1.768, 0.152);
        assert_eq!(
            atom.lennard_jones,
            Some(LennardJonesParams {
                radius: 1.768,
                well_depth: 0.152
            })
        );
        assert_eq!(atom.vdw_radius(), 1.768);
    }

    #[test]
    fn record_round_trips_through_serde() {
        let atom = AtomRecord::new("HW1", 1.008, 0.417).with_lennard_jones(0.6, 0.01);
        let text = serde_json::to_string(&atom).unwrap();
        let restored: AtomRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(atom, restored);
    }
}
