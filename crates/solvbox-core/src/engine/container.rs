use nalgebra::Point3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::ops::Range;
use tracing::{info, instrument, warn};

use super::error::ContainerError;
use crate::core::geometry::cavity::Cavity;
use crate::core::geometry::grid::SpatialGrid;
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::{centre_of_mass, rotation_from_euler_xyz};

/// Bookkeeping for one inserted solute: how many solvent replicas its
/// insertion removed, which bounds how many a later removal may restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertionRecord {
    pub name: String,
    pub removed: usize,
}

/// A solvent population filling a cavity volume.
///
/// On construction the container replicates its template structure (one
/// solvent unit, e.g. a water molecule) at the interior points of a lattice
/// spanning the cavity, up to `floor(density * volume)` copies, each with a
/// random orientation drawn from a seeded deterministic generator: the same
/// template, cavity, density and seed always reproduce bit-identical
/// placement.
///
/// Solutes can then be inserted, removing every replica that overlaps them
/// within the Lennard-Jones radius sum, and later removed again, which
/// refills the freed volume with at most as many replicas as the insertion
/// displaced. The container tracks the displaced ("occluded") count
/// throughout; `molecule_count() + occluded_molecules()` is conserved across
/// an insert/remove pair except for the documented reinsertion shortfall.
///
/// Atom storage is a flat coordinate buffer; molecule `i` owns the
/// contiguous range [`SolventContainer::molecule_range`]. Property rows are
/// shared: every replica reuses the template's atom table.
///
/// The container is fully serializable, including the generator state, so a
/// reloaded container continues the same random stream. After
/// deserialization call [`SolventContainer::restore`] to rebuild the lattice
/// (point buffers are not persisted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolventContainer {
    template: Structure,
    cavity: Cavity,
    density: f64,
    seed: u64,
    rng: ChaCha8Rng,
    grid: SpatialGrid,
    positions: Vec<Point3<f64>>,
    occluded: usize,
    records: Vec<InsertionRecord>,
    contained: Vec<Structure>,
}

impl SolventContainer {
    pub fn builder() -> SolventContainerBuilder {
        SolventContainerBuilder::default()
    }

    /// The name of the container's template data source.
    pub fn name(&self) -> &str {
        self.template.name()
    }

    pub fn template(&self) -> &Structure {
        &self.template
    }

    pub fn cavity(&self) -> &Cavity {
        &self.cavity
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn atoms_per_molecule(&self) -> usize {
        self.template.atom_count()
    }

    /// The number of template replicas currently in the cavity.
    pub fn molecule_count(&self) -> usize {
        self.positions.len() / self.template.atom_count()
    }

    /// The number of replicas removed through solute insertion and not yet
    /// restored.
    pub fn occluded_molecules(&self) -> usize {
        self.occluded
    }

    /// The solutes currently inserted, in insertion order.
    pub fn contained_systems(&self) -> &[Structure] {
        &self.contained
    }

    pub fn insertion_records(&self) -> &[InsertionRecord] {
        &self.records
    }

    /// The flat working coordinates, one entry per solvent atom.
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// The atom index range owned by molecule `index`.
    pub fn molecule_range(&self, index: usize) -> Range<usize> {
        let per = self.template.atom_count();
        index * per..(index + 1) * per
    }

    /// Replaces the working coordinates wholesale, typically to sync the
    /// container with the integrator's current configuration before an
    /// insertion or removal.
    ///
    /// # Errors
    ///
    /// The new configuration must have exactly one coordinate per atom;
    /// on mismatch nothing is mutated.
    pub fn set_configuration(&mut self, coordinates: &[Point3<f64>]) -> Result<(), ContainerError> {
        if coordinates.len() != self.positions.len() {
            return Err(ContainerError::ConfigurationMismatch {
                expected: self.positions.len(),
                actual: coordinates.len(),
            });
        }
        self.positions.clear();
        self.positions.extend_from_slice(coordinates);
        Ok(())
    }

    /// Inserts `solute` into the container volume, removing every solvent
    /// replica with any atom inside the van der Waals radius sum of any
    /// solute atom. Returns the number of replicas removed.
    ///
    /// # Errors
    ///
    /// Every solute atom must carry Lennard-Jones parameters; the radius
    /// sum criterion is undefined otherwise.
    #[instrument(skip_all, fields(solute = solute.name()))]
    pub fn insert_system(&mut self, solute: &Structure) -> Result<usize, ContainerError> {
        if let Some(index) = solute.first_atom_without_lennard_jones() {
            return Err(ContainerError::MissingLennardJones {
                name: solute.name().to_string(),
                index,
            });
        }

        let radii: Vec<f64> = solute.atoms().iter().map(|a| a.vdw_radius()).collect();
        let removed = self.remove_clashing_molecules(solute.positions(), &radii);

        self.occluded += removed;
        self.records.push(InsertionRecord {
            name: solute.name().to_string(),
            removed,
        });
        self.contained.push(solute.clone());

        info!(
            removed,
            occluded = self.occluded,
            remaining = self.molecule_count(),
            "Inserted solute into container"
        );
        Ok(removed)
    }

    /// Removes the previously inserted solute identified by `name` and
    /// attempts to refill the freed volume, placing at most as many fresh
    /// replicas as the insertion displaced. Returns the number actually
    /// reinserted, which may fall short when the space no longer admits
    /// them.
    #[instrument(skip(self))]
    pub fn remove_system(&mut self, name: &str) -> Result<usize, ContainerError> {
        let record_index = self
            .records
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| ContainerError::UnknownSystem(name.to_string()))?;
        // Both lists are located before either is touched, so a
        // deserialized archive with an unpaired record errors cleanly
        // without partial mutation.
        let solute_index = self
            .contained
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| ContainerError::UnknownSystem(name.to_string()))?;
        let record = self.records.remove(record_index);
        self.contained.remove(solute_index);

        let reinserted = self.refill(record.removed);
        self.occluded -= reinserted;

        if reinserted < record.removed {
            warn!(
                removed = record.removed,
                reinserted, "Freed volume no longer admits the full replica count"
            );
        }
        info!(
            reinserted,
            occluded = self.occluded,
            current = self.molecule_count(),
            "Removed solute from container"
        );
        Ok(reinserted)
    }

    /// Permanently removes every replica with any atom inside `cavity`.
    /// Unlike solute occlusion, these replicas are never reinserted and do
    /// not count as occluded. Returns the number removed.
    pub fn set_exclusion_area(&mut self, cavity: &Cavity) -> usize {
        let per = self.template.atom_count();
        let mut removed = 0;
        for molecule in (0..self.molecule_count()).rev() {
            let range = molecule * per..(molecule + 1) * per;
            if self.positions[range.clone()]
                .iter()
                .any(|p| cavity.contains(p))
            {
                self.positions.drain(range);
                removed += 1;
            }
        }
        info!(removed, shape = cavity.shape_name(), "Applied exclusion area");
        removed
    }

    /// Rebuilds the lattice point buffer after deserialization. The
    /// persisted spacing and cavity reproduce bit-identical geometry.
    pub fn restore(&mut self) {
        self.grid.rebuild(&self.cavity);
    }

    fn template_masses(&self) -> Vec<f64> {
        self.template.atoms().iter().map(|a| a.mass).collect()
    }

    /// Places one template replica with its centre of mass at `point`,
    /// rotated by three Euler angles drawn uniformly from [0, 2π) in x, y,
    /// z order and applied as successive axis-angle rotations.
    fn place_replica_at(&mut self, point: Point3<f64>) -> Vec<Point3<f64>> {
        let ax = self.rng.gen_range(0.0..TAU);
        let ay = self.rng.gen_range(0.0..TAU);
        let az = self.rng.gen_range(0.0..TAU);
        let rotation = rotation_from_euler_xyz(ax, ay, az);
        let com = self.template.centre_of_mass();
        self.template
            .positions()
            .iter()
            .map(|p| point + rotation * (p - com))
            .collect()
    }

    /// Removes every molecule with an atom inside the van der Waals radius
    /// sum of any obstacle atom; returns the count removed.
    fn remove_clashing_molecules(
        &mut self,
        obstacle_positions: &[Point3<f64>],
        obstacle_radii: &[f64],
    ) -> usize {
        let per = self.template.atom_count();
        let template_radii: Vec<f64> =
            self.template.atoms().iter().map(|a| a.vdw_radius()).collect();
        let mut removed = 0;
        for molecule in (0..self.molecule_count()).rev() {
            let range = molecule * per..(molecule + 1) * per;
            let clashes = self.positions[range.clone()].iter().enumerate().any(
                |(atom, position)| {
                    obstacle_positions
                        .iter()
                        .zip(obstacle_radii)
                        .any(|(obstacle, &radius)| {
                            (position - obstacle).norm() < template_radii[atom] + radius
                        })
                },
            );
            if clashes {
                self.positions.drain(range);
                removed += 1;
            }
        }
        removed
    }

    /// Attempts to place up to `target` fresh replicas at vacant interior
    /// lattice points; returns the number placed.
    ///
    /// A point is vacant when no existing replica's centre of mass sits
    /// within half the smallest grid spacing of it and the candidate does
    /// not clash with any remaining solute.
    fn refill(&mut self, target: usize) -> usize {
        if target == 0 {
            return 0;
        }
        let masses = self.template_masses();
        let half_spacing = self
            .grid
            .spacing()
            .iter()
            .fold(f64::INFINITY, |a, &b| a.min(b))
            / 2.0;
        let candidate_points: Vec<Point3<f64>> = self
            .grid
            .interior_points()
            .map(|(_, p)| p.position)
            .collect();

        let mut placed = 0;
        for point in candidate_points {
            if placed == target {
                break;
            }
            if !self.point_is_vacant(&point, half_spacing, &masses) {
                continue;
            }
            let candidate = self.place_replica_at(point);
            if self.candidate_clears_solutes(&candidate) {
                self.positions.extend(candidate);
                placed += 1;
            }
        }
        placed
    }

    fn point_is_vacant(&self, point: &Point3<f64>, half_spacing: f64, masses: &[f64]) -> bool {
        let per = self.template.atom_count();
        (0..self.molecule_count()).all(|molecule| {
            let range = molecule * per..(molecule + 1) * per;
            let com = centre_of_mass(&self.positions[range], masses);
            (com - point).norm() > half_spacing
        })
    }

    fn candidate_clears_solutes(&self, candidate: &[Point3<f64>]) -> bool {
        let template_radii: Vec<f64> =
            self.template.atoms().iter().map(|a| a.vdw_radius()).collect();
        self.contained.iter().all(|solute| {
            solute
                .positions()
                .iter()
                .zip(solute.atoms())
                .all(|(obstacle, record)| {
                    candidate.iter().zip(&template_radii).all(|(position, &r)| {
                        (position - obstacle).norm() >= r + record.vdw_radius()
                    })
                })
        })
    }
}

/// Builder for [`SolventContainer`].
///
/// `template`, `cavity` and `density` are required; the seed defaults to 0
/// and the pre-inserted solute list to empty.
#[derive(Debug, Default)]
pub struct SolventContainerBuilder {
    template: Option<Structure>,
    cavity: Option<Cavity>,
    density: Option<f64>,
    seed: u64,
    contained_systems: Vec<Structure>,
}

impl SolventContainerBuilder {
    pub fn template(mut self, template: Structure) -> Self {
        self.template = Some(template);
        self
    }

    pub fn cavity(mut self, cavity: Cavity) -> Self {
        self.cavity = Some(cavity);
        self
    }

    /// Target density in solvent units per cubic distance unit.
    pub fn density(mut self, density: f64) -> Self {
        self.density = Some(density);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Solutes inserted immediately after the initial fill, in order.
    pub fn contained_systems(mut self, systems: Vec<Structure>) -> Self {
        self.contained_systems = systems;
        self
    }

    #[instrument(skip_all)]
    pub fn build(self) -> Result<SolventContainer, ContainerError> {
        let template = self
            .template
            .ok_or(ContainerError::MissingParameter("template"))?;
        let cavity = self
            .cavity
            .ok_or(ContainerError::MissingParameter("cavity"))?;
        let density = self
            .density
            .ok_or(ContainerError::MissingParameter("density"))?;
        if density <= 0.0 {
            return Err(ContainerError::NonPositiveDensity(density));
        }

        let grid = SpatialGrid::with_density(density, &cavity)?;
        let target = (density * cavity.volume()).floor() as usize;

        let mut container = SolventContainer {
            template,
            cavity,
            density,
            seed: self.seed,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            grid,
            positions: Vec::new(),
            occluded: 0,
            records: Vec::new(),
            contained: Vec::new(),
        };

        let points: Vec<Point3<f64>> = container
            .grid
            .interior_points()
            .take(target)
            .map(|(_, p)| p.position)
            .collect();
        for point in &points {
            let replica = container.place_replica_at(*point);
            container.positions.extend(replica);
        }
        if points.len() < target {
            warn!(
                target,
                placed = points.len(),
                "Lattice admits fewer replicas than the target density requires"
            );
        }
        info!(
            molecules = container.molecule_count(),
            target,
            volume = container.cavity.volume(),
            "Filled solvent container"
        );

        for solute in self.contained_systems {
            container.insert_system(&solute)?;
        }
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::cavity::Sphere;
    use crate::core::models::atom::AtomRecord;

    fn water_template() -> Structure {
        Structure::new(
            "water",
            vec![
                AtomRecord::new("OW", 16.0, -0.834).with_lennard_jones(1.768, 0.152),
                AtomRecord::new("HW1", 1.0, 0.417).with_lennard_jones(0.6, 0.01),
                AtomRecord::new("HW2", 1.0, 0.417).with_lennard_jones(0.6, 0.01),
            ],
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.96, 0.0, 0.0),
                Point3::new(-0.24, 0.93, 0.0),
            ],
        )
        .unwrap()
    }

    fn sphere(radius: f64) -> Cavity {
        Cavity::Sphere(Sphere::new(radius).unwrap())
    }

    fn build(radius: f64, density: f64, seed: u64) -> SolventContainer {
        SolventContainer::builder()
            .template(water_template())
            .cavity(sphere(radius))
            .density(density)
            .seed(seed)
            .build()
            .unwrap()
    }

    fn central_solute(radius: f64) -> Structure {
        Structure::new(
            "probe",
            vec![AtomRecord::new("X", 40.0, 0.0).with_lennard_jones(radius, 0.3)],
            vec![Point3::origin()],
        )
        .unwrap()
    }

    #[test]
    fn initial_fill_reaches_the_density_target() {
        // Sphere of radius 10 has volume ~4188.79; at 0.0334 molecules per
        // cubic Angstrom the target count is floor(139.9) = 139.
        let container = build(10.0, 0.0334, 7);
        assert_eq!(container.molecule_count(), 139);
        assert_eq!(
            container.positions().len(),
            139 * container.atoms_per_molecule()
        );
        assert_eq!(container.occluded_molecules(), 0);
    }

    #[test]
    fn placed_molecules_sit_at_interior_lattice_points() {
        let container = build(10.0, 0.0334, 7);
        let masses: Vec<f64> = container.template().atoms().iter().map(|a| a.mass).collect();
        let com = centre_of_mass(&container.positions()[container.molecule_range(0)], &masses);
        let site = container
            .grid
            .interior_points()
            .next()
            .map(|(_, p)| p.position)
            .unwrap();
        assert!((com - site).norm() < 1e-9);
    }

    #[test]
    fn same_seed_reproduces_bit_identical_placement() {
        let a = build(10.0, 0.0334, 42);
        let b = build(10.0, 0.0334, 42);
        assert_eq!(a.positions(), b.positions());
    }

    #[test]
    fn different_seeds_give_different_orientations() {
        let a = build(10.0, 0.0334, 1);
        let b = build(10.0, 0.0334, 2);
        assert_ne!(a.positions(), b.positions());
    }

    #[test]
    fn insert_system_occludes_overlapping_replicas() {
        let mut container = build(10.0, 0.0334, 7);
        let before = container.molecule_count();

        let removed = container.insert_system(&central_solute(4.0)).unwrap();
        assert!(removed > 0);
        assert_eq!(container.molecule_count(), before - removed);
        assert_eq!(container.occluded_molecules(), removed);
        assert_eq!(container.contained_systems().len(), 1);
        assert_eq!(container.contained_systems()[0].name(), "probe");
    }

    #[test]
    fn insert_system_requires_lennard_jones_parameters() {
        let mut container = build(10.0, 0.0334, 7);
        let bare = Structure::new(
            "ion",
            vec![AtomRecord::new("NA", 22.99, 1.0)],
            vec![Point3::origin()],
        )
        .unwrap();
        assert!(matches!(
            container.insert_system(&bare),
            Err(ContainerError::MissingLennardJones { index: 0, .. })
        ));
        assert_eq!(container.occluded_molecules(), 0);
    }

    #[test]
    fn remove_system_never_exceeds_the_pre_insertion_count() {
        let mut container = build(10.0, 0.0334, 7);
        let before = container.molecule_count();

        let removed = container.insert_system(&central_solute(4.0)).unwrap();
        let reinserted = container.remove_system("probe").unwrap();

        assert!(reinserted <= removed);
        assert!(container.molecule_count() <= before);
        assert_eq!(container.occluded_molecules(), removed - reinserted);
        assert!(container.contained_systems().is_empty());
        assert!(container.insertion_records().is_empty());
    }

    #[test]
    fn remove_system_restores_molecules_into_the_freed_volume() {
        let mut container = build(10.0, 0.0334, 7);
        let after_insert = {
            container.insert_system(&central_solute(4.0)).unwrap();
            container.molecule_count()
        };
        let reinserted = container.remove_system("probe").unwrap();
        assert!(reinserted > 0);
        assert_eq!(container.molecule_count(), after_insert + reinserted);
    }

    #[test]
    fn remove_system_rejects_archives_with_unpaired_records() {
        let mut container = build(10.0, 0.0334, 7);
        container.insert_system(&central_solute(4.0)).unwrap();

        // Hand-edited archive: the insertion record survives but the
        // contained-system list was stripped.
        let mut archive: serde_json::Value =
            serde_json::to_value(&container).unwrap();
        archive["contained"] = serde_json::json!([]);
        let mut corrupted: SolventContainer = serde_json::from_value(archive).unwrap();
        corrupted.restore();

        assert!(matches!(
            corrupted.remove_system("probe"),
            Err(ContainerError::UnknownSystem(_))
        ));
        assert_eq!(corrupted.insertion_records().len(), 1);
    }

    #[test]
    fn remove_system_rejects_unknown_names() {
        let mut container = build(10.0, 0.0334, 7);
        assert!(matches!(
            container.remove_system("ghost"),
            Err(ContainerError::UnknownSystem(_))
        ));
    }

    #[test]
    fn builder_pre_inserts_contained_systems() {
        let container = SolventContainer::builder()
            .template(water_template())
            .cavity(sphere(10.0))
            .density(0.0334)
            .seed(7)
            .contained_systems(vec![central_solute(4.0)])
            .build()
            .unwrap();
        assert!(container.occluded_molecules() > 0);
        assert_eq!(container.contained_systems().len(), 1);
    }

    #[test]
    fn set_exclusion_area_removes_without_occlusion_bookkeeping() {
        let mut container = build(10.0, 0.0334, 7);
        let before = container.molecule_count();

        let removed = container.set_exclusion_area(&sphere(4.0));
        assert!(removed > 0);
        assert_eq!(container.molecule_count(), before - removed);
        assert_eq!(container.occluded_molecules(), 0);
    }

    #[test]
    fn set_configuration_rejects_mismatched_lengths() {
        let mut container = build(10.0, 0.0334, 7);
        let wrong = vec![Point3::origin(); 5];
        assert!(matches!(
            container.set_configuration(&wrong),
            Err(ContainerError::ConfigurationMismatch { .. })
        ));
    }

    #[test]
    fn set_configuration_replaces_the_working_coordinates() {
        let mut container = build(10.0, 0.0334, 7);
        let shifted: Vec<Point3<f64>> = container
            .positions()
            .iter()
            .map(|p| p + nalgebra::Vector3::new(0.1, 0.0, 0.0))
            .collect();
        container.set_configuration(&shifted).unwrap();
        assert_eq!(container.positions(), shifted.as_slice());
    }

    #[test]
    fn builder_validates_density_and_required_parameters() {
        assert!(matches!(
            SolventContainer::builder()
                .template(water_template())
                .cavity(sphere(10.0))
                .density(-0.5)
                .build(),
            Err(ContainerError::NonPositiveDensity(_))
        ));
        assert!(matches!(
            SolventContainer::builder().build(),
            Err(ContainerError::MissingParameter("template"))
        ));
    }

    #[test]
    fn serialized_container_restores_identical_state() {
        let container = build(10.0, 0.0334, 7);
        let text = serde_json::to_string(&container).unwrap();
        let mut restored: SolventContainer = serde_json::from_str(&text).unwrap();
        restored.restore();

        assert_eq!(restored.positions(), container.positions());
        assert_eq!(
            restored.grid().number_of_points(),
            container.grid().number_of_points()
        );
        assert_eq!(restored.seed(), container.seed());
    }

    #[test]
    fn restored_generator_continues_the_same_stream() {
        let mut original = build(10.0, 0.0334, 7);
        let text = serde_json::to_string(&original).unwrap();
        let mut restored: SolventContainer = serde_json::from_str(&text).unwrap();
        restored.restore();

        original.insert_system(&central_solute(4.0)).unwrap();
        restored.insert_system(&central_solute(4.0)).unwrap();
        let a = original.remove_system("probe").unwrap();
        let b = restored.remove_system("probe").unwrap();
        assert_eq!(a, b);
        assert_eq!(original.positions(), restored.positions());
    }
}
