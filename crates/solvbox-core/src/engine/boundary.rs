use nalgebra::{Point3, Vector3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, instrument, warn};

use super::container::SolventContainer;
use super::error::BoundaryError;
use crate::core::forcefield::term::{Configuration, ForceBuffer, ForceFieldTerm, TermError};
use crate::core::models::structure::Structure;
use crate::core::utils::geometry::{clamp_cosine, dipole_moment};

/// Boltzmann constant in kcal/(mol K).
const BOLTZMANN: f64 = 1.987204259e-3;

/// Radial restoring force constant, kcal/(mol A^2). Empirical bulk-liquid
/// compressibility parameter of the surface-constraint model.
const ALPHA: f64 = 2.0;

/// Charge-displacement coefficient, A^3/e. Scales how far a net solute
/// charge shifts the equilibrium radial distances of the surface shell.
const BETA: f64 = 0.26;

/// Orientational restraint constant on the dipole polarization cosine,
/// kcal/mol.
const POLARIZATION_CONSTANT: f64 = 1.2;

/// Per-molecule scratch storage reused across evaluations and reallocated
/// only when the molecule count changes.
#[derive(Debug, Default)]
struct ShellArena {
    com: Vec<Point3<f64>>,
    radial_distance: Vec<f64>,
    dipole: Vec<Vector3<f64>>,
    cos_polarization: Vec<f64>,
    shell_by_distance: Vec<usize>,
    shell_by_angle: Vec<usize>,
}

impl ShellArena {
    fn resize(&mut self, molecules: usize) {
        self.com.resize(molecules, Point3::origin());
        self.radial_distance.resize(molecules, 0.0);
        self.dipole.resize(molecules, Vector3::zeros());
        self.cos_polarization.resize(molecules, 0.0);
        self.shell_by_distance.clear();
        self.shell_by_angle.clear();
    }
}

/// Surface-constrained (SCAAS-style) boundary forces for a spherical
/// solvent container.
///
/// Simulating a finite solvent sphere truncates the infinite bulk beyond
/// its surface; left alone, the outermost solvent would evaporate and
/// depolarize. This term classifies every solvent molecule by the radial
/// distance of its centre of mass, leaves the inner "bulk" population
/// untouched, and applies three corrections to the surface shell (the
/// outermost `boundary_depth` of the sphere):
///
/// 1. a harmonic radial restoring force toward per-molecule equilibrium
///    distances derived from the shell's rank statistics, shrunk by the
///    container's occluded-molecule fraction and shifted by the net charge
///    of the registered contained solutes;
/// 2. an orientational restraint on the molecular dipole's polarization
///    cosine toward the distribution expected at a dielectric boundary;
/// 3. a Langevin-style frictional plus stochastic force holding the shell
///    at the target temperature, applied only when the evaluation supplies
///    velocities.
///
/// The boundary does not observe the container. After any insertion or
/// removal, call [`ScaasBoundary::refresh`] before the next evaluation;
/// the occlusion fraction is re-read from the container there, so the
/// container's occlusion bookkeeping and this term's charge compensation
/// cannot drift apart silently.
#[derive(Debug)]
pub struct ScaasBoundary {
    boundary_depth: f64,
    target_temperature: f64,
    kbt: f64,
    friction: f64,
    time_step: f64,
    sphere_radius: f64,
    sphere_centre: Point3<f64>,
    atoms_per_molecule: usize,
    atom_masses: Vec<f64>,
    atom_charges: Vec<f64>,
    molecule_mass: f64,
    molecule_count: usize,
    occlusion_fraction: f64,
    solute_charge: f64,
    contained: Vec<Structure>,
    rng: ChaCha8Rng,
    arena: ShellArena,
}

impl ScaasBoundary {
    pub fn builder() -> ScaasBoundaryBuilder {
        ScaasBoundaryBuilder::default()
    }

    pub fn boundary_depth(&self) -> f64 {
        self.boundary_depth
    }

    /// Sets the boundary depth. Non-positive values fall back to 1.0.
    pub fn set_boundary_depth(&mut self, value: f64) {
        if value <= 0.0 {
            warn!(value, "Non-positive boundary depth, falling back to 1.0");
            self.boundary_depth = 1.0;
        } else {
            self.boundary_depth = value;
        }
    }

    pub fn target_temperature(&self) -> f64 {
        self.target_temperature
    }

    /// Sets the target shell temperature. Negative values clamp to 0.
    pub fn set_target_temperature(&mut self, value: f64) {
        self.target_temperature = value.max(0.0);
        self.kbt = BOLTZMANN * self.target_temperature;
    }

    /// The solute systems whose net charge feeds the radial charge
    /// compensation.
    pub fn contained_systems(&self) -> &[Structure] {
        &self.contained
    }

    /// Replaces the registered solute systems and recomputes the net
    /// charge they compensate for.
    pub fn set_contained_systems(&mut self, systems: Vec<Structure>) {
        self.solute_charge = systems.iter().map(Structure::net_charge).sum();
        self.contained = systems;
    }

    /// Re-reads the container's geometry, molecule count and occlusion
    /// fraction. Must be called after any insertion into or removal from
    /// the container, and after the cavity moves.
    #[instrument(skip_all)]
    pub fn refresh(&mut self, container: &SolventContainer) {
        // Shape cannot change after construction, so as_sphere always holds.
        if let Some(sphere) = container.cavity().as_sphere() {
            self.sphere_radius = sphere.radius();
            self.sphere_centre = container.cavity().centre();
        }
        self.molecule_count = container.molecule_count();
        let displaced = container.occluded_molecules();
        let total = self.molecule_count + displaced;
        self.occlusion_fraction = if total > 0 {
            displaced as f64 / total as f64
        } else {
            0.0
        };
        self.arena.resize(self.molecule_count);
        debug!(
            molecules = self.molecule_count,
            occlusion = self.occlusion_fraction,
            "Refreshed boundary state"
        );
    }

    /// The equilibrium radial distance for the shell molecule of
    /// distance-rank `rank` among `shell_count` shell molecules.
    ///
    /// Ranks map to equal-volume sub-shells between the inner boundary and
    /// the sphere surface; the volume available shrinks with the occluded
    /// fraction, and a net solute charge shifts every equilibrium distance
    /// by a Born-like 1/r^2 displacement.
    fn equilibrium_distance(&self, rank: usize, shell_count: usize) -> f64 {
        let inner = self.sphere_radius - self.boundary_depth;
        let fraction = (rank as f64 + 0.5) / shell_count as f64;
        let available = (1.0 - self.occlusion_fraction)
            * (self.sphere_radius.powi(3) - inner.powi(3));
        let base = (inner.powi(3) + fraction * available).cbrt();
        base - BETA * self.solute_charge / (base * base)
    }

    /// The equilibrium polarization cosine for the shell molecule of
    /// angle-rank `rank`: rank statistics of the uniform cosine
    /// distribution of unpolarized bulk.
    fn equilibrium_cosine(rank: usize, shell_count: usize) -> f64 {
        1.0 - 2.0 * (rank as f64 + 0.5) / shell_count as f64
    }

    fn evaluate(
        &mut self,
        configuration: &Configuration,
        mut forces: Option<&mut ForceBuffer>,
    ) -> Result<f64, TermError> {
        let expected = self.molecule_count * self.atoms_per_molecule;
        if configuration.positions.len() != expected {
            return Err(TermError::ConfigurationMismatch {
                expected,
                actual: configuration.positions.len(),
            });
        }
        if let Some(buffer) = forces.as_ref() {
            if buffer.len() != expected {
                return Err(TermError::BufferMismatch {
                    expected,
                    actual: buffer.len(),
                });
            }
        }
        if self.molecule_count == 0 {
            return Ok(0.0);
        }

        self.classify(configuration.positions);
        let shell_count = self.arena.shell_by_distance.len();
        if shell_count == 0 {
            return Ok(0.0);
        }

        let mut energy = 0.0;

        // Radial restoring forces follow the ascending-distance ordering.
        for rank in 0..shell_count {
            let molecule = self.arena.shell_by_distance[rank];
            let r = self.arena.radial_distance[molecule];
            let r_eq = self.equilibrium_distance(rank, shell_count);
            let displacement = r - r_eq;
            energy += 0.5 * ALPHA * displacement * displacement;

            if let Some(buffer) = forces.as_deref_mut() {
                let radial_unit = (self.arena.com[molecule] - self.sphere_centre) / r;
                let com_force = -ALPHA * displacement * radial_unit;
                self.spread_mass_weighted(molecule, &com_force, buffer);
            }
        }

        // The orientational restraint follows the angular ordering.
        for rank in 0..shell_count {
            let molecule = self.arena.shell_by_angle[rank];
            let deviation =
                self.arena.cos_polarization[molecule] - Self::equilibrium_cosine(rank, shell_count);
            energy += 0.5 * POLARIZATION_CONSTANT * deviation * deviation;

            if let Some(buffer) = forces.as_deref_mut() {
                self.apply_polarization_force(molecule, deviation, buffer);
            }
        }

        if let (Some(buffer), Some(velocities)) = (forces.as_deref_mut(), configuration.velocities)
        {
            self.apply_friction(velocities, buffer);
        }

        if !energy.is_finite() {
            // Known non-fatal diagnostic: execution continues with the value.
            warn!(energy, "Non-finite boundary energy");
        }
        Ok(energy)
    }

    /// Computes per-molecule centres of mass, radial distances, dipoles and
    /// polarization cosines, then collects and sorts the surface shell.
    fn classify(&mut self, positions: &[Point3<f64>]) {
        let per = self.atoms_per_molecule;
        let inner = self.sphere_radius - self.boundary_depth;

        self.arena.shell_by_distance.clear();
        for molecule in 0..self.molecule_count {
            let range = molecule * per..(molecule + 1) * per;
            let atoms = &positions[range];

            let weighted: Vector3<f64> = atoms
                .iter()
                .zip(&self.atom_masses)
                .map(|(p, &m)| p.coords * m)
                .sum();
            let com = Point3::from(weighted / self.molecule_mass);
            let radial = com - self.sphere_centre;
            let r = radial.norm();
            let dipole = dipole_moment(atoms, &self.atom_charges, &com);

            self.arena.com[molecule] = com;
            self.arena.radial_distance[molecule] = r;
            self.arena.dipole[molecule] = dipole;
            self.arena.cos_polarization[molecule] =
                if r > f64::EPSILON && dipole.norm() > f64::EPSILON {
                    clamp_cosine(dipole.dot(&radial) / (dipole.norm() * r))
                } else {
                    1.0
                };

            if r >= inner {
                self.arena.shell_by_distance.push(molecule);
            }
        }

        let distances = &self.arena.radial_distance;
        self.arena.shell_by_distance.sort_unstable_by(|&a, &b| {
            distances[a]
                .partial_cmp(&distances[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        self.arena.shell_by_angle.clear();
        self.arena
            .shell_by_angle
            .extend_from_slice(&self.arena.shell_by_distance);
        let cosines = &self.arena.cos_polarization;
        self.arena.shell_by_angle.sort_unstable_by(|&a, &b| {
            cosines[b]
                .partial_cmp(&cosines[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Distributes a centre-of-mass force over the molecule's atoms in
    /// proportion to their masses.
    fn spread_mass_weighted(
        &self,
        molecule: usize,
        com_force: &Vector3<f64>,
        buffer: &mut ForceBuffer,
    ) {
        if !com_force.norm().is_finite() {
            warn!(molecule, "Non-finite radial boundary force");
        }
        let base = molecule * self.atoms_per_molecule;
        for (atom, &mass) in self.atom_masses.iter().enumerate() {
            buffer.add(base + atom, com_force * (mass / self.molecule_mass));
        }
    }

    /// Applies the orientational restraint through the gradient of the
    /// polarization cosine with respect to the dipole vector. The template
    /// is neutral, so the dipole's derivative with respect to atom `i` is
    /// just its partial charge.
    fn apply_polarization_force(
        &self,
        molecule: usize,
        deviation: f64,
        buffer: &mut ForceBuffer,
    ) {
        let dipole = self.arena.dipole[molecule];
        let dipole_norm = dipole.norm();
        let r = self.arena.radial_distance[molecule];
        if dipole_norm <= f64::EPSILON || r <= f64::EPSILON {
            return;
        }
        let radial_unit = (self.arena.com[molecule] - self.sphere_centre) / r;
        let dipole_unit = dipole / dipole_norm;
        let cosine = self.arena.cos_polarization[molecule];
        let gradient = (radial_unit - dipole_unit * cosine) / dipole_norm;

        let base = molecule * self.atoms_per_molecule;
        for (atom, &charge) in self.atom_charges.iter().enumerate() {
            let force = -POLARIZATION_CONSTANT * deviation * charge * gradient;
            if !force.norm().is_finite() {
                warn!(molecule, atom, "Non-finite polarization force");
            }
            buffer.add(base + atom, force);
        }
    }

    /// Langevin friction plus matching stochastic kicks on every shell
    /// atom, holding the shell at the target temperature.
    fn apply_friction(&mut self, velocities: &[Vector3<f64>], buffer: &mut ForceBuffer) {
        if self.friction <= 0.0 || self.kbt <= 0.0 {
            return;
        }
        for rank in 0..self.arena.shell_by_distance.len() {
            let molecule = self.arena.shell_by_distance[rank];
            let base = molecule * self.atoms_per_molecule;
            for (atom, &mass) in self.atom_masses.iter().enumerate() {
                let index = base + atom;
                let sigma = (2.0 * self.friction * mass * self.kbt / self.time_step).sqrt();
                let mut force = -self.friction * mass * velocities[index];
                if let Ok(normal) = Normal::new(0.0, sigma) {
                    force += Vector3::new(
                        normal.sample(&mut self.rng),
                        normal.sample(&mut self.rng),
                        normal.sample(&mut self.rng),
                    );
                }
                buffer.add(index, force);
            }
        }
    }
}

impl ForceFieldTerm for ScaasBoundary {
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

/// Builder for [`ScaasBoundary`].
///
/// Defaults: boundary depth 1.5, target temperature 300 K, friction
/// coefficient 0.2 per time unit, time step 1.0, kick seed 0, no
/// registered solutes.
#[derive(Debug)]
pub struct ScaasBoundaryBuilder {
    boundary_depth: f64,
    target_temperature: f64,
    friction: f64,
    time_step: f64,
    seed: u64,
    contained_systems: Vec<Structure>,
}

impl Default for ScaasBoundaryBuilder {
    fn default() -> Self {
        Self {
            boundary_depth: 1.5,
            target_temperature: 300.0,
            friction: 0.2,
            time_step: 1.0,
            seed: 0,
            contained_systems: Vec::new(),
        }
    }
}

impl ScaasBoundaryBuilder {
    /// Depth of the surface shell measured inward from the sphere surface.
    /// Non-positive values fall back to 1.0 at build time.
    pub fn boundary_depth(mut self, depth: f64) -> Self {
        self.boundary_depth = depth;
        self
    }

    /// Target shell temperature in Kelvin. Negative values clamp to 0.
    pub fn target_temperature(mut self, temperature: f64) -> Self {
        self.target_temperature = temperature;
        self
    }

    pub fn friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn time_step(mut self, time_step: f64) -> Self {
        self.time_step = time_step;
        self
    }

    /// Seed for the stochastic kick stream.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// The solute systems whose net charge the boundary compensates for.
    /// This list is intentionally explicit rather than copied from the
    /// container: charge compensation is only physical for solutes near the
    /// sphere centre, and the caller decides which qualify.
    pub fn contained_systems(mut self, systems: Vec<Structure>) -> Self {
        self.contained_systems = systems;
        self
    }

    #[instrument(skip_all)]
    pub fn build(self, container: &SolventContainer) -> Result<ScaasBoundary, BoundaryError> {
        let sphere = container
            .cavity()
            .as_sphere()
            .ok_or_else(|| BoundaryError::NonSphericalCavity(container.cavity().shape_name()))?;

        let template = container.template();
        let atom_masses: Vec<f64> = template.atoms().iter().map(|a| a.mass).collect();
        let atom_charges: Vec<f64> = template.atoms().iter().map(|a| a.partial_charge).collect();
        let solute_charge = self
            .contained_systems
            .iter()
            .map(Structure::net_charge)
            .sum();

        let mut boundary = ScaasBoundary {
            boundary_depth: 1.5,
            target_temperature: 0.0,
            kbt: 0.0,
            friction: self.friction.max(0.0),
            time_step: if self.time_step > 0.0 { self.time_step } else { 1.0 },
            sphere_radius: sphere.radius(),
            sphere_centre: container.cavity().centre(),
            atoms_per_molecule: template.atom_count(),
            molecule_mass: template.total_mass(),
            atom_masses,
            atom_charges,
            molecule_count: 0,
            occlusion_fraction: 0.0,
            solute_charge,
            contained: self.contained_systems,
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            arena: ShellArena::default(),
        };
        boundary.set_boundary_depth(self.boundary_depth);
        boundary.set_target_temperature(self.target_temperature);
        boundary.refresh(container);
        Ok(boundary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::cavity::{Cavity, Cuboid, Sphere};
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

    fn spherical_container() -> SolventContainer {
        SolventContainer::builder()
            .template(water_template())
            .cavity(Cavity::Sphere(Sphere::new(10.0).unwrap()))
            .density(0.002)
            .seed(3)
            .build()
            .unwrap()
    }

    /// Rigid template copies at chosen centre-of-mass radii along x.
    fn configuration_at_radii(container: &SolventContainer, radii: &[f64]) -> Vec<Point3<f64>> {
        assert_eq!(radii.len(), container.molecule_count());
        let template = container.template();
        let com = template.centre_of_mass();
        radii
            .iter()
            .flat_map(|&r| {
                template
                    .positions()
                    .iter()
                    .map(move |p| Point3::new(r, 0.0, 0.0) + (p - com))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn molecule_force_norm(buffer: &ForceBuffer, container: &SolventContainer, index: usize) -> f64 {
        buffer.as_slice()[container.molecule_range(index)]
            .iter()
            .map(|f| f.norm())
            .sum()
    }

    #[test]
    fn build_rejects_non_spherical_cavities() {
        let container = SolventContainer::builder()
            .template(water_template())
            .cavity(Cavity::Cuboid(Cuboid::new([10.0, 10.0, 10.0]).unwrap()))
            .density(0.002)
            .seed(3)
            .build()
            .unwrap();
        assert!(matches!(
            ScaasBoundary::builder().build(&container),
            Err(BoundaryError::NonSphericalCavity("cuboid"))
        ));
    }

    #[test]
    fn builder_applies_parameter_fallbacks() {
        let container = spherical_container();
        let boundary = ScaasBoundary::builder()
            .boundary_depth(-2.0)
            .target_temperature(-50.0)
            .build(&container)
            .unwrap();
        assert_eq!(boundary.boundary_depth(), 1.0);
        assert_eq!(boundary.target_temperature(), 0.0);
    }

    #[test]
    fn bulk_molecules_receive_no_boundary_force() {
        let container = spherical_container();
        let mut boundary = ScaasBoundary::builder().build(&container).unwrap();

        // Everyone bulk except the last molecule, which sits in the shell.
        let mut radii = vec![2.0, 3.0, 4.0, 5.0, 5.5, 6.0, 9.0];
        radii.truncate(container.molecule_count());
        let positions = configuration_at_radii(&container, &radii);
        let mut forces = ForceBuffer::zeroed(positions.len());
        let energy = boundary
            .accumulate_forces(&Configuration::positions_only(&positions), &mut forces)
            .unwrap();

        assert!(energy > 0.0);
        for (index, &r) in radii.iter().enumerate() {
            let norm = molecule_force_norm(&forces, &container, index);
            if r < 10.0 - boundary.boundary_depth() {
                assert_eq!(norm, 0.0, "bulk molecule {index} at r={r} got a force");
            } else {
                assert!(norm > 0.0, "shell molecule {index} at r={r} got no force");
            }
        }
    }

    #[test]
    fn molecule_just_inside_the_shell_boundary_is_bulk() {
        let container = spherical_container();
        let mut boundary = ScaasBoundary::builder().boundary_depth(1.5).build(&container).unwrap();

        // R - depth - epsilon: everyone bulk.
        let radii = vec![8.49; container.molecule_count()];
        let positions = configuration_at_radii(&container, &radii);
        let energy = boundary
            .energy(&Configuration::positions_only(&positions))
            .unwrap();
        assert_eq!(energy, 0.0);

        // R - epsilon: inside the shell.
        let mut all_bulk = vec![5.0; container.molecule_count()];
        all_bulk[0] = 9.99;
        let positions = configuration_at_radii(&container, &all_bulk);
        let mut forces = ForceBuffer::zeroed(positions.len());
        let energy = boundary
            .accumulate_forces(&Configuration::positions_only(&positions), &mut forces)
            .unwrap();
        assert!(energy > 0.0);
        assert!(molecule_force_norm(&forces, &container, 0) > 0.0);
    }

    #[test]
    fn all_bulk_configuration_has_zero_energy() {
        let container = spherical_container();
        let mut boundary = ScaasBoundary::builder().build(&container).unwrap();
        let radii = vec![3.0; container.molecule_count()];
        let positions = configuration_at_radii(&container, &radii);
        let energy = boundary
            .energy(&Configuration::positions_only(&positions))
            .unwrap();
        assert_eq!(energy, 0.0);
    }

    #[test]
    fn charged_solutes_shift_the_radial_equilibrium() {
        let container = spherical_container();
        let mut neutral = ScaasBoundary::builder().build(&container).unwrap();

        let ion = Structure::new(
            "sodium",
            vec![AtomRecord::new("NA", 22.99, 1.0).with_lennard_jones(1.2, 0.1)],
            vec![Point3::origin()],
        )
        .unwrap();
        let mut charged = ScaasBoundary::builder()
            .contained_systems(vec![ion])
            .build(&container)
            .unwrap();

        let mut radii = vec![3.0; container.molecule_count()];
        radii[0] = 9.5;
        let positions = configuration_at_radii(&container, &radii);
        let conf = Configuration::positions_only(&positions);
        let e_neutral = neutral.energy(&conf).unwrap();
        let e_charged = charged.energy(&conf).unwrap();
        assert!((e_neutral - e_charged).abs() > 1e-12);
    }

    #[test]
    fn set_contained_systems_updates_the_compensated_charge() {
        let container = spherical_container();
        let mut boundary = ScaasBoundary::builder().build(&container).unwrap();
        assert!(boundary.contained_systems().is_empty());

        let ion = Structure::new(
            "chloride",
            vec![AtomRecord::new("CL", 35.45, -1.0).with_lennard_jones(1.8, 0.1)],
            vec![Point3::origin()],
        )
        .unwrap();
        boundary.set_contained_systems(vec![ion]);
        assert_eq!(boundary.contained_systems().len(), 1);
        assert_eq!(boundary.solute_charge, -1.0);
    }

    #[test]
    fn friction_applies_only_with_velocities_and_is_deterministic() {
        let container = spherical_container();
        let radii: Vec<f64> = (0..container.molecule_count())
            .map(|i| if i == 0 { 9.5 } else { 3.0 })
            .collect();
        let positions = configuration_at_radii(&container, &radii);
        let velocities = vec![Vector3::new(0.1, 0.0, 0.0); positions.len()];

        let run = |seed: u64| {
            let mut boundary = ScaasBoundary::builder().seed(seed).build(&container).unwrap();
            let mut forces = ForceBuffer::zeroed(positions.len());
            boundary
                .accumulate_forces(
                    &Configuration::with_velocities(&positions, &velocities),
                    &mut forces,
                )
                .unwrap();
            forces
        };
        assert_eq!(run(11), run(11));

        let mut boundary = ScaasBoundary::builder().seed(11).build(&container).unwrap();
        let mut without_velocities = ForceBuffer::zeroed(positions.len());
        boundary
            .accumulate_forces(
                &Configuration::positions_only(&positions),
                &mut without_velocities,
            )
            .unwrap();
        assert_ne!(run(11), without_velocities);
    }

    #[test]
    fn stale_boundary_detects_container_changes() {
        let mut container = spherical_container();
        let mut boundary = ScaasBoundary::builder().build(&container).unwrap();

        let probe = Structure::new(
            "probe",
            vec![AtomRecord::new("X", 40.0, 0.0).with_lennard_jones(6.0, 0.3)],
            vec![Point3::origin()],
        )
        .unwrap();
        let removed = container.insert_system(&probe).unwrap();
        assert!(removed > 0);

        // Without a refresh the molecule count is stale and evaluation
        // rejects the new configuration.
        let conf_positions = container.positions().to_vec();
        assert!(matches!(
            boundary.energy(&Configuration::positions_only(&conf_positions)),
            Err(TermError::ConfigurationMismatch { .. })
        ));

        boundary.refresh(&container);
        assert!(
            boundary
                .energy(&Configuration::positions_only(&conf_positions))
                .is_ok()
        );
    }

    #[test]
    fn occlusion_raises_shell_energy_for_outlying_molecules() {
        // Occlusion shrinks the available shell volume, pulling equilibrium
        // distances inward; a molecule parked at the surface is then further
        // from equilibrium.
        let mut container = spherical_container();
        let mut before = ScaasBoundary::builder().build(&container).unwrap();
        let radii: Vec<f64> = (0..container.molecule_count())
            .map(|i| if i == 0 { 9.9 } else { 3.0 })
            .collect();
        let positions = configuration_at_radii(&container, &radii);
        let e_before = before
            .energy(&Configuration::positions_only(&positions))
            .unwrap();

        let probe = Structure::new(
            "probe",
            vec![AtomRecord::new("X", 40.0, 0.0).with_lennard_jones(6.0, 0.3)],
            vec![Point3::origin()],
        )
        .unwrap();
        container.insert_system(&probe).unwrap();
        let mut after = ScaasBoundary::builder().build(&container).unwrap();

        let radii_after: Vec<f64> = (0..container.molecule_count())
            .map(|i| if i == 0 { 9.9 } else { 3.0 })
            .collect();
        let positions_after = configuration_at_radii(&container, &radii_after);
        let e_after = after
            .energy(&Configuration::positions_only(&positions_after))
            .unwrap();
        assert!(e_after > e_before);
    }
}
