//! # Force Field Module
//!
//! The seam between this subsystem and the external force-field aggregator.
//!
//! The aggregator calls each registered [`term::ForceFieldTerm`] once per
//! timestep, collecting energies and accumulating forces into a shared
//! [`term::ForceBuffer`]. The pairwise bonded/nonbonded kernels themselves
//! are external collaborators and are not defined here.

pub mod term;
