//! # SolvBox Core Library
//!
//! A library for building and maintaining the explicit-solvent environment of
//! a molecular simulation: bounded cavity volumes, the lattices built inside
//! them, solvent containers that replicate a template fragment across a
//! lattice to a target density, and the surface-constrained (SCAAS-style)
//! boundary forces that stand in for the infinite bulk solvent truncated away
//! at the cavity surface.
//!
//! ## Architectural Philosophy
//!
//! The library is split into two layers:
//!
//! - **[`core`]: The Foundation.** Stateless data models (structures and
//!   per-atom property records), pure geometry (cavity shapes, spatial
//!   grids), and the [`core::forcefield::term::ForceFieldTerm`] seam through
//!   which an external force-field aggregator consumes energies and forces.
//!
//! - **[`engine`]: The Logic Core.** The stateful subsystem objects: the
//!   solvent container with its deterministic placement stream and
//!   insertion/removal bookkeeping, the spherical boundary enforcer, and
//!   harmonic positional restraints.
//!
//! Pairwise energy kernels, file parsing, integrators and thermostats are
//! external collaborators; this crate only decides *where solvent particles
//! are* and *what artificial forces act on the ones at the edge*.

pub mod core;
pub mod engine;
