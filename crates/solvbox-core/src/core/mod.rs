//! # Core Module
//!
//! Stateless foundations of the solvent subsystem.
//!
//! ## Overview
//!
//! Everything here is a pure function of its inputs: molecular fragments and
//! their property tables, analytic cavity volumes, the lattices spanned
//! inside them, and the trait seam through which force-field terms report
//! energies and forces. Stateful orchestration (containers, boundary
//! enforcement, restraints) lives in [`crate::engine`].
//!
//! ## Key Components
//!
//! - **Molecular Representation** ([`models`]) - atom property records and
//!   immutable structure sources
//! - **Spatial Geometry** ([`geometry`]) - cavity shapes and spatial grids
//! - **Force-Field Seam** ([`forcefield`]) - the term trait and the shared
//!   force accumulation buffer
//! - **Utilities** ([`utils`]) - rotation, centre-of-mass and dipole helpers

pub mod forcefield;
pub mod geometry;
pub mod models;
pub mod utils;
