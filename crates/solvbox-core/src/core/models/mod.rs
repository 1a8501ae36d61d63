//! # Core Models Module
//!
//! Data structures describing the molecular fragments the solvent subsystem
//! works with.
//!
//! - [`atom`] - per-atom property records (mass, charge, Lennard-Jones
//!   parameters)
//! - [`structure`] - named, immutable fragments pairing a property table
//!   with reference coordinates; used as solvent templates, inserted
//!   solutes, and restraint targets

pub mod atom;
pub mod structure;
