//! # Engine Module
//!
//! Stateful subsystem objects built on the [`crate::core`] foundations.
//!
//! ## Overview
//!
//! The engine populates cavity volumes with solvent and maintains that
//! population under solute insertion and removal, then applies the
//! artificial forces that approximate the truncated bulk:
//!
//! - **Solvent Containers** ([`container`]) - template replication across a
//!   lattice to a target density, with deterministic seeded orientations and
//!   occlusion bookkeeping
//! - **Boundary Enforcement** ([`boundary`]) - SCAAS-style radial,
//!   orientational and frictional forces on the outer solvent shell of a
//!   spherical container
//! - **Restraints** ([`restraint`]) - harmonic pinning of selected elements
//!   to snapshot positions
//! - **Error Handling** ([`error`]) - engine-specific error types
//!
//! Containers and boundary terms do not observe each other. After any
//! insertion or removal the owner must call
//! [`boundary::ScaasBoundary::refresh`] before the next evaluation.

pub mod boundary;
pub mod container;
pub mod error;
pub mod restraint;
