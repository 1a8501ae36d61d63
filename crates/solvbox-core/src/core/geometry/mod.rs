//! # Geometry Module
//!
//! Cavity volumes and the lattices built inside them.
//!
//! - [`cavity`] - the fixed set of cavity shapes (cuboid, sphere,
//!   ellipsoid) with analytic volume, containment and extremes
//! - [`grid`] - regular 3-D lattices bounded by a cavity, with stable
//!   point ordering and nearest-point queries

pub mod cavity;
pub mod grid;
