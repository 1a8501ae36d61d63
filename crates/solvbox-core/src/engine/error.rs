use thiserror::Error;

use crate::core::geometry::grid::GridError;
use crate::core::models::structure::StructureError;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Template structure is invalid: {source}")]
    Template {
        #[from]
        source: StructureError,
    },

    #[error("Solvent density must be positive, got {0}")]
    NonPositiveDensity(f64),

    #[error("Grid construction failed: {source}")]
    Grid {
        #[from]
        source: GridError,
    },

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("Solute '{name}' atom {index} carries no Lennard-Jones parameters")]
    MissingLennardJones { name: String, index: usize },

    #[error("No inserted system named '{0}'")]
    UnknownSystem(String),

    #[error("Configuration has {actual} coordinates but the container holds {expected} atoms")]
    ConfigurationMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("SCAAS boundary requires a spherical cavity, got a {0} cavity")]
    NonSphericalCavity(&'static str),

    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
}

#[derive(Debug, Error)]
pub enum RestraintError {
    #[error("Selection-string matching is not implemented: '{0}'")]
    UnsupportedExpression(String),

    #[error("Selected element index {index} is out of range for {count} elements")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Restraint force constant must be positive, got {0}")]
    NonPositiveForceConstant(f64),
}
