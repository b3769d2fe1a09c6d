//! Quasi-probability representations of qudit circuits: operator registry,
//! circuits and their compression, phase-space algebra, negativity
//! optimisation and an exact oracle for small circuits.

pub mod circuit;
pub mod compress;
pub mod error;
pub mod gates;
pub mod generator;
pub mod negativity;
pub mod operators;
pub mod optimize;
pub mod oracle;
pub mod phase_space;

pub use circuit::{Circuit, Gate};
pub use error::{QuasiError, Result};
pub use negativity::{Element, NegativityModel, ParamLayout};
pub use optimize::{
    optimize_global, optimize_local, wigner_result, InitialPoint, LocalConfig, LocalOrder,
    OptimizationMethod, OptimizeConfig, OptimizeResult,
};
pub use oracle::exact_probability;
pub use phase_space::PhaseSpace;
