//! Error taxonomy for circuit loading, phase-space algebra and optimisation.
//!
//! Structural errors abort the call. Numerical errors (`SingularKernel`,
//! `NonFinite`) are retried by the optimizer with a fresh starting point and
//! only escalate as `RestartBudgetExhausted`. `ImaginaryResidue` and
//! `MarginalDrift` point at a bug in the algebra and are never clamped away.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuasiError {
    #[error("qudit dimension {0} is not supported (expected 2 or 3)")]
    UnsupportedDimension(usize),

    #[error("unknown {kind} label '{label}' for dimension {dim}")]
    UnknownLabel {
        kind: &'static str,
        label: String,
        dim: usize,
    },

    #[error("gate {gate} targets wire {wire}, but the circuit has {wires} wires")]
    WireOutOfRange {
        gate: usize,
        wire: usize,
        wires: usize,
    },

    #[error("gate {gate} targets wire {wire} more than once")]
    DuplicateWire { gate: usize, wire: usize },

    #[error("gate {gate} acts on {width} wires; only 1, 2 or 3 are supported")]
    GateTooWide { gate: usize, width: usize },

    #[error("{what}: expected {expected}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{what} {index} has dimension {got}, expected {expected}")]
    OperatorShape {
        what: &'static str,
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("block size {0} is not supported (expected 2 or 3)")]
    UnsupportedBlockSize(usize),

    #[error("cannot compress a {wires}-wire circuit into {block}-wire blocks")]
    BlockTooNarrow { wires: usize, block: usize },

    #[error("gate {gate} acts on {width} wires, wider than the {block}-wire block size")]
    GateWiderThanBlock {
        gate: usize,
        width: usize,
        block: usize,
    },

    #[error("quasi-probabilities are implemented for 1, 2 or 3 wires, got {0}")]
    UnsupportedArity(usize),

    #[error("unknown optimisation method '{0}'")]
    UnknownMethod(String),

    #[error("parameter vector has length {got}, the circuit needs {expected}")]
    ParameterLength { expected: usize, got: usize },

    #[error("traversal order {0:?} is not a permutation of the circuit's gates")]
    InvalidOrder(Vec<usize>),

    #[error("kernel is singular: tr[D Gamma] vanishes at phase-space point {point}")]
    SingularKernel { point: usize },

    #[error("non-finite {0} encountered")]
    NonFinite(&'static str),

    #[error("optimisation failed: none of {attempts} restarts produced a finite result")]
    RestartBudgetExhausted { attempts: usize },

    #[error("quasi-probability has imaginary residue {residue:.3e} (algebra bug)")]
    ImaginaryResidue { residue: f64 },

    #[error("{element}: marginal sums drift by {drift:.3e} from the expected trace (algebra bug)")]
    MarginalDrift { element: String, drift: f64 },
}

impl QuasiError {
    /// Numerical failures the optimizer may recover from by restarting.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QuasiError::SingularKernel { .. } | QuasiError::NonFinite(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, QuasiError>;
