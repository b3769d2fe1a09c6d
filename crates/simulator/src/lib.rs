//! Sampling layer: per-element draw tables, the Monte Carlo estimator, rayon
//! batching and the `QdCircuit` convenience wrapper.

pub mod batch;
pub mod output;
mod qd_circuit;
pub mod sampler;

pub use batch::sample_batched;
pub use qd_circuit::{QdCircuit, Representation};
pub use sampler::{Estimator, ParameterSource, SampleReport, Sampler};
