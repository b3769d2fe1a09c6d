pub mod matrix;
pub mod tensor;

pub use matrix::{kron_all, CMat, C64, ONE, ZERO};
pub use tensor::QdTensor;
