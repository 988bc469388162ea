//! Kernel families that share one structure across several op kinds.

mod binary_elementwise;
mod unary_elementwise;

pub use binary_elementwise::{BiasAddKernel, BinaryElementwiseKernel};
pub use unary_elementwise::{ClampKernel, UnaryElementwiseKernel};
