//! Kernels that don't fit into a family.

mod matmul;
mod reshape;
mod softmax;

pub use matmul::MatMulKernel;
pub use reshape::{ReorderKernel, StaticReshapeKernel};
pub use softmax::SoftMaxKernel;
