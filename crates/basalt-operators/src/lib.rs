//! Reference CPU backend for Basalt.
//!
//! This crate provides a small, unoptimized backend so the whole
//! partition → compile → execute lifecycle can run on the host. Kernels are
//! grouped into families to avoid duplication.
//!
//! # Kernel Families
//!
//! - **Unary elementwise**: ReLU, Sigmoid, Tanh, GELU, Abs, Square, Sqrt, Clamp
//! - **Binary elementwise**: Add, Subtract, Multiply, Divide, Maximum, Minimum,
//!   BiasAdd (NumPy broadcasting)
//!
//! # Individual Kernels
//!
//! - Matrix operations (MatMul)
//! - Normalization (SoftMax)
//! - Data movement (Reorder, StaticReshape)

pub mod backend;
pub mod broadcast;
pub mod families;
pub mod kernel;
pub mod operators;
pub mod rules;

mod registry;

pub use backend::ReferenceBackend;
pub use families::{BiasAddKernel, BinaryElementwiseKernel, ClampKernel, UnaryElementwiseKernel};
pub use kernel::{HostTensor, Kernel};
pub use registry::{KernelRegistry, core_kernel_registry};
pub use rules::FusionRules;

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for kernel operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kernel error: {0}")]
    Kernel(String),

    #[error("Shape error: {0}")]
    Shape(String),

    #[error(transparent)]
    Core(#[from] basalt_core::Error),
}

impl From<Error> for basalt_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Core(inner) => inner,
            other => basalt_core::Error::Backend(other.to_string()),
        }
    }
}
