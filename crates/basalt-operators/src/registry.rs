//! Kernel registry.

use crate::families::{BiasAddKernel, BinaryElementwiseKernel, ClampKernel, UnaryElementwiseKernel};
use crate::kernel::Kernel;
use crate::operators::{MatMulKernel, ReorderKernel, SoftMaxKernel, StaticReshapeKernel};
use basalt_core::OpKind;
use std::collections::HashMap;

/// Registry for kernel implementations.
///
/// Maps op kinds to the `Kernel` that runs them on the host.
///
/// # Example
///
/// ```ignore
/// let mut registry = KernelRegistry::new();
/// registry
///     .register(OpKind::Add, BinaryElementwiseKernel::add())
///     .register(OpKind::ReLU, UnaryElementwiseKernel::relu());
///
/// let kernel = registry.get(OpKind::Add).unwrap();
/// ```
#[derive(Default)]
pub struct KernelRegistry {
    kernels: HashMap<OpKind, Box<dyn Kernel>>,
}

impl KernelRegistry {
    /// Create a new empty kernel registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kernel, replacing any previous one for the same kind.
    ///
    /// Returns `self` for method chaining.
    pub fn register<K>(&mut self, kind: OpKind, kernel: K) -> &mut Self
    where
        K: Kernel + 'static,
    {
        self.kernels.insert(kind, Box::new(kernel));
        self
    }

    /// Look up the kernel for an op kind.
    pub fn get(&self, kind: OpKind) -> Option<&dyn Kernel> {
        self.kernels.get(&kind).map(|k| k.as_ref())
    }

    /// Check if a kernel is registered for an op kind.
    pub fn contains(&self, kind: OpKind) -> bool {
        self.kernels.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<OpKind> {
        let mut kinds: Vec<OpKind> = self.kernels.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

/// Returns a kernel registry pre-populated with every host kernel.
///
/// The registry includes:
/// - 7 unary elementwise kernels plus Clamp
/// - 6 binary elementwise kernels plus BiasAdd
/// - MatMul and SoftMax
/// - Reorder and StaticReshape
///
/// Convolution, BatchNorm, Wildcard and End have no host kernel; partitions
/// containing them are reported as unsupported.
pub fn core_kernel_registry() -> KernelRegistry {
    let mut registry = KernelRegistry::new();

    // Unary elementwise kernels
    registry
        .register(OpKind::ReLU, UnaryElementwiseKernel::relu())
        .register(OpKind::Sigmoid, UnaryElementwiseKernel::sigmoid())
        .register(OpKind::Tanh, UnaryElementwiseKernel::tanh())
        .register(OpKind::GELU, UnaryElementwiseKernel::gelu())
        .register(OpKind::Abs, UnaryElementwiseKernel::abs())
        .register(OpKind::Square, UnaryElementwiseKernel::square())
        .register(OpKind::Sqrt, UnaryElementwiseKernel::sqrt())
        .register(OpKind::Clamp, ClampKernel);

    // Binary elementwise kernels
    registry
        .register(OpKind::Add, BinaryElementwiseKernel::add())
        .register(OpKind::Subtract, BinaryElementwiseKernel::sub())
        .register(OpKind::Multiply, BinaryElementwiseKernel::mul())
        .register(OpKind::Divide, BinaryElementwiseKernel::div())
        .register(OpKind::Maximum, BinaryElementwiseKernel::max())
        .register(OpKind::Minimum, BinaryElementwiseKernel::min())
        .register(OpKind::BiasAdd, BiasAddKernel);

    // Matrix and normalization kernels
    registry
        .register(OpKind::MatMul, MatMulKernel)
        .register(OpKind::SoftMax, SoftMaxKernel);

    // Data movement kernels
    registry
        .register(OpKind::Reorder, ReorderKernel)
        .register(OpKind::StaticReshape, StaticReshapeKernel);

    registry
}
