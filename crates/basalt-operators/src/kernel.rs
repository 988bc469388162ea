//! Kernel trait and host-side tensor values.

use crate::{Error, Result};
use basalt_core::Op;

/// A dense row-major `f32` tensor held on the host while a partition runs.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl HostTensor {
    /// Create a tensor, checking that `data` matches `shape`.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::Shape(format!(
                "shape {shape:?} needs {expected} elements, got {}",
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A host implementation of one op kind.
///
/// Kernels receive the op (for attributes and declared output shapes) and
/// its inputs in declaration order, and return its outputs in declaration
/// order.
pub trait Kernel: Send + Sync {
    /// Get the kernel name (e.g., "Add", "ReLU").
    fn name(&self) -> &str;

    /// Compute the op's outputs.
    fn run(&self, op: &Op, inputs: &[&HostTensor]) -> Result<Vec<HostTensor>>;
}

/// Check an op has exactly `expected` inputs.
pub(crate) fn expect_inputs(op: &Op, inputs: &[&HostTensor], expected: usize) -> Result<()> {
    if inputs.len() != expected {
        return Err(Error::Kernel(format!(
            "{} (op {}) expects {expected} inputs, got {}",
            op.kind(),
            op.id(),
            inputs.len()
        )));
    }
    Ok(())
}

/// Read an attribute that has a default.
///
/// Only an absent attribute takes `default`; one of the wrong type is an
/// error.
pub(crate) fn optional_attr<T>(
    op: &Op,
    name: &str,
    default: T,
    read: impl FnOnce(&Op, &str) -> basalt_core::Result<T>,
) -> Result<T> {
    match op.attr(name) {
        None => Ok(default),
        Some(_) => Ok(read(op, name)?),
    }
}

/// Concrete dims of the op's first output, if declared.
pub(crate) fn declared_output_dims(op: &Op) -> Option<Vec<usize>> {
    op.outputs().first().and_then(|t| t.dims())
}
