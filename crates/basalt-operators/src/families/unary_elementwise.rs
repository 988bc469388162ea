//! Unary elementwise kernel family.
//!
//! Covers: ReLU, Sigmoid, Tanh, GELU, Abs, Square, Sqrt, Clamp

use crate::kernel::{HostTensor, Kernel, expect_inputs};
use crate::Result;
use basalt_core::Op;

/// Unary elementwise kernel family.
///
/// All members preserve the input shape and apply one scalar function per
/// element; they differ only in that function.
pub struct UnaryElementwiseKernel {
    name: &'static str,
    apply_fn: fn(f32) -> f32,
}

impl UnaryElementwiseKernel {
    /// Create a ReLU kernel (Y = max(X, 0)).
    pub fn relu() -> Self {
        Self {
            name: "ReLU",
            apply_fn: |x| x.max(0.0),
        }
    }

    /// Create a Sigmoid kernel (Y = 1 / (1 + exp(-X))).
    pub fn sigmoid() -> Self {
        Self {
            name: "Sigmoid",
            apply_fn: |x| 1.0 / (1.0 + (-x).exp()),
        }
    }

    /// Create a Tanh kernel.
    pub fn tanh() -> Self {
        Self {
            name: "Tanh",
            apply_fn: f32::tanh,
        }
    }

    /// Create a GELU kernel (tanh approximation).
    pub fn gelu() -> Self {
        Self {
            name: "GELU",
            apply_fn: gelu_tanh,
        }
    }

    /// Create an Abs kernel.
    pub fn abs() -> Self {
        Self {
            name: "Abs",
            apply_fn: f32::abs,
        }
    }

    /// Create a Square kernel (Y = X * X).
    pub fn square() -> Self {
        Self {
            name: "Square",
            apply_fn: |x| x * x,
        }
    }

    /// Create a Sqrt kernel.
    pub fn sqrt() -> Self {
        Self {
            name: "Sqrt",
            apply_fn: f32::sqrt,
        }
    }
}

impl Kernel for UnaryElementwiseKernel {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, op: &Op, inputs: &[&HostTensor]) -> Result<Vec<HostTensor>> {
        expect_inputs(op, inputs, 1)?;
        let input = inputs[0];
        let data = input.data.iter().map(|&x| (self.apply_fn)(x)).collect();
        Ok(vec![HostTensor {
            shape: input.shape.clone(),
            data,
        }])
    }
}

/// Clamp kernel: Y = min(max(X, min), max), bounds from the `min` and `max`
/// attributes.
pub struct ClampKernel;

impl Kernel for ClampKernel {
    fn name(&self) -> &str {
        "Clamp"
    }

    fn run(&self, op: &Op, inputs: &[&HostTensor]) -> Result<Vec<HostTensor>> {
        expect_inputs(op, inputs, 1)?;
        let min = op.attr_f32("min")?;
        let max = op.attr_f32("max")?;
        let input = inputs[0];
        let data = input.data.iter().map(|&x| x.max(min).min(max)).collect();
        Ok(vec![HostTensor {
            shape: input.shape.clone(),
            data,
        }])
    }
}

fn gelu_tanh(x: f32) -> f32 {
    const SQRT_2_OVER_PI: f32 = 0.797_884_6;
    0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + 0.044_715 * x * x * x)).tanh())
}
