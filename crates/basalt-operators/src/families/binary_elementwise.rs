//! Binary elementwise kernel family.
//!
//! Covers: Add, Subtract, Multiply, Divide, Maximum, Minimum, BiasAdd

use crate::broadcast::{broadcast_shape, source_index};
use crate::kernel::{HostTensor, Kernel, expect_inputs};
use crate::{Error, Result};
use basalt_core::Op;

/// Binary elementwise kernel family.
///
/// All members broadcast their two inputs NumPy-style and apply one scalar
/// function per output element; they differ only in that function.
pub struct BinaryElementwiseKernel {
    name: &'static str,
    apply_fn: fn(f32, f32) -> f32,
}

impl BinaryElementwiseKernel {
    /// Create an Add kernel.
    pub fn add() -> Self {
        Self {
            name: "Add",
            apply_fn: |a, b| a + b,
        }
    }

    /// Create a Subtract kernel.
    pub fn sub() -> Self {
        Self {
            name: "Subtract",
            apply_fn: |a, b| a - b,
        }
    }

    /// Create a Multiply kernel.
    pub fn mul() -> Self {
        Self {
            name: "Multiply",
            apply_fn: |a, b| a * b,
        }
    }

    /// Create a Divide kernel.
    pub fn div() -> Self {
        Self {
            name: "Divide",
            apply_fn: |a, b| a / b,
        }
    }

    /// Create a Maximum kernel.
    pub fn max() -> Self {
        Self {
            name: "Maximum",
            apply_fn: f32::max,
        }
    }

    /// Create a Minimum kernel.
    pub fn min() -> Self {
        Self {
            name: "Minimum",
            apply_fn: f32::min,
        }
    }
}

impl Kernel for BinaryElementwiseKernel {
    fn name(&self) -> &str {
        self.name
    }

    fn run(&self, op: &Op, inputs: &[&HostTensor]) -> Result<Vec<HostTensor>> {
        expect_inputs(op, inputs, 2)?;
        Ok(vec![broadcast_apply(inputs[0], inputs[1], self.apply_fn)?])
    }
}

/// BiasAdd kernel: adds a 1-D bias along the channel axis.
///
/// The channel axis is 1 for `data_format = "NCX"` (the default) and the
/// last axis for `"NXC"`.
pub struct BiasAddKernel;

impl Kernel for BiasAddKernel {
    fn name(&self) -> &str {
        "BiasAdd"
    }

    fn run(&self, op: &Op, inputs: &[&HostTensor]) -> Result<Vec<HostTensor>> {
        expect_inputs(op, inputs, 2)?;
        let (input, bias) = (inputs[0], inputs[1]);
        if bias.shape.len() != 1 {
            return Err(Error::Shape(format!(
                "BiasAdd bias must be 1-D, got {:?}",
                bias.shape
            )));
        }

        let channels_last = op
            .attr_string("data_format")
            .is_ok_and(|format| format == "NXC");
        let rank = input.shape.len();
        let axis = if channels_last {
            rank.saturating_sub(1)
        } else {
            1.min(rank.saturating_sub(1))
        };

        // Reshape bias to [1, .., C, .., 1] so plain broadcasting applies
        let mut bias_shape = vec![1; rank];
        if let Some(dim) = bias_shape.get_mut(axis) {
            *dim = bias.shape[0];
        }
        let bias = HostTensor::new(bias_shape, bias.data.clone())?;
        Ok(vec![broadcast_apply(input, &bias, |a, b| a + b)?])
    }
}

fn broadcast_apply(
    a: &HostTensor,
    b: &HostTensor,
    apply: fn(f32, f32) -> f32,
) -> Result<HostTensor> {
    let shape = broadcast_shape(&a.shape, &b.shape)?;
    let count: usize = shape.iter().product();

    let data = if a.shape == b.shape {
        a.data.iter().zip(&b.data).map(|(&x, &y)| apply(x, y)).collect()
    } else {
        (0..count)
            .map(|i| {
                let x = a.data[source_index(i, &shape, &a.shape)];
                let y = b.data[source_index(i, &shape, &b.shape)];
                apply(x, y)
            })
            .collect()
    };

    Ok(HostTensor { shape, data })
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_core::{DataType, LogicalTensor, OpKind};

    fn op(kind: OpKind) -> Op {
        Op::new(1, kind)
            .with_input(LogicalTensor::new(0, DataType::F32, [2, 3]))
            .with_input(LogicalTensor::new(1, DataType::F32, [3]))
            .with_output(LogicalTensor::new(2, DataType::F32, [2, 3]))
    }

    #[test]
    fn test_add_broadcasts_row() {
        let a = HostTensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let b = HostTensor::new(vec![3], vec![10.0, 20.0, 30.0]).unwrap();
        let out = BinaryElementwiseKernel::add()
            .run(&op(OpKind::Add), &[&a, &b])
            .unwrap();
        assert_eq!(out[0].shape, vec![2, 3]);
        assert_eq!(out[0].data, vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0]);
    }

    #[test]
    fn test_minimum_same_shape() {
        let a = HostTensor::new(vec![3], vec![1.0, 5.0, -1.0]).unwrap();
        let b = HostTensor::new(vec![3], vec![2.0, 4.0, -3.0]).unwrap();
        let out = BinaryElementwiseKernel::min()
            .run(&op(OpKind::Minimum), &[&a, &b])
            .unwrap();
        assert_eq!(out[0].data, vec![1.0, 4.0, -3.0]);
    }

    #[test]
    fn test_incompatible_shapes() {
        let a = HostTensor::new(vec![2], vec![1.0, 2.0]).unwrap();
        let b = HostTensor::new(vec![3], vec![1.0, 2.0, 3.0]).unwrap();
        assert!(matches!(
            BinaryElementwiseKernel::sub().run(&op(OpKind::Subtract), &[&a, &b]),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn test_bias_add_channel_axis() {
        // [N=1, C=2, X=2]
        let input = HostTensor::new(vec![1, 2, 2], vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        let bias = HostTensor::new(vec![2], vec![10.0, 20.0]).unwrap();

        let ncx = BiasAddKernel.run(&op(OpKind::BiasAdd), &[&input, &bias]).unwrap();
        assert_eq!(ncx[0].data, vec![11.0, 11.0, 21.0, 21.0]);

        let nxc_op = op(OpKind::BiasAdd).with_attr("data_format", "NXC");
        let nxc = BiasAddKernel.run(&nxc_op, &[&input, &bias]).unwrap();
        assert_eq!(nxc[0].data, vec![11.0, 21.0, 11.0, 21.0]);
    }
}
