//! Data movement kernels: Reorder and StaticReshape.
//!
//! Host tensors are always dense row-major, so both kernels copy the data
//! unchanged and only the reported shape differs.

use crate::kernel::{HostTensor, Kernel, declared_output_dims, expect_inputs};
use crate::{Error, Result};
use basalt_core::Op;

/// Reorder: converts between layouts; on the host this is a plain copy.
pub struct ReorderKernel;

impl Kernel for ReorderKernel {
    fn name(&self) -> &str {
        "Reorder"
    }

    fn run(&self, op: &Op, inputs: &[&HostTensor]) -> Result<Vec<HostTensor>> {
        expect_inputs(op, inputs, 1)?;
        Ok(vec![inputs[0].clone()])
    }
}

/// StaticReshape: target shape from the `shape` attribute, or the declared
/// output dims when the attribute is absent.
///
/// A `-1` entry in the attribute is inferred from the element count.
pub struct StaticReshapeKernel;

impl Kernel for StaticReshapeKernel {
    fn name(&self) -> &str {
        "StaticReshape"
    }

    fn run(&self, op: &Op, inputs: &[&HostTensor]) -> Result<Vec<HostTensor>> {
        expect_inputs(op, inputs, 1)?;
        let input = inputs[0];

        let shape = match op.attr_ints("shape") {
            Ok(dims) => resolve_target(dims, input.len())?,
            Err(_) => declared_output_dims(op).ok_or_else(|| {
                Error::Kernel(format!(
                    "StaticReshape (op {}) has neither a 'shape' attribute nor known output dims",
                    op.id()
                ))
            })?,
        };

        Ok(vec![HostTensor::new(shape, input.data.clone())?])
    }
}

fn resolve_target(dims: &[i64], count: usize) -> Result<Vec<usize>> {
    let known: usize = dims.iter().filter(|&&d| d >= 0).map(|&d| d as usize).product();
    let inferred = dims.iter().filter(|&&d| d < 0).count();
    if inferred > 1 {
        return Err(Error::Shape(format!(
            "StaticReshape target {dims:?} has more than one inferred dimension"
        )));
    }
    dims.iter()
        .map(|&d| {
            if d >= 0 {
                Ok(d as usize)
            } else if known != 0 && count % known == 0 {
                Ok(count / known)
            } else {
                Err(Error::Shape(format!(
                    "cannot reshape {count} elements into {dims:?}"
                )))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_core::{DataType, LogicalTensor, OpKind};

    fn reshape_op() -> Op {
        Op::new(1, OpKind::StaticReshape)
            .with_input(LogicalTensor::new(0, DataType::F32, [2, 3]))
            .with_output(LogicalTensor::new(1, DataType::F32, [3, 2]))
    }

    #[test]
    fn test_reshape_from_declared_output() {
        let input = HostTensor::new(vec![2, 3], (0..6).map(|v| v as f32).collect()).unwrap();
        let out = StaticReshapeKernel.run(&reshape_op(), &[&input]).unwrap();
        assert_eq!(out[0].shape, vec![3, 2]);
        assert_eq!(out[0].data, input.data);
    }

    #[test]
    fn test_reshape_infers_dimension() {
        let input = HostTensor::new(vec![2, 3], vec![0.0; 6]).unwrap();
        let op = reshape_op().with_attr("shape", vec![-1i64, 2]);
        let out = StaticReshapeKernel.run(&op, &[&input]).unwrap();
        assert_eq!(out[0].shape, vec![3, 2]);

        let bad = reshape_op().with_attr("shape", vec![4i64, 4]);
        assert!(StaticReshapeKernel.run(&bad, &[&input]).is_err());
    }

    #[test]
    fn test_reorder_copies() {
        let input = HostTensor::new(vec![2], vec![1.0, 2.0]).unwrap();
        let out = ReorderKernel.run(&reshape_op(), &[&input]).unwrap();
        assert_eq!(out[0], input);
    }
}
