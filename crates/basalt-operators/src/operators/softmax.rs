//! SoftMax kernel.

use crate::kernel::{HostTensor, Kernel, expect_inputs, optional_attr};
use crate::{Error, Result};
use basalt_core::Op;

/// SoftMax along the `axis` attribute (default 1, negative counts from the
/// end).
pub struct SoftMaxKernel;

impl Kernel for SoftMaxKernel {
    fn name(&self) -> &str {
        "SoftMax"
    }

    fn run(&self, op: &Op, inputs: &[&HostTensor]) -> Result<Vec<HostTensor>> {
        expect_inputs(op, inputs, 1)?;
        let input = inputs[0];
        let rank = input.shape.len() as i64;
        let axis = optional_attr(op, "axis", 1, Op::attr_i64)?;
        let axis = if axis < 0 { axis + rank } else { axis };
        if !(0..rank).contains(&axis) {
            return Err(Error::Kernel(format!(
                "SoftMax axis {axis} is out of range for shape {:?}",
                input.shape
            )));
        }
        let axis = axis as usize;

        let dim = input.shape[axis];
        let inner: usize = input.shape[axis + 1..].iter().product();
        let outer: usize = input.shape[..axis].iter().product();
        let mut data = input.data.clone();

        for o in 0..outer {
            for i in 0..inner {
                let at = |d: usize| o * dim * inner + d * inner + i;
                let max = (0..dim)
                    .map(|d| input.data[at(d)])
                    .fold(f32::NEG_INFINITY, f32::max);
                let mut sum = 0.0;
                for d in 0..dim {
                    let e = (input.data[at(d)] - max).exp();
                    data[at(d)] = e;
                    sum += e;
                }
                for d in 0..dim {
                    data[at(d)] /= sum;
                }
            }
        }

        Ok(vec![HostTensor {
            shape: input.shape.clone(),
            data,
        }])
    }
}
