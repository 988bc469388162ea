//! Matrix multiplication kernel.

use crate::kernel::{HostTensor, Kernel, expect_inputs, optional_attr};
use crate::{Error, Result};
use basalt_core::Op;

/// Batched matrix multiplication: `[.., M, K] x [.., K, N] -> [.., M, N]`.
///
/// Both inputs must have rank ≥ 2 and identical leading (batch) dims. The
/// `transpose_a` / `transpose_b` bool attributes swap the last two axes of
/// the corresponding input.
pub struct MatMulKernel;

impl Kernel for MatMulKernel {
    fn name(&self) -> &str {
        "MatMul"
    }

    fn run(&self, op: &Op, inputs: &[&HostTensor]) -> Result<Vec<HostTensor>> {
        expect_inputs(op, inputs, 2)?;
        let transpose_a = optional_attr(op, "transpose_a", false, Op::attr_bool)?;
        let transpose_b = optional_attr(op, "transpose_b", false, Op::attr_bool)?;
        let (a, b) = (inputs[0], inputs[1]);

        let (batch_a, m, k) = split_matrix(&a.shape, transpose_a)?;
        let (batch_b, k2, n) = split_matrix(&b.shape, transpose_b)?;
        if batch_a != batch_b || k != k2 {
            return Err(Error::Shape(format!(
                "MatMul cannot multiply {:?} by {:?}",
                a.shape, b.shape
            )));
        }

        let batches: usize = batch_a.iter().product();
        let mut data = vec![0.0f32; batches * m * n];
        for batch in 0..batches {
            let a_base = batch * m * k;
            let b_base = batch * k * n;
            let out_base = batch * m * n;
            for i in 0..m {
                for j in 0..n {
                    let mut acc = 0.0f32;
                    for p in 0..k {
                        let a_idx = if transpose_a { p * m + i } else { i * k + p };
                        let b_idx = if transpose_b { j * k + p } else { p * n + j };
                        acc += a.data[a_base + a_idx] * b.data[b_base + b_idx];
                    }
                    data[out_base + i * n + j] = acc;
                }
            }
        }

        let mut shape = batch_a.to_vec();
        shape.extend([m, n]);
        Ok(vec![HostTensor { shape, data }])
    }
}

/// Split a shape into (batch dims, rows, cols) after an optional transpose.
fn split_matrix(shape: &[usize], transpose: bool) -> Result<(&[usize], usize, usize)> {
    if shape.len() < 2 {
        return Err(Error::Shape(format!(
            "MatMul needs rank >= 2 inputs, got {shape:?}"
        )));
    }
    let (batch, matrix) = shape.split_at(shape.len() - 2);
    let (rows, cols) = (matrix[0], matrix[1]);
    Ok(if transpose {
        (batch, cols, rows)
    } else {
        (batch, rows, cols)
    })
}
