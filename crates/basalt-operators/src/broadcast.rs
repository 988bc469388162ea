//! Broadcasting helpers for binary kernels.

use crate::{Error, Result};

/// Compute NumPy-style broadcast output shape from two input shapes.
///
/// Implements NumPy broadcasting rules:
/// - Shapes are aligned from the rightmost dimension
/// - Dimensions match if they are equal or one of them is 1
/// - Missing dimensions in shorter shapes are treated as 1
///
/// # Example
///
/// ```text
/// broadcast_shape(&[2, 3, 4], &[3, 4])    -> [2, 3, 4]
/// broadcast_shape(&[8, 1, 6, 1], &[7, 1, 5]) -> [8, 7, 6, 5]
/// ```
pub fn broadcast_shape(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let rank = a.len().max(b.len());
    (0..rank)
        .map(|i| {
            let da = aligned_dim(a, rank, i);
            let db = aligned_dim(b, rank, i);
            match (da, db) {
                _ if da == db => Ok(da),
                (1, _) => Ok(db),
                (_, 1) => Ok(da),
                _ => Err(Error::Shape(format!(
                    "Cannot broadcast shapes {a:?} and {b:?} at dimension {i}"
                ))),
            }
        })
        .collect()
}

/// Flat index into `input` for the element at flat index `index` of a
/// tensor with shape `output`, where `input` broadcasts to `output`.
pub fn source_index(index: usize, output: &[usize], input: &[usize]) -> usize {
    let offset = output.len() - input.len();
    let mut remaining = index;
    let mut source = 0;
    let mut stride = 1;
    for axis in (0..output.len()).rev() {
        let coord = remaining % output[axis].max(1);
        remaining /= output[axis].max(1);
        if axis >= offset {
            let dim = input[axis - offset];
            if dim != 1 {
                source += coord * stride;
            }
            stride *= dim;
        }
    }
    source
}

fn aligned_dim(shape: &[usize], rank: usize, i: usize) -> usize {
    let pad = rank - shape.len();
    if i < pad { 1 } else { shape[i - pad] }
}
