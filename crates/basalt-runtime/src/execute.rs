//! Submission of compiled partitions to streams.

use crate::stream::{Job, Stream};
use basalt_core::{CompiledPartition, Error, LogicalTensor, Misplaced, Result, Tensor};

/// Submit a compiled partition for execution on a stream.
///
/// `inputs` and `outputs` must line up positionally with the compiled
/// boundary lists. The call returns once the job is queued; use
/// [`Stream::wait`] to observe completion and kernel failures.
///
/// # Errors
///
/// - `TensorCountMismatch` if the slice lengths differ from the boundary,
///   or if a tensor's id differs from the boundary id at its position.
/// - `InvalidArgument` if the stream or a tensor lives on another engine.
/// - `LayoutConflict` if a tensor's dtype, dims, or layout disagrees with
///   the resolved descriptor at its position.
///
/// Nothing is enqueued when validation fails.
#[tracing::instrument(skip_all, fields(
    partition = compiled.partition().id(),
    stream = %stream.id(),
    backend = compiled.backend_name(),
))]
pub fn execute(
    compiled: &CompiledPartition,
    stream: &Stream,
    inputs: &[Tensor],
    outputs: &[Tensor],
) -> Result<()> {
    if inputs.len() != compiled.inputs().len() || outputs.len() != compiled.outputs().len() {
        return Err(Error::TensorCountMismatch {
            expected_inputs: compiled.inputs().len(),
            expected_outputs: compiled.outputs().len(),
            got_inputs: inputs.len(),
            got_outputs: outputs.len(),
            misplaced: None,
        });
    }

    let mut slots = boundary_slots(compiled.inputs(), inputs, false)
        .chain(boundary_slots(compiled.outputs(), outputs, true));
    if let Some(misplaced) = slots.find(|slot| slot.expected != slot.got) {
        return Err(Error::TensorCountMismatch {
            expected_inputs: compiled.inputs().len(),
            expected_outputs: compiled.outputs().len(),
            got_inputs: inputs.len(),
            got_outputs: outputs.len(),
            misplaced: Some(misplaced),
        });
    }

    if stream.engine() != compiled.engine() {
        return Err(Error::InvalidArgument(format!(
            "{} is bound to {} but the partition was compiled for {}",
            stream.id(),
            stream.engine(),
            compiled.engine()
        )));
    }

    let pairs = compiled
        .inputs()
        .iter()
        .zip(inputs)
        .chain(compiled.outputs().iter().zip(outputs));
    for (expected, tensor) in pairs {
        check_tensor(compiled, expected, tensor)?;
    }

    stream.enqueue(Job {
        compiled: compiled.clone(),
        inputs: inputs.to_vec(),
        outputs: outputs.to_vec(),
    })
}

fn boundary_slots<'a>(
    expected: &'a [LogicalTensor],
    supplied: &'a [Tensor],
    output: bool,
) -> impl Iterator<Item = Misplaced> + 'a {
    expected
        .iter()
        .zip(supplied)
        .enumerate()
        .map(move |(position, (expected, tensor))| Misplaced {
            output,
            position,
            expected: expected.id,
            got: tensor.id(),
        })
}

fn check_tensor(
    compiled: &CompiledPartition,
    expected: &LogicalTensor,
    tensor: &Tensor,
) -> Result<()> {
    if tensor.engine() != compiled.engine() {
        return Err(Error::InvalidArgument(format!(
            "tensor {} lives on {} but the partition was compiled for {}",
            tensor.id(),
            tensor.engine(),
            compiled.engine()
        )));
    }

    let actual = tensor.logical_tensor();
    let mismatch = if actual.dtype != expected.dtype {
        Some(format!("dtype {:?}, expected {:?}", actual.dtype, expected.dtype))
    } else if !actual.shape.unifies_with(&expected.shape) {
        Some(format!("shape {:?}, expected {:?}", actual.shape, expected.shape))
    } else if !actual.layout.unifies_with(&expected.layout) {
        Some(format!("layout {:?}, expected {:?}", actual.layout, expected.layout))
    } else {
        None
    };

    match mismatch {
        Some(detail) => Err(Error::LayoutConflict(format!("tensor {}: {detail}", actual.id))),
        None => Ok(()),
    }
}
