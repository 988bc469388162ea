//! Backend capability trait.
//!
//! The partitioner, compiler, and runtime only ever see a backend through
//! this trait. A backend answers two questions during partitioning (can two
//! ops fuse, may one op stand alone) and does the actual work during
//! compilation and execution.

use crate::compiled::CompiledPartition;
use crate::engine::Engine;
use crate::graph::Graph;
use crate::op::Op;
use crate::partition::Partition;
use crate::tensor::{LogicalTensor, Tensor, TensorId};
use crate::types::Layout;
use crate::{Error, Result};

/// Read-only view of the graph handed to the fusibility predicate.
#[derive(Clone, Copy)]
pub struct FusionCtx<'a> {
    graph: &'a Graph,
}

impl<'a> FusionCtx<'a> {
    /// Create a context over a graph.
    pub fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    /// Get the underlying graph.
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// Get the refined descriptor of a tensor.
    pub fn tensor(&self, id: TensorId) -> Option<&'a LogicalTensor> {
        self.graph.tensor(id)
    }

    /// Check if `consumer` reads an output of `producer` directly.
    pub fn feeds(&self, producer: &Op, consumer: &Op) -> bool {
        producer
            .output_ids()
            .any(|out| consumer.input_ids().any(|input| input == out))
    }
}

/// A device backend: fusibility predicate, layout policy, and executor.
///
/// Implementations must be thread-safe; compiled partitions keep an `Arc`
/// to their backend and streams call it from a worker thread.
pub trait Backend: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &str;

    /// Fusibility predicate.
    ///
    /// Called with a candidate member `a` and an op `b` that directly
    /// consumes one of `a`'s outputs. Called with `a == b` to ask whether
    /// the op may form a partition on its own.
    fn can_fuse(&self, a: &Op, b: &Op, cx: &FusionCtx<'_>) -> bool;

    /// Run a compiled partition on caller-provided tensors.
    ///
    /// `inputs` and `outputs` are already validated against the compiled
    /// boundary descriptors.
    fn execute(
        &self,
        compiled: &CompiledPartition,
        inputs: &[Tensor],
        outputs: &[Tensor],
    ) -> Result<()>;

    /// Check if this backend can compile `partition` for `engine`.
    fn supports_partition(&self, _partition: &Partition, _engine: Engine) -> bool {
        true
    }

    /// Check if a concrete boundary layout is acceptable.
    ///
    /// Only called for concrete layouts; `Any` is always resolved through
    /// [`Backend::resolve_layout`].
    fn accepts_layout(&self, tensor: &LogicalTensor, _engine: Engine) -> bool {
        match &tensor.layout {
            Layout::Any => true,
            Layout::Strided(strides) => tensor.rank().is_none_or(|rank| rank == strides.len()),
            Layout::Opaque(_) => false,
        }
    }

    /// Pick a concrete layout for a boundary tensor declared with `Any`.
    fn resolve_layout(&self, tensor: &LogicalTensor, _engine: Engine) -> Result<Layout> {
        let dims = tensor.dims().ok_or_else(|| {
            Error::UnsupportedPartition(format!(
                "cannot choose a layout for tensor {} with unknown dims {:?}",
                tensor.id, tensor.shape
            ))
        })?;
        Layout::row_major(&dims).ok_or_else(|| {
            Error::UnsupportedPartition(format!(
                "row-major strides of tensor {} with dims {:?} overflow",
                tensor.id, dims
            ))
        })
    }

    /// `(input, output)` boundary pairs that may share one buffer.
    fn inplace_pairs(
        &self,
        _partition: &Partition,
        _inputs: &[LogicalTensor],
        _outputs: &[LogicalTensor],
    ) -> Vec<(TensorId, TensorId)> {
        Vec::new()
    }
}
