//! Executable artifacts produced by compiling a partition.

use crate::backend::Backend;
use crate::engine::Engine;
use crate::partition::Partition;
use crate::tensor::{LogicalTensor, TensorId};
use std::fmt;
use std::sync::Arc;

/// A partition compiled for one engine.
///
/// Boundary descriptors are fully resolved: every `Any` layout has been
/// replaced by the concrete layout the backend chose, so callers allocate
/// buffers from [`CompiledPartition::query_logical_tensor`]. Cloning is
/// cheap and shares the inner state.
#[derive(Clone)]
pub struct CompiledPartition {
    inner: Arc<Inner>,
}

struct Inner {
    partition: Arc<Partition>,
    engine: Engine,
    backend: Arc<dyn Backend>,
    inputs: Vec<LogicalTensor>,
    outputs: Vec<LogicalTensor>,
    inplace_pairs: Vec<(TensorId, TensorId)>,
}

impl CompiledPartition {
    /// Assemble a compiled partition from resolved boundary descriptors.
    ///
    /// Normally called by the partition compiler, which performs the layout
    /// checks; this constructor trusts its arguments.
    pub fn new(
        partition: Arc<Partition>,
        engine: Engine,
        backend: Arc<dyn Backend>,
        inputs: Vec<LogicalTensor>,
        outputs: Vec<LogicalTensor>,
        inplace_pairs: Vec<(TensorId, TensorId)>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                partition,
                engine,
                backend,
                inputs,
                outputs,
                inplace_pairs,
            }),
        }
    }

    /// Get the source partition.
    pub fn partition(&self) -> &Arc<Partition> {
        &self.inner.partition
    }

    /// Get the engine this artifact targets.
    pub fn engine(&self) -> Engine {
        self.inner.engine
    }

    /// Get the backend that compiled this artifact.
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    pub fn backend_name(&self) -> &str {
        self.inner.backend.name()
    }

    /// Resolved boundary inputs, in partition order.
    pub fn inputs(&self) -> &[LogicalTensor] {
        &self.inner.inputs
    }

    /// Resolved boundary outputs, in partition order.
    pub fn outputs(&self) -> &[LogicalTensor] {
        &self.inner.outputs
    }

    /// Resolved descriptor of a boundary tensor.
    pub fn query_logical_tensor(&self, id: TensorId) -> Option<&LogicalTensor> {
        self.inner
            .inputs
            .iter()
            .chain(&self.inner.outputs)
            .find(|t| t.id == id)
    }

    /// `(input, output)` pairs allowed to share one buffer.
    pub fn inplace_pairs(&self) -> &[(TensorId, TensorId)] {
        &self.inner.inplace_pairs
    }
}

impl fmt::Debug for CompiledPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledPartition")
            .field("partition", &self.inner.partition.id())
            .field("engine", &self.inner.engine)
            .field("backend", &self.inner.backend.name())
            .field("inputs", &self.inner.inputs)
            .field("outputs", &self.inner.outputs)
            .field("inplace_pairs", &self.inner.inplace_pairs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FusionCtx;
    use crate::graph::Graph;
    use crate::op::{Op, OpKind};
    use crate::partition::PartitionPolicy;
    use crate::tensor::Tensor;
    use crate::types::DataType;
    use crate::Result;

    struct NullBackend;

    impl Backend for NullBackend {
        fn name(&self) -> &str {
            "null"
        }

        fn can_fuse(&self, _a: &Op, _b: &Op, _cx: &FusionCtx<'_>) -> bool {
            true
        }

        fn execute(&self, _: &CompiledPartition, _: &[Tensor], _: &[Tensor]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_query_and_clone() {
        let t = |id| LogicalTensor::strided_row_major(id, DataType::F32, &[4]);
        let mut graph = Graph::new();
        graph.add_input(t(0)).unwrap();
        graph
            .add_op(Op::new(1, OpKind::ReLU).with_input(t(0)).with_output(t(1)))
            .unwrap();
        graph.finalize().unwrap();
        let partition = Arc::new(
            Partition::seal(0, PartitionPolicy::Fusion, &graph, &[1]).unwrap(),
        );

        let compiled = CompiledPartition::new(
            Arc::clone(&partition),
            Engine::cpu(0),
            Arc::new(NullBackend),
            partition.inputs().to_vec(),
            partition.outputs().to_vec(),
            vec![(0, 1)],
        );
        let copy = compiled.clone();

        assert_eq!(copy.query_logical_tensor(1), Some(&t(1)));
        assert_eq!(copy.query_logical_tensor(7), None);
        assert_eq!(copy.inplace_pairs(), &[(0, 1)]);
        assert_eq!(copy.backend_name(), "null");
        assert!(format!("{copy:?}").contains("null"));
    }
}
