//! Partition compilation: boundary layout checks and resolution.

use basalt_core::{
    Backend, CompiledPartition, Engine, Error, Layout, LogicalTensor, Partition, Result,
};
use std::sync::Arc;

/// Compiles partitions for one backend.
///
/// Compilation is a pure function of the partition, the engine, and the
/// backend, so one compiler may be shared across threads and used on
/// independent partitions concurrently.
#[derive(Clone)]
pub struct PartitionCompiler {
    backend: Arc<dyn Backend>,
}

impl PartitionCompiler {
    /// Create a compiler for a backend.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Compile a partition for an engine.
    ///
    /// # Errors
    ///
    /// - `UnsupportedPartition` if the backend cannot handle the partition on
    ///   this engine, or cannot choose a layout for an `Any` tensor.
    /// - `LayoutConflict` if a concrete boundary layout is malformed or
    ///   rejected by the backend.
    #[tracing::instrument(skip_all, fields(partition = partition.id(), engine = %engine, backend = self.backend.name()))]
    pub fn compile(&self, partition: &Arc<Partition>, engine: Engine) -> Result<CompiledPartition> {
        if !self.backend.supports_partition(partition, engine) {
            return Err(Error::UnsupportedPartition(format!(
                "backend '{}' cannot compile partition {} (ops {:?}) for engine {}",
                self.backend.name(),
                partition.id(),
                partition.op_ids(),
                engine
            )));
        }

        self.check_layouts(partition, engine)?;

        let inputs = self.resolve_all(partition.inputs(), engine)?;
        let outputs = self.resolve_all(partition.outputs(), engine)?;
        let inplace_pairs = self.backend.inplace_pairs(partition, &inputs, &outputs);

        tracing::debug!(
            num_inputs = inputs.len(),
            num_outputs = outputs.len(),
            num_inplace = inplace_pairs.len(),
            "partition compiled"
        );

        Ok(CompiledPartition::new(
            Arc::clone(partition),
            engine,
            Arc::clone(&self.backend),
            inputs,
            outputs,
            inplace_pairs,
        ))
    }

    /// Validate every concrete layout the partition mentions.
    ///
    /// Sealing gives every occurrence of a tensor id the same descriptor,
    /// so each occurrence is judged on its own.
    fn check_layouts(&self, partition: &Partition, engine: Engine) -> Result<()> {
        let occurrences = partition
            .inputs()
            .iter()
            .chain(partition.outputs())
            .chain(
                partition
                    .ops()
                    .iter()
                    .flat_map(|op| op.inputs().iter().chain(op.outputs())),
            );

        for tensor in occurrences {
            if tensor.layout.is_any() {
                continue;
            }
            check_stride_rank(tensor)?;
            if !self.backend.accepts_layout(tensor, engine) {
                return Err(Error::LayoutConflict(format!(
                    "backend '{}' does not accept layout {:?} for tensor {}",
                    self.backend.name(),
                    tensor.layout,
                    tensor.id
                )));
            }
        }
        Ok(())
    }

    fn resolve_all(&self, tensors: &[LogicalTensor], engine: Engine) -> Result<Vec<LogicalTensor>> {
        tensors
            .iter()
            .map(|tensor| {
                if tensor.layout.is_any() {
                    let layout = self.backend.resolve_layout(tensor, engine)?;
                    Ok(tensor.clone().with_layout(layout))
                } else {
                    Ok(tensor.clone())
                }
            })
            .collect()
    }
}

/// Compile a partition for an engine with the given backend.
pub fn compile(
    partition: &Arc<Partition>,
    engine: Engine,
    backend: &Arc<dyn Backend>,
) -> Result<CompiledPartition> {
    PartitionCompiler::new(Arc::clone(backend)).compile(partition, engine)
}

fn check_stride_rank(tensor: &LogicalTensor) -> Result<()> {
    if let (Layout::Strided(strides), Some(rank)) = (&tensor.layout, tensor.rank()) {
        if strides.len() != rank {
            return Err(Error::LayoutConflict(format!(
                "tensor {} has rank {} but {} strides",
                tensor.id,
                rank,
                strides.len()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use basalt_core::{DataType, FusionCtx, Graph, Op, OpKind, PartitionPolicy, Tensor};

    struct AnyEngineBackend;

    impl Backend for AnyEngineBackend {
        fn name(&self) -> &str {
            "any"
        }

        fn can_fuse(&self, _a: &Op, _b: &Op, _cx: &FusionCtx<'_>) -> bool {
            true
        }

        fn execute(&self, _: &CompiledPartition, _: &[Tensor], _: &[Tensor]) -> Result<()> {
            Ok(())
        }

        fn supports_partition(&self, _partition: &Partition, engine: Engine) -> bool {
            engine == Engine::cpu(0)
        }
    }

    fn single_op_partition(input: LogicalTensor) -> Arc<Partition> {
        let output = LogicalTensor::new(1, DataType::F32, [2, 3]);
        let mut graph = Graph::new();
        graph.add_input(input.clone()).unwrap();
        graph
            .add_op(Op::new(1, OpKind::ReLU).with_input(input).with_output(output))
            .unwrap();
        graph.finalize().unwrap();
        Arc::new(Partition::seal(0, PartitionPolicy::Fusion, &graph, &[1]).unwrap())
    }

    #[test]
    fn test_resolves_any_to_row_major() {
        let partition = single_op_partition(LogicalTensor::new(0, DataType::F32, [2, 3]));
        let compiler = PartitionCompiler::new(Arc::new(AnyEngineBackend));
        let compiled = compiler.compile(&partition, Engine::cpu(0)).unwrap();

        assert_eq!(
            compiled.query_logical_tensor(0).unwrap().layout,
            Layout::Strided(vec![3, 1])
        );
        assert_eq!(
            compiled.query_logical_tensor(1).unwrap().layout,
            Layout::Strided(vec![3, 1])
        );
        // The partition itself is untouched
        assert!(partition.inputs()[0].layout.is_any());
    }

    #[test]
    fn test_unsupported_engine() {
        let partition = single_op_partition(LogicalTensor::new(0, DataType::F32, [2, 3]));
        let backend: Arc<dyn Backend> = Arc::new(AnyEngineBackend);
        assert!(matches!(
            compile(&partition, Engine::gpu(0), &backend),
            Err(Error::UnsupportedPartition(_))
        ));
    }

    #[test]
    fn test_stride_rank_mismatch() {
        let bad =
            LogicalTensor::new(0, DataType::F32, [2, 3]).with_layout(Layout::Strided(vec![1]));
        let partition = single_op_partition(bad);
        let backend: Arc<dyn Backend> = Arc::new(AnyEngineBackend);
        assert!(matches!(
            compile(&partition, Engine::cpu(0), &backend),
            Err(Error::LayoutConflict(_))
        ));
    }

    #[test]
    fn test_unrepresentable_dims_unsupported() {
        let huge = 1usize << 40;
        let dims = [huge, huge, huge];
        let mut graph = Graph::new();
        graph.add_input(LogicalTensor::new(0, DataType::F32, dims)).unwrap();
        graph
            .add_op(
                Op::new(1, OpKind::ReLU)
                    .with_input(LogicalTensor::new(0, DataType::F32, dims))
                    .with_output(LogicalTensor::new(1, DataType::F32, dims)),
            )
            .unwrap();
        graph.finalize().unwrap();
        let partition =
            Arc::new(Partition::seal(0, PartitionPolicy::Fusion, &graph, &[1]).unwrap());

        let backend: Arc<dyn Backend> = Arc::new(AnyEngineBackend);
        assert!(matches!(
            compile(&partition, Engine::cpu(0), &backend),
            Err(Error::UnsupportedPartition(_))
        ));
    }

    #[test]
    fn test_opaque_layout_rejected_by_default() {
        let opaque = LogicalTensor::new(0, DataType::F32, [2, 3]).with_layout(Layout::Opaque(4));
        let partition = single_op_partition(opaque);
        let backend: Arc<dyn Backend> = Arc::new(AnyEngineBackend);
        assert!(matches!(
            compile(&partition, Engine::cpu(0), &backend),
            Err(Error::LayoutConflict(_))
        ));
    }
}
