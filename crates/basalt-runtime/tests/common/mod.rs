//! Common test utilities for stream execution tests.

#![allow(dead_code)]

use basalt_compiler::{PartitionCompiler, Partitioner, PartitionerConfig};
use basalt_core::{
    Backend, CompiledPartition, DataType, Engine, Error, FusionCtx, Graph, LogicalTensor, Op,
    OpKind, PartitionPolicy, Result, Tensor, TensorId,
};
use basalt_operators::ReferenceBackend;
use std::sync::Arc;

/// Install a test subscriber (ignored if one is already set).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// `[4]` f32 descriptor with an unspecified layout.
pub fn vector(id: TensorId) -> LogicalTensor {
    LogicalTensor::new(id, DataType::F32, [4])
}

/// Host buffer for a resolved descriptor, filled with `data`.
pub fn tensor(desc: &LogicalTensor, data: Vec<f32>) -> Tensor {
    Tensor::from_vec(desc.clone(), Engine::cpu(0), data).unwrap()
}

/// Zeroed host buffer for a resolved descriptor.
pub fn zeros(desc: &LogicalTensor) -> Tensor {
    Tensor::zeros(desc.clone(), Engine::cpu(0)).unwrap()
}

/// ReLU(a) -> b, Abs(b) -> c with a = 0, b = 1, c = 2.
pub fn relu_abs_graph() -> Graph {
    let mut graph = Graph::new();
    graph.add_input(vector(0)).unwrap();
    graph
        .add_op(Op::new(1, OpKind::ReLU).with_input(vector(0)).with_output(vector(1)))
        .unwrap();
    graph
        .add_op(Op::new(2, OpKind::Abs).with_input(vector(1)).with_output(vector(2)))
        .unwrap();
    graph.add_output(2).unwrap();
    graph.finalize().unwrap();
    graph
}

/// Compile every partition of `graph` for `cpu(0)` with `policy`.
pub fn compile_all(
    graph: &Graph,
    backend: Arc<dyn Backend>,
    policy: PartitionPolicy,
) -> Vec<CompiledPartition> {
    let config = PartitionerConfig::default().with_policy(policy);
    let partitioning = Partitioner::with_config(config)
        .partition(graph, backend.as_ref())
        .unwrap();
    let compiler = PartitionCompiler::new(backend);
    partitioning
        .partitions
        .iter()
        .map(|partition| compiler.compile(partition, Engine::cpu(0)).unwrap())
        .collect()
}

/// Compile the relu/abs graph as one fused partition on the reference backend.
pub fn fused_relu_abs() -> CompiledPartition {
    let backend: Arc<dyn Backend> = Arc::new(ReferenceBackend::new());
    let mut compiled = compile_all(&relu_abs_graph(), backend, PartitionPolicy::Fusion);
    assert_eq!(compiled.len(), 1);
    compiled.remove(0)
}

/// Backend that fuses everything and fails every execution.
pub struct FailingBackend;

impl Backend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn can_fuse(&self, _a: &Op, _b: &Op, _cx: &FusionCtx<'_>) -> bool {
        true
    }

    fn execute(&self, compiled: &CompiledPartition, _: &[Tensor], _: &[Tensor]) -> Result<()> {
        Err(Error::Backend(format!(
            "partition {} failed on purpose",
            compiled.partition().id()
        )))
    }
}
