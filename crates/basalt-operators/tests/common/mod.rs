//! Common test utilities for reference backend tests.
//!
//! Drives a graph through partitioning, compilation, and host execution so
//! each test only has to describe the graph and the expected values.

#![allow(dead_code)]

use basalt_compiler::{PartitionCompiler, Partitioner, Partitioning};
use basalt_core::{
    Backend, CompiledPartition, DataType, Engine, Graph, LogicalTensor, Result, Tensor, TensorId,
};
use basalt_operators::ReferenceBackend;
use std::collections::HashMap;
use std::sync::Arc;

/// Install a test subscriber (ignored if one is already set).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// f32 descriptor with an unspecified layout.
pub fn f32_tensor(id: TensorId, dims: &[usize]) -> LogicalTensor {
    LogicalTensor::new(id, DataType::F32, dims)
}

/// Partition and compile every partition of `graph` for `cpu(0)`.
pub fn compile_graph(
    graph: &Graph,
    backend: &Arc<ReferenceBackend>,
) -> Result<(Partitioning, Vec<CompiledPartition>)> {
    let partitioning = Partitioner::new().partition(graph, backend.as_ref())?;
    let compiler = PartitionCompiler::new(Arc::clone(backend) as Arc<dyn Backend>);
    let compiled = partitioning
        .partitions
        .iter()
        .map(|partition| compiler.compile(partition, Engine::cpu(0)))
        .collect::<Result<Vec<_>>>()?;
    Ok((partitioning, compiled))
}

/// Host-side tensor values keyed by tensor id.
#[derive(Default)]
pub struct Values {
    tensors: HashMap<TensorId, Tensor>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record row-major input data for a tensor id.
    pub fn with(mut self, id: TensorId, dims: &[usize], data: Vec<f32>) -> Self {
        let desc = LogicalTensor::strided_row_major(id, DataType::F32, dims);
        let tensor = Tensor::from_vec(desc, Engine::cpu(0), data).unwrap();
        self.tensors.insert(id, tensor);
        self
    }

    /// Run compiled partitions in order, allocating outputs from their
    /// resolved descriptors.
    pub fn run(&mut self, compiled: &[CompiledPartition]) -> Result<()> {
        for partition in compiled {
            let inputs = partition
                .inputs()
                .iter()
                .map(|desc| self.tensors[&desc.id].view(desc.clone()))
                .collect::<Result<Vec<_>>>()?;
            let outputs = partition
                .outputs()
                .iter()
                .map(|desc| Tensor::zeros(desc.clone(), Engine::cpu(0)))
                .collect::<Result<Vec<_>>>()?;

            partition.backend().execute(partition, &inputs, &outputs)?;

            for output in outputs {
                self.tensors.insert(output.id(), output);
            }
        }
        Ok(())
    }

    /// Read a tensor back as `f32` values.
    pub fn get(&self, id: TensorId) -> Vec<f32> {
        self.tensors[&id].to_vec::<f32>().unwrap()
    }
}

/// Compare two slices element-wise within `tolerance`.
pub fn assert_close(actual: &[f32], expected: &[f32], tolerance: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "element {i}: expected {e}, got {a}"
        );
    }
}
