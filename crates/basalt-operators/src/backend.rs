//! Reference CPU backend.

use crate::kernel::{HostTensor, declared_output_dims};
use crate::registry::{KernelRegistry, core_kernel_registry};
use crate::rules::FusionRules;
use crate::{Error, Result};
use basalt_core::{
    Backend, CompiledPartition, DataType, Engine, EngineKind, FusionCtx, Layout, LogicalTensor,
    Op, Partition, Tensor, TensorId,
};
use std::collections::HashMap;

/// Host backend running `f32` partitions with the reference kernels.
///
/// Only CPU engines and dense row-major layouts are supported.
pub struct ReferenceBackend {
    rules: FusionRules,
    registry: KernelRegistry,
}

impl ReferenceBackend {
    /// Create a backend with the default fusion rules and every kernel.
    pub fn new() -> Self {
        Self::with_rules(FusionRules::default())
    }

    /// Create a backend with custom fusion rules.
    pub fn with_rules(rules: FusionRules) -> Self {
        Self {
            rules,
            registry: core_kernel_registry(),
        }
    }

    /// Replace the kernel registry.
    pub fn with_registry(mut self, registry: KernelRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn rules(&self) -> &FusionRules {
        &self.rules
    }

    pub fn registry(&self) -> &KernelRegistry {
        &self.registry
    }

    /// Run every member op of a compiled partition on host values.
    fn run_partition(
        &self,
        compiled: &CompiledPartition,
        inputs: &[Tensor],
    ) -> Result<HashMap<TensorId, HostTensor>> {
        // Copy every input out before anything is written
        let mut values: HashMap<TensorId, HostTensor> = HashMap::new();
        for (desc, tensor) in compiled.inputs().iter().zip(inputs) {
            values.insert(desc.id, read_host(tensor)?);
        }

        for op in compiled.partition().ops() {
            let kernel = self.registry.get(op.kind()).ok_or_else(|| {
                Error::Kernel(format!("no kernel registered for {}", op.kind()))
            })?;

            let args = op
                .input_ids()
                .map(|id| {
                    values.get(&id).ok_or_else(|| {
                        Error::Kernel(format!(
                            "input {id} of op {} is not available",
                            op.id()
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let results = kernel.run(op, &args)?;
            check_results(op, &results)?;
            tracing::trace!(op = op.id(), kernel = kernel.name(), "kernel finished");

            for (id, value) in op.output_ids().zip(results) {
                values.insert(id, value);
            }
        }

        Ok(values)
    }
}

impl Default for ReferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for ReferenceBackend {
    fn name(&self) -> &str {
        "reference"
    }

    fn can_fuse(&self, a: &Op, b: &Op, cx: &FusionCtx<'_>) -> bool {
        all_f32(a, cx) && all_f32(b, cx) && self.rules.approves(a, b)
    }

    fn execute(
        &self,
        compiled: &CompiledPartition,
        inputs: &[Tensor],
        outputs: &[Tensor],
    ) -> basalt_core::Result<()> {
        let mut values = self.run_partition(compiled, inputs)?;

        for (desc, tensor) in compiled.outputs().iter().zip(outputs) {
            let value = values.remove(&desc.id).ok_or_else(|| {
                Error::Kernel(format!("output {} was never computed", desc.id))
            })?;
            tensor.write_from(&value.data)?;
        }
        Ok(())
    }

    fn supports_partition(&self, partition: &Partition, engine: Engine) -> bool {
        if engine.kind() != EngineKind::Cpu {
            return false;
        }
        let kernels = partition
            .ops()
            .iter()
            .all(|op| self.registry.contains(op.kind()));
        let boundary = partition
            .inputs()
            .iter()
            .chain(partition.outputs())
            .all(|t| t.dtype == DataType::F32);
        kernels && boundary
    }

    fn accepts_layout(&self, tensor: &LogicalTensor, _engine: Engine) -> bool {
        is_dense(tensor)
    }

    fn inplace_pairs(
        &self,
        _partition: &Partition,
        inputs: &[LogicalTensor],
        outputs: &[LogicalTensor],
    ) -> Vec<(TensorId, TensorId)> {
        let mut used = vec![false; inputs.len()];
        let mut pairs = Vec::new();
        for output in outputs {
            let candidate = (0..inputs.len()).find(|&i| {
                let input = &inputs[i];
                !used[i]
                    && input.dtype == output.dtype
                    && input.dims().is_some()
                    && input.dims() == output.dims()
            });
            if let Some(i) = candidate {
                used[i] = true;
                pairs.push((inputs[i].id, output.id));
            }
        }
        pairs
    }
}

/// `Any`, or row-major strides for known dims.
fn is_dense(tensor: &LogicalTensor) -> bool {
    match (&tensor.layout, tensor.dims()) {
        (Layout::Any, _) => true,
        (layout @ Layout::Strided(_), Some(dims)) => layout.is_row_major_for(&dims),
        _ => false,
    }
}

fn all_f32(op: &Op, cx: &FusionCtx<'_>) -> bool {
    op.input_ids()
        .chain(op.output_ids())
        .all(|id| cx.tensor(id).is_some_and(|t| t.dtype == DataType::F32))
}

fn read_host(tensor: &Tensor) -> Result<HostTensor> {
    let desc = tensor.logical_tensor();
    let shape = desc.dims().ok_or_else(|| {
        Error::Shape(format!("tensor {} has unknown dims", desc.id))
    })?;
    let count: usize = shape.iter().product();
    let mut data = tensor.to_vec::<f32>()?;
    data.truncate(count);
    HostTensor::new(shape, data)
}

fn check_results(op: &Op, results: &[HostTensor]) -> Result<()> {
    if results.len() != op.outputs().len() {
        return Err(Error::Kernel(format!(
            "{} (op {}) produced {} outputs, expected {}",
            op.kind(),
            op.id(),
            results.len(),
            op.outputs().len()
        )));
    }
    if let (Some(declared), Some(first)) = (declared_output_dims(op), results.first()) {
        if declared != first.shape {
            return Err(Error::Shape(format!(
                "{} (op {}) produced shape {:?}, declared {:?}",
                op.kind(),
                op.id(),
                first.shape,
                declared
            )));
        }
    }
    Ok(())
}
