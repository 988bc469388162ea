//! Common test utilities for partitioning and compilation tests.
//!
//! Provides a closure-driven backend and small graph builders shared by the
//! integration test files.

#![allow(dead_code)]

use basalt_core::{
    Backend, CompiledPartition, DataType, FusionCtx, Graph, LogicalTensor, Op, OpId, OpKind,
    Result, Tensor, TensorId,
};

type Predicate = dyn Fn(&Op, &Op) -> bool + Send + Sync;

/// Backend whose fusibility predicate is a closure. Never executes.
pub struct PredicateBackend {
    predicate: Box<Predicate>,
}

impl PredicateBackend {
    pub fn new(predicate: impl Fn(&Op, &Op) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }

    /// Approves every pair, including standalone ops.
    pub fn approve_all() -> Self {
        Self::new(|_, _| true)
    }

    /// Rejects every pair, including standalone ops.
    pub fn reject_all() -> Self {
        Self::new(|_, _| false)
    }
}

impl Backend for PredicateBackend {
    fn name(&self) -> &str {
        "predicate"
    }

    fn can_fuse(&self, a: &Op, b: &Op, _cx: &FusionCtx<'_>) -> bool {
        (self.predicate)(a, b)
    }

    fn execute(&self, _: &CompiledPartition, _: &[Tensor], _: &[Tensor]) -> Result<()> {
        Ok(())
    }
}

/// Install a test subscriber (ignored if one is already set).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// `[1, 8, 16, 16]` f32 descriptor with an unspecified layout.
pub fn activation(id: TensorId) -> LogicalTensor {
    LogicalTensor::new(id, DataType::F32, [1, 8, 16, 16])
}

/// Unary op `kind(input) -> output` over activation-shaped tensors.
pub fn unary(id: OpId, kind: OpKind, input: TensorId, output: TensorId) -> Op {
    Op::new(id, kind)
        .with_input(activation(input))
        .with_output(activation(output))
}

/// Conv(A) -> B, ReLU(B) -> C with A = 0, B = 1, C = 2.
pub fn conv_relu_graph() -> Graph {
    let mut graph = Graph::new();
    graph.add_input(activation(0)).unwrap();
    graph
        .add_op(
            unary(10, OpKind::Convolution, 0, 1)
                .with_attr("strides", vec![1i64, 1])
                .with_attr("pads_begin", vec![0i64, 0])
                .with_attr("pads_end", vec![0i64, 0]),
        )
        .unwrap();
    graph.add_op(unary(11, OpKind::ReLU, 1, 2)).unwrap();
    graph.add_output(2).unwrap();
    graph.finalize().unwrap();
    graph
}

/// A wider graph with a fork and a join:
///
/// ```text
///  t0 -> [1 MatMul] -> t1 -> [2 ReLU] -> t2 --\
///                       \--> [3 Sigmoid] -> t3 -> [4 Add] -> t4 -> [5 SoftMax] -> t5
///  t6 -> [6 Abs] -> t7 (independent)
/// ```
pub fn mixed_graph() -> Graph {
    let mut graph = Graph::new();
    graph.add_input(activation(0)).unwrap();
    graph.add_input(activation(6)).unwrap();
    graph.add_op(unary(1, OpKind::MatMul, 0, 1)).unwrap();
    graph.add_op(unary(2, OpKind::ReLU, 1, 2)).unwrap();
    graph.add_op(unary(3, OpKind::Sigmoid, 1, 3)).unwrap();
    graph
        .add_op(
            Op::new(4, OpKind::Add)
                .with_input(activation(2))
                .with_input(activation(3))
                .with_output(activation(4)),
        )
        .unwrap();
    graph
        .add_op(unary(5, OpKind::SoftMax, 4, 5).with_attr("axis", 1i64))
        .unwrap();
    graph.add_op(unary(6, OpKind::Abs, 6, 7)).unwrap();
    graph.add_output(5).unwrap();
    graph.add_output(7).unwrap();
    graph.finalize().unwrap();
    graph
}
