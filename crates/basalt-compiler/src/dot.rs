//! DOT graph visualization for partitionings.
//!
//! Each partition is drawn as a cluster of its member ops. Unpartitioned
//! ops are dashed, graph inputs are green ellipses, and edges are labeled
//! with the tensor id they carry.

use crate::partitioner::Partitioning;
use basalt_core::{Graph, Op, OpId};

/// Generate a DOT graph from a partitioning of `graph`.
///
/// # Example
///
/// ```ignore
/// let dot = partitioning.to_dot(&graph);
/// std::fs::write("partitions.dot", dot)?;
/// // Render with: dot -Tpng partitions.dot -o partitions.png
/// ```
pub fn to_partition_dot(graph: &Graph, partitioning: &Partitioning) -> String {
    let mut dot = String::new();
    dot.push_str("digraph partitions {\n");
    dot.push_str("  rankdir=TB;\n");
    dot.push_str("  node [shape=box, style=rounded];\n\n");

    // Graph inputs
    for &input in graph.inputs() {
        dot.push_str(&format!(
            "  t{input} [label=\"t{input}\", shape=ellipse, style=bold, color=green];\n"
        ));
    }

    // One cluster per partition
    for partition in &partitioning.partitions {
        dot.push_str(&format!("\n  subgraph cluster_p{} {{\n", partition.id()));
        dot.push_str(&format!(
            "    label=\"partition {} ({} ops)\";\n",
            partition.id(),
            partition.op_count()
        ));
        dot.push_str("    style=filled;\n    color=lightgrey;\n");
        for op in partition.ops() {
            dot.push_str(&format!("    {};\n", op_node(op, "")));
        }
        dot.push_str("  }\n");
    }

    // Leftovers
    if !partitioning.unpartitioned.is_empty() {
        dot.push('\n');
    }
    for &id in &partitioning.unpartitioned {
        if let Some(op) = graph.op(id) {
            dot.push_str(&format!("  {};\n", op_node(op, ", style=dashed")));
        }
    }

    // Data edges
    dot.push('\n');
    for op in graph.ops() {
        for input in op.input_ids() {
            let source = match graph.producer(input) {
                Some(producer) => op_name(producer),
                None if graph.is_input(input) => format!("t{input}"),
                None => continue,
            };
            dot.push_str(&format!(
                "  {} -> {} [label=\"t{}\"];\n",
                source,
                op_name(op.id()),
                input
            ));
        }
    }

    dot.push_str("}\n");
    dot
}

fn op_name(id: OpId) -> String {
    format!("op_{id}")
}

fn op_node(op: &Op, extra: &str) -> String {
    format!(
        "{} [label=\"{} [#{}]\"{}]",
        op_name(op.id()),
        op.kind(),
        op.id(),
        extra
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitioner::Partitioner;
    use basalt_core::{
        Backend, CompiledPartition, DataType, FusionCtx, LogicalTensor, OpKind, Result, Tensor,
    };

    struct NoAbs;

    impl Backend for NoAbs {
        fn name(&self) -> &str {
            "no-abs"
        }

        fn can_fuse(&self, a: &Op, b: &Op, _cx: &FusionCtx<'_>) -> bool {
            a.kind() != OpKind::Abs && b.kind() != OpKind::Abs
        }

        fn execute(&self, _: &CompiledPartition, _: &[Tensor], _: &[Tensor]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_to_partition_dot_generates_valid_output() {
        let t = |id| LogicalTensor::new(id, DataType::F32, [4]);
        let mut graph = Graph::new();
        graph.add_input(t(0)).unwrap();
        graph
            .add_op(Op::new(1, OpKind::ReLU).with_input(t(0)).with_output(t(1)))
            .unwrap();
        graph
            .add_op(Op::new(2, OpKind::Abs).with_input(t(1)).with_output(t(2)))
            .unwrap();
        graph.finalize().unwrap();

        let partitioning = Partitioner::new().partition(&graph, &NoAbs).unwrap();
        let dot = partitioning.to_dot(&graph);

        assert!(dot.starts_with("digraph partitions {"));
        assert!(dot.contains("subgraph cluster_p0"));
        assert!(dot.contains("op_1 [label=\"ReLU [#1]\"]"));
        assert!(dot.contains("op_2 [label=\"Abs [#2]\", style=dashed]"));
        assert!(dot.contains("t0 -> op_1 [label=\"t0\"]"));
        assert!(dot.contains("op_1 -> op_2 [label=\"t1\"]"));
    }
}
