//! Sealed partitions: immutable snapshots of a fused op group.

use crate::graph::Graph;
use crate::op::{Op, OpId};
use crate::tensor::{LogicalTensor, TensorId};
use crate::{Error, Result};
use std::collections::HashSet;

/// Sequential partition identifier within one partitioning pass.
pub type PartitionId = usize;

/// Policy a partitioning pass runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PartitionPolicy {
    /// Grow partitions as far as the fusibility predicate allows.
    #[default]
    Fusion,

    /// No growth: every standalone-approved op becomes its own partition.
    Debug,
}

/// A group of ops a backend executes as one fused unit.
///
/// Built by copying everything it needs out of the graph, so it stays valid
/// after the graph is dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    id: PartitionId,
    policy: PartitionPolicy,
    ops: Vec<Op>,
    inputs: Vec<LogicalTensor>,
    outputs: Vec<LogicalTensor>,
}

impl Partition {
    /// Seal `members` of a finalized graph into a partition.
    ///
    /// Member ops are stored in the graph's topological order with their
    /// tensors replaced by the graph's refined descriptors. Boundary inputs
    /// are tensors consumed by a member but produced outside the partition
    /// (or not produced at all), in order of first use. Boundary outputs are
    /// tensors produced by a member that a non-member consumes, that are
    /// declared graph outputs, or that nothing consumes.
    ///
    /// # Errors
    ///
    /// - `NotFinalized` if the graph is still under construction.
    /// - `InvalidGraph` if `members` is empty or names an unknown op.
    pub fn seal(
        id: PartitionId,
        policy: PartitionPolicy,
        graph: &Graph,
        members: &[OpId],
    ) -> Result<Self> {
        if !graph.is_finalized() {
            return Err(Error::NotFinalized);
        }
        if members.is_empty() {
            return Err(Error::InvalidGraph(format!("Partition {id} has no ops")));
        }
        if let Some(unknown) = members.iter().find(|&&op| graph.op(op).is_none()) {
            return Err(Error::InvalidGraph(format!(
                "Partition {id} references unknown op {unknown}"
            )));
        }

        let member_set: HashSet<OpId> = members.iter().copied().collect();
        let resolve = |tid: TensorId| graph.tensor(tid).cloned();

        let ops: Vec<Op> = graph
            .topological_order()
            .into_iter()
            .filter(|op_id| member_set.contains(op_id))
            .filter_map(|op_id| graph.op(op_id))
            .map(|op| op.with_resolved_tensors(resolve))
            .collect();

        let mut seen = HashSet::new();
        let mut inputs = Vec::new();
        for tid in ops.iter().flat_map(|op| op.input_ids()) {
            let internal = graph
                .producer(tid)
                .is_some_and(|producer| member_set.contains(&producer));
            if !internal && seen.insert(tid) {
                inputs.extend(resolve(tid));
            }
        }

        let mut outputs = Vec::new();
        for tid in ops.iter().flat_map(|op| op.output_ids()) {
            let consumers = graph.consumers(tid);
            let escapes = consumers.is_empty()
                || graph.is_output(tid)
                || consumers.iter().any(|c| !member_set.contains(c));
            if escapes && seen.insert(tid) {
                outputs.extend(resolve(tid));
            }
        }

        Ok(Self {
            id,
            policy,
            ops,
            inputs,
            outputs,
        })
    }

    pub fn id(&self) -> PartitionId {
        self.id
    }

    pub fn policy(&self) -> PartitionPolicy {
        self.policy
    }

    /// Member ops in topological order.
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn op_ids(&self) -> Vec<OpId> {
        self.ops.iter().map(Op::id).collect()
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    pub fn is_single_op(&self) -> bool {
        self.ops.len() == 1
    }

    pub fn contains_op(&self, id: OpId) -> bool {
        self.ops.iter().any(|op| op.id() == id)
    }

    /// Boundary inputs, in order of first use.
    pub fn inputs(&self) -> &[LogicalTensor] {
        &self.inputs
    }

    /// Boundary outputs, in order of production.
    pub fn outputs(&self) -> &[LogicalTensor] {
        &self.outputs
    }

    pub fn input_ids(&self) -> Vec<TensorId> {
        self.inputs.iter().map(|t| t.id).collect()
    }

    pub fn output_ids(&self) -> Vec<TensorId> {
        self.outputs.iter().map(|t| t.id).collect()
    }

    /// Find the descriptor of a boundary tensor.
    pub fn boundary_tensor(&self, id: TensorId) -> Option<&LogicalTensor> {
        self.inputs
            .iter()
            .chain(&self.outputs)
            .find(|t| t.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::OpKind;
    use crate::types::DataType;

    fn t(id: TensorId) -> LogicalTensor {
        LogicalTensor::new(id, DataType::F32, [4])
    }

    /// 1: relu(t0) -> t1, 2: abs(t1) -> t2, 3: tanh(t1) -> t3
    fn fork_graph() -> Graph {
        let mut graph = Graph::new();
        graph.add_input(t(0)).unwrap();
        graph
            .add_op(Op::new(1, OpKind::ReLU).with_input(t(0)).with_output(t(1)))
            .unwrap();
        graph
            .add_op(Op::new(2, OpKind::Abs).with_input(t(1)).with_output(t(2)))
            .unwrap();
        graph
            .add_op(Op::new(3, OpKind::Tanh).with_input(t(1)).with_output(t(3)))
            .unwrap();
        graph.add_output(2).unwrap();
        graph.add_output(3).unwrap();
        graph.finalize().unwrap();
        graph
    }

    #[test]
    fn test_seal_requires_finalized_graph() {
        let graph = Graph::new();
        assert_eq!(
            Partition::seal(0, PartitionPolicy::Fusion, &graph, &[1]),
            Err(Error::NotFinalized)
        );
    }

    #[test]
    fn test_seal_rejects_unknown_or_empty_members() {
        let graph = fork_graph();
        assert!(Partition::seal(0, PartitionPolicy::Fusion, &graph, &[]).is_err());
        assert!(Partition::seal(0, PartitionPolicy::Fusion, &graph, &[42]).is_err());
    }

    #[test]
    fn test_boundaries_of_internal_chain() {
        let graph = fork_graph();
        let partition = Partition::seal(0, PartitionPolicy::Fusion, &graph, &[2, 1]).unwrap();

        assert_eq!(partition.op_ids(), vec![1, 2]);
        assert_eq!(partition.input_ids(), vec![0]);
        // t1 escapes to op 3, t2 is a graph output
        assert_eq!(partition.output_ids(), vec![1, 2]);
        assert!(partition.contains_op(2));
        assert!(!partition.is_single_op());
    }

    #[test]
    fn test_boundaries_of_whole_graph() {
        let graph = fork_graph();
        let partition = Partition::seal(3, PartitionPolicy::Fusion, &graph, &[1, 2, 3]).unwrap();
        assert_eq!(partition.input_ids(), vec![0]);
        assert_eq!(partition.output_ids(), vec![2, 3]);
        assert_eq!(partition.id(), 3);
    }

    #[test]
    fn test_partition_outlives_graph() {
        let partition = {
            let graph = fork_graph();
            Partition::seal(0, PartitionPolicy::Debug, &graph, &[3]).unwrap()
        };
        assert_eq!(partition.policy(), PartitionPolicy::Debug);
        assert_eq!(partition.input_ids(), vec![1]);
        assert_eq!(partition.boundary_tensor(3), Some(&t(3)));
    }
}
