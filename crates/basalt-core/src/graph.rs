//! Build-then-freeze computation graph.
//!
//! The graph is an arena: ops live as node weights of a petgraph `DiGraph`
//! whose edges carry the tensor id flowing from producer to consumer.
//! Side tables map tensor ids to their descriptor, producer, and consumers.
//!
//! While under construction every `add_op` is validated so the graph stays a
//! DAG with single producers and consistent descriptors. `finalize` checks
//! that every tensor has a source and every declared output is produced, then
//! freezes the graph for partitioning.

use crate::op::{Op, OpId};
use crate::tensor::{LogicalTensor, TensorId};
use crate::{Error, Result};
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap, HashSet};

/// A graph of tensor operations.
///
/// No internal locking: concurrent mutation must be serialized by the
/// caller. A finalized graph is read-only and may be shared across threads.
#[derive(Debug, Default)]
pub struct Graph {
    /// Ops as node weights; edges carry the tensor id they transport.
    graph: DiGraph<Op, TensorId>,

    /// Lookup table: op id -> node index.
    op_index: HashMap<OpId, NodeIndex>,

    /// Refined descriptor of every referenced tensor.
    tensors: BTreeMap<TensorId, LogicalTensor>,

    /// Lookup table: tensor id -> producing op.
    producers: HashMap<TensorId, OpId>,

    /// Lookup table: tensor id -> consuming ops (in insertion order).
    consumers: HashMap<TensorId, Vec<OpId>>,

    /// Declared graph inputs.
    inputs: Vec<TensorId>,

    /// Declared graph outputs.
    outputs: Vec<TensorId>,

    finalized: bool,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Construction ──

    /// Declare a graph input.
    ///
    /// Declaring the same input twice is a no-op (the descriptors are
    /// merged).
    pub fn add_input(&mut self, tensor: LogicalTensor) -> Result<()> {
        self.ensure_mutable()?;

        if let Some(producer) = self.producers.get(&tensor.id) {
            return Err(Error::InvalidGraph(format!(
                "Tensor {} is produced by op {} and cannot be a graph input",
                tensor.id, producer
            )));
        }
        let refined = self.check_descriptor(&tensor, None)?;
        self.tensors.insert(tensor.id, refined);
        if !self.inputs.contains(&tensor.id) {
            self.inputs.push(tensor.id);
        }
        Ok(())
    }

    /// Declare a graph output.
    pub fn add_output(&mut self, id: TensorId) -> Result<()> {
        self.ensure_mutable()?;
        if !self.outputs.contains(&id) {
            self.outputs.push(id);
        }
        Ok(())
    }

    /// Add an op to the graph.
    ///
    /// # Errors
    ///
    /// - `GraphFinalized` after `finalize()`.
    /// - `InvalidGraph` if the op id is taken, a tensor conflicts with an
    ///   existing descriptor of the same id, an output is already produced
    ///   (or is a graph input), or the op would close a cycle.
    ///
    /// The graph is left unchanged when an error is returned.
    pub fn add_op(&mut self, op: Op) -> Result<OpId> {
        self.ensure_mutable()?;

        if self.op_index.contains_key(&op.id()) {
            return Err(Error::InvalidGraph(format!("Duplicate op id {}", op.id())));
        }

        // Descriptor consistency, staged so a failure leaves the graph intact
        let mut staged: BTreeMap<TensorId, LogicalTensor> = BTreeMap::new();
        for tensor in op.inputs().iter().chain(op.outputs()) {
            let refined = self.check_descriptor(tensor, staged.get(&tensor.id))?;
            staged.insert(tensor.id, refined);
        }

        // Single-producer property
        let mut seen_outputs = HashSet::new();
        for out in op.output_ids() {
            if !seen_outputs.insert(out) {
                return Err(Error::InvalidGraph(format!(
                    "Op {} lists output {} more than once",
                    op.id(),
                    out
                )));
            }
            if let Some(producer) = self.producers.get(&out) {
                return Err(Error::InvalidGraph(format!(
                    "Tensor {} is already produced by op {}",
                    out, producer
                )));
            }
            if self.inputs.contains(&out) {
                return Err(Error::InvalidGraph(format!(
                    "Tensor {out} is a graph input and cannot be produced by op {}",
                    op.id()
                )));
            }
        }

        if self.would_create_cycle(&op) {
            return Err(Error::InvalidGraph(format!(
                "Adding op {} ({}) would create a cycle",
                op.id(),
                op.kind()
            )));
        }

        // All checks passed: commit
        let op_id = op.id();
        let input_ids: Vec<TensorId> = op.input_ids().collect();
        let output_ids: Vec<TensorId> = op.output_ids().collect();
        let node = self.graph.add_node(op);
        self.op_index.insert(op_id, node);
        self.tensors.extend(staged);

        for &input in &input_ids {
            let consumers = self.consumers.entry(input).or_default();
            if !consumers.contains(&op_id) {
                consumers.push(op_id);
            }
            if let Some(&producer) = self.producers.get(&input) {
                self.graph.add_edge(self.op_index[&producer], node, input);
            }
        }

        for &output in &output_ids {
            self.producers.insert(output, op_id);
            for consumer in self.consumers.get(&output).cloned().unwrap_or_default() {
                self.graph.add_edge(node, self.op_index[&consumer], output);
            }
        }

        tracing::trace!(op = op_id, "op added");
        Ok(op_id)
    }

    /// Validate the graph and freeze it.
    ///
    /// # Errors
    ///
    /// - `GraphFinalized` if already finalized.
    /// - `InvalidGraph` if a referenced tensor has no producer and is not a
    ///   declared input, or a declared output is never produced.
    pub fn finalize(&mut self) -> Result<()> {
        self.ensure_mutable()?;

        for id in self.tensors.keys() {
            if !self.producers.contains_key(id) && !self.inputs.contains(id) {
                return Err(Error::InvalidGraph(format!(
                    "Tensor {id} has no producer and is not a graph input"
                )));
            }
        }

        for id in &self.outputs {
            if !self.producers.contains_key(id) {
                return Err(Error::InvalidGraph(format!(
                    "Graph output {id} is never produced"
                )));
            }
        }

        self.finalized = true;
        tracing::debug!(
            num_ops = self.op_count(),
            num_tensors = self.tensors.len(),
            "graph finalized"
        );
        Ok(())
    }

    // ── Queries ──

    /// Check if the graph has been finalized.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Get an op by id.
    pub fn op(&self, id: OpId) -> Option<&Op> {
        self.op_index.get(&id).map(|&node| &self.graph[node])
    }

    /// Iterate over all ops in insertion order.
    pub fn ops(&self) -> impl Iterator<Item = &Op> {
        self.graph.node_weights()
    }

    /// Get the number of ops in the graph.
    pub fn op_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the refined descriptor of a tensor.
    pub fn tensor(&self, id: TensorId) -> Option<&LogicalTensor> {
        self.tensors.get(&id)
    }

    /// Iterate over all referenced tensors in ascending id order.
    pub fn tensors(&self) -> impl Iterator<Item = &LogicalTensor> {
        self.tensors.values()
    }

    /// Get the op that produces a tensor, if any.
    pub fn producer(&self, id: TensorId) -> Option<OpId> {
        self.producers.get(&id).copied()
    }

    /// Get the ops that consume a tensor.
    pub fn consumers(&self, id: TensorId) -> &[OpId] {
        self.consumers.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Declared graph inputs.
    pub fn inputs(&self) -> &[TensorId] {
        &self.inputs
    }

    /// Declared graph outputs.
    pub fn outputs(&self) -> &[TensorId] {
        &self.outputs
    }

    pub fn is_input(&self, id: TensorId) -> bool {
        self.inputs.contains(&id)
    }

    pub fn is_output(&self, id: TensorId) -> bool {
        self.outputs.contains(&id)
    }

    /// Ops that directly consume an output of `id`, ascending, deduplicated.
    pub fn successors(&self, id: OpId) -> Vec<OpId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Ops that directly produce an input of `id`, ascending, deduplicated.
    pub fn predecessors(&self, id: OpId) -> Vec<OpId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Check if there is a dependency path from `from` to `to`.
    ///
    /// An op trivially reaches itself.
    pub fn reaches(&self, from: OpId, to: OpId) -> bool {
        match (self.op_index.get(&from), self.op_index.get(&to)) {
            (Some(&a), Some(&b)) => has_path_connecting(&self.graph, a, b, None),
            _ => false,
        }
    }

    /// Check if op `a` (transitively) depends on op `b`.
    pub fn depends_on(&self, a: OpId, b: OpId) -> bool {
        a != b && self.reaches(b, a)
    }

    /// Topological order, ties broken by ascending op id.
    pub fn topological_order(&self) -> Vec<OpId> {
        self.topological_order_by_key(|op| op.id())
    }

    /// Topological order with ties broken by the smallest `key`.
    ///
    /// Kahn's algorithm over a min-heap, so the order is deterministic for a
    /// given graph and key.
    pub fn topological_order_by_key<K: Ord>(&self, key: impl Fn(&Op) -> K) -> Vec<OpId> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|node| {
                let degree = self
                    .graph
                    .edges_directed(node, Direction::Incoming)
                    .count();
                (node, degree)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<(K, NodeIndex)>> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&node, _)| Reverse((key(&self.graph[node]), node)))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, node))) = ready.pop() {
            order.push(self.graph[node].id());
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                let target = edge.target();
                if let Some(degree) = in_degree.get_mut(&target) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((key(&self.graph[target]), target)));
                    }
                }
            }
        }

        order
    }

    // ── Internals ──

    fn ensure_mutable(&self) -> Result<()> {
        if self.finalized {
            Err(Error::GraphFinalized)
        } else {
            Ok(())
        }
    }

    /// Check `tensor` against the recorded (and staged) descriptor of the
    /// same id and return the refined result.
    fn check_descriptor(
        &self,
        tensor: &LogicalTensor,
        staged: Option<&LogicalTensor>,
    ) -> Result<LogicalTensor> {
        let mut refined = tensor.clone();
        for existing in [self.tensors.get(&tensor.id), staged].into_iter().flatten() {
            if !existing.is_compatible_with(&refined) {
                return Err(Error::InvalidGraph(format!(
                    "Tensor {} is described inconsistently: {:?} vs {:?}",
                    tensor.id, existing, tensor
                )));
            }
            refined = existing.refine(&refined);
        }
        Ok(refined)
    }

    /// An op closes a cycle if it consumes its own output, or if an existing
    /// consumer of one of its outputs can reach a producer of one of its
    /// inputs.
    fn would_create_cycle(&self, op: &Op) -> bool {
        let outputs: HashSet<TensorId> = op.output_ids().collect();
        if op.input_ids().any(|id| outputs.contains(&id)) {
            return true;
        }

        let input_producers: Vec<NodeIndex> = op
            .input_ids()
            .filter_map(|id| self.producers.get(&id))
            .map(|producer| self.op_index[producer])
            .collect();
        let output_consumers: Vec<NodeIndex> = op
            .output_ids()
            .flat_map(|id| self.consumers(id).iter())
            .map(|consumer| self.op_index[consumer])
            .collect();

        output_consumers.iter().any(|&consumer| {
            input_producers
                .iter()
                .any(|&producer| has_path_connecting(&self.graph, consumer, producer, None))
        })
    }

    fn neighbors(&self, id: OpId, direction: Direction) -> Vec<OpId> {
        let Some(&node) = self.op_index.get(&id) else {
            return Vec::new();
        };
        let mut ids: Vec<OpId> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|n| self.graph[n].id())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
