//! Greedy fusion partitioner.
//!
//! Ops are visited in topological order. Each op not yet claimed seeds a
//! candidate, which then grows by absorbing direct consumers of its members
//! as long as the backend approves the fusion and every input of the new op
//! is already available. Availability keeps the candidate convex: the set
//! of claimed ops is closed under producers, so an input produced outside
//! the candidate never depends on a member. A candidate is sealed into a
//! [`Partition`] if it holds two or more ops, or if its single op is
//! approved to stand alone.

use basalt_core::{Backend, Error, FusionCtx, Graph, OpId, Partition, PartitionPolicy, Result};
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::Arc;

/// Order in which a growth step considers eligible ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    #[default]
    AscendingId,
    DescendingId,
}

/// Partitioner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartitionerConfig {
    /// Fusion or one-op-per-partition.
    pub policy: PartitionPolicy,

    /// Order of eligible ops within a growth step.
    pub tie_break: TieBreak,

    /// Upper bound on ops per partition (`None` = unbounded).
    pub max_partition_ops: Option<usize>,
}

impl PartitionerConfig {
    pub fn with_policy(mut self, policy: PartitionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_max_partition_ops(mut self, max: usize) -> Self {
        self.max_partition_ops = Some(max.max(1));
        self
    }
}

/// Result of a partitioning pass.
#[derive(Debug, Clone, Default)]
pub struct Partitioning {
    /// Sealed partitions, ids sequential from 0.
    pub partitions: Vec<Arc<Partition>>,

    /// Ops no partition claimed, ascending.
    pub unpartitioned: Vec<OpId>,
}

impl Partitioning {
    /// Find the partition containing an op.
    pub fn partition_of(&self, op: OpId) -> Option<&Arc<Partition>> {
        self.partitions.iter().find(|p| p.contains_op(op))
    }

    /// Number of sealed partitions.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Render the partitioning as Graphviz DOT.
    pub fn to_dot(&self, graph: &Graph) -> String {
        crate::dot::to_partition_dot(graph, self)
    }
}

/// Greedy fusion partitioner.
#[derive(Debug, Clone, Default)]
pub struct Partitioner {
    config: PartitionerConfig,
}

impl Partitioner {
    /// Create a partitioner with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a partitioner with an explicit configuration.
    pub fn with_config(config: PartitionerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PartitionerConfig {
        &self.config
    }

    /// Partition a finalized graph.
    ///
    /// The result depends only on the graph, the backend's predicate, and
    /// the configuration; repeated runs give identical partitionings.
    ///
    /// # Errors
    ///
    /// Returns `NotFinalized` if the graph is still under construction.
    #[tracing::instrument(skip_all, fields(num_ops = graph.op_count(), backend = backend.name()))]
    pub fn partition(&self, graph: &Graph, backend: &dyn Backend) -> Result<Partitioning> {
        if !graph.is_finalized() {
            return Err(Error::NotFinalized);
        }

        let cx = FusionCtx::new(graph);
        let order = match self.config.tie_break {
            TieBreak::AscendingId => graph.topological_order(),
            TieBreak::DescendingId => graph.topological_order_by_key(|op| Reverse(op.id())),
        };

        let mut processed: HashSet<OpId> = HashSet::new();
        let mut result = Partitioning::default();

        for seed_id in order {
            if processed.contains(&seed_id) {
                continue;
            }
            let Some(seed) = graph.op(seed_id) else {
                continue;
            };

            let mut candidate = Candidate::new(seed_id);
            if self.config.policy == PartitionPolicy::Fusion {
                self.grow(&mut candidate, graph, backend, &cx, &processed);
            }

            let sealed = candidate.members.len() >= 2 || backend.can_fuse(seed, seed, &cx);
            processed.extend(candidate.members.iter().copied());

            if sealed {
                let partition = Partition::seal(
                    result.partitions.len(),
                    self.config.policy,
                    graph,
                    &candidate.members,
                )?;
                tracing::debug!(
                    partition = partition.id(),
                    ops = ?partition.op_ids(),
                    inputs = ?partition.input_ids(),
                    outputs = ?partition.output_ids(),
                    "partition sealed"
                );
                result.partitions.push(Arc::new(partition));
            } else {
                tracing::trace!(op = seed_id, kind = %seed.kind(), "op left unpartitioned");
                result.unpartitioned.push(seed_id);
            }
        }

        result.unpartitioned.sort_unstable();
        tracing::debug!(
            num_partitions = result.partitions.len(),
            num_unpartitioned = result.unpartitioned.len(),
            "partitioning complete"
        );
        Ok(result)
    }

    fn grow(
        &self,
        candidate: &mut Candidate,
        graph: &Graph,
        backend: &dyn Backend,
        cx: &FusionCtx<'_>,
        processed: &HashSet<OpId>,
    ) {
        loop {
            if self.is_full(candidate) {
                return;
            }

            let mut eligible: Vec<OpId> = candidate
                .members
                .iter()
                .flat_map(|&member| graph.successors(member))
                .filter(|op| !candidate.contains(*op) && !processed.contains(op))
                .collect();
            eligible.sort_unstable();
            eligible.dedup();
            if self.config.tie_break == TieBreak::DescendingId {
                eligible.reverse();
            }

            let mut added = false;
            for op_id in eligible {
                if self.is_full(candidate) {
                    break;
                }
                // Re-validated against the candidate as it grows
                if candidate.contains(op_id)
                    || !can_join(candidate, op_id, graph, backend, cx, processed)
                {
                    continue;
                }
                tracing::trace!(op = op_id, seed = candidate.members[0], "op joins candidate");
                candidate.insert(op_id);
                added = true;
            }

            if !added {
                return;
            }
        }
    }

    fn is_full(&self, candidate: &Candidate) -> bool {
        self.config
            .max_partition_ops
            .is_some_and(|max| candidate.members.len() >= max)
    }
}

/// Partition a finalized graph with an explicit configuration.
pub fn partition(
    graph: &Graph,
    backend: &dyn Backend,
    config: PartitionerConfig,
) -> Result<Partitioning> {
    Partitioner::with_config(config).partition(graph, backend)
}

/// A partition under construction.
struct Candidate {
    members: Vec<OpId>,
    member_set: HashSet<OpId>,
}

impl Candidate {
    fn new(seed: OpId) -> Self {
        Self {
            members: vec![seed],
            member_set: HashSet::from([seed]),
        }
    }

    fn contains(&self, op: OpId) -> bool {
        self.member_set.contains(&op)
    }

    fn insert(&mut self, op: OpId) {
        if self.member_set.insert(op) {
            self.members.push(op);
        }
    }
}

/// Check whether `op_id` may join `candidate`.
fn can_join(
    candidate: &Candidate,
    op_id: OpId,
    graph: &Graph,
    backend: &dyn Backend,
    cx: &FusionCtx<'_>,
    processed: &HashSet<OpId>,
) -> bool {
    let Some(op) = graph.op(op_id) else {
        return false;
    };

    // Every input must be available: produced by a member, an earlier
    // candidate, or nobody (graph input)
    let available = op.input_ids().all(|input| match graph.producer(input) {
        Some(producer) => candidate.contains(producer) || processed.contains(&producer),
        None => true,
    });
    if !available {
        return false;
    }

    // Predicate against each member feeding this op
    let approved = candidate
        .members
        .iter()
        .filter_map(|&member| graph.op(member))
        .filter(|member| cx.feeds(member, op))
        .all(|member| backend.can_fuse(member, op, cx));
    if !approved {
        return false;
    }

    // Earlier candidates are sealed before this one seeds, so none of them
    // can depend on a member
    debug_assert!(
        op.input_ids()
            .filter_map(|input| graph.producer(input))
            .filter(|&producer| !candidate.contains(producer))
            .all(|producer| !candidate.members.iter().any(|&m| graph.reaches(m, producer))),
        "op {op_id} would re-enter candidate {:?}",
        candidate.members
    );
    true
}
