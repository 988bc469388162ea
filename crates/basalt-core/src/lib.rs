//! Core graph IR, partition, and execution-contract types for Basalt.
//!
//! This crate provides the foundational abstractions that the other Basalt
//! crates build on:
//! - Tensor descriptors (`LogicalTensor`) and concrete buffers (`Tensor`)
//! - Graph nodes (`Op`) and the build-then-freeze `Graph`
//! - Sealed `Partition` snapshots and their `CompiledPartition` artifacts
//! - The `Backend` capability trait (fusibility predicate + execution)
//! - Opaque `Engine` handles

pub mod backend;
pub mod compiled;
pub mod engine;
pub mod graph;
pub mod op;
pub mod partition;
pub mod tensor;
pub mod types;

// Re-export commonly used types
pub use backend::{Backend, FusionCtx};
pub use compiled::CompiledPartition;
pub use engine::{Engine, EngineKind};
pub use graph::Graph;
pub use op::{AttributeValue, Op, OpId, OpKind};
pub use partition::{Partition, PartitionId, PartitionPolicy};
pub use tensor::{LogicalTensor, Tensor, TensorId};
pub use types::{DataType, Dim, Layout, PropertyKind, TensorShape};

/// Result type using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type shared by every Basalt crate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Graph is not finalized")]
    NotFinalized,

    #[error("Graph is finalized and can no longer be modified")]
    GraphFinalized,

    #[error("Unsupported partition: {0}")]
    UnsupportedPartition(String),

    #[error("Layout conflict: {0}")]
    LayoutConflict(String),

    #[error(
        "Tensor count mismatch: expected {expected_inputs} inputs / {expected_outputs} outputs, \
         got {got_inputs} inputs / {got_outputs} outputs{}",
        misplaced_suffix(.misplaced)
    )]
    TensorCountMismatch {
        expected_inputs: usize,
        expected_outputs: usize,
        got_inputs: usize,
        got_outputs: usize,
        /// Set when the counts agree but a tensor sits at the wrong position.
        misplaced: Option<Misplaced>,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// A supplied tensor whose id differs from the boundary tensor at its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Misplaced {
    /// `true` for the output list, `false` for the input list.
    pub output: bool,
    pub position: usize,
    pub expected: TensorId,
    pub got: TensorId,
}

fn misplaced_suffix(misplaced: &Option<Misplaced>) -> String {
    match misplaced {
        Some(m) => format!(
            "; {} {} is tensor {}, expected tensor {}",
            if m.output { "output" } else { "input" },
            m.position,
            m.got,
            m.expected
        ),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_mismatch_message() {
        let counts = Error::TensorCountMismatch {
            expected_inputs: 2,
            expected_outputs: 1,
            got_inputs: 1,
            got_outputs: 1,
            misplaced: None,
        };
        assert_eq!(
            counts.to_string(),
            "Tensor count mismatch: expected 2 inputs / 1 outputs, got 1 inputs / 1 outputs"
        );

        let order = Error::TensorCountMismatch {
            expected_inputs: 2,
            expected_outputs: 1,
            got_inputs: 2,
            got_outputs: 1,
            misplaced: Some(Misplaced { output: false, position: 0, expected: 0, got: 1 }),
        };
        assert!(order.to_string().ends_with("; input 0 is tensor 1, expected tensor 0"));
    }
}
