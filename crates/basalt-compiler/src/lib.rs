//! Partitioning and compilation for Basalt graphs.
//!
//! Two stages turn a finalized [`Graph`] into executable artifacts:
//! 1. **Partitioning** - [`Partitioner`] groups ops into fused partitions
//!    using the backend's fusibility predicate
//! 2. **Compilation** - [`PartitionCompiler`] checks boundary layouts and
//!    resolves `Any` layouts for a target engine
//!
//! # Example
//!
//! ```ignore
//! use basalt_compiler::{PartitionCompiler, Partitioner};
//! use basalt_core::Engine;
//!
//! let partitioning = Partitioner::default().partition(&graph, backend.as_ref())?;
//! let compiler = PartitionCompiler::new(backend.clone());
//! for partition in &partitioning.partitions {
//!     let compiled = compiler.compile(partition, Engine::cpu(0))?;
//!     println!("{:?}", compiled.inputs());
//! }
//! ```

pub mod compile;
pub mod dot;
pub mod partitioner;

pub use compile::{PartitionCompiler, compile};
pub use dot::to_partition_dot;
pub use partitioner::{Partitioner, PartitionerConfig, Partitioning, TieBreak, partition};

// Re-export commonly used types from basalt-core
pub use basalt_core::{Error, Graph, Partition, PartitionPolicy, Result};
