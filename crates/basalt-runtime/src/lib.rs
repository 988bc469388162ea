//! Execution of compiled Basalt partitions.
//!
//! A [`Stream`] is an ordered submission queue bound to one engine. Work is
//! submitted with [`execute`], which validates the caller's tensors against
//! the compiled boundary and returns without waiting; [`Stream::wait`] blocks
//! until everything submitted so far has run.
//!
//! # Example
//!
//! ```ignore
//! use basalt_runtime::{Stream, execute};
//!
//! let stream = Stream::new(Engine::cpu(0))?;
//! execute(&compiled, &stream, &[input], &[output.clone()])?;
//! stream.wait()?;
//! let result = output.to_vec::<f32>()?;
//! ```

mod execute;
mod stream;

pub use execute::execute;
pub use stream::{Stream, StreamId};
