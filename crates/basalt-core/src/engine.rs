//! Opaque device/runtime context handles.

use std::fmt;

/// Kind of device an engine targets.
///
/// The encoding of `Custom` is backend-defined and passed through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngineKind {
    Cpu,
    Gpu,
    Custom(u32),
}

/// Handle identifying a device/runtime execution context.
///
/// Identity is the `(kind, index)` pair. An engine owns no graph or
/// partition data; partitions are compiled *against* an engine and streams
/// are bound to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Engine {
    kind: EngineKind,
    index: u32,
}

impl Engine {
    /// Create an engine handle.
    pub fn new(kind: EngineKind, index: u32) -> Self {
        Self { kind, index }
    }

    /// Shorthand for a CPU engine.
    pub fn cpu(index: u32) -> Self {
        Self::new(EngineKind::Cpu, index)
    }

    /// Shorthand for a GPU engine.
    pub fn gpu(index: u32) -> Self {
        Self::new(EngineKind::Gpu, index)
    }

    /// Get the device kind.
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Get the device index.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EngineKind::Cpu => write!(f, "cpu:{}", self.index),
            EngineKind::Gpu => write!(f, "gpu:{}", self.index),
            EngineKind::Custom(code) => write!(f, "custom{}:{}", code, self.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_identity() {
        assert_eq!(Engine::cpu(0), Engine::new(EngineKind::Cpu, 0));
        assert_ne!(Engine::cpu(0), Engine::cpu(1));
        assert_ne!(Engine::cpu(0), Engine::gpu(0));
    }

    #[test]
    fn test_engine_display() {
        assert_eq!(Engine::gpu(2).to_string(), "gpu:2");
        assert_eq!(Engine::new(EngineKind::Custom(9), 1).to_string(), "custom9:1");
    }
}
