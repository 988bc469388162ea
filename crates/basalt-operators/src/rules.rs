//! Fusion rules: the reference backend's fusibility predicate.

use basalt_core::{Op, OpKind};
use std::collections::HashSet;

/// Table-driven fusibility predicate.
///
/// A pair `(a, b)` where `b` consumes an output of `a` is approved if `a` is
/// an anchor and `b` a post-op, or both are chainable. An op paired with
/// itself is approved if its kind may stand alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionRules {
    anchors: HashSet<OpKind>,
    post_ops: HashSet<OpKind>,
    chainable: HashSet<OpKind>,
    standalone: HashSet<OpKind>,
}

impl FusionRules {
    /// Rules that approve every pair and every standalone op.
    pub fn permissive() -> Self {
        let all: HashSet<OpKind> = OpKind::ALL.iter().copied().collect();
        Self {
            anchors: all.clone(),
            post_ops: all.clone(),
            chainable: all.clone(),
            standalone: all,
        }
    }

    /// Rules that approve nothing.
    pub fn none() -> Self {
        Self {
            anchors: HashSet::new(),
            post_ops: HashSet::new(),
            chainable: HashSet::new(),
            standalone: HashSet::new(),
        }
    }

    /// Allow `kind` to start an anchor → post-op fusion.
    pub fn with_anchor(mut self, kind: OpKind) -> Self {
        self.anchors.insert(kind);
        self
    }

    /// Allow `kind` to follow an anchor.
    pub fn with_post_op(mut self, kind: OpKind) -> Self {
        self.post_ops.insert(kind);
        self
    }

    /// Allow `kind` in chains of chainable ops.
    pub fn with_chainable(mut self, kind: OpKind) -> Self {
        self.chainable.insert(kind);
        self
    }

    /// Allow `kind` to form a one-op partition.
    pub fn with_standalone(mut self, kind: OpKind) -> Self {
        self.standalone.insert(kind);
        self
    }

    /// Forbid `kind` from forming a one-op partition.
    pub fn without_standalone(mut self, kind: OpKind) -> Self {
        self.standalone.remove(&kind);
        self
    }

    /// Decide whether `b` may join `a`'s partition.
    pub fn approves(&self, a: &Op, b: &Op) -> bool {
        if a.id() == b.id() {
            return self.standalone.contains(&a.kind());
        }
        let (ka, kb) = (a.kind(), b.kind());
        (self.anchors.contains(&ka) && self.post_ops.contains(&kb))
            || (self.chainable.contains(&ka) && self.chainable.contains(&kb))
    }
}

impl Default for FusionRules {
    /// Convolution/MatMul absorb BiasAdd and elementwise post-ops, BiasAdd
    /// absorbs elementwise post-ops, and elementwise ops chain. Every real
    /// kind may stand alone.
    fn default() -> Self {
        let elementwise = OpKind::ALL.iter().copied().filter(OpKind::is_elementwise);
        let mut rules = Self::none()
            .with_anchor(OpKind::Convolution)
            .with_anchor(OpKind::MatMul)
            .with_anchor(OpKind::BiasAdd)
            .with_post_op(OpKind::BiasAdd);
        for kind in elementwise {
            rules = rules.with_post_op(kind).with_chainable(kind);
        }
        for &kind in OpKind::ALL {
            if !matches!(kind, OpKind::Wildcard | OpKind::End) {
                rules = rules.with_standalone(kind);
            }
        }
        rules
    }
}
