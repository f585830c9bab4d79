use canopy_core::{NodeHash, TreeSelector};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How many children a node kind holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Leaf,
    Single,
    Many,
}

/// Static configuration of a Parallel composite; copied into each agent's
/// blackboard at setup.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParallelSpec {
    /// Index of the child whose terminal result ends the Parallel at once.
    pub primary_child: Option<usize>,
    pub req_successes: Option<u32>,
    pub req_failures: Option<u32>,
    /// Result when every child finished without meeting a threshold.
    pub default_success: bool,
}

impl Default for ParallelSpec {
    fn default() -> Self {
        Self {
            primary_child: None,
            req_successes: None,
            req_failures: None,
            default_success: true,
        }
    }
}

/// The closed set of node variants.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum NodeKind {
    Root,

    Sequence,
    Selector,
    MemSequence,
    MemSelector,
    ProbSequence,
    ProbSelector,
    Parallel(ParallelSpec),

    Inverter,
    Succeeder,
    Failer,
    Repeater { repeats: u32 },
    Limiter { limit: u32 },
    Allocator { resources: Vec<String> },
    Verifier { predicate: String },
    EchoDecorator { message: String },

    Condition { predicate: String },
    Command { action: String },
    Transition { target: Option<TreeSelector> },
    EchoLeaf { message: String, succeed: bool },
}

impl NodeKind {
    pub fn arity(&self) -> Arity {
        match self {
            NodeKind::Sequence
            | NodeKind::Selector
            | NodeKind::MemSequence
            | NodeKind::MemSelector
            | NodeKind::ProbSequence
            | NodeKind::ProbSelector
            | NodeKind::Parallel(_) => Arity::Many,
            NodeKind::Root
            | NodeKind::Inverter
            | NodeKind::Succeeder
            | NodeKind::Failer
            | NodeKind::Repeater { .. }
            | NodeKind::Limiter { .. }
            | NodeKind::Allocator { .. }
            | NodeKind::Verifier { .. }
            | NodeKind::EchoDecorator { .. } => Arity::Single,
            NodeKind::Condition { .. }
            | NodeKind::Command { .. }
            | NodeKind::Transition { .. }
            | NodeKind::EchoLeaf { .. } => Arity::Leaf,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Root => "Root",
            NodeKind::Sequence => "Sequence",
            NodeKind::Selector => "Selector",
            NodeKind::MemSequence => "MemSequence",
            NodeKind::MemSelector => "MemSelector",
            NodeKind::ProbSequence => "ProbSequence",
            NodeKind::ProbSelector => "ProbSelector",
            NodeKind::Parallel(_) => "Parallel",
            NodeKind::Inverter => "Inverter",
            NodeKind::Succeeder => "Succeeder",
            NodeKind::Failer => "Failer",
            NodeKind::Repeater { .. } => "Repeater",
            NodeKind::Limiter { .. } => "Limiter",
            NodeKind::Allocator { .. } => "Allocator",
            NodeKind::Verifier { .. } => "Verifier",
            NodeKind::EchoDecorator { .. } => "EchoDecorator",
            NodeKind::Condition { .. } => "Condition",
            NodeKind::Command { .. } => "Command",
            NodeKind::Transition { .. } => "Transition",
            NodeKind::EchoLeaf { .. } => "EchoLeaf",
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, NodeKind::Root)
    }

    /// The tree another tree is grafted from, for Transition leaves.
    pub fn transition_target(&self) -> Option<&TreeSelector> {
        match self {
            NodeKind::Transition { target } => target.as_ref(),
            _ => None,
        }
    }

    /// Called after a child was inserted at `index`.
    pub fn on_add_child(&mut self, index: usize) {
        if let NodeKind::Parallel(spec) = self {
            if let Some(primary) = spec.primary_child.as_mut() {
                if *primary >= index {
                    *primary += 1;
                }
            }
        }
    }

    /// Called after the child at `index` was removed.
    pub fn on_remove_child(&mut self, index: usize) {
        if let NodeKind::Parallel(spec) = self {
            match spec.primary_child {
                Some(primary) if primary == index => spec.primary_child = None,
                Some(primary) if primary > index => spec.primary_child = Some(primary - 1),
                _ => {}
            }
        }
    }

    /// Called after the children at `a` and `b` traded places.
    pub fn on_swap_children(&mut self, a: usize, b: usize) {
        if let NodeKind::Parallel(spec) = self {
            if spec.primary_child == Some(a) {
                spec.primary_child = Some(b);
            } else if spec.primary_child == Some(b) {
                spec.primary_child = Some(a);
            }
        }
    }

    /// Called after the child at `index` was replaced by another node.
    pub fn on_replace_child(&mut self, index: usize) {
        self.on_remove_child(index);
        self.on_add_child(index);
    }

    /// Called after a child moved from `from` to `to` among its siblings.
    pub fn on_move_child(&mut self, from: usize, to: usize) {
        if let NodeKind::Parallel(spec) = self {
            if let Some(primary) = spec.primary_child {
                spec.primary_child = Some(if primary == from {
                    to
                } else {
                    // Same shift as a removal at `from` followed by an insert at `to`.
                    let after_remove = if primary > from { primary - 1 } else { primary };
                    if after_remove >= to {
                        after_remove + 1
                    } else {
                        after_remove
                    }
                });
            }
        }
    }
}

/// One registered node of a [`Tree`](crate::Tree).
///
/// `parent` is a back-reference by hash, not an ownership edge; nodes never
/// refer to the tree that owns them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    pub(crate) name: String,
    pub(crate) hash: NodeHash,
    pub(crate) parent: Option<NodeHash>,
    pub(crate) children: Vec<NodeHash>,
    pub(crate) weight: f64,
    pub(crate) kind: NodeKind,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> &NodeHash {
        &self.hash
    }

    pub fn parent(&self) -> Option<&NodeHash> {
        self.parent.as_ref()
    }

    pub fn children(&self) -> &[NodeHash] {
        &self.children
    }

    /// Static probabilistic weight used when a parent draws among its children.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn arity(&self) -> Arity {
        self.kind.arity()
    }

    pub fn is_root(&self) -> bool {
        self.kind.is_root()
    }
}
