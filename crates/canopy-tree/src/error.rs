use canopy_core::{NodeHash, TreeId, TreeSelector};
use thiserror::Error;

/// A structural edit was rejected. The tree is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("no node {0} in this tree")]
    UnknownNode(NodeHash),

    #[error("no tree {0}")]
    UnknownTree(TreeSelector),

    #[error("'{name}' ({hash}) is a leaf and cannot take children")]
    LeafTarget { hash: NodeHash, name: String },

    #[error("'{name}' ({hash}) already has its single child")]
    TargetOccupied { hash: NodeHash, name: String },

    #[error("root nodes cannot be moved, copied, swapped or removed")]
    RootNode,

    #[error("node {0} is not registered in the source tree")]
    NotInSource(NodeHash),

    #[error("parent of {0} is not a composite; its children cannot be reordered")]
    NotComposite(NodeHash),

    #[error("moving {0} there would make it its own ancestor")]
    WouldCycle(NodeHash),

    #[error("cannot interpose {0} above itself")]
    SelfInterpose(NodeHash),

    #[error("malformed subtree: {0}")]
    MalformedSubtree(String),

    #[error("{kind} cannot hold {children} children")]
    ArityMismatch { kind: &'static str, children: usize },

    #[error("cross-tree operation needs two different trees, got {0} twice")]
    SameTree(TreeId),
}

/// The tree is structurally incomplete and cannot be executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{kind} '{name}' ({hash}) has no child")]
    MissingChild {
        hash: NodeHash,
        name: String,
        kind: &'static str,
    },
}
