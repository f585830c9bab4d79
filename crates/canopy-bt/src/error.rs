use canopy_core::{TreeId, TreeSelector};
use canopy_tree::ValidationError;
use thiserror::Error;

/// `setup` could not bind a usable tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("no tree given, the agent declares no default and no tree is bound yet")]
    NoTree,

    #[error("tree {0} not found")]
    UnknownTree(TreeSelector),

    #[error("tree '{tree}' is restricted to agents of kind '{expected}', got '{found}'")]
    AgentMismatch {
        tree: String,
        expected: String,
        found: String,
    },

    #[error("tree is invalid: {0}")]
    Invalid(#[from] ValidationError),
}

/// `tick` was called on a handler that cannot run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickError {
    #[error("handler has no blackboard; call setup first")]
    NotSetUp,

    #[error("bound tree {0} is no longer in the forest")]
    TreeMissing(TreeId),
}
