//! Behavior-tree structure for the canopy engine.
//!
//! A [`Tree`] owns a registry of [`Node`]s keyed by short, tree-scoped
//! [`NodeHash`]es. Structural edits (`add`, `shift`, `swap`, `interpose`,
//! `remove`) validate every precondition before touching the graph, so a
//! failed edit leaves the tree exactly as it was. Detached nodes travel as
//! owned [`Subtree`] values and are rehashed on arrival where their old
//! hash would collide or belongs to another tree.
//!
//! [`NodeHash`]: canopy_core::NodeHash

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod error;
pub mod forest;
pub mod hash;
pub mod mutate;
pub mod node;
pub mod subtree;
pub mod tree;

pub use error::{TopologyError, ValidationError};
pub use forest::{Forest, SharedForest};
pub use hash::HashConfig;
pub use mutate::NodeOrigin;
pub use node::{Arity, Node, NodeKind, ParallelSpec};
pub use subtree::Subtree;
pub use tree::Tree;
