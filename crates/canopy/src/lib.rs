//! Umbrella crate that re-exports the `canopy-*` building blocks.
//!
//! Most users want the default `full` feature and start from
//! [`bt::AiHandler`] with a [`tree::Forest`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

#[cfg(feature = "core")]
#[cfg_attr(docsrs, doc(cfg(feature = "core")))]
pub use canopy_core as core;

#[cfg(feature = "tools")]
#[cfg_attr(docsrs, doc(cfg(feature = "tools")))]
pub use canopy_tools as tools;

#[cfg(feature = "tree")]
#[cfg_attr(docsrs, doc(cfg(feature = "tree")))]
pub use canopy_tree as tree;

#[cfg(feature = "bt")]
#[cfg_attr(docsrs, doc(cfg(feature = "bt")))]
pub use canopy_bt as bt;

/// The names most programs need.
#[cfg(feature = "bt")]
#[cfg_attr(docsrs, doc(cfg(feature = "bt")))]
pub mod prelude {
    pub use canopy_bt::{AiHandler, Behaviors, Blackboard, EngineConfig, Globals, HandlerConfig};
    pub use canopy_core::{Agent, BtStatus, NodeHash, TreeId, TreeSelector};
    pub use canopy_tree::{Forest, NodeKind, ParallelSpec, Subtree, Tree};
}
