//! Behavior-tree execution built on `canopy-tree`.
//!
//! Trees are shared structure; everything an agent accumulates while
//! running one lives in its [`Blackboard`], owned by an [`AiHandler`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod behaviors;
pub mod blackboard;
pub mod bt;
pub mod config;
pub mod error;
pub mod handler;
pub mod nodes;

pub use behaviors::Behaviors;
pub use blackboard::{Blackboard, Globals, KindState, NodeState};
pub use bt::{TickCx, Tickable};
pub use canopy_core::BtStatus;
pub use config::{EngineConfig, HandlerConfig};
pub use error::{ResolutionError, TickError};
pub use handler::{tick_handlers, AiHandler};
