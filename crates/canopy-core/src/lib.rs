//! Shared vocabulary for the canopy behavior-tree engine.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod agent;
pub mod ids;
pub mod rng;
pub mod status;

pub use agent::Agent;
pub use ids::{NodeHash, NodeRef, TreeId, TreeSelector};
pub use rng::{DeterministicRng, SplitMix64};
pub use status::BtStatus;
