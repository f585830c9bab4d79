//! Tooling primitives for the canopy engine.
//!
//! Engine-agnostic and lightweight: Echo nodes and the tick lifecycle write
//! `TraceEvent`s here, and debug tooling reads them back out.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod trace;

pub use trace::{NullTraceSink, TraceEvent, TraceLog, TraceSink, Tracer, VecTraceSink};
