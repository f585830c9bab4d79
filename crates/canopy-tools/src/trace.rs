use std::borrow::Cow;
use std::sync::{Arc, Mutex};

use canopy_core::NodeHash;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A small trace event.
///
/// Plain data so it can be recorded during a tick and rendered later by
/// tooling. `tag` follows the `bt.<what>` convention (`bt.echo`, `bt.open`,
/// `bt.close`, `bt.abandon`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceEvent {
    pub tick: u64,
    pub tag: Cow<'static, str>,
    pub node: Option<NodeHash>,
    pub detail: String,
}

impl TraceEvent {
    pub fn new(tick: u64, tag: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tick,
            tag: tag.into(),
            node: None,
            detail: String::new(),
        }
    }

    pub fn with_node(mut self, node: NodeHash) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

pub trait TraceSink: Send {
    fn emit(&mut self, event: TraceEvent);
}

#[derive(Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn emit(&mut self, _event: TraceEvent) {}
}

/// Collects into a vector shared with the caller, so events stay readable
/// after the sink is boxed into a blackboard.
#[derive(Debug, Default, Clone)]
pub struct VecTraceSink {
    pub events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl VecTraceSink {
    pub fn snapshot(&self) -> Vec<TraceEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TraceSink for VecTraceSink {
    fn emit(&mut self, event: TraceEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceLog {
    pub events: Vec<TraceEvent>,
}

impl TraceLog {
    pub fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub fn with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a TraceEvent> + 'a {
        self.events.iter().filter(move |e| e.tag == tag)
    }
}

/// Per-blackboard trace channel: an optional in-memory log and an optional
/// user sink. With neither installed, `emit` only forwards to `tracing`.
#[derive(Default)]
pub struct Tracer {
    log: Option<TraceLog>,
    sink: Option<Box<dyn TraceSink>>,
}

impl Tracer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracer that records into an in-memory `TraceLog`.
    pub fn recording() -> Self {
        Self {
            log: Some(TraceLog::default()),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn TraceSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn set_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.sink = sink;
    }

    pub fn is_collecting(&self) -> bool {
        self.log.is_some() || self.sink.is_some()
    }

    pub fn log(&self) -> Option<&TraceLog> {
        self.log.as_ref()
    }

    pub fn take_log(&mut self) -> Option<TraceLog> {
        self.log.as_mut().map(std::mem::take)
    }

    pub fn emit(&mut self, event: TraceEvent) {
        tracing::trace!(
            tick = event.tick,
            tag = %event.tag,
            node = event.node.as_ref().map(|n| n.as_str()).unwrap_or(""),
            detail = %event.detail,
            "bt trace"
        );
        if let Some(log) = self.log.as_mut() {
            log.push(event.clone());
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.emit(event);
        }
    }
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer")
            .field("log", &self.log)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
