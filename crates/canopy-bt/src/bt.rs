use canopy_core::{Agent, BtStatus, NodeHash};
use canopy_tools::TraceEvent;
use canopy_tree::{Forest, Tree};

use crate::behaviors::Behaviors;
use crate::blackboard::Blackboard;
use crate::config::HandlerConfig;

/// The node lifecycle.
///
/// `tick` is the only entry point callers use: it opens the node if it is
/// not already running, updates it, and then either records it as running
/// or closes it. `open`/`update`/`close` are the per-kind hooks.
pub trait Tickable {
    fn tick<A: Agent>(&self, tree: &Tree, cx: &mut TickCx<'_, A>) -> BtStatus;

    fn open<A: Agent>(&self, tree: &Tree, cx: &mut TickCx<'_, A>);

    fn update<A: Agent>(&self, tree: &Tree, cx: &mut TickCx<'_, A>) -> BtStatus;

    fn close<A: Agent>(&self, tree: &Tree, cx: &mut TickCx<'_, A>);

    /// Seed this node's instance state (kept if present unless `override_`).
    fn on_blackboard_setup(&self, tree: &Tree, blackboard: &mut Blackboard, override_: bool);
}

/// Everything one handler tick can touch.
pub struct TickCx<'a, A: Agent> {
    pub(crate) forest: &'a Forest,
    pub(crate) agent: &'a mut A,
    pub(crate) bb: &'a mut Blackboard,
    pub(crate) behaviors: &'a Behaviors<A>,
    pub(crate) config: &'a HandlerConfig,
    pub(crate) steps: u64,
    pub(crate) depth: u32,
    exhausted: bool,
}

impl<'a, A: Agent> TickCx<'a, A> {
    pub fn new(
        forest: &'a Forest,
        agent: &'a mut A,
        bb: &'a mut Blackboard,
        behaviors: &'a Behaviors<A>,
        config: &'a HandlerConfig,
    ) -> Self {
        Self {
            forest,
            agent,
            bb,
            behaviors,
            config,
            steps: 0,
            depth: 0,
            exhausted: false,
        }
    }

    pub fn blackboard(&self) -> &Blackboard {
        self.bb
    }

    /// Node ticks taken so far in this handler tick.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Count one node tick against the budget. `false` once it is spent.
    pub(crate) fn take_step(&mut self, node: &NodeHash) -> bool {
        self.steps += 1;
        match self.config.max_steps_per_tick {
            Some(max) if self.steps > max => {
                if !self.exhausted {
                    self.exhausted = true;
                    tracing::warn!(
                        agent = self.bb.agent(),
                        node = %node,
                        max,
                        "step budget exhausted"
                    );
                    self.bb
                        .globals
                        .errors
                        .push(format!("step budget of {max} exhausted at node {node}"));
                }
                false
            }
            _ => true,
        }
    }

    /// Record an execution problem and yield `Error`.
    pub(crate) fn fail(&mut self, node: &NodeHash, message: String) -> BtStatus {
        tracing::warn!(agent = self.bb.agent(), node = %node, "{message}");
        self.bb.globals.errors.push(message);
        BtStatus::Error
    }

    pub(crate) fn emit(&mut self, tag: &'static str, node: &NodeHash, detail: impl Into<String>) {
        let event = TraceEvent::new(self.bb.tick_count(), tag)
            .with_node(node.clone())
            .with_detail(detail);
        self.bb.tracer.emit(event);
    }

    pub(crate) fn lifecycle(&mut self, tag: &'static str, node: &NodeHash, name: &str) {
        tracing::trace!(agent = self.bb.agent(), node = %node, name, "{tag}");
        if self.config.trace_lifecycle {
            self.emit(tag, node, name.to_string());
        }
    }
}
