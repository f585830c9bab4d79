//! Per-agent execution state.
//!
//! A blackboard refers to its tree and agent by id only. Node-instance state
//! lives in `nodes`, keyed by hash; hashes carry their tree's scope, so
//! nodes reached through Transitions share the same map without clashing.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use canopy_core::rng::derive_seed;
use canopy_core::{BtStatus, NodeHash, NodeRef, SplitMix64, TreeId};
use canopy_tools::{TraceLog, TraceSink, Tracer};
use canopy_tree::{Forest, Node, NodeKind, Tree};
use serde::{Deserialize, Serialize};

/// Weight used when a configured weight is negative or not finite.
pub const FALLBACK_WEIGHT: f64 = 1.0;

pub(crate) fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight >= 0.0 {
        weight
    } else {
        FALLBACK_WEIGHT
    }
}

/// Shared, agent-wide values that every node of the tick can see.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Globals {
    /// Resource name to "taken". Allocator nodes wait while any of theirs
    /// is taken; commands claim and release them.
    pub resources: BTreeMap<String, bool>,
    /// Execution problems recorded during ticks (unknown behaviors, budget
    /// exhaustion, dangling transitions).
    pub errors: Vec<String>,
    /// Free-form values for commands and conditions.
    pub values: BTreeMap<String, serde_json::Value>,
}

impl Globals {
    pub fn is_taken(&self, resource: &str) -> bool {
        self.resources.get(resource).copied().unwrap_or(false)
    }

    pub fn claim(&mut self, resource: impl Into<String>) {
        self.resources.insert(resource.into(), true);
    }

    pub fn release(&mut self, resource: &str) {
        if let Some(taken) = self.resources.get_mut(resource) {
            *taken = false;
        }
    }
}

/// Kind-specific part of a node's instance state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KindState {
    Plain,
    Mem {
        running_child: usize,
    },
    Prob {
        child_weights: BTreeMap<NodeHash, f64>,
        /// `(child index, weight)` pairs not yet drawn this activation.
        avail_weights: Vec<(usize, f64)>,
        running_child: Option<usize>,
    },
    Parallel {
        /// Result of each child this activation; `None` until first ticked.
        states: Vec<Option<BtStatus>>,
        primary_child: Option<usize>,
        req_successes: Option<u32>,
        req_failures: Option<u32>,
        default_success: bool,
    },
    Repeater {
        repeats: u32,
        count: u32,
    },
    Limiter {
        limit: u32,
        remaining: u32,
    },
}

impl KindState {
    /// `true` if this state has the shape `kind` executes with.
    pub fn fits(&self, kind: &NodeKind) -> bool {
        match self {
            KindState::Mem { .. } => matches!(kind, NodeKind::MemSequence | NodeKind::MemSelector),
            KindState::Prob { .. } => {
                matches!(kind, NodeKind::ProbSequence | NodeKind::ProbSelector)
            }
            KindState::Parallel { .. } => matches!(kind, NodeKind::Parallel(_)),
            KindState::Repeater { .. } => matches!(kind, NodeKind::Repeater { .. }),
            KindState::Limiter { .. } => matches!(kind, NodeKind::Limiter { .. }),
            KindState::Plain => !matches!(
                kind,
                NodeKind::MemSequence
                    | NodeKind::MemSelector
                    | NodeKind::ProbSequence
                    | NodeKind::ProbSelector
                    | NodeKind::Parallel(_)
                    | NodeKind::Repeater { .. }
                    | NodeKind::Limiter { .. }
            ),
        }
    }
}

/// Instance state of one node for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub weight: f64,
    pub running: bool,
    /// Times the node has been ticked.
    pub ticks: u64,
    /// Observers interested in this node (used by external tooling).
    pub watchers: BTreeSet<String>,
    pub kind: KindState,
}

impl NodeState {
    /// Defaults for `node`, derived from its kind's static configuration.
    pub fn for_node(tree: &Tree, node: &Node) -> Self {
        let kind = match node.kind() {
            NodeKind::MemSequence | NodeKind::MemSelector => KindState::Mem { running_child: 0 },
            NodeKind::ProbSequence | NodeKind::ProbSelector => KindState::Prob {
                child_weights: node
                    .children()
                    .iter()
                    .map(|c| {
                        let w = tree.get(c).map(Node::weight).unwrap_or(FALLBACK_WEIGHT);
                        (c.clone(), sanitize_weight(w))
                    })
                    .collect(),
                avail_weights: Vec::new(),
                running_child: None,
            },
            NodeKind::Parallel(spec) => KindState::Parallel {
                states: Vec::new(),
                primary_child: spec.primary_child,
                req_successes: spec.req_successes,
                req_failures: spec.req_failures,
                default_success: spec.default_success,
            },
            NodeKind::Repeater { repeats } => KindState::Repeater {
                repeats: *repeats,
                count: 0,
            },
            NodeKind::Limiter { limit } => KindState::Limiter {
                limit: *limit,
                remaining: *limit,
            },
            _ => KindState::Plain,
        };
        Self {
            weight: sanitize_weight(node.weight()),
            running: false,
            ticks: 0,
            watchers: BTreeSet::new(),
            kind,
        }
    }

    /// Refresh the fields copied from `node`'s kind, keeping progress.
    ///
    /// A Limiter whose limit changed keeps the number of uses already spent.
    pub fn sync_config(&mut self, node: &Node) {
        match (&mut self.kind, node.kind()) {
            (
                KindState::Parallel {
                    primary_child,
                    req_successes,
                    req_failures,
                    default_success,
                    ..
                },
                NodeKind::Parallel(spec),
            ) => {
                *primary_child = spec.primary_child;
                *req_successes = spec.req_successes;
                *req_failures = spec.req_failures;
                *default_success = spec.default_success;
            }
            (KindState::Repeater { repeats, .. }, NodeKind::Repeater { repeats: configured }) => {
                *repeats = *configured;
            }
            (KindState::Limiter { limit, remaining }, NodeKind::Limiter { limit: configured }) => {
                if *limit != *configured {
                    let spent = limit.saturating_sub(*remaining);
                    *limit = *configured;
                    *remaining = configured.saturating_sub(spent);
                }
            }
            _ => {}
        }
    }

    /// Resume index of a Mem composite or the running child of a Prob one.
    pub fn running_child(&self) -> Option<usize> {
        match &self.kind {
            KindState::Mem { running_child } => Some(*running_child),
            KindState::Prob { running_child, .. } => *running_child,
            _ => None,
        }
    }

    /// Weight a Prob composite gives `child`.
    pub fn child_weight(&self, child: &NodeHash) -> Option<f64> {
        match &self.kind {
            KindState::Prob { child_weights, .. } => child_weights.get(child).copied(),
            _ => None,
        }
    }

    /// Override the weight a Prob composite gives `child`. Returns `false`
    /// for other kinds.
    pub fn set_child_weight(&mut self, child: NodeHash, weight: f64) -> bool {
        match &mut self.kind {
            KindState::Prob { child_weights, .. } => {
                child_weights.insert(child, sanitize_weight(weight));
                true
            }
            _ => false,
        }
    }

    /// Children a Prob composite can still draw this activation.
    pub fn avail_weights(&self) -> &[(usize, f64)] {
        match &self.kind {
            KindState::Prob { avail_weights, .. } => avail_weights,
            _ => &[],
        }
    }

    /// Completed child runs of a Repeater.
    pub fn repeat_count(&self) -> Option<u32> {
        match &self.kind {
            KindState::Repeater { count, .. } => Some(*count),
            _ => None,
        }
    }

    /// Uses a Limiter has left.
    pub fn remaining(&self) -> Option<u32> {
        match &self.kind {
            KindState::Limiter { remaining, .. } => Some(*remaining),
            _ => None,
        }
    }

    pub fn set_remaining(&mut self, value: u32) -> bool {
        match &mut self.kind {
            KindState::Limiter { remaining, .. } => {
                *remaining = value;
                true
            }
            _ => false,
        }
    }

    /// Per-child results of a Parallel in the current activation.
    pub fn parallel_states(&self) -> &[Option<BtStatus>] {
        match &self.kind {
            KindState::Parallel { states, .. } => states,
            _ => &[],
        }
    }
}

/// Execution state pairing one agent with one tree.
#[derive(Debug)]
pub struct Blackboard {
    tree: TreeId,
    agent: u64,
    pub(crate) running_now: Vec<NodeRef>,
    pub(crate) running_pre: Vec<NodeRef>,
    pub(crate) nodes: BTreeMap<NodeHash, NodeState>,
    pub globals: Globals,
    tick: u64,
    pub(crate) rng: SplitMix64,
    pub(crate) tracer: Tracer,
}

impl Blackboard {
    pub fn new(tree: TreeId, agent: u64, seed: u64) -> Self {
        Self {
            tree,
            agent,
            running_now: Vec::new(),
            running_pre: Vec::new(),
            nodes: BTreeMap::new(),
            globals: Globals::default(),
            tick: 0,
            rng: SplitMix64::new(derive_seed(seed, agent, tree.0)),
            tracer: Tracer::new(),
        }
    }

    pub fn tree(&self) -> TreeId {
        self.tree
    }

    pub fn agent(&self) -> u64 {
        self.agent
    }

    /// Handler ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub(crate) fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Nodes that returned RUNNING during the latest tick, in tick order.
    pub fn running_now(&self) -> &[NodeRef] {
        &self.running_now
    }

    /// Nodes that returned RUNNING during the tick before.
    pub fn running_pre(&self) -> &[NodeRef] {
        &self.running_pre
    }

    pub fn state(&self, hash: &NodeHash) -> Option<&NodeState> {
        self.nodes.get(hash)
    }

    pub fn state_mut(&mut self, hash: &NodeHash) -> Option<&mut NodeState> {
        self.nodes.get_mut(hash)
    }

    pub fn states(&self) -> impl Iterator<Item = (&NodeHash, &NodeState)> {
        self.nodes.iter()
    }

    pub fn is_running(&self, hash: &NodeHash) -> bool {
        self.nodes.get(hash).map(|s| s.running).unwrap_or(false)
    }

    /// State for `node`, created from its defaults when missing.
    /// State whose shape no longer matches the node's kind (after
    /// `replace_kind`) is reseeded too.
    pub(crate) fn state_or_init(&mut self, tree: &Tree, node: &Node) -> &mut NodeState {
        match self.nodes.entry(node.hash().clone()) {
            Entry::Occupied(entry) => {
                let state = entry.into_mut();
                if !state.kind.fits(node.kind()) {
                    *state = NodeState::for_node(tree, node);
                }
                state
            }
            Entry::Vacant(entry) => entry.insert(NodeState::for_node(tree, node)),
        }
    }

    /// Seed `node`'s state if absent, or always with `override_`. Kept
    /// state has its configuration refreshed from the node.
    pub fn seed_state(&mut self, tree: &Tree, node: &Node, override_: bool) {
        if override_ {
            self.nodes
                .insert(node.hash().clone(), NodeState::for_node(tree, node));
        } else {
            self.state_or_init(tree, node).sync_config(node);
        }
    }

    /// Forget running bookkeeping, keeping node state otherwise.
    pub(crate) fn clear_running(&mut self) {
        self.running_now.clear();
        self.running_pre.clear();
        for state in self.nodes.values_mut() {
            state.running = false;
        }
    }

    /// Drop state for nodes no longer registered in `forest`. Returns how
    /// many entries were removed.
    pub fn prune_orphans(&mut self, forest: &Forest) -> usize {
        let alive = |hash: &NodeHash| forest.trees().any(|t| t.contains(hash));
        let before = self.nodes.len();
        self.nodes.retain(|hash, _| alive(hash));
        self.running_now.retain(|r| alive(&r.hash));
        self.running_pre.retain(|r| alive(&r.hash));
        let removed = before - self.nodes.len();
        if removed > 0 {
            tracing::debug!(agent = self.agent, removed, "orphaned node state pruned");
        }
        removed
    }

    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    pub fn tracer_mut(&mut self) -> &mut Tracer {
        &mut self.tracer
    }

    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink>>) {
        self.tracer.set_sink(sink);
    }

    pub fn trace_log(&self) -> Option<&TraceLog> {
        self.tracer.log()
    }

    /// JSON view of the blackboard for debug tooling.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "tree": self.tree.0,
            "agent": self.agent,
            "tick": self.tick,
            "running_now": self.running_now.iter().map(|r| r.hash.as_str()).collect::<Vec<_>>(),
            "running_pre": self.running_pre.iter().map(|r| r.hash.as_str()).collect::<Vec<_>>(),
            "nodes": self.nodes,
            "globals": self.globals,
        })
    }
}
