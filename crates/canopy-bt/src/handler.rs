use std::collections::BTreeSet;
use std::sync::Arc;

use canopy_core::{Agent, BtStatus, NodeRef, TreeId, TreeSelector};
use canopy_tools::Tracer;
use canopy_tree::Forest;

use crate::behaviors::Behaviors;
use crate::blackboard::Blackboard;
use crate::bt::{TickCx, Tickable};
use crate::config::HandlerConfig;
use crate::error::{ResolutionError, TickError};
use crate::nodes::abandon;

/// Drives one agent through its tree: binds a blackboard with `setup`,
/// then advances it once per simulation step with `tick`.
pub struct AiHandler<A: Agent> {
    behaviors: Arc<Behaviors<A>>,
    config: HandlerConfig,
    blackboard: Option<Blackboard>,
}

impl<A: Agent> AiHandler<A> {
    pub fn new(behaviors: Arc<Behaviors<A>>) -> Self {
        Self::with_config(behaviors, HandlerConfig::default())
    }

    pub fn with_config(behaviors: Arc<Behaviors<A>>, config: HandlerConfig) -> Self {
        Self {
            behaviors,
            config,
            blackboard: None,
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn behaviors(&self) -> &Arc<Behaviors<A>> {
        &self.behaviors
    }

    pub fn is_set_up(&self) -> bool {
        self.blackboard.is_some()
    }

    pub fn blackboard(&self) -> Option<&Blackboard> {
        self.blackboard.as_ref()
    }

    pub fn blackboard_mut(&mut self) -> Option<&mut Blackboard> {
        self.blackboard.as_mut()
    }

    /// Tree the blackboard is bound to.
    pub fn tree(&self) -> Option<TreeId> {
        self.blackboard.as_ref().map(Blackboard::tree)
    }

    /// Bind (or rebind) the blackboard to a tree.
    ///
    /// The tree is taken from `tree`, else the agent's default, else the
    /// tree already bound. Rebinding the same tree for the same agent keeps
    /// node state and globals (only running bookkeeping is cleared) unless
    /// `override_` is set; any other bind starts from a fresh blackboard.
    /// Either way every node reachable from the root, Transitions
    /// included, gets its state seeded. Each tree on that walk is validated
    /// first; an invalid one fails setup and leaves the handler untouched.
    pub fn setup(
        &mut self,
        forest: &Forest,
        agent: &A,
        tree: Option<TreeSelector>,
        override_: bool,
    ) -> Result<TreeId, ResolutionError> {
        let agent_id = agent.stable_id();
        let id = match tree.or_else(|| agent.default_tree()) {
            Some(selector) => match forest.resolve(&selector) {
                Some(id) => id,
                None => {
                    tracing::warn!(agent = agent_id, tree = %selector, "setup: tree not found");
                    return Err(ResolutionError::UnknownTree(selector));
                }
            },
            None => match &self.blackboard {
                Some(bb) => bb.tree(),
                None => {
                    tracing::warn!(agent = agent_id, "setup: no tree to bind");
                    return Err(ResolutionError::NoTree);
                }
            },
        };
        let bound = forest
            .get(id)
            .ok_or(ResolutionError::UnknownTree(TreeSelector::Id(id)))?;

        if let Some(expected) = bound.agent_kind() {
            if expected != agent.kind() {
                tracing::warn!(
                    agent = agent_id,
                    tree = %id,
                    expected,
                    found = agent.kind(),
                    "setup: agent kind mismatch"
                );
                return Err(ResolutionError::AgentMismatch {
                    tree: bound.name().to_string(),
                    expected: expected.to_string(),
                    found: agent.kind().to_string(),
                });
            }
        }
        // Every tree the agent can transition into must be well formed
        // before the blackboard is touched.
        let walk = forest.walk_following_transitions(id);
        let mut checked = BTreeSet::new();
        for tree_id in walk.iter().map(|r| r.tree) {
            if !checked.insert(tree_id) {
                continue;
            }
            let Some(tree) = forest.get(tree_id) else {
                continue;
            };
            if let Err(err) = tree.validate_tree() {
                tracing::warn!(
                    agent = agent_id,
                    tree = %tree_id,
                    error = %err,
                    "setup: invalid tree"
                );
                return Err(err.into());
            }
        }

        let reuse = !override_
            && self
                .blackboard
                .as_ref()
                .is_some_and(|bb| bb.tree() == id && bb.agent() == agent_id);
        let bb = match self.blackboard.take() {
            Some(mut bb) if reuse => {
                bb.clear_running();
                bb
            }
            previous => {
                let mut bb = Blackboard::new(id, agent_id, self.config.seed);
                bb.tracer = match previous {
                    Some(old) => old.tracer,
                    None if self.config.record_trace => Tracer::recording(),
                    None => Tracer::new(),
                };
                bb
            }
        };
        let bb = self.blackboard.insert(bb);

        for node_ref in &walk {
            let Some(tree) = forest.get(node_ref.tree) else {
                continue;
            };
            if let Some(node) = tree.get(&node_ref.hash) {
                node.on_blackboard_setup(tree, bb, override_);
            }
        }
        tracing::info!(
            agent = agent_id,
            tree = %id,
            name = bound.name(),
            nodes = walk.len(),
            reused = reuse,
            "handler set up"
        );
        Ok(id)
    }

    /// One evaluation pass from the bound tree's root.
    ///
    /// Nodes that were running two ticks back but not revisited last tick
    /// are closed first, then the running generations rotate and the root
    /// is ticked.
    pub fn tick(&mut self, forest: &Forest, agent: &mut A) -> Result<BtStatus, TickError> {
        let bb = self.blackboard.as_mut().ok_or(TickError::NotSetUp)?;
        let tree = forest
            .get(bb.tree())
            .ok_or(TickError::TreeMissing(bb.tree()))?;
        let tick = bb.advance_tick();

        let abandoned: Vec<NodeRef> = bb
            .running_pre
            .iter()
            .filter(|r| !bb.running_now.contains(*r))
            .cloned()
            .collect();
        bb.running_pre = std::mem::take(&mut bb.running_now);

        let mut cx = TickCx::new(forest, agent, bb, &self.behaviors, &self.config);
        for node_ref in abandoned {
            if !cx.bb.is_running(&node_ref.hash) {
                continue;
            }
            let Some(owner) = forest.get(node_ref.tree) else {
                continue;
            };
            if let Some(node) = owner.get(&node_ref.hash) {
                abandon(node, owner, &mut cx);
            }
        }

        let status = tree.root_node().tick(tree, &mut cx);
        tracing::trace!(agent = cx.bb.agent(), tick, steps = cx.steps(), %status, "handler tick");
        Ok(status)
    }

    /// Drop the blackboard. Returns it for inspection.
    pub fn teardown(&mut self) -> Option<Blackboard> {
        let bb = self.blackboard.take();
        if let Some(bb) = &bb {
            tracing::debug!(agent = bb.agent(), tree = %bb.tree(), "handler torn down");
        }
        bb
    }
}

impl<A: Agent> std::fmt::Debug for AiHandler<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiHandler")
            .field("config", &self.config)
            .field("blackboard", &self.blackboard)
            .finish()
    }
}

/// Tick a batch of handlers in stable agent-id order. Results come back in
/// that order too.
pub fn tick_handlers<A: Agent>(
    forest: &Forest,
    batch: &mut [(AiHandler<A>, A)],
) -> Vec<Result<BtStatus, TickError>> {
    batch.sort_by_key(|(_, agent)| agent.stable_id());
    batch
        .iter_mut()
        .map(|(handler, agent)| handler.tick(forest, agent))
        .collect()
}
