//! Execution semantics of every node kind.

use canopy_core::{Agent, BtStatus, DeterministicRng, NodeRef, TreeSelector};
use canopy_tree::{Node, NodeKind, Tree};

use crate::blackboard::{sanitize_weight, Blackboard, KindState};
use crate::bt::{TickCx, Tickable};

impl Tickable for Node {
    fn tick<A: Agent>(&self, tree: &Tree, cx: &mut TickCx<'_, A>) -> BtStatus {
        if !cx.take_step(self.hash()) {
            return BtStatus::Error;
        }
        let was_running = {
            let state = cx.bb.state_or_init(tree, self);
            state.ticks += 1;
            state.running
        };
        if !was_running {
            self.open(tree, cx);
        }

        let status = self.update(tree, cx);

        if status == BtStatus::Running {
            cx.bb.state_or_init(tree, self).running = true;
            let node_ref = NodeRef::new(tree.id(), self.hash().clone());
            if !cx.bb.running_now.contains(&node_ref) {
                cx.bb.running_now.push(node_ref);
            }
        } else {
            self.close(tree, cx);
        }
        status
    }

    fn open<A: Agent>(&self, tree: &Tree, cx: &mut TickCx<'_, A>) {
        cx.lifecycle("bt.open", self.hash(), self.name());
        let children = self.children();
        let state = cx.bb.state_or_init(tree, self);
        state.sync_config(self);
        match &mut state.kind {
            KindState::Prob {
                child_weights,
                avail_weights,
                running_child,
            } => {
                *avail_weights = children
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        let weight = child_weights.get(c).copied().unwrap_or_else(|| {
                            sanitize_weight(tree.get(c).map(Node::weight).unwrap_or(1.0))
                        });
                        (i, weight)
                    })
                    .collect();
                *running_child = None;
            }
            KindState::Parallel { states, .. } => {
                *states = vec![None; children.len()];
            }
            _ => {}
        }
    }

    fn update<A: Agent>(&self, tree: &Tree, cx: &mut TickCx<'_, A>) -> BtStatus {
        match self.kind() {
            NodeKind::Root => match single_child(tree, self) {
                Some(child) => child.tick(tree, cx),
                None => cx.fail(
                    self.hash(),
                    format!("root of tree '{}' has no child", tree.name()),
                ),
            },
            NodeKind::Sequence => scan(tree, self, cx, BtStatus::Success),
            NodeKind::Selector => scan(tree, self, cx, BtStatus::Failure),
            NodeKind::MemSequence => scan_mem(tree, self, cx, BtStatus::Success),
            NodeKind::MemSelector => scan_mem(tree, self, cx, BtStatus::Failure),
            NodeKind::ProbSequence => scan_prob(tree, self, cx, BtStatus::Success),
            NodeKind::ProbSelector => scan_prob(tree, self, cx, BtStatus::Failure),
            NodeKind::Parallel(_) => parallel(tree, self, cx),
            NodeKind::Inverter => delegate(tree, self, cx, BtStatus::invert),
            NodeKind::Succeeder => delegate(tree, self, cx, |s| match s {
                BtStatus::Failure => BtStatus::Success,
                other => other,
            }),
            NodeKind::Failer => delegate(tree, self, cx, |s| match s {
                BtStatus::Success => BtStatus::Failure,
                other => other,
            }),
            NodeKind::Repeater { .. } => repeater(tree, self, cx),
            NodeKind::Limiter { .. } => limiter(tree, self, cx),
            NodeKind::Allocator { resources } => {
                if let Some(taken) = resources.iter().find(|r| cx.bb.globals.is_taken(r)) {
                    tracing::trace!(node = %self.hash(), resource = %taken, "allocator waiting");
                    BtStatus::Running
                } else {
                    delegate(tree, self, cx, |s| s)
                }
            }
            NodeKind::Verifier { predicate } => match check(cx, self, predicate) {
                Ok(true) => delegate(tree, self, cx, |s| s),
                Ok(false) => BtStatus::Failure,
                Err(status) => status,
            },
            NodeKind::EchoDecorator { message } => {
                cx.emit("bt.echo", self.hash(), message.clone());
                delegate(tree, self, cx, |s| s)
            }
            NodeKind::Condition { predicate } => match check(cx, self, predicate) {
                Ok(ok) => BtStatus::from_bool(ok),
                Err(status) => status,
            },
            NodeKind::Command { action } => {
                if cx.behaviors.run(action, cx.agent, &mut cx.bb.globals) {
                    BtStatus::Success
                } else {
                    cx.fail(
                        self.hash(),
                        format!("unknown command '{action}' at node '{}'", self.name()),
                    )
                }
            }
            NodeKind::Transition { target } => transition(self, cx, target.as_ref()),
            NodeKind::EchoLeaf { message, succeed } => {
                cx.emit("bt.echo", self.hash(), message.clone());
                BtStatus::from_bool(*succeed)
            }
        }
    }

    fn close<A: Agent>(&self, tree: &Tree, cx: &mut TickCx<'_, A>) {
        let state = cx.bb.state_or_init(tree, self);
        state.running = false;
        match &mut state.kind {
            KindState::Mem { running_child } => *running_child = 0,
            KindState::Prob {
                avail_weights,
                running_child,
                ..
            } => {
                avail_weights.clear();
                *running_child = None;
            }
            KindState::Parallel { states, .. } => states.clear(),
            _ => {}
        }
        cx.lifecycle("bt.close", self.hash(), self.name());
    }

    fn on_blackboard_setup(&self, tree: &Tree, blackboard: &mut Blackboard, override_: bool) {
        blackboard.seed_state(tree, self, override_);
    }
}

/// Close a node that was running but was not revisited by its parent.
pub(crate) fn abandon<A: Agent>(node: &Node, tree: &Tree, cx: &mut TickCx<'_, A>) {
    cx.lifecycle("bt.abandon", node.hash(), node.name());
    node.close(tree, cx);
}

fn child<'t>(tree: &'t Tree, node: &Node, index: usize) -> Option<&'t Node> {
    node.children().get(index).and_then(|h| tree.get(h))
}

fn single_child<'t>(tree: &'t Tree, node: &Node) -> Option<&'t Node> {
    child(tree, node, 0)
}

fn missing_child<A: Agent>(node: &Node, cx: &mut TickCx<'_, A>, index: usize) -> BtStatus {
    cx.fail(
        node.hash(),
        format!("{} '{}' has no child at {index}", node.kind().label(), node.name()),
    )
}

fn check<A: Agent>(cx: &mut TickCx<'_, A>, node: &Node, predicate: &str) -> Result<bool, BtStatus> {
    match cx.behaviors.check(predicate, cx.agent, &cx.bb.globals) {
        Some(ok) => Ok(ok),
        None => Err(cx.fail(
            node.hash(),
            format!("unknown condition '{predicate}' at node '{}'", node.name()),
        )),
    }
}

fn delegate<A: Agent>(
    tree: &Tree,
    node: &Node,
    cx: &mut TickCx<'_, A>,
    map: impl FnOnce(BtStatus) -> BtStatus,
) -> BtStatus {
    match single_child(tree, node) {
        Some(child) => map(child.tick(tree, cx)),
        None => missing_child(node, cx, 0),
    }
}

/// Sequence (`cont = Success`) and Selector (`cont = Failure`).
fn scan<A: Agent>(tree: &Tree, node: &Node, cx: &mut TickCx<'_, A>, cont: BtStatus) -> BtStatus {
    for index in 0..node.children().len() {
        let Some(child) = child(tree, node, index) else {
            return missing_child(node, cx, index);
        };
        let status = child.tick(tree, cx);
        if status != cont {
            return status;
        }
    }
    cont
}

/// Mem variants resume at the child that was running last tick.
fn scan_mem<A: Agent>(
    tree: &Tree,
    node: &Node,
    cx: &mut TickCx<'_, A>,
    cont: BtStatus,
) -> BtStatus {
    let start = cx.bb.state_or_init(tree, node).running_child().unwrap_or(0);
    for index in start..node.children().len() {
        let Some(child) = child(tree, node, index) else {
            return missing_child(node, cx, index);
        };
        let status = child.tick(tree, cx);
        if status == BtStatus::Running {
            if let KindState::Mem { running_child } = &mut cx.bb.state_or_init(tree, node).kind {
                *running_child = index;
            }
            return status;
        }
        if status != cont {
            return status;
        }
    }
    cont
}

/// Draw children without replacement until one breaks the run.
fn scan_prob<A: Agent>(
    tree: &Tree,
    node: &Node,
    cx: &mut TickCx<'_, A>,
    cont: BtStatus,
) -> BtStatus {
    cx.bb.state_or_init(tree, node);
    loop {
        let Some(index) = next_prob_child(cx.bb, node) else {
            return cont;
        };
        let Some(child) = child(tree, node, index) else {
            return missing_child(node, cx, index);
        };
        let status = child.tick(tree, cx);
        if status == BtStatus::Running {
            if let KindState::Prob { running_child, .. } =
                &mut cx.bb.state_or_init(tree, node).kind
            {
                *running_child = Some(index);
            }
            return status;
        }
        if status != cont {
            return status;
        }
    }
}

fn next_prob_child(bb: &mut Blackboard, node: &Node) -> Option<usize> {
    let rng = &mut bb.rng;
    match bb.nodes.get_mut(node.hash()).map(|s| &mut s.kind) {
        Some(KindState::Prob {
            avail_weights,
            running_child,
            ..
        }) => running_child.take().or_else(|| draw(avail_weights, rng)),
        _ => None,
    }
}

/// Remove and return one index from `avail`, weight-proportionally. When
/// every remaining weight is zero the pick is uniform.
pub(crate) fn draw(
    avail: &mut Vec<(usize, f64)>,
    rng: &mut impl DeterministicRng,
) -> Option<usize> {
    if avail.is_empty() {
        return None;
    }
    let total: f64 = avail.iter().map(|(_, w)| *w).sum();
    let pos = if total > 0.0 && total.is_finite() {
        let mut r = rng.next_f64_unit() * total;
        let mut pos = avail.len() - 1;
        for (i, (_, w)) in avail.iter().enumerate() {
            if r < *w {
                pos = i;
                break;
            }
            r -= *w;
        }
        pos
    } else {
        rng.next_below(avail.len() as u64) as usize
    };
    Some(avail.remove(pos).0)
}

fn parallel_states<'b>(
    bb: &'b mut Blackboard,
    node: &Node,
) -> Option<&'b mut Vec<Option<BtStatus>>> {
    match bb.nodes.get_mut(node.hash()).map(|s| &mut s.kind) {
        Some(KindState::Parallel { states, .. }) => Some(states),
        _ => None,
    }
}

fn parallel<A: Agent>(tree: &Tree, node: &Node, cx: &mut TickCx<'_, A>) -> BtStatus {
    let count = node.children().len();
    let (primary, req_successes, req_failures, default_success) =
        match &mut cx.bb.state_or_init(tree, node).kind {
            KindState::Parallel {
                states,
                primary_child,
                req_successes,
                req_failures,
                default_success,
            } => {
                states.resize(count, None);
                (*primary_child, *req_successes, *req_failures, *default_success)
            }
            _ => (None, None, None, true),
        };

    for index in 0..count {
        let settled = parallel_states(cx.bb, node)
            .and_then(|s| s.get(index).copied().flatten())
            .is_some_and(BtStatus::is_terminal);
        if settled {
            continue;
        }
        let Some(child) = child(tree, node, index) else {
            return missing_child(node, cx, index);
        };
        let status = child.tick(tree, cx);

        let (successes, failures) = match parallel_states(cx.bb, node) {
            Some(states) => {
                if let Some(slot) = states.get_mut(index) {
                    *slot = Some(status);
                }
                let tally = |want: BtStatus| states.iter().filter(|s| **s == Some(want)).count();
                (tally(BtStatus::Success), tally(BtStatus::Failure))
            }
            None => (0, 0),
        };

        if status == BtStatus::Error {
            return status;
        }
        if primary == Some(index) && status.is_terminal() {
            return status;
        }
        if req_successes.is_some_and(|n| successes >= n as usize) {
            return BtStatus::Success;
        }
        if req_failures.is_some_and(|n| failures >= n as usize) {
            return BtStatus::Failure;
        }
    }

    let any_running = parallel_states(cx.bb, node)
        .map(|s| s.iter().any(|s| *s == Some(BtStatus::Running)))
        .unwrap_or(false);
    if any_running {
        BtStatus::Running
    } else {
        BtStatus::from_bool(default_success)
    }
}

/// Counts finished child runs; once `repeats` is reached the next tick
/// succeeds without touching the child and the count starts over.
fn repeater<A: Agent>(tree: &Tree, node: &Node, cx: &mut TickCx<'_, A>) -> BtStatus {
    let (repeats, count) = match &cx.bb.state_or_init(tree, node).kind {
        KindState::Repeater { repeats, count } => (*repeats, *count),
        _ => (0, 0),
    };
    if count >= repeats {
        if let KindState::Repeater { count, .. } = &mut cx.bb.state_or_init(tree, node).kind {
            *count = 0;
        }
        return BtStatus::Success;
    }
    let Some(child) = single_child(tree, node) else {
        return missing_child(node, cx, 0);
    };
    match child.tick(tree, cx) {
        BtStatus::Success | BtStatus::Failure => {
            if let KindState::Repeater { count, .. } = &mut cx.bb.state_or_init(tree, node).kind {
                *count += 1;
            }
            BtStatus::Running
        }
        other => other,
    }
}

fn limiter<A: Agent>(tree: &Tree, node: &Node, cx: &mut TickCx<'_, A>) -> BtStatus {
    let state = cx.bb.state_or_init(tree, node);
    let remaining = state.remaining().unwrap_or(0);
    if remaining == 0 {
        return BtStatus::Failure;
    }
    state.set_remaining(remaining - 1);
    delegate(tree, node, cx, |s| s)
}

fn transition<A: Agent>(
    node: &Node,
    cx: &mut TickCx<'_, A>,
    target: Option<&TreeSelector>,
) -> BtStatus {
    let Some(selector) = target else {
        return cx.fail(
            node.hash(),
            format!("transition '{}' has no target tree", node.name()),
        );
    };
    let forest = cx.forest;
    let Some(tree) = forest.resolve(selector).and_then(|id| forest.get(id)) else {
        return cx.fail(
            node.hash(),
            format!("transition '{}' targets missing tree {selector}", node.name()),
        );
    };
    if cx.depth >= cx.config.max_transition_depth {
        return cx.fail(
            node.hash(),
            format!(
                "transition depth {} exceeded at '{}'",
                cx.config.max_transition_depth,
                node.name()
            ),
        );
    }
    cx.depth += 1;
    let status = tree.root_node().tick(tree, cx);
    cx.depth -= 1;
    status
}
