//! Structural edits on a [`Tree`].
//!
//! Every public operation checks all of its preconditions first and only
//! then touches the registry, so an `Err` always means "nothing changed".

use canopy_core::NodeHash;

use crate::node::{Arity, Node, NodeKind};
use crate::{Subtree, TopologyError, Tree};

/// Where a node being attached comes from.
pub enum NodeOrigin<'a> {
    /// A fresh or previously removed subtree.
    Detached(Subtree),
    /// A node already registered in the destination tree.
    Local(NodeHash),
    /// A node registered in another tree.
    Foreign { tree: &'a mut Tree, node: NodeHash },
}

impl From<Subtree> for NodeOrigin<'_> {
    fn from(subtree: Subtree) -> Self {
        NodeOrigin::Detached(subtree)
    }
}

impl From<NodeHash> for NodeOrigin<'_> {
    fn from(hash: NodeHash) -> Self {
        NodeOrigin::Local(hash)
    }
}

impl From<&NodeHash> for NodeOrigin<'_> {
    fn from(hash: &NodeHash) -> Self {
        NodeOrigin::Local(hash.clone())
    }
}

impl Tree {
    /// Attach `origin` under `target`, at `position` among its children
    /// (appended when `None`; ignored for single-child targets).
    ///
    /// With `copying` the node is cloned and the original stays put;
    /// otherwise it is detached from wherever it lives first. Returns the
    /// attached node's hash in this tree.
    pub fn add<'a>(
        &mut self,
        origin: impl Into<NodeOrigin<'a>>,
        target: &NodeHash,
        position: Option<usize>,
        copying: bool,
    ) -> Result<NodeHash, TopologyError> {
        let subtree = match origin.into() {
            NodeOrigin::Detached(subtree) => {
                subtree.check()?;
                self.check_target(target, None)?;
                subtree
            }
            NodeOrigin::Local(hash) => {
                if self.node_or_err(&hash)?.is_root() {
                    return Err(TopologyError::RootNode);
                }
                if copying {
                    self.check_target(target, None)?;
                    self.clone_subtree(&hash)
                        .ok_or_else(|| TopologyError::UnknownNode(hash.clone()))?
                } else {
                    if hash == *target || self.is_ancestor(&hash, target) {
                        return Err(TopologyError::WouldCycle(hash));
                    }
                    self.check_target(target, Some(&hash))?;
                    self.detach(&hash)?
                }
            }
            NodeOrigin::Foreign { tree: source, node } => {
                let found = source
                    .get(&node)
                    .ok_or_else(|| TopologyError::NotInSource(node.clone()))?;
                if found.is_root() {
                    return Err(TopologyError::RootNode);
                }
                self.check_target(target, None)?;
                if copying {
                    source
                        .clone_subtree(&node)
                        .ok_or_else(|| TopologyError::NotInSource(node.clone()))?
                } else {
                    source.detach(&node)?
                }
            }
        };

        let size = subtree.node_count();
        let hash = self.attach(subtree, target, position);
        tracing::debug!(
            tree = %self.id(),
            node = %hash,
            target = %target,
            size,
            copying,
            "node added"
        );
        Ok(hash)
    }

    /// Move `hash` to `position` among its siblings (last when `None`).
    pub fn shift(&mut self, hash: &NodeHash, position: Option<usize>) -> Result<(), TopologyError> {
        let (parent, from) = self.slot_of(hash)?;
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or_else(|| TopologyError::UnknownNode(parent.clone()))?;
        if parent_node.arity() != Arity::Many {
            return Err(TopologyError::NotComposite(hash.clone()));
        }
        parent_node.children.remove(from);
        let to = position
            .unwrap_or(parent_node.children.len())
            .min(parent_node.children.len());
        parent_node.children.insert(to, hash.clone());
        parent_node.kind.on_move_child(from, to);
        tracing::debug!(tree = %self.id(), node = %hash, from, to, "node shifted");
        Ok(())
    }

    /// Exchange the slots of two nodes of this tree.
    pub fn swap(&mut self, a: &NodeHash, b: &NodeHash) -> Result<(), TopologyError> {
        let (pa, ia) = self.slot_of(a)?;
        let (pb, ib) = self.slot_of(b)?;
        if a == b {
            return Ok(());
        }
        if self.is_ancestor(a, b) || self.is_ancestor(b, a) {
            return Err(TopologyError::WouldCycle(a.clone()));
        }

        if pa == pb {
            if let Some(parent) = self.nodes.get_mut(&pa) {
                parent.children.swap(ia, ib);
                parent.kind.on_swap_children(ia, ib);
            }
        } else {
            if let Some(parent) = self.nodes.get_mut(&pa) {
                parent.children[ia] = b.clone();
                parent.kind.on_replace_child(ia);
            }
            if let Some(parent) = self.nodes.get_mut(&pb) {
                parent.children[ib] = a.clone();
                parent.kind.on_replace_child(ib);
            }
        }
        if let Some(node) = self.nodes.get_mut(a) {
            node.parent = Some(pb);
        }
        if let Some(node) = self.nodes.get_mut(b) {
            node.parent = Some(pa);
        }
        tracing::debug!(tree = %self.id(), a = %a, b = %b, "nodes swapped");
        Ok(())
    }

    /// Exchange `a` (in this tree) with `b` (in `other`). Both subtrees are
    /// rehashed into their new trees.
    ///
    /// Returns `(new hash of a in other, new hash of b in self)`.
    pub fn swap_across(
        &mut self,
        a: &NodeHash,
        other: &mut Tree,
        b: &NodeHash,
    ) -> Result<(NodeHash, NodeHash), TopologyError> {
        let (pa, ia) = self.slot_of(a)?;
        let (pb, ib) = other.slot_of(b).map_err(|err| match err {
            TopologyError::UnknownNode(hash) => TopologyError::NotInSource(hash),
            err => err,
        })?;

        let sa = self
            .take_nodes(a)
            .ok_or_else(|| TopologyError::UnknownNode(a.clone()))?;
        let sb = other
            .take_nodes(b)
            .ok_or_else(|| TopologyError::NotInSource(b.clone()))?;

        let b_here = self.put_nodes(sb, Some(pa.clone()));
        if let Some(parent) = self.nodes.get_mut(&pa) {
            parent.children[ia] = b_here.clone();
            parent.kind.on_replace_child(ia);
        }
        let a_there = other.put_nodes(sa, Some(pb.clone()));
        if let Some(parent) = other.nodes.get_mut(&pb) {
            parent.children[ib] = a_there.clone();
            parent.kind.on_replace_child(ib);
        }
        tracing::debug!(
            tree = %self.id(),
            other = %other.id(),
            a = %a_there,
            b = %b_here,
            "nodes swapped across trees"
        );
        Ok((a_there, b_here))
    }

    /// Splice `origin` between `target` and `target`'s parent: the new node
    /// takes `target`'s slot and `target` becomes its child at `position`.
    pub fn interpose<'a>(
        &mut self,
        origin: impl Into<NodeOrigin<'a>>,
        target: &NodeHash,
        position: Option<usize>,
        copying: bool,
    ) -> Result<NodeHash, TopologyError> {
        self.slot_of(target)?;

        let subtree = match origin.into() {
            NodeOrigin::Detached(subtree) => {
                subtree.check()?;
                let shown = subtree
                    .hash
                    .clone()
                    .unwrap_or_else(|| NodeHash::new("unhashed"));
                check_host(&subtree.kind, &shown, &subtree.name, subtree.children.len())?;
                subtree
            }
            NodeOrigin::Local(hash) => {
                if hash == *target {
                    return Err(TopologyError::SelfInterpose(hash));
                }
                let node = self.node_or_err(&hash)?;
                if node.is_root() {
                    return Err(TopologyError::RootNode);
                }
                check_host(&node.kind, &node.hash, &node.name, node.children.len())?;
                if copying {
                    self.clone_subtree(&hash)
                        .ok_or_else(|| TopologyError::UnknownNode(hash.clone()))?
                } else {
                    if self.is_ancestor(&hash, target) {
                        return Err(TopologyError::WouldCycle(hash));
                    }
                    self.detach(&hash)?
                }
            }
            NodeOrigin::Foreign { tree: source, node } => {
                let found = source
                    .get(&node)
                    .ok_or_else(|| TopologyError::NotInSource(node.clone()))?;
                if found.is_root() {
                    return Err(TopologyError::RootNode);
                }
                check_host(&found.kind, &found.hash, &found.name, found.children.len())?;
                if copying {
                    source
                        .clone_subtree(&node)
                        .ok_or_else(|| TopologyError::NotInSource(node.clone()))?
                } else {
                    source.detach(&node)?
                }
            }
        };

        // Detaching a sibling may have moved the target's slot.
        let (parent, index) = self.slot_of(target)?;
        let hash = self.put_nodes(subtree, Some(parent.clone()));
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children[index] = hash.clone();
        }
        if let Some(target_node) = self.nodes.get_mut(target) {
            target_node.parent = Some(hash.clone());
        }
        if let Some(host) = self.nodes.get_mut(&hash) {
            let at = position
                .unwrap_or(host.children.len())
                .min(host.children.len());
            host.children.insert(at, target.clone());
            host.kind.on_add_child(at);
        }
        tracing::debug!(tree = %self.id(), node = %hash, target = %target, "node interposed");
        Ok(hash)
    }

    /// Detach `hash` and its subtree, purging their hashes. The removed
    /// nodes are handed back as a [`Subtree`].
    pub fn remove(&mut self, hash: &NodeHash) -> Result<Subtree, TopologyError> {
        let subtree = self.detach(hash)?;
        tracing::debug!(
            tree = %self.id(),
            node = %hash,
            size = subtree.node_count(),
            "node removed"
        );
        Ok(subtree)
    }

    fn node_or_err(&self, hash: &NodeHash) -> Result<&Node, TopologyError> {
        self.nodes
            .get(hash)
            .ok_or_else(|| TopologyError::UnknownNode(hash.clone()))
    }

    /// `target` can take one more child. `leaving` is a child about to move
    /// away and does not count as occupying the slot.
    fn check_target(
        &self,
        target: &NodeHash,
        leaving: Option<&NodeHash>,
    ) -> Result<(), TopologyError> {
        let node = self.node_or_err(target)?;
        match node.arity() {
            Arity::Leaf => Err(TopologyError::LeafTarget {
                hash: target.clone(),
                name: node.name.clone(),
            }),
            Arity::Single => {
                let occupied = node
                    .children
                    .iter()
                    .filter(|c| Some(*c) != leaving)
                    .count();
                if occupied > 0 {
                    Err(TopologyError::TargetOccupied {
                        hash: target.clone(),
                        name: node.name.clone(),
                    })
                } else {
                    Ok(())
                }
            }
            Arity::Many => Ok(()),
        }
    }

    /// Parent hash and index of `hash`; roots have no slot.
    pub(crate) fn slot_of(&self, hash: &NodeHash) -> Result<(NodeHash, usize), TopologyError> {
        let node = self.node_or_err(hash)?;
        let parent = node.parent.clone().ok_or(TopologyError::RootNode)?;
        let index = self
            .nodes
            .get(&parent)
            .and_then(|p| p.children.iter().position(|c| c == hash))
            .ok_or_else(|| TopologyError::UnknownNode(hash.clone()))?;
        Ok((parent, index))
    }

    pub(crate) fn detach(&mut self, hash: &NodeHash) -> Result<Subtree, TopologyError> {
        let (parent, index) = self.slot_of(hash)?;
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.remove(index);
            parent_node.kind.on_remove_child(index);
        }
        self.take_nodes(hash)
            .ok_or_else(|| TopologyError::UnknownNode(hash.clone()))
    }

    fn attach(&mut self, subtree: Subtree, parent: &NodeHash, position: Option<usize>) -> NodeHash {
        let hash = self.put_nodes(subtree, Some(parent.clone()));
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            let index = position
                .unwrap_or(parent_node.children.len())
                .min(parent_node.children.len());
            parent_node.children.insert(index, hash.clone());
            parent_node.kind.on_add_child(index);
        }
        hash
    }

    /// Unregister `hash` and its descendants without touching the parent's
    /// child list.
    pub(crate) fn take_nodes(&mut self, hash: &NodeHash) -> Option<Subtree> {
        let node = self.nodes.remove(hash)?;
        let children = node
            .children
            .iter()
            .filter_map(|c| self.take_nodes(c))
            .collect();
        Some(Subtree {
            name: node.name,
            hash: Some(node.hash),
            weight: node.weight,
            kind: node.kind,
            children,
        })
    }

    /// Register `subtree` under `parent` without touching the parent's child
    /// list. Returns the (possibly fresh) hash of the subtree's top node.
    pub(crate) fn put_nodes(&mut self, subtree: Subtree, parent: Option<NodeHash>) -> NodeHash {
        let Subtree {
            name,
            hash: hint,
            weight,
            kind,
            children,
        } = subtree;
        let hash = self.keep_or_mint(hint);
        self.nodes.insert(
            hash.clone(),
            Node {
                name,
                hash: hash.clone(),
                parent,
                children: Vec::new(),
                weight,
                kind,
            },
        );
        let child_hashes: Vec<NodeHash> = children
            .into_iter()
            .map(|child| self.put_nodes(child, Some(hash.clone())))
            .collect();
        if let Some(node) = self.nodes.get_mut(&hash) {
            node.children = child_hashes;
        }
        hash
    }

    /// Keep a hash that is scoped to this tree and free; mint otherwise.
    fn keep_or_mint(&mut self, hint: Option<NodeHash>) -> NodeHash {
        let id = self.id();
        match hint {
            Some(hash) if hash.is_scoped_to(id) && !self.nodes.contains_key(&hash) => hash,
            hint => {
                let nodes = &self.nodes;
                let fresh = self.minter.mint(|candidate| nodes.contains_key(candidate));
                if let Some(old) = hint {
                    tracing::trace!(tree = %id, old = %old, new = %fresh, "node rehashed");
                }
                fresh
            }
        }
    }
}

fn check_host(
    kind: &NodeKind,
    hash: &NodeHash,
    name: &str,
    children: usize,
) -> Result<(), TopologyError> {
    match kind.arity() {
        Arity::Leaf => Err(TopologyError::LeafTarget {
            hash: hash.clone(),
            name: name.to_string(),
        }),
        Arity::Single if children > 0 => Err(TopologyError::TargetOccupied {
            hash: hash.clone(),
            name: name.to_string(),
        }),
        _ => Ok(()),
    }
}
