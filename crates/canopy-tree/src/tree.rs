use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use canopy_core::{NodeHash, TreeId};

use crate::hash::{HashConfig, HashMinter};
use crate::node::{Arity, Node, NodeKind};
use crate::{Subtree, TopologyError, ValidationError};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// A behavior tree: a Root node plus the registry of every node reachable
/// from it.
///
/// Invariants held by every public operation:
/// - each registered node's hash equals its registry key
/// - parent and child links agree
/// - every ancestor chain ends at `root`
#[derive(Debug)]
pub struct Tree {
    id: TreeId,
    name: String,
    agent_kind: Option<String>,
    root: NodeHash,
    pub(crate) nodes: BTreeMap<NodeHash, Node>,
    pub(crate) minter: HashMinter,
}

impl Tree {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, HashConfig::default())
    }

    pub fn with_config(name: impl Into<String>, hashing: HashConfig) -> Self {
        let id = TreeId(NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed));
        Self::build(id, name.into(), hashing)
    }

    /// Build a tree with a caller-chosen id. Later `Tree::new` calls never
    /// hand out an id at or below it.
    pub fn with_id(id: TreeId, name: impl Into<String>, hashing: HashConfig) -> Self {
        NEXT_TREE_ID.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
        Self::build(id, name.into(), hashing)
    }

    fn build(id: TreeId, name: String, hashing: HashConfig) -> Self {
        let mut minter = HashMinter::new(id, hashing);
        let root = minter.mint(|_| false);
        let mut nodes = BTreeMap::new();
        nodes.insert(
            root.clone(),
            Node {
                name: "root".to_string(),
                hash: root.clone(),
                parent: None,
                children: Vec::new(),
                weight: 1.0,
                kind: NodeKind::Root,
            },
        );
        tracing::debug!(tree = %id, %name, root = %root, "tree created");
        Self {
            id,
            name,
            agent_kind: None,
            root,
            nodes,
            minter,
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Agent kind this tree is restricted to, if any.
    pub fn agent_kind(&self) -> Option<&str> {
        self.agent_kind.as_deref()
    }

    pub fn set_agent_kind(&mut self, kind: Option<String>) {
        self.agent_kind = kind;
    }

    pub fn hash_config(&self) -> HashConfig {
        self.minter.config()
    }

    pub fn root(&self) -> &NodeHash {
        &self.root
    }

    pub fn root_node(&self) -> &Node {
        &self.nodes[&self.root]
    }

    pub fn get(&self, hash: &NodeHash) -> Option<&Node> {
        self.nodes.get(hash)
    }

    pub fn contains(&self, hash: &NodeHash) -> bool {
        self.nodes.contains_key(hash)
    }

    /// Number of registered nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn find_by_name<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes.values().filter(move |n| n.name == name)
    }

    /// Plain traversal step: composite and decorator children only. Never
    /// leaves this tree.
    pub fn children_of(&self, hash: &NodeHash) -> &[NodeHash] {
        self.nodes
            .get(hash)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    /// Pre-order walk of `hash` and its descendants using [`Tree::children_of`].
    pub fn descendants(&self, hash: &NodeHash) -> Vec<NodeHash> {
        let mut out = Vec::new();
        if !self.nodes.contains_key(hash) {
            return out;
        }
        let mut stack = vec![hash.clone()];
        while let Some(current) = stack.pop() {
            stack.extend(self.children_of(&current).iter().rev().cloned());
            out.push(current);
        }
        out
    }

    /// `true` if `ancestor` lies strictly above `node`.
    pub fn is_ancestor(&self, ancestor: &NodeHash, node: &NodeHash) -> bool {
        let mut current = self.nodes.get(node).and_then(|n| n.parent.as_ref());
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            current = self.nodes.get(parent).and_then(|n| n.parent.as_ref());
        }
        false
    }

    /// Position of `hash` among its parent's children.
    pub fn index_in_parent(&self, hash: &NodeHash) -> Option<usize> {
        let parent = self.nodes.get(hash)?.parent.as_ref()?;
        self.nodes
            .get(parent)?
            .children
            .iter()
            .position(|c| c == hash)
    }

    /// Report the first Decorator or Root, in pre-order, that has no child.
    pub fn validate_tree(&self) -> Result<(), ValidationError> {
        for hash in self.descendants(&self.root) {
            let node = &self.nodes[&hash];
            if node.arity() == Arity::Single && node.children.is_empty() {
                return Err(ValidationError::MissingChild {
                    hash,
                    name: node.name.clone(),
                    kind: node.kind.label(),
                });
            }
        }
        Ok(())
    }

    /// Owned copy of `hash` and its descendants, hashes included.
    pub fn clone_subtree(&self, hash: &NodeHash) -> Option<Subtree> {
        let node = self.nodes.get(hash)?;
        let children = node
            .children
            .iter()
            .filter_map(|c| self.clone_subtree(c))
            .collect();
        Some(Subtree {
            name: node.name.clone(),
            hash: Some(node.hash.clone()),
            weight: node.weight,
            kind: node.kind.clone(),
            children,
        })
    }

    pub fn rename(
        &mut self,
        hash: &NodeHash,
        name: impl Into<String>,
    ) -> Result<(), TopologyError> {
        let node = self
            .nodes
            .get_mut(hash)
            .ok_or_else(|| TopologyError::UnknownNode(hash.clone()))?;
        node.name = name.into();
        Ok(())
    }

    pub fn set_weight(&mut self, hash: &NodeHash, weight: f64) -> Result<(), TopologyError> {
        let node = self
            .nodes
            .get_mut(hash)
            .ok_or_else(|| TopologyError::UnknownNode(hash.clone()))?;
        node.weight = weight;
        Ok(())
    }

    /// Swap a node's kind in place, keeping its hash and children. The new
    /// kind must accept the current number of children; Root can neither be
    /// replaced nor introduced.
    pub fn replace_kind(&mut self, hash: &NodeHash, kind: NodeKind) -> Result<(), TopologyError> {
        let node = self
            .nodes
            .get_mut(hash)
            .ok_or_else(|| TopologyError::UnknownNode(hash.clone()))?;
        if node.kind.is_root() || kind.is_root() {
            return Err(TopologyError::RootNode);
        }
        let children = node.children.len();
        let fits = match kind.arity() {
            Arity::Leaf => children == 0,
            Arity::Single => children <= 1,
            Arity::Many => true,
        };
        if !fits {
            return Err(TopologyError::ArityMismatch {
                kind: kind.label(),
                children,
            });
        }
        node.kind = kind;
        Ok(())
    }

    /// Checks the structural invariants from scratch.
    pub fn is_consistent(&self) -> bool {
        let reachable = self.descendants(&self.root);
        if reachable.len() != self.nodes.len() {
            return false;
        }
        self.nodes.iter().all(|(key, node)| {
            if *key != node.hash {
                return false;
            }
            let parent_ok = match &node.parent {
                None => *key == self.root,
                Some(p) => self
                    .nodes
                    .get(p)
                    .map(|pn| pn.children.iter().filter(|c| *c == key).count() == 1)
                    .unwrap_or(false),
            };
            let children_ok = node.children.iter().all(|c| {
                self.nodes
                    .get(c)
                    .map(|cn| cn.parent.as_ref() == Some(key))
                    .unwrap_or(false)
            });
            let arity_ok = match node.arity() {
                Arity::Leaf => node.children.is_empty(),
                Arity::Single => node.children.len() <= 1,
                Arity::Many => true,
            };
            parent_ok && children_ok && arity_ok
        })
    }
}
