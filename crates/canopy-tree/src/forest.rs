use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use canopy_core::{NodeHash, NodeRef, TreeId, TreeSelector};

use crate::{HashConfig, NodeOrigin, TopologyError, Tree};

/// Forest shared between ticking threads (readers) and an editor (writer).
pub type SharedForest = Arc<RwLock<Forest>>;

/// The set of trees handlers bind to and Transition nodes jump into.
#[derive(Debug, Default)]
pub struct Forest {
    trees: BTreeMap<TreeId, Tree>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_shared(self) -> SharedForest {
        Arc::new(RwLock::new(self))
    }

    /// Add `tree`, replacing (and returning) any tree with the same id.
    pub fn insert(&mut self, tree: Tree) -> Option<Tree> {
        self.trees.insert(tree.id(), tree)
    }

    pub fn create(&mut self, name: impl Into<String>) -> TreeId {
        self.create_with(name, HashConfig::default())
    }

    pub fn create_with(&mut self, name: impl Into<String>, hashing: HashConfig) -> TreeId {
        let tree = Tree::with_config(name, hashing);
        let id = tree.id();
        self.trees.insert(id, tree);
        id
    }

    pub fn get(&self, id: TreeId) -> Option<&Tree> {
        self.trees.get(&id)
    }

    pub fn get_mut(&mut self, id: TreeId) -> Option<&mut Tree> {
        self.trees.get_mut(&id)
    }

    /// First tree (lowest id) with this name.
    pub fn by_name(&self, name: &str) -> Option<&Tree> {
        self.trees.values().find(|t| t.name() == name)
    }

    pub fn resolve(&self, selector: &TreeSelector) -> Option<TreeId> {
        match selector {
            TreeSelector::Id(id) => self.trees.contains_key(id).then_some(*id),
            TreeSelector::Name(name) => self.by_name(name).map(Tree::id),
        }
    }

    pub fn remove(&mut self, id: TreeId) -> Option<Tree> {
        self.trees.remove(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = TreeId> + '_ {
        self.trees.keys().copied()
    }

    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.values()
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn node(&self, node: &NodeRef) -> Option<&crate::Node> {
        self.trees.get(&node.tree)?.get(&node.hash)
    }

    /// Two distinct trees borrowed mutably at once.
    pub fn pair_mut(
        &mut self,
        a: TreeId,
        b: TreeId,
    ) -> Result<(&mut Tree, &mut Tree), TopologyError> {
        if a == b {
            return Err(TopologyError::SameTree(a));
        }
        let mut first = None;
        let mut second = None;
        for (id, tree) in self.trees.iter_mut() {
            if *id == a {
                first = Some(tree);
            } else if *id == b {
                second = Some(tree);
            }
        }
        match (first, second) {
            (Some(first), Some(second)) => Ok((first, second)),
            (None, _) => Err(TopologyError::UnknownTree(TreeSelector::Id(a))),
            (_, None) => Err(TopologyError::UnknownTree(TreeSelector::Id(b))),
        }
    }

    /// Multi-tree traversal step: like [`Tree::children_of`], but a
    /// Transition leaf leads to the root of its target tree. Used for setup;
    /// hash bookkeeping must stay on the plain traversal.
    pub fn children_of_following_transitions(&self, node: &NodeRef) -> Vec<NodeRef> {
        let Some(tree) = self.trees.get(&node.tree) else {
            return Vec::new();
        };
        let Some(found) = tree.get(&node.hash) else {
            return Vec::new();
        };
        if let Some(target) = found.kind().transition_target() {
            return self
                .resolve(target)
                .and_then(|id| self.trees.get(&id))
                .map(|t| vec![NodeRef::new(t.id(), t.root().clone())])
                .unwrap_or_default();
        }
        found
            .children()
            .iter()
            .map(|c| NodeRef::new(node.tree, c.clone()))
            .collect()
    }

    /// Pre-order walk from `tree`'s root across Transition edges. Each tree
    /// is entered at most once, so transition cycles terminate.
    pub fn walk_following_transitions(&self, tree: TreeId) -> Vec<NodeRef> {
        let mut out = Vec::new();
        let Some(start) = self.trees.get(&tree) else {
            return out;
        };
        let mut entered: BTreeSet<TreeId> = BTreeSet::new();
        entered.insert(tree);
        let mut stack = vec![NodeRef::new(tree, start.root().clone())];
        while let Some(current) = stack.pop() {
            let next = self.children_of_following_transitions(&current);
            for child in next.into_iter().rev() {
                // Roots are only reachable through a Transition edge.
                let is_root = self
                    .trees
                    .get(&child.tree)
                    .map(|t| *t.root() == child.hash)
                    .unwrap_or(false);
                if is_root && !entered.insert(child.tree) {
                    continue;
                }
                stack.push(child);
            }
            out.push(current);
        }
        out
    }

    /// [`Tree::add`] with the node taken from another tree of this forest.
    pub fn add_across(
        &mut self,
        source: TreeId,
        node: &NodeHash,
        dest: TreeId,
        target: &NodeHash,
        position: Option<usize>,
        copying: bool,
    ) -> Result<NodeHash, TopologyError> {
        if source == dest {
            let tree = self.tree_mut(dest)?;
            return tree.add(node, target, position, copying);
        }
        let (src, dst) = self.pair_mut(source, dest)?;
        dst.add(
            NodeOrigin::Foreign {
                tree: src,
                node: node.clone(),
            },
            target,
            position,
            copying,
        )
    }

    /// [`Tree::interpose`] with the node taken from another tree of this forest.
    pub fn interpose_across(
        &mut self,
        source: TreeId,
        node: &NodeHash,
        dest: TreeId,
        target: &NodeHash,
        position: Option<usize>,
        copying: bool,
    ) -> Result<NodeHash, TopologyError> {
        if source == dest {
            let tree = self.tree_mut(dest)?;
            return tree.interpose(node, target, position, copying);
        }
        let (src, dst) = self.pair_mut(source, dest)?;
        dst.interpose(
            NodeOrigin::Foreign {
                tree: src,
                node: node.clone(),
            },
            target,
            position,
            copying,
        )
    }

    /// Swap two nodes that may live in different trees. Returns the nodes'
    /// hashes after the swap, `(a, b)`.
    pub fn swap_across(
        &mut self,
        tree_a: TreeId,
        a: &NodeHash,
        tree_b: TreeId,
        b: &NodeHash,
    ) -> Result<(NodeHash, NodeHash), TopologyError> {
        if tree_a == tree_b {
            self.tree_mut(tree_a)?.swap(a, b)?;
            return Ok((a.clone(), b.clone()));
        }
        let (ta, tb) = self.pair_mut(tree_a, tree_b)?;
        ta.swap_across(a, tb, b)
    }

    fn tree_mut(&mut self, id: TreeId) -> Result<&mut Tree, TopologyError> {
        self.trees
            .get_mut(&id)
            .ok_or(TopologyError::UnknownTree(TreeSelector::Id(id)))
    }
}
