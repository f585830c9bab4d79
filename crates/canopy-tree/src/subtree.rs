use canopy_core::NodeHash;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::node::{Arity, NodeKind};
use crate::TopologyError;

fn default_weight() -> f64 {
    1.0
}

/// A detached node and its descendants, owned by value.
///
/// This is how nodes move between trees: removing a node yields a
/// `Subtree`, and adding one registers it (rehashing where needed). `hash`
/// is kept as a hint; the destination tree decides whether it survives.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Subtree {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub hash: Option<NodeHash>,
    #[cfg_attr(feature = "serde", serde(default = "default_weight"))]
    pub weight: f64,
    pub kind: NodeKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub children: Vec<Subtree>,
}

impl Subtree {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            hash: None,
            weight: default_weight(),
            kind,
            children: Vec::new(),
        }
    }

    pub fn condition(name: impl Into<String>, predicate: impl Into<String>) -> Self {
        Self::new(
            name,
            NodeKind::Condition {
                predicate: predicate.into(),
            },
        )
    }

    pub fn command(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self::new(
            name,
            NodeKind::Command {
                action: action.into(),
            },
        )
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_child(mut self, child: Subtree) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Subtree>) -> Self {
        self.children.extend(children);
        self
    }

    /// Number of nodes, this one included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Subtree::node_count).sum::<usize>()
    }

    /// Shape check before attaching: no Root anywhere, and every node within
    /// its kind's arity. Decorators may still be empty.
    pub fn check(&self) -> Result<(), TopologyError> {
        if self.kind.is_root() {
            return Err(TopologyError::RootNode);
        }
        self.check_children()
    }

    fn check_children(&self) -> Result<(), TopologyError> {
        let allowed = match self.kind.arity() {
            Arity::Leaf => 0,
            Arity::Single => 1,
            Arity::Many => usize::MAX,
        };
        if self.children.len() > allowed {
            return Err(TopologyError::MalformedSubtree(format!(
                "{} '{}' holds {} children",
                self.kind.label(),
                self.name,
                self.children.len()
            )));
        }
        for child in &self.children {
            if child.kind.is_root() {
                return Err(TopologyError::MalformedSubtree(format!(
                    "root node '{}' nested under '{}'",
                    child.name, self.name
                )));
            }
            child.check_children()?;
        }
        Ok(())
    }
}
