use core::fmt;
use std::borrow::Borrow;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Process-unique identifier of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TreeId(pub u64);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short, tree-scoped node identifier, e.g. `k3x9-7`.
///
/// The part after the last `-` is the scope suffix of the tree that
/// assigned the hash.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct NodeHash(String);

impl NodeHash {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Scope suffix, if the hash carries one.
    pub fn scope(&self) -> Option<&str> {
        self.0.rsplit_once('-').map(|(_, scope)| scope)
    }

    pub fn is_scoped_to(&self, tree: TreeId) -> bool {
        self.scope()
            .and_then(|s| s.parse::<u64>().ok())
            .map(|id| id == tree.0)
            .unwrap_or(false)
    }
}

impl fmt::Display for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeHash {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeHash {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeHash {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// A node addressed across trees.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeRef {
    pub tree: TreeId,
    pub hash: NodeHash,
}

impl NodeRef {
    pub fn new(tree: TreeId, hash: NodeHash) -> Self {
        Self { tree, hash }
    }
}

/// How a caller names a tree: by id, or by name lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TreeSelector {
    Id(TreeId),
    Name(String),
}

impl From<TreeId> for TreeSelector {
    fn from(id: TreeId) -> Self {
        TreeSelector::Id(id)
    }
}

impl From<&str> for TreeSelector {
    fn from(name: &str) -> Self {
        TreeSelector::Name(name.to_string())
    }
}

impl fmt::Display for TreeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeSelector::Id(id) => write!(f, "#{id}"),
            TreeSelector::Name(name) => write!(f, "'{name}'"),
        }
    }
}
