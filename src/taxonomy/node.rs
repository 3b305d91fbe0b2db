//! Taxonomy node and unit identity types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Index of a node inside an [`AddressTaxonomy`](super::AddressTaxonomy) arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

/// Identity of a taxonomy unit
///
/// Two nodes with the same match key and display name are the same unit, no matter
/// where they sit in the tree or what their children are. This is the key under which
/// crawl progress is stored in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub match_key: String,
    pub display_name: String,
}

impl UnitKey {
    pub fn new(match_key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            match_key: match_key.into(),
            display_name: display_name.into(),
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.match_key)
    }
}

/// A single area of the administrative taxonomy
///
/// Children are owned through the arena; `parent` is a plain index used for
/// navigation only and never takes part in equality or hashing.
#[derive(Debug, Clone)]
pub struct TaxonomyNode {
    pub(crate) id: NodeId,
    pub(crate) match_key: String,
    pub(crate) display_name: String,
    /// Lowercased match key, compared against lowercased input
    pub(crate) needle: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl TaxonomyNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The fragment searched for in free text
    pub fn match_key(&self) -> &str {
        &self.match_key
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Leaves are the unit of crawl work
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn key(&self) -> UnitKey {
        UnitKey::new(&self.match_key, &self.display_name)
    }

    pub(crate) fn matches(&self, lowered: &str) -> bool {
        lowered.contains(&self.needle)
    }
}

impl PartialEq for TaxonomyNode {
    fn eq(&self, other: &Self) -> bool {
        self.match_key == other.match_key && self.display_name == other.display_name
    }
}

impl Eq for TaxonomyNode {}

impl Hash for TaxonomyNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.match_key.hash(state);
        self.display_name.hash(state);
    }
}
