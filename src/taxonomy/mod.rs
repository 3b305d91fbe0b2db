//! Administrative address taxonomy
//!
//! This module builds a forest of administrative areas from configuration and
//! answers one question about free text: which configured area does it mention, and
//! through which path from a root is that area reached?
//!
//! # Matching rules
//!
//! Matching is a case-insensitive substring search. For every node, each child is
//! searched first, in configured order, and the first child whose subtree matches
//! wins. Only when no child matches is the node's own key tested. Roots are tried in
//! configured order and the first root yielding a match wins.
//!
//! # Example
//!
//! ```
//! use catalog_trawler::config::AreaConfig;
//! use catalog_trawler::taxonomy::AddressTaxonomy;
//!
//! let areas = vec![AreaConfig::new("north", "North")
//!     .with_children(vec![AreaConfig::new("north-a", "A")])];
//! let taxonomy = AddressTaxonomy::from_config(&areas).unwrap();
//!
//! assert_eq!(
//!     taxonomy.resolve("some-north-a-street"),
//!     Some(vec!["North".to_string(), "A".to_string()])
//! );
//! assert_eq!(taxonomy.resolve("central-ave"), None);
//! ```

mod node;

pub use node::{NodeId, TaxonomyNode, UnitKey};

use crate::config::AreaConfig;
use crate::TaxonomyError;
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};

/// The configured forest of administrative areas
///
/// Built once per process and shared by reference (usually behind an `Arc`) with
/// every component that needs it.
#[derive(Debug, Clone)]
pub struct AddressTaxonomy {
    nodes: Vec<TaxonomyNode>,
    roots: Vec<NodeId>,
}

impl AddressTaxonomy {
    /// Builds the forest from configured areas
    ///
    /// # Errors
    ///
    /// * `TaxonomyError::EmptyField` - An area has an empty address or name
    /// * `TaxonomyError::DuplicateLeaf` - Two leaves share the same identity, which
    ///   would merge their crawl progress
    pub fn from_config(areas: &[AreaConfig]) -> Result<Self, TaxonomyError> {
        let mut taxonomy = Self {
            nodes: Vec::new(),
            roots: Vec::with_capacity(areas.len()),
        };

        for (index, area) in areas.iter().enumerate() {
            let root = taxonomy.insert(area, None, &index.to_string())?;
            taxonomy.roots.push(root);
        }

        let mut seen = HashSet::new();
        for leaf in taxonomy.leaves() {
            if !seen.insert(leaf.key()) {
                return Err(TaxonomyError::DuplicateLeaf {
                    address: leaf.match_key.clone(),
                    name: leaf.display_name.clone(),
                });
            }
        }

        Ok(taxonomy)
    }

    // Depth-first insertion; children are linked after they are built
    fn insert(
        &mut self,
        area: &AreaConfig,
        parent: Option<NodeId>,
        position: &str,
    ) -> Result<NodeId, TaxonomyError> {
        if area.address.trim().is_empty() {
            return Err(TaxonomyError::EmptyField {
                position: position.to_string(),
                field: "address",
            });
        }
        if area.name.trim().is_empty() {
            return Err(TaxonomyError::EmptyField {
                position: position.to_string(),
                field: "name",
            });
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(TaxonomyNode {
            id,
            match_key: area.address.clone(),
            display_name: area.name.clone(),
            needle: area.address.to_lowercase(),
            parent,
            children: Vec::with_capacity(area.children.len()),
        });

        for (index, child) in area.children.iter().enumerate() {
            let child_id = self.insert(child, Some(id), &format!("{}.{}", position, index))?;
            self.nodes[id.0].children.push(child_id);
        }

        Ok(id)
    }

    /// Returns the node with the given id
    pub fn node(&self, id: NodeId) -> &TaxonomyNode {
        &self.nodes[id.0]
    }

    /// Returns the configured roots in configuration order
    pub fn roots(&self) -> impl Iterator<Item = &TaxonomyNode> + '_ {
        self.roots.iter().map(move |id| self.node(*id))
    }

    /// Returns the parent of a node, if any
    pub fn parent(&self, node: &TaxonomyNode) -> Option<&TaxonomyNode> {
        node.parent.map(|id| self.node(id))
    }

    /// Returns every node without children, in breadth-first order over the roots
    ///
    /// The order is stable for a given configuration; it is the order in which
    /// crawl units are visited.
    pub fn leaves(&self) -> Vec<&TaxonomyNode> {
        let mut leaves = Vec::new();
        let mut queue: VecDeque<NodeId> = self.roots.iter().copied().collect();

        while let Some(id) = queue.pop_front() {
            let node = self.node(id);
            if node.is_leaf() {
                leaves.push(node);
            } else {
                queue.extend(node.children.iter().copied());
            }
        }

        leaves
    }

    /// Returns the display names from the root down to the given node
    pub fn path_of(&self, id: NodeId) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.node(id);
            path.push(node.display_name.clone());
            current = node.parent;
        }
        path.reverse();
        path
    }

    /// Resolves free text to a path of display names
    ///
    /// Returns `None` when no configured area is mentioned, which is an ordinary
    /// outcome rather than an error.
    pub fn resolve(&self, text: &str) -> Option<Vec<String>> {
        self.find(text).map(|id| self.path_of(id))
    }

    /// Resolves several text fragments at once, joined by spaces
    pub fn resolve_parts<S: AsRef<str>>(&self, parts: &[S]) -> Option<Vec<String>> {
        let joined = parts
            .iter()
            .map(|part| part.as_ref())
            .collect::<Vec<_>>()
            .join(" ");
        self.resolve(&joined)
    }

    /// Finds the deepest matching node for the given text
    pub fn find(&self, text: &str) -> Option<NodeId> {
        let lowered = text.to_lowercase();
        self.roots
            .iter()
            .find_map(|root| self.search(*root, &lowered))
    }

    fn search(&self, id: NodeId, lowered: &str) -> Option<NodeId> {
        let node = self.node(id);
        node.children
            .iter()
            .find_map(|child| self.search(*child, lowered))
            .or_else(|| node.matches(lowered).then_some(id))
    }

    /// Total number of nodes in the forest
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Computes a SHA-256 fingerprint of the forest's shape and identities
    ///
    /// Stored in snapshots so that a resumed run can notice a changed taxonomy.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let mut stack: Vec<(NodeId, usize)> =
            self.roots.iter().rev().map(|id| (*id, 0)).collect();

        while let Some((id, depth)) = stack.pop() {
            let node = self.node(id);
            hasher.update(depth.to_le_bytes());
            hasher.update(node.match_key.as_bytes());
            hasher.update([0]);
            hasher.update(node.display_name.as_bytes());
            hasher.update([0]);
            stack.extend(node.children.iter().rev().map(|child| (*child, depth + 1)));
        }

        hex::encode(hasher.finalize())
    }
}
