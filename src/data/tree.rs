//! Recursive container of per-domain mesh chunks.
//!
//! A tree is either empty, a single leaf, or an ordered list of child trees.
//! Depth-first leaf order is the domain order every filter must preserve.
//!
//! ```text
//! Node
//! +-- Leaf(domain 0)
//! +-- Node
//! |   +-- Leaf(domain 1)
//! |   +-- Leaf(domain 2)
//! +-- Leaf(domain 3)
//! ```

use crate::data::mesh::MeshHandle;
use crate::data::representation::DataRepresentation;
use crate::types::{DomainId, Extents};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Shared handle to a whole tree, passed between a producer and its consumers.
pub type DataTreeRef = Arc<DataTree>;

#[derive(Debug, Clone, Default)]
pub enum DataTree {
    #[default]
    Empty,
    Leaf(DataRepresentation),
    Node(Vec<DataTree>),
}

impl DataTree {
    pub fn leaf(mesh: MeshHandle, domain: DomainId, label: impl Into<String>) -> Self {
        DataTree::Leaf(DataRepresentation::new(mesh, domain, label))
    }

    /// Internal node over `children`, dropping empty ones.
    ///
    /// Collapses to `Empty` when nothing is left.
    pub fn from_children(children: Vec<DataTree>) -> Self {
        let children: Vec<DataTree> = children.into_iter().filter(|c| !c.is_empty()).collect();
        if children.is_empty() {
            DataTree::Empty
        } else {
            DataTree::Node(children)
        }
    }

    /// Concatenate trees in order.
    pub fn merge(trees: Vec<DataTree>) -> Self {
        Self::from_children(trees)
    }

    /// True when the tree holds no leaves.
    pub fn is_empty(&self) -> bool {
        match self {
            DataTree::Empty => true,
            DataTree::Leaf(_) => false,
            DataTree::Node(children) => children.iter().all(|c| c.is_empty()),
        }
    }

    /// Depth-first leaf iterator.
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves { stack: vec![self] }
    }

    pub fn number_of_leaves(&self) -> usize {
        self.leaves().count()
    }

    /// Domain indices in traversal order.
    pub fn domain_ids(&self) -> Vec<DomainId> {
        self.leaves().map(|l| l.domain()).collect()
    }

    pub fn unique_labels(&self) -> Vec<String> {
        self.leaves()
            .map(|l| l.label().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Union of the leaves' spatial extents, `None` for an empty tree.
    pub fn spatial_extents(&self) -> Option<Extents> {
        let mut leaves = self.leaves();
        let mut total = leaves.next()?.spatial_extents().clone();
        for leaf in leaves {
            total.merge(leaf.spatial_extents());
        }
        Some(total)
    }

    /// Keep only leaves whose label is in `labels`, preserving structure and order.
    pub fn prune_by_labels(&self, labels: &[&str]) -> DataTree {
        match self {
            DataTree::Empty => DataTree::Empty,
            DataTree::Leaf(rep) => {
                if labels.iter().any(|&l| l == rep.label()) {
                    DataTree::Leaf(rep.clone())
                } else {
                    DataTree::Empty
                }
            }
            DataTree::Node(children) => DataTree::from_children(
                children.iter().map(|c| c.prune_by_labels(labels)).collect(),
            ),
        }
    }

    /// Copy with every leaf label rewritten by `f`.
    pub fn relabel<F>(&self, f: &F) -> DataTree
    where
        F: Fn(&DataRepresentation) -> String,
    {
        match self {
            DataTree::Empty => DataTree::Empty,
            DataTree::Leaf(rep) => DataTree::Leaf(rep.relabeled(f(rep))),
            DataTree::Node(children) => {
                DataTree::Node(children.iter().map(|c| c.relabel(f)).collect())
            }
        }
    }

    /// Release the mesh of every leaf, keeping the structure and metadata.
    pub fn release_data(&mut self) {
        match self {
            DataTree::Empty => {}
            DataTree::Leaf(rep) => rep.release(),
            DataTree::Node(children) => children.iter_mut().for_each(|c| c.release_data()),
        }
    }
}

/// Depth-first iterator over the leaves of a [`DataTree`].
pub struct Leaves<'a> {
    stack: Vec<&'a DataTree>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a DataRepresentation;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(tree) = self.stack.pop() {
            match tree {
                DataTree::Empty => {}
                DataTree::Leaf(rep) => return Some(rep),
                DataTree::Node(children) => self.stack.extend(children.iter().rev()),
            }
        }
        None
    }
}
