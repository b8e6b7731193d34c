use serde::{Deserialize, Serialize};

use crate::models::{EdgeId, NodeId};

/// The set of elements selection-scoped operations act on. A graph holds node ids or edge
/// ids, never both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ids", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    Empty,
    Nodes(Vec<NodeId>),
    Edges(Vec<EdgeId>),
}

impl Selection {
    /// Node selection in first-seen order with duplicates dropped.
    pub fn of_nodes(ids: impl IntoIterator<Item = NodeId>) -> Self {
        let ids = dedup(ids);
        if ids.is_empty() {
            Self::Empty
        } else {
            Self::Nodes(ids)
        }
    }

    pub fn of_edges(ids: impl IntoIterator<Item = EdgeId>) -> Self {
        let ids = dedup(ids);
        if ids.is_empty() {
            Self::Empty
        } else {
            Self::Edges(ids)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn node_ids(&self) -> Option<&[NodeId]> {
        match self {
            Self::Nodes(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn edge_ids(&self) -> Option<&[EdgeId]> {
        match self {
            Self::Edges(ids) => Some(ids),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Nodes(ids) => ids.len(),
            Self::Edges(ids) => ids.len(),
        }
    }

    /// Drops selected nodes for which `keep` is false, collapsing to `Empty` when none remain.
    pub fn retain_nodes(&mut self, mut keep: impl FnMut(NodeId) -> bool) {
        if let Self::Nodes(ids) = self {
            ids.retain(|id| keep(*id));
            if ids.is_empty() {
                *self = Self::Empty;
            }
        }
    }

    pub fn retain_edges(&mut self, mut keep: impl FnMut(EdgeId) -> bool) {
        if let Self::Edges(ids) = self {
            ids.retain(|id| keep(*id));
            if ids.is_empty() {
                *self = Self::Empty;
            }
        }
    }
}

fn dedup<T: Copy + Eq + std::hash::Hash>(ids: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn of_nodes_keeps_first_seen_order() {
        let selection = Selection::of_nodes([NodeId(3), NodeId(1), NodeId(3)]);
        assert_eq!(selection.node_ids(), Some(&[NodeId(3), NodeId(1)][..]));
        assert_eq!(selection.edge_ids(), None);
    }

    #[test]
    fn retain_collapses_to_empty() {
        let mut selection = Selection::of_edges([EdgeId(2)]);
        selection.retain_edges(|id| id != EdgeId(2));
        assert!(selection.is_empty());
    }

    #[test]
    fn empty_input_is_no_selection() {
        assert_eq!(Selection::of_nodes(Vec::new()), Selection::Empty);
    }
}
