use std::collections::HashSet;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::aux_store::AuxStore;
use crate::error::{LibError, Result};
use crate::ids::IdAllocator;
use crate::models::{BindingId, EdgeId, ElementKind, NodeId};
use crate::selection::Selection;
use crate::tables::{EdgeTable, NodeTable};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphInvariantViolation {
    NonPositiveId {
        kind: ElementKind,
    },
    DuplicateNodeId {
        node_id: NodeId,
    },
    DuplicateEdgeId {
        edge_id: EdgeId,
    },
    UnknownNodeReference {
        edge_id: EdgeId,
        from: NodeId,
        to: NodeId,
        missing_node_id: NodeId,
    },
    IdAboveHighWaterMark {
        kind: ElementKind,
        id: u64,
        high_water_mark: u64,
    },
    StaleSelection {
        kind: ElementKind,
        id: u64,
    },
    DanglingBinding {
        kind: ElementKind,
        element_id: u64,
        binding_id: BindingId,
    },
}

impl GraphInvariantViolation {
    pub const fn error_code(&self) -> &'static str {
        match self {
            GraphInvariantViolation::NonPositiveId { .. } => "graph_non_positive_id",
            GraphInvariantViolation::DuplicateNodeId { .. } => "graph_duplicate_node_id",
            GraphInvariantViolation::DuplicateEdgeId { .. } => "graph_duplicate_edge_id",
            GraphInvariantViolation::UnknownNodeReference { .. } => {
                "graph_unknown_node_reference"
            }
            GraphInvariantViolation::IdAboveHighWaterMark { .. } => "graph_id_above_counter",
            GraphInvariantViolation::StaleSelection { .. } => "graph_stale_selection",
            GraphInvariantViolation::DanglingBinding { .. } => "graph_dangling_binding",
        }
    }

    pub const fn public_message(&self) -> &'static str {
        match self {
            GraphInvariantViolation::NonPositiveId { .. } => "Element ids must be positive",
            GraphInvariantViolation::DuplicateNodeId { .. } => "Node ids must be unique",
            GraphInvariantViolation::DuplicateEdgeId { .. } => "Edge ids must be unique",
            GraphInvariantViolation::UnknownNodeReference { .. } => {
                "Edge references a node that does not exist"
            }
            GraphInvariantViolation::IdAboveHighWaterMark { .. } => {
                "Element id is above the graph's id counter"
            }
            GraphInvariantViolation::StaleSelection { .. } => {
                "Selection references an element that does not exist"
            }
            GraphInvariantViolation::DanglingBinding { .. } => {
                "Element references an attached table that does not exist"
            }
        }
    }
}

pub fn graph_invariant_violations(
    nodes: &NodeTable,
    edges: &EdgeTable,
    ids: &IdAllocator,
    selection: &Selection,
    aux: &AuxStore,
) -> Vec<GraphInvariantViolation> {
    let mut violations = Vec::new();

    let mut node_ids: HashSet<NodeId> = HashSet::with_capacity(nodes.len());
    for node in nodes.iter() {
        if node.id.0 == 0 {
            violations.push(GraphInvariantViolation::NonPositiveId {
                kind: ElementKind::Node,
            });
        }
        if !node_ids.insert(node.id) {
            violations.push(GraphInvariantViolation::DuplicateNodeId { node_id: node.id });
        }
        if node.id.0 > ids.last_node_id() {
            violations.push(GraphInvariantViolation::IdAboveHighWaterMark {
                kind: ElementKind::Node,
                id: node.id.0,
                high_water_mark: ids.last_node_id(),
            });
        }
        if let Some(binding_id) = node.df_id.filter(|binding| !aux.contains(*binding)) {
            violations.push(GraphInvariantViolation::DanglingBinding {
                kind: ElementKind::Node,
                element_id: node.id.0,
                binding_id,
            });
        }
    }

    let mut edge_ids: HashSet<EdgeId> = HashSet::with_capacity(edges.len());
    for edge in edges.iter() {
        if edge.id.0 == 0 {
            violations.push(GraphInvariantViolation::NonPositiveId {
                kind: ElementKind::Edge,
            });
        }
        if !edge_ids.insert(edge.id) {
            violations.push(GraphInvariantViolation::DuplicateEdgeId { edge_id: edge.id });
        }
        if edge.id.0 > ids.last_edge_id() {
            violations.push(GraphInvariantViolation::IdAboveHighWaterMark {
                kind: ElementKind::Edge,
                id: edge.id.0,
                high_water_mark: ids.last_edge_id(),
            });
        }
        for endpoint in [edge.from, edge.to] {
            if !node_ids.contains(&endpoint) {
                violations.push(GraphInvariantViolation::UnknownNodeReference {
                    edge_id: edge.id,
                    from: edge.from,
                    to: edge.to,
                    missing_node_id: endpoint,
                });
                break;
            }
        }
        if let Some(binding_id) = edge.df_id.filter(|binding| !aux.contains(*binding)) {
            violations.push(GraphInvariantViolation::DanglingBinding {
                kind: ElementKind::Edge,
                element_id: edge.id.0,
                binding_id,
            });
        }
    }

    match selection {
        Selection::Empty => {}
        Selection::Nodes(selected) => {
            for id in selected.iter().filter(|id| !nodes.contains(**id)) {
                violations.push(GraphInvariantViolation::StaleSelection {
                    kind: ElementKind::Node,
                    id: id.0,
                });
            }
        }
        Selection::Edges(selected) => {
            for id in selected.iter().filter(|id| !edges.contains(**id)) {
                violations.push(GraphInvariantViolation::StaleSelection {
                    kind: ElementKind::Edge,
                    id: id.0,
                });
            }
        }
    }

    violations
}

pub fn ensure_graph_invariants(
    nodes: &NodeTable,
    edges: &EdgeTable,
    ids: &IdAllocator,
    selection: &Selection,
    aux: &AuxStore,
) -> Result<()> {
    let violations = graph_invariant_violations(nodes, edges, ids, selection, aux);
    let dangling = violations.iter().find_map(|violation| match violation {
        GraphInvariantViolation::UnknownNodeReference {
            missing_node_id, ..
        } => Some((violation, *missing_node_id)),
        _ => None,
    });
    if let Some((violation, missing_node_id)) = dangling {
        return Err(LibError::invalid_reference(
            violation.public_message(),
            missing_node_id.0,
            anyhow!("graph invariant validation failed: {:?}", violations),
        ));
    }
    if let Some(first) = violations.first() {
        let source = anyhow!("graph invariant validation failed: {:?}", violations);
        return Err(LibError::invalid_graph(
            first.error_code(),
            first.public_message(),
            source,
        ));
    }

    Ok(())
}
