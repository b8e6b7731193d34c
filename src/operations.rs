use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;

use crate::algorithms::{self, NodeMetric};
use crate::error::{LibError, Result};
use crate::graph::{Graph, missing_attr};
use crate::ids::IdAllocator;
use crate::models::{BindingId, Edge, EdgeId, ElementKind, NewEdge, Node, NodeId};
use crate::registry as ops;
use crate::selection::Selection;
use crate::tables::{EdgeTable, NodeTable};
use crate::transform;

/// Rows of one graph renumbered contiguously from the given offsets.
struct Renumbered {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    node_map: HashMap<NodeId, NodeId>,
    edge_map: HashMap<EdgeId, EdgeId>,
    repoints: Vec<(BindingId, u64)>,
}

fn renumber(source: &Graph, node_offset: u64, edge_offset: u64) -> Renumbered {
    let mut node_map = HashMap::with_capacity(source.nodes.len());
    let mut repoints = Vec::new();
    let nodes = source
        .nodes
        .iter()
        .zip(node_offset + 1..)
        .map(|(node, new_id)| {
            node_map.insert(node.id, NodeId(new_id));
            if let Some(binding) = node.df_id {
                repoints.push((binding, new_id));
            }
            Node {
                id: NodeId(new_id),
                ..node.clone()
            }
        })
        .collect::<Vec<_>>();

    let mut edge_map = HashMap::with_capacity(source.edges.len());
    let mut edges = Vec::with_capacity(source.edges.len());
    for (edge, new_id) in source.edges.iter().zip(edge_offset + 1..) {
        let (Some(from), Some(to)) = (node_map.get(&edge.from), node_map.get(&edge.to)) else {
            continue;
        };
        edge_map.insert(edge.id, EdgeId(new_id));
        if let Some(binding) = edge.df_id {
            repoints.push((binding, new_id));
        }
        edges.push(Edge {
            id: EdgeId(new_id),
            from: *from,
            to: *to,
            ..edge.clone()
        });
    }

    Renumbered {
        nodes,
        edges,
        node_map,
        edge_map,
        repoints,
    }
}

impl Renumbered {
    /// Rewrites binding ids that were rekeyed when the attached tables were merged.
    fn rebind(&mut self, rekeyed: &HashMap<BindingId, BindingId>) {
        if rekeyed.is_empty() {
            return;
        }
        let fresh = |binding: BindingId| rekeyed.get(&binding).copied().unwrap_or(binding);
        for node in &mut self.nodes {
            node.df_id = node.df_id.map(fresh);
        }
        for edge in &mut self.edges {
            edge.df_id = edge.df_id.map(fresh);
        }
        for (binding, _) in &mut self.repoints {
            *binding = fresh(*binding);
        }
    }
}

impl Graph {
    /// Union of two graphs as a new graph. See [`Graph::combine_with`].
    pub fn combine(base: &Graph, other: &Graph) -> Result<Graph> {
        let mut combined = base.clone();
        combined.combine_with(other)?;
        Ok(combined)
    }

    /// Merges `other` into this graph.
    ///
    /// Nodes and edges of both graphs are renumbered contiguously from 1, this graph's
    /// elements first. Attached tables of both graphs follow their elements. Identity,
    /// configuration, graph actions and global attributes stay those of this graph.
    pub fn combine_with(&mut self, other: &Graph) -> Result<()> {
        if self.directed != other.directed {
            return Err(LibError::incompatible(
                "Cannot combine a directed graph with an undirected one",
                anyhow!(
                    "graph {} directed={} vs graph {} directed={}",
                    self.id,
                    self.directed,
                    other.id,
                    other.directed
                ),
            ));
        }
        other.ensure_well_formed()?;

        self.transact_atomic(ops::COMBINE_GRAPHS, |graph| {
            let base = renumber(graph, 0, 0);
            let mut added = renumber(other, base.nodes.len() as u64, base.edges.len() as u64);

            let mut aux = (*graph.aux).clone();
            let rekeyed = aux.absorb((*other.aux).clone());
            added.rebind(&rekeyed);
            for (binding, element_id) in base.repoints.iter().chain(&added.repoints) {
                aux.repoint(*binding, *element_id);
            }

            graph.selection = match &graph.selection {
                Selection::Empty => Selection::Empty,
                Selection::Nodes(ids) => {
                    Selection::of_nodes(ids.iter().filter_map(|id| base.node_map.get(id).copied()))
                }
                Selection::Edges(ids) => {
                    Selection::of_edges(ids.iter().filter_map(|id| base.edge_map.get(id).copied()))
                }
            };

            let mut nodes = base.nodes;
            nodes.extend(added.nodes);
            let mut edges = base.edges;
            edges.extend(added.edges);
            graph.ids = IdAllocator::starting_at(nodes.len() as u64, edges.len() as u64);
            graph.nodes = Arc::new(NodeTable::from_rows(nodes));
            graph.edges = Arc::new(EdgeTable::from_rows(edges));
            graph.aux = Arc::new(aux);
            Ok(())
        })
    }

    /// Complement of this graph as a new graph. See [`Graph::transform_to_complement`].
    pub fn complement(&self, loops: bool) -> Result<Graph> {
        let mut complement = self.clone();
        complement.transform_to_complement(loops)?;
        Ok(complement)
    }

    /// Replaces every edge with the edges between node pairs that were not adjacent.
    ///
    /// Nodes are kept unchanged. New edges carry no attributes and are numbered from 1;
    /// tables attached to the old edges are dropped.
    pub fn transform_to_complement(&mut self, loops: bool) -> Result<()> {
        self.transact_atomic(ops::TRANSFORM_TO_COMPLEMENT_GRAPH, |graph| {
            graph.require_nodes(ops::TRANSFORM_TO_COMPLEMENT_GRAPH)?;
            let engine = graph.engine().complement(loops);
            let (_, edges) = algorithms::from_engine_format(&engine);

            let released = graph
                .edges
                .iter()
                .filter_map(|edge| edge.df_id)
                .collect::<Vec<_>>();
            for binding in released {
                graph.release_binding(Some(binding));
            }
            if matches!(graph.selection, Selection::Edges(_)) {
                graph.selection = Selection::Empty;
            }
            graph.ids.reset_edges(edges.max_id());
            graph.edges = Arc::new(edges);
            Ok(())
        })
    }

    /// Adds the edges missing between every pair of selected nodes.
    ///
    /// Directed graphs receive both orientations. Existing edges are left alone and the
    /// node selection is kept.
    pub fn fully_connect_nodes_ws(&mut self) -> Result<Vec<EdgeId>> {
        self.transact_atomic(ops::FULLY_CONNECT_NODES_WS, |graph| {
            let selected = graph.require_node_selection()?;
            let directed = graph.directed;
            let mut added = Vec::new();
            for (position, &u) in selected.iter().enumerate() {
                for &v in &selected[position + 1..] {
                    let mut pairs = vec![(u, v)];
                    if directed {
                        pairs.push((v, u));
                    }
                    for (from, to) in pairs {
                        if !graph.edges.connects(from, to, directed) {
                            added.push(graph.add_edge(NewEdge::new(from, to))?);
                        }
                    }
                }
            }
            Ok(added)
        })
    }

    /// Linearly rescales a numeric node column into `[to_lower, to_upper]`.
    ///
    /// Writes to `to_attr` when given, otherwise overwrites `from_attr`.
    pub fn rescale_node_attrs(
        &mut self,
        from_attr: &str,
        to_lower: f64,
        to_upper: f64,
        to_attr: Option<&str>,
    ) -> Result<()> {
        self.transact_atomic(ops::RESCALE_NODE_ATTRS, |graph| {
            check_bounds(to_lower, to_upper)?;
            if !graph.node_column_exists(from_attr) {
                return Err(missing_attr(from_attr, ElementKind::Node));
            }
            let (ids, values): (Vec<_>, Vec<_>) = graph.node_attr_values(from_attr).into_iter().unzip();
            let scaled = transform::rescale(&values, (to_lower, to_upper), None);
            graph.write_node_column(to_attr.unwrap_or(from_attr), ids.into_iter().zip(scaled).collect())
        })
    }

    pub fn rescale_edge_attrs(
        &mut self,
        from_attr: &str,
        to_lower: f64,
        to_upper: f64,
        to_attr: Option<&str>,
    ) -> Result<()> {
        self.transact_atomic(ops::RESCALE_EDGE_ATTRS, |graph| {
            check_bounds(to_lower, to_upper)?;
            if !graph.edge_column_exists(from_attr) {
                return Err(missing_attr(from_attr, ElementKind::Edge));
            }
            let (ids, values): (Vec<_>, Vec<_>) = graph.edge_attr_values(from_attr).into_iter().unzip();
            let scaled = transform::rescale(&values, (to_lower, to_upper), None);
            graph.write_edge_column(to_attr.unwrap_or(from_attr), ids.into_iter().zip(scaled).collect())
        })
    }

    /// Maps a node column onto `palette`, writing the colors to `to_attr` (default `fillcolor`).
    pub fn colorize_node_attrs(
        &mut self,
        from_attr: &str,
        palette: &[String],
        to_attr: Option<&str>,
    ) -> Result<()> {
        self.transact_atomic(ops::COLORIZE_NODE_ATTRS, |graph| {
            if !graph.node_column_exists(from_attr) {
                return Err(missing_attr(from_attr, ElementKind::Node));
            }
            let (ids, values): (Vec<_>, Vec<_>) = graph.node_attr_values(from_attr).into_iter().unzip();
            let colors = transform::colorize(&values, palette)?;
            graph.write_node_column(to_attr.unwrap_or("fillcolor"), ids.into_iter().zip(colors).collect())
        })
    }

    /// Maps an edge column onto `palette`, writing the colors to `to_attr` (default `color`).
    pub fn colorize_edge_attrs(
        &mut self,
        from_attr: &str,
        palette: &[String],
        to_attr: Option<&str>,
    ) -> Result<()> {
        self.transact_atomic(ops::COLORIZE_EDGE_ATTRS, |graph| {
            if !graph.edge_column_exists(from_attr) {
                return Err(missing_attr(from_attr, ElementKind::Edge));
            }
            let (ids, values): (Vec<_>, Vec<_>) = graph.edge_attr_values(from_attr).into_iter().unzip();
            let colors = transform::colorize(&values, palette)?;
            graph.write_edge_column(to_attr.unwrap_or("color"), ids.into_iter().zip(colors).collect())
        })
    }

    /// Computes `metric` for every node and stores it in the node column `to_attr`.
    pub fn set_node_attr_w_metric(&mut self, metric: NodeMetric, to_attr: &str) -> Result<()> {
        self.transact_atomic(ops::SET_NODE_ATTR_W_METRIC, |graph| {
            graph.require_nodes(ops::SET_NODE_ATTR_W_METRIC)?;
            let values = graph.engine().metric(metric);
            graph.write_node_column(to_attr, values)
        })
    }
}

fn check_bounds(to_lower: f64, to_upper: f64) -> Result<()> {
    if !to_lower.is_finite() || !to_upper.is_finite() {
        return Err(LibError::invalid(
            "Rescale bounds must be finite numbers",
            anyhow!("rescale bounds [{}, {}]", to_lower, to_upper),
        ));
    }
    Ok(())
}
