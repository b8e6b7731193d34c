use std::collections::HashMap;

use petgraph::algo::dijkstra;
use petgraph::graph::Graph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, EdgeType, Undirected};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{Edge, EdgeId, Node, NodeId};
use crate::tables::{EdgeTable, NodeTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegreeMode {
    In,
    Out,
    Total,
}

/// Per-node metrics that can be written back into a node attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeMetric {
    DegreeIn,
    DegreeOut,
    DegreeTotal,
    Eccentricity,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DegreeFrequency {
    pub degree: usize,
    pub proportion: f64,
}

#[derive(Debug, Clone)]
pub struct EngineRepr<Ty: EdgeType> {
    graph: Graph<Node, Edge, Ty>,
}

#[derive(Debug, Clone)]
pub enum EngineGraph {
    Directed(EngineRepr<Directed>),
    Undirected(EngineRepr<Undirected>),
}

macro_rules! with_repr {
    ($engine:expr, $repr:ident => $body:expr) => {
        match $engine {
            EngineGraph::Directed($repr) => $body,
            EngineGraph::Undirected($repr) => $body,
        }
    };
}

pub fn to_engine_format(nodes: &NodeTable, edges: &EdgeTable, directed: bool) -> EngineGraph {
    if directed {
        EngineGraph::Directed(build(nodes, edges))
    } else {
        EngineGraph::Undirected(build(nodes, edges))
    }
}

pub fn from_engine_format(engine: &EngineGraph) -> (NodeTable, EdgeTable) {
    with_repr!(engine, repr => unbuild(repr))
}

impl EngineGraph {
    pub fn is_directed(&self) -> bool {
        matches!(self, EngineGraph::Directed(_))
    }

    pub fn node_count(&self) -> usize {
        with_repr!(self, repr => repr.graph.node_count())
    }

    pub fn edge_count(&self) -> usize {
        with_repr!(self, repr => repr.graph.edge_count())
    }

    /// Degree of every node in table order. Undirected self-loops count twice.
    pub fn degrees(&self, mode: DegreeMode) -> Vec<(NodeId, usize)> {
        with_repr!(self, repr => degrees(repr, mode))
    }

    /// Longest shortest-path distance from each node to any node it can reach.
    pub fn eccentricity(&self) -> Vec<(NodeId, usize)> {
        with_repr!(self, repr => eccentricity(repr))
    }

    /// Graph over the same nodes whose edges are exactly the node pairs not adjacent here.
    ///
    /// Parallel edges collapse to simple adjacency, edge attributes are dropped, and the
    /// new edges are numbered from 1.
    pub fn complement(&self, loops: bool) -> EngineGraph {
        match self {
            EngineGraph::Directed(repr) => EngineGraph::Directed(complement(repr, loops)),
            EngineGraph::Undirected(repr) => EngineGraph::Undirected(complement(repr, loops)),
        }
    }

    pub fn metric(&self, metric: NodeMetric) -> Vec<(NodeId, Value)> {
        let values = match metric {
            NodeMetric::DegreeIn => self.degrees(DegreeMode::In),
            NodeMetric::DegreeOut => self.degrees(DegreeMode::Out),
            NodeMetric::DegreeTotal => self.degrees(DegreeMode::Total),
            NodeMetric::Eccentricity => self.eccentricity(),
        };
        values
            .into_iter()
            .map(|(id, value)| (id, Value::from(value)))
            .collect()
    }
}

/// Share of nodes having each degree from 0 up to the maximum degree.
pub fn degree_distribution(degrees: &[(NodeId, usize)]) -> Vec<DegreeFrequency> {
    let Some(max) = degrees.iter().map(|(_, degree)| *degree).max() else {
        return Vec::new();
    };
    let mut counts = vec![0usize; max + 1];
    for (_, degree) in degrees {
        counts[*degree] += 1;
    }
    let total = degrees.len() as f64;
    counts
        .into_iter()
        .enumerate()
        .map(|(degree, count)| DegreeFrequency {
            degree,
            proportion: count as f64 / total,
        })
        .collect()
}

fn build<Ty: EdgeType>(nodes: &NodeTable, edges: &EdgeTable) -> EngineRepr<Ty> {
    let mut graph = Graph::with_capacity(nodes.len(), edges.len());
    let mut index = HashMap::with_capacity(nodes.len());
    for node in nodes.iter() {
        index.insert(node.id, graph.add_node(node.clone()));
    }
    for edge in edges.iter() {
        // Best-effort behavior: skip dangling edges, invariants report them separately.
        let (Some(&from), Some(&to)) = (index.get(&edge.from), index.get(&edge.to)) else {
            continue;
        };
        graph.add_edge(from, to, edge.clone());
    }
    EngineRepr { graph }
}

fn unbuild<Ty: EdgeType>(repr: &EngineRepr<Ty>) -> (NodeTable, EdgeTable) {
    let nodes = repr.graph.node_weights().cloned().collect();
    let edges = repr.graph.edge_weights().cloned().collect();
    (NodeTable::from_rows(nodes), EdgeTable::from_rows(edges))
}

fn degrees<Ty: EdgeType>(repr: &EngineRepr<Ty>, mode: DegreeMode) -> Vec<(NodeId, usize)> {
    let mut counts = vec![0usize; repr.graph.node_count()];
    for edge in repr.graph.edge_references() {
        let (source, target) = (edge.source().index(), edge.target().index());
        match (Ty::is_directed(), mode) {
            (true, DegreeMode::Out) => counts[source] += 1,
            (true, DegreeMode::In) => counts[target] += 1,
            _ => {
                counts[source] += 1;
                counts[target] += 1;
            }
        }
    }
    repr.graph
        .node_indices()
        .map(|idx| (repr.graph[idx].id, counts[idx.index()]))
        .collect()
}

fn eccentricity<Ty: EdgeType>(repr: &EngineRepr<Ty>) -> Vec<(NodeId, usize)> {
    repr.graph
        .node_indices()
        .map(|idx| {
            let distances = dijkstra(&repr.graph, idx, None, |_| 1usize);
            let farthest = distances.values().copied().max().unwrap_or(0);
            (repr.graph[idx].id, farthest)
        })
        .collect()
}

fn complement<Ty: EdgeType>(repr: &EngineRepr<Ty>, loops: bool) -> EngineRepr<Ty> {
    let order = repr.graph.node_indices().collect::<Vec<_>>();
    let mut pairs = Vec::new();
    for (position, &u) in order.iter().enumerate() {
        let candidates = if Ty::is_directed() {
            &order[..]
        } else {
            &order[position..]
        };
        for &v in candidates {
            if u == v && !loops {
                continue;
            }
            if !repr.graph.contains_edge(u, v) {
                pairs.push((u, v));
            }
        }
    }

    let mut graph = Graph::with_capacity(repr.graph.node_count(), pairs.len());
    for node in repr.graph.node_weights() {
        graph.add_node(node.clone());
    }
    for (seq, (u, v)) in pairs.into_iter().enumerate() {
        let edge = Edge {
            id: EdgeId(seq as u64 + 1),
            from: repr.graph[u].id,
            to: repr.graph[v].id,
            rel: None,
            df_id: None,
            attrs: Map::new(),
        };
        graph.add_edge(u, v, edge);
    }
    EngineRepr { graph }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;

    fn node(id: u64) -> Node {
        Node {
            id: NodeId(id),
            node_type: Some("t".to_string()),
            label: Some(format!("n{id}")),
            df_id: None,
            attrs: Map::new(),
        }
    }

    fn edge(id: u64, from: u64, to: u64) -> Edge {
        let mut attrs = Map::new();
        attrs.insert("weight".to_string(), json!(id));
        Edge {
            id: EdgeId(id),
            from: NodeId(from),
            to: NodeId(to),
            rel: Some("r".to_string()),
            df_id: None,
            attrs,
        }
    }

    fn tables(n: u64, edges: &[(u64, u64)]) -> (NodeTable, EdgeTable) {
        let nodes = NodeTable::from_rows((1..=n).map(node).collect());
        let edges = EdgeTable::from_rows(
            edges
                .iter()
                .enumerate()
                .map(|(i, (from, to))| edge(i as u64 + 1, *from, *to))
                .collect(),
        );
        (nodes, edges)
    }

    fn pairs(edges: &EdgeTable) -> HashSet<(u64, u64)> {
        edges.iter().map(|e| (e.from.0, e.to.0)).collect()
    }

    #[test]
    fn round_trip_keeps_rows() {
        let (nodes, edges) = tables(3, &[(1, 2), (2, 3), (2, 3)]);
        let engine = to_engine_format(&nodes, &edges, true);
        let (nodes_back, edges_back) = from_engine_format(&engine);
        assert_eq!(nodes_back, nodes);
        assert_eq!(edges_back, edges);
    }

    #[test]
    fn directed_degrees_split_by_mode() {
        let (nodes, edges) = tables(3, &[(1, 2), (1, 3), (3, 1)]);
        let engine = to_engine_format(&nodes, &edges, true);
        assert_eq!(
            engine.degrees(DegreeMode::Out),
            vec![(NodeId(1), 2), (NodeId(2), 0), (NodeId(3), 1)]
        );
        assert_eq!(
            engine.degrees(DegreeMode::In),
            vec![(NodeId(1), 1), (NodeId(2), 1), (NodeId(3), 1)]
        );
    }

    #[test]
    fn undirected_loops_count_twice() {
        let (nodes, edges) = tables(2, &[(1, 1), (1, 2)]);
        let engine = to_engine_format(&nodes, &edges, false);
        assert_eq!(
            engine.degrees(DegreeMode::Total),
            vec![(NodeId(1), 3), (NodeId(2), 1)]
        );
    }

    #[test]
    fn eccentricity_follows_out_edges() {
        let (nodes, edges) = tables(3, &[(1, 2), (2, 3)]);
        let directed = to_engine_format(&nodes, &edges, true);
        assert_eq!(
            directed.eccentricity(),
            vec![(NodeId(1), 2), (NodeId(2), 1), (NodeId(3), 0)]
        );

        let undirected = to_engine_format(&nodes, &edges, false);
        assert_eq!(
            undirected.eccentricity(),
            vec![(NodeId(1), 2), (NodeId(2), 1), (NodeId(3), 2)]
        );
    }

    #[test]
    fn complement_of_undirected_path() {
        let (nodes, edges) = tables(3, &[(1, 2), (2, 3)]);
        let engine = to_engine_format(&nodes, &edges, false).complement(false);
        let (nodes_back, edges_back) = from_engine_format(&engine);

        assert_eq!(nodes_back, nodes);
        assert_eq!(pairs(&edges_back), HashSet::from([(1, 3)]));
        assert_eq!(edges_back.ids(), vec![EdgeId(1)]);
        assert!(edges_back.iter().all(|e| e.attrs.is_empty() && e.rel.is_none()));
    }

    #[test]
    fn complement_with_loops_adds_self_edges() {
        let (nodes, edges) = tables(2, &[(1, 2)]);
        let engine = to_engine_format(&nodes, &edges, true).complement(true);
        let (_, edges_back) = from_engine_format(&engine);
        assert_eq!(pairs(&edges_back), HashSet::from([(1, 1), (2, 1), (2, 2)]));
    }

    #[test]
    fn distribution_covers_zero_to_max() {
        let distribution =
            degree_distribution(&[(NodeId(1), 0), (NodeId(2), 2), (NodeId(3), 2), (NodeId(4), 1)]);
        assert_eq!(
            distribution
                .iter()
                .map(|f| (f.degree, f.proportion))
                .collect::<Vec<_>>(),
            vec![(0, 0.25), (1, 0.25), (2, 0.5)]
        );
    }
}
