#![allow(clippy::expect_used)]

use std::collections::BTreeSet;

use proptest::prelude::*;

use crate::graph::Graph;
use crate::models::{EdgeId, NewEdge, NewNode, NodeId};

#[derive(Debug, Clone)]
enum Step {
    AddNode,
    AddEdge(usize, usize),
    DeleteNode(usize),
    DeleteEdge(usize),
    Select(usize),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::AddNode),
        4 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Step::AddEdge(a, b)),
        1 => any::<usize>().prop_map(Step::DeleteNode),
        1 => any::<usize>().prop_map(Step::DeleteEdge),
        1 => any::<usize>().prop_map(Step::Select),
    ]
}

/// Applies a step, picking targets among live elements. Returns `None` when no target exists.
fn apply(graph: &mut Graph, step: &Step) -> Option<crate::error::Result<()>> {
    let nodes = graph.node_ids();
    let edges = graph.edge_ids();
    match step {
        Step::AddNode => Some(graph.add_node(NewNode::new()).map(drop)),
        Step::AddEdge(a, b) if !nodes.is_empty() => {
            let from = nodes[a % nodes.len()];
            let to = nodes[b % nodes.len()];
            Some(graph.add_edge(NewEdge::new(from, to)).map(drop))
        }
        Step::DeleteNode(a) if !nodes.is_empty() => Some(graph.delete_node(nodes[a % nodes.len()])),
        Step::DeleteEdge(a) if !edges.is_empty() => Some(graph.delete_edge(edges[a % edges.len()])),
        Step::Select(a) if !nodes.is_empty() => Some(graph.select_nodes(&[nodes[a % nodes.len()]])),
        _ => None,
    }
}

fn scripted_graph(directed: bool, steps: &[Step]) -> Graph {
    let mut graph = Graph::new(directed);
    for step in steps {
        if let Some(result) = apply(&mut graph, step) {
            result.expect("scripted step targets live elements");
        }
    }
    graph
}

fn adjacency(graph: &Graph) -> BTreeSet<(u64, u64)> {
    graph
        .edges()
        .iter()
        .map(|edge| {
            let (a, b) = (edge.from.0, edge.to.0);
            if graph.is_directed() || a <= b { (a, b) } else { (b, a) }
        })
        .collect()
}

proptest! {
    #[test]
    fn scripts_keep_graph_valid(directed in any::<bool>(), steps in prop::collection::vec(arb_step(), 0..60)) {
        let graph = scripted_graph(directed, &steps);
        prop_assert!(graph.validate().is_ok(), "violations: {:?}", graph.invariant_violations());
        let endpoints_exist = graph.edges().iter().all(|edge| {
            graph.node(edge.from).is_some() && graph.node(edge.to).is_some()
        });
        prop_assert!(endpoints_exist);
    }

    #[test]
    fn allocated_ids_never_repeat(steps in prop::collection::vec(arb_step(), 0..60)) {
        let mut graph = Graph::new(true);
        let mut seen_nodes = BTreeSet::new();
        let mut seen_edges = BTreeSet::new();
        for step in &steps {
            let last_node = graph.last_node_id();
            let last_edge = graph.last_edge_id();
            if let Some(result) = apply(&mut graph, step) {
                prop_assert!(result.is_ok());
            }
            prop_assert!(graph.last_node_id() >= last_node);
            prop_assert!(graph.last_edge_id() >= last_edge);
            for id in graph.node_ids() {
                if id.0 > last_node {
                    prop_assert!(seen_nodes.insert(id));
                }
            }
            for id in graph.edge_ids() {
                if id.0 > last_edge {
                    prop_assert!(seen_edges.insert(id));
                }
            }
        }
        let versions = graph.log().iter().map(|entry| entry.version_id).collect::<Vec<_>>();
        prop_assert!(versions.windows(2).all(|pair| pair[1] == pair[0] + 1));
    }

    #[test]
    fn rejected_edges_leave_graph_untouched(steps in prop::collection::vec(arb_step(), 0..30)) {
        let mut graph = scripted_graph(true, &steps);
        let before = graph.clone();
        let missing = NodeId(graph.last_node_id() + 1);
        prop_assert!(graph.add_edge(NewEdge::new(missing, missing)).is_err());
        prop_assert!(graph.delete_edge(EdgeId(graph.last_edge_id() + 1)).is_err());
        prop_assert_eq!(graph, before);
    }

    #[test]
    fn combine_adds_counts(
        a_steps in prop::collection::vec(arb_step(), 0..30),
        b_steps in prop::collection::vec(arb_step(), 0..30),
    ) {
        let a = scripted_graph(false, &a_steps);
        let b = scripted_graph(false, &b_steps);
        let combined = Graph::combine(&a, &b).expect("same directedness combines");
        prop_assert_eq!(combined.node_count(), a.node_count() + b.node_count());
        prop_assert_eq!(combined.edge_count(), a.edge_count() + b.edge_count());
        prop_assert_eq!(combined.last_node_id(), combined.node_count() as u64);
        prop_assert!(combined.validate().is_ok());
    }

    #[test]
    fn combine_with_own_copy_keeps_bindings_valid(
        steps in prop::collection::vec(arb_step(), 1..40),
        node_picks in prop::collection::vec(any::<usize>(), 0..5),
        edge_picks in prop::collection::vec(any::<usize>(), 0..5),
        victim in any::<usize>(),
    ) {
        let mut graph = scripted_graph(false, &steps);
        let nodes = graph.node_ids();
        let edges = graph.edge_ids();
        prop_assume!(!nodes.is_empty());
        for pick in &node_picks {
            graph.add_table_to_node(nodes[pick % nodes.len()], Vec::new()).expect("node exists");
        }
        if !edges.is_empty() {
            for pick in &edge_picks {
                graph.add_table_to_edge(edges[pick % edges.len()], Vec::new()).expect("edge exists");
            }
        }

        let mut combined = Graph::combine(&graph, &graph.clone()).expect("same directedness combines");
        prop_assert_eq!(combined.aux_store().len(), 2 * graph.aux_store().len());
        prop_assert!(combined.validate().is_ok(), "violations: {:?}", combined.invariant_violations());

        let ids = combined.node_ids();
        combined.delete_node(ids[victim % ids.len()]).expect("node exists");
        prop_assert!(combined.validate().is_ok(), "violations: {:?}", combined.invariant_violations());
    }

    #[test]
    fn fully_connect_closes_directed_selection(
        steps in prop::collection::vec(arb_step(), 0..40),
        picks in prop::collection::vec(any::<usize>(), 1..6),
    ) {
        let mut graph = scripted_graph(true, &steps);
        let nodes = graph.node_ids();
        prop_assume!(!nodes.is_empty());
        let selected = picks.iter().map(|pick| nodes[pick % nodes.len()]).collect::<Vec<_>>();
        graph.select_nodes(&selected).expect("selected nodes exist");

        graph.fully_connect_nodes_ws().expect("connect should succeed");

        let adjacency = adjacency(&graph);
        for u in &selected {
            for v in &selected {
                if u != v {
                    prop_assert!(adjacency.contains(&(u.0, v.0)));
                }
            }
        }
    }

    #[test]
    fn delete_node_leaves_no_incident_edges(steps in prop::collection::vec(arb_step(), 1..40), pick in any::<usize>()) {
        let mut graph = scripted_graph(false, &steps);
        let nodes = graph.node_ids();
        prop_assume!(!nodes.is_empty());
        let victim = nodes[pick % nodes.len()];

        graph.delete_node(victim).expect("node exists");

        prop_assert!(graph.edges().iter().all(|edge| !edge.touches(victim)));
        prop_assert!(graph.node(victim).is_none());
    }

    #[test]
    fn complement_twice_restores_simple_adjacency(
        directed in any::<bool>(),
        n in 1usize..8,
        pairs in prop::collection::vec((0usize..8, 0usize..8), 0..20),
    ) {
        let mut graph = Graph::new(directed);
        graph.add_n_nodes(n, None, None).expect("nodes should add");
        let mut added = BTreeSet::new();
        for (a, b) in pairs {
            let (from, to) = ((a % n) as u64 + 1, (b % n) as u64 + 1);
            let key = if directed || from <= to { (from, to) } else { (to, from) };
            if from != to && added.insert(key) {
                graph.add_edge(NewEdge::new(from, to)).expect("edge should add");
            }
        }

        let twice = graph
            .complement(false)
            .and_then(|once| once.complement(false))
            .expect("complement should succeed");
        prop_assert_eq!(adjacency(&twice), adjacency(&graph));
        prop_assert_eq!(twice.node_ids(), graph.node_ids());
    }
}
