use std::hint::black_box;

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use subseq_tablegraph::actions::GraphAction;
use subseq_tablegraph::algorithms::NodeMetric;
use subseq_tablegraph::graph::Graph;
use subseq_tablegraph::models::{NewEdge, NewNode, NodeId};

fn lcg_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

fn synthetic_graph(node_count: usize, edge_count: usize) -> Graph {
    let mut graph = Graph::new(true);
    graph
        .add_n_nodes(node_count, Some("n"), None)
        .expect("nodes should add");
    let mut state = 0x1234_5678_9abc_def0u64;
    let edges = (0..edge_count)
        .map(|_| {
            let from = (lcg_next(&mut state) as usize) % node_count + 1;
            let to = (lcg_next(&mut state) as usize) % node_count + 1;
            NewEdge::new(from as u64, to as u64)
        })
        .collect();
    graph.add_edges_from_table(edges).expect("edges should add");
    graph
}

fn bench_add_edge(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_edge");
    for (nodes, edges) in [(1_000usize, 3_000usize), (3_000usize, 9_000usize)] {
        let graph = synthetic_graph(nodes, edges);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("single_edge", format!("{nodes}n_{edges}e")),
            &graph,
            |b, graph| {
                let mut seed = 42u64;
                b.iter_batched(
                    || graph.clone(),
                    |mut graph| {
                        let from = (lcg_next(&mut seed) as usize) % nodes + 1;
                        let to = (lcg_next(&mut seed) as usize) % nodes + 1;
                        black_box(graph.add_edge(NewEdge::new(from as u64, to as u64)))
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

fn bench_add_node_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_node");
    for run in [1_000usize, 5_000usize] {
        let graph = synthetic_graph(1_000, 3_000);

        group.throughput(Throughput::Elements(run as u64));
        group.bench_with_input(BenchmarkId::new("single_node_run", run), &graph, |b, graph| {
            b.iter_batched(
                || graph.clone(),
                |mut graph| {
                    for _ in 0..run {
                        black_box(graph.add_node(NewNode::new()).ok());
                    }
                    graph
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_cascade_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_node");
    for (nodes, edges) in [(1_000usize, 3_000usize), (3_000usize, 9_000usize)] {
        let graph = synthetic_graph(nodes, edges);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::new("cascade", format!("{nodes}n_{edges}e")),
            &graph,
            |b, graph| {
                let mut idx = 0u64;
                b.iter_batched(
                    || graph.clone(),
                    |mut graph| {
                        idx = idx.wrapping_add(1);
                        black_box(graph.delete_node(NodeId(idx % nodes as u64 + 1)))
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

fn bench_combine(c: &mut Criterion) {
    let mut group = c.benchmark_group("combine_graphs");
    for (nodes, edges) in [(1_000usize, 3_000usize), (3_000usize, 9_000usize)] {
        let a = synthetic_graph(nodes, edges);
        let b = synthetic_graph(nodes, edges);

        group.throughput(Throughput::Elements((2 * nodes) as u64));
        group.bench_with_input(
            BenchmarkId::new("combine", format!("{nodes}n_{edges}e")),
            &(a, b),
            |bench, (a, b)| bench.iter(|| black_box(Graph::combine(a, b))),
        );
    }
    group.finish();
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigger_graph_actions");
    for (nodes, edges) in [(500usize, 1_500usize), (1_000usize, 3_000usize)] {
        let mut graph = synthetic_graph(nodes, edges);
        graph
            .add_graph_action(
                GraphAction::SetNodeAttrWMetric {
                    metric: NodeMetric::DegreeTotal,
                    to: "degree".to_string(),
                },
                "degree",
            )
            .expect("action should register");
        graph
            .add_graph_action(
                GraphAction::RescaleNodeAttrs {
                    from: "degree".to_string(),
                    to: Some("size".to_string()),
                    to_lower: 0.5,
                    to_upper: 2.0,
                },
                "size",
            )
            .expect("action should register");

        group.bench_with_input(
            BenchmarkId::new("metric_then_rescale", format!("{nodes}n_{edges}e")),
            &graph,
            |b, graph| {
                b.iter_batched(
                    || graph.clone(),
                    |mut graph| black_box(graph.trigger_graph_actions()),
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

criterion_group!(
    mutation_checks,
    bench_add_edge,
    bench_add_node_run,
    bench_cascade_delete,
    bench_combine,
    bench_replay
);
criterion_main!(mutation_checks);
