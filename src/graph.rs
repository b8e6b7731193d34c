use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::actions::{DeferredAction, ReplayFailure};
use crate::algorithms::{self, DegreeFrequency, DegreeMode, EngineGraph};
use crate::aux_store::AuxStore;
use crate::config::GraphConfig;
use crate::error::{LibError, Result};
use crate::ids::IdAllocator;
use crate::invariants::{self, GraphInvariantViolation};
use crate::log::{ActionLog, LogEntry};
use crate::models::{
    BindingId, Edge, EdgeId, ElementKind, GlobalAttr, GlobalAttrType, GraphId, NewEdge, NewNode,
    Node, NodeId, Row,
};
use crate::persistence::{FileSnapshotHook, PersistenceHook};
use crate::registry as ops;
use crate::selection::Selection;
use crate::tables::{EdgeTable, NodeTable};

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TxScope {
    pub(crate) depth: usize,
    pub(crate) replaying: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub(crate) id: GraphId,
    pub(crate) created_at: NaiveDateTime,
    pub(crate) directed: bool,
    pub(crate) nodes: Arc<NodeTable>,
    pub(crate) edges: Arc<EdgeTable>,
    pub(crate) ids: IdAllocator,
    pub(crate) selection: Selection,
    pub(crate) aux: Arc<AuxStore>,
    pub(crate) log: Arc<ActionLog>,
    pub(crate) actions: Vec<DeferredAction>,
    pub(crate) global_attrs: Vec<GlobalAttr>,
    pub(crate) config: GraphConfig,
    #[serde(skip)]
    pub(crate) hook: Option<Arc<dyn PersistenceHook>>,
    #[serde(skip)]
    pub(crate) scope: TxScope,
    #[serde(skip)]
    pub(crate) last_replay_failure: Option<ReplayFailure>,
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.created_at == other.created_at
            && self.directed == other.directed
            && self.nodes == other.nodes
            && self.edges == other.edges
            && self.ids == other.ids
            && self.selection == other.selection
            && self.aux == other.aux
            && self.log == other.log
            && self.actions == other.actions
            && self.global_attrs == other.global_attrs
            && self.config == other.config
    }
}

impl Graph {
    pub fn new(directed: bool) -> Self {
        Self::with_config(directed, GraphConfig::default())
    }

    pub fn with_config(directed: bool, config: GraphConfig) -> Self {
        let started = Instant::now();
        let mut graph = Self::blank(directed, config);
        Arc::make_mut(&mut graph.log).record(ops::CREATE_GRAPH, started, (0, 0), (0, 0));
        graph.persist();
        graph
    }

    /// Graph over existing rows. Id counters start at the largest ids present.
    pub fn from_tables(
        directed: bool,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        config: GraphConfig,
    ) -> Result<Self> {
        let started = Instant::now();
        let mut graph = Self::blank(directed, config);
        let nodes = NodeTable::from_rows(nodes);
        let edges = EdgeTable::from_rows(edges);
        graph.ids = IdAllocator::starting_at(nodes.max_id(), edges.max_id());
        graph.nodes = Arc::new(nodes);
        graph.edges = Arc::new(edges);
        graph.validate()?;

        let after = graph.counts();
        Arc::make_mut(&mut graph.log).record(ops::CREATE_GRAPH, started, (0, 0), after);
        graph.persist();
        Ok(graph)
    }

    /// Enables backups and snapshots through `hook` after every committed mutation.
    pub fn with_persistence_hook(mut self, hook: Arc<dyn PersistenceHook>) -> Self {
        self.config.write_backups = true;
        self.hook = Some(hook);
        self
    }

    fn blank(directed: bool, config: GraphConfig) -> Self {
        Self {
            id: GraphId::new(),
            created_at: Utc::now().naive_utc(),
            directed,
            nodes: Arc::new(NodeTable::new()),
            edges: Arc::new(EdgeTable::new()),
            ids: IdAllocator::new(),
            selection: Selection::Empty,
            aux: Arc::new(AuxStore::new()),
            log: Arc::new(ActionLog::new()),
            actions: Vec::new(),
            global_attrs: Vec::new(),
            config,
            hook: None,
            scope: TxScope::default(),
            last_replay_failure: None,
        }
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.config.graph_name.as_deref()
    }

    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    pub fn edges(&self) -> &EdgeTable {
        &self.edges
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.ids()
    }

    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.edges.ids()
    }

    pub fn node_columns(&self) -> Vec<String> {
        self.nodes.columns()
    }

    pub fn edge_columns(&self) -> Vec<String> {
        self.edges.columns()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn log(&self) -> &[LogEntry] {
        self.log.entries()
    }

    /// Version of the latest log entry.
    pub fn version(&self) -> u64 {
        self.log.last().map_or(0, |entry| entry.version_id)
    }

    pub fn aux_store(&self) -> &AuxStore {
        &self.aux
    }

    pub fn last_node_id(&self) -> u64 {
        self.ids.last_node_id()
    }

    pub fn last_edge_id(&self) -> u64 {
        self.ids.last_edge_id()
    }

    pub fn global_attrs(&self) -> &[GlobalAttr] {
        &self.global_attrs
    }

    /// Diagnostic of the most recent graph-action replay, if it rolled back.
    pub fn last_replay_failure(&self) -> Option<&ReplayFailure> {
        self.last_replay_failure.as_ref()
    }

    pub fn invariant_violations(&self) -> Vec<GraphInvariantViolation> {
        invariants::graph_invariant_violations(
            &self.nodes,
            &self.edges,
            &self.ids,
            &self.selection,
            &self.aux,
        )
    }

    /// Full scan of every graph invariant.
    pub fn validate(&self) -> Result<()> {
        invariants::ensure_graph_invariants(
            &self.nodes,
            &self.edges,
            &self.ids,
            &self.selection,
            &self.aux,
        )
    }

    pub(crate) fn counts(&self) -> (usize, usize) {
        (self.nodes.len(), self.edges.len())
    }

    pub(crate) fn ensure_well_formed(&self) -> Result<()> {
        if !self.nodes.is_indexed() || !self.edges.is_indexed() {
            return Err(LibError::invalid_graph(
                "graph_table_index_mismatch",
                "Graph tables are inconsistent",
                anyhow!(
                    "graph {} has duplicate or unindexed rows ({} nodes, {} edges)",
                    self.id,
                    self.nodes.len(),
                    self.edges.len()
                ),
            ));
        }
        Ok(())
    }

    /// Runs `apply` as one logged operation that also replays graph actions afterwards.
    ///
    /// `apply` runs on the live graph and must check every precondition before its first
    /// write. Use [`Graph::transact_atomic`] when a failure can surface after partial writes.
    pub(crate) fn transact<T>(
        &mut self,
        operation: &'static str,
        apply: impl FnOnce(&mut Graph) -> Result<T>,
    ) -> Result<T> {
        self.run_transaction(operation, true, false, apply)
    }

    pub(crate) fn transact_with<T>(
        &mut self,
        operation: &'static str,
        replay_actions: bool,
        apply: impl FnOnce(&mut Graph) -> Result<T>,
    ) -> Result<T> {
        self.run_transaction(operation, replay_actions, false, apply)
    }

    /// Like [`Graph::transact`], but restores the graph as it was when `apply` fails.
    pub(crate) fn transact_atomic<T>(
        &mut self,
        operation: &'static str,
        apply: impl FnOnce(&mut Graph) -> Result<T>,
    ) -> Result<T> {
        self.run_transaction(operation, true, true, apply)
    }

    fn run_transaction<T>(
        &mut self,
        operation: &'static str,
        replay_actions: bool,
        snapshot: bool,
        apply: impl FnOnce(&mut Graph) -> Result<T>,
    ) -> Result<T> {
        if self.scope.depth > 0 {
            return apply(self);
        }
        self.ensure_well_formed()?;

        let started = Instant::now();
        let before = self.counts();
        // The log stays out of the rollback copy so recording never copies it.
        let log = std::mem::take(&mut self.log);
        let rollback = snapshot.then(|| self.clone());
        self.scope.depth = 1;
        let applied = apply(self);
        self.scope.depth = 0;
        let output = match applied {
            Ok(output) => output,
            Err(err) => {
                if let Some(rollback) = rollback {
                    *self = rollback;
                }
                self.log = log;
                return Err(err);
            }
        };
        drop(rollback);
        self.log = log;

        let after = self.counts();
        let version =
            Arc::make_mut(&mut self.log).record(operation, started, before, after).version_id;
        tracing::debug!(
            graph_id = %self.id,
            operation,
            version,
            nodes = after.0,
            edges = after.1,
            "graph mutation committed"
        );

        if self.scope.replaying {
            return Ok(output);
        }
        if replay_actions && !self.actions.is_empty() {
            self.run_graph_actions();
        }
        self.persist();
        Ok(output)
    }

    pub(crate) fn persist(&self) {
        if !self.config.write_backups || self.scope.replaying {
            return;
        }
        let hook: Arc<dyn PersistenceHook> = match &self.hook {
            Some(hook) => Arc::clone(hook),
            None => Arc::new(FileSnapshotHook::new(self.config.backup_dir.clone())),
        };
        if let Err(err) = hook.on_commit(self) {
            tracing::warn!(
                graph_id = %self.id,
                version = self.version(),
                error = %err,
                "graph snapshot failed"
            );
        }
    }

    pub(crate) fn message(&self, text: &str) {
        if self.config.display_msgs {
            tracing::info!(graph_id = %self.id, "{text}");
        }
    }

    pub fn add_node(&mut self, node: NewNode) -> Result<NodeId> {
        self.transact(ops::ADD_NODE, |graph| {
            check_new_attrs(&node.attrs, ElementKind::Node)?;
            let id = graph.ids.next_node_id();
            Arc::make_mut(&mut graph.nodes).push(Node {
                id,
                node_type: node.node_type,
                label: node.label,
                df_id: None,
                attrs: node.attrs,
            });
            Ok(id)
        })
    }

    pub fn add_n_nodes(
        &mut self,
        n: usize,
        node_type: Option<&str>,
        label: Option<&str>,
    ) -> Result<Vec<NodeId>> {
        self.transact_atomic(ops::ADD_N_NODES, |graph| {
            (0..n)
                .map(|_| {
                    graph.add_node(NewNode {
                        node_type: node_type.map(str::to_string),
                        label: label.map(str::to_string),
                        attrs: Map::new(),
                    })
                })
                .collect()
        })
    }

    pub fn add_nodes_from_table(&mut self, rows: Vec<NewNode>) -> Result<Vec<NodeId>> {
        self.transact_atomic(ops::ADD_NODES_FROM_TABLE, |graph| {
            rows.into_iter().map(|node| graph.add_node(node)).collect()
        })
    }

    pub fn add_edge(&mut self, edge: NewEdge) -> Result<EdgeId> {
        self.transact(ops::ADD_EDGE, |graph| {
            for endpoint in [edge.from, edge.to] {
                if !graph.nodes.contains(endpoint) {
                    return Err(LibError::invalid_reference(
                        "Edge endpoint node not found",
                        endpoint.0,
                        anyhow!("edge {} -> {} references missing node {}", edge.from, edge.to, endpoint),
                    ));
                }
            }
            check_new_attrs(&edge.attrs, ElementKind::Edge)?;

            let id = graph.ids.next_edge_id();
            Arc::make_mut(&mut graph.edges).push(Edge {
                id,
                from: edge.from,
                to: edge.to,
                rel: edge.rel,
                df_id: None,
                attrs: edge.attrs,
            });
            Ok(id)
        })
    }

    pub fn add_edges_from_table(&mut self, rows: Vec<NewEdge>) -> Result<Vec<EdgeId>> {
        self.transact_atomic(ops::ADD_EDGES_FROM_TABLE, |graph| {
            rows.into_iter().map(|edge| graph.add_edge(edge)).collect()
        })
    }

    /// Removes a node and every edge incident to it.
    pub fn delete_node(&mut self, id: NodeId) -> Result<()> {
        self.transact(ops::DELETE_NODE, |graph| {
            let removed = Arc::make_mut(&mut graph.nodes).remove(id).ok_or_else(|| {
                LibError::missing_element(
                    "Node not found",
                    ElementKind::Node,
                    id.0,
                    anyhow!("node {} is not in graph {}", id, graph.id),
                )
            })?;
            let cascaded = Arc::make_mut(&mut graph.edges).remove_where(|edge| edge.touches(id));

            graph.release_binding(removed.df_id);
            for edge in &cascaded {
                graph.release_binding(edge.df_id);
            }
            let gone = cascaded.iter().map(|edge| edge.id).collect::<HashSet<_>>();
            graph.selection.retain_nodes(|node| node != id);
            graph.selection.retain_edges(|edge| !gone.contains(&edge));
            Ok(())
        })
    }

    pub fn delete_edge(&mut self, id: EdgeId) -> Result<()> {
        self.transact(ops::DELETE_EDGE, |graph| {
            let removed = Arc::make_mut(&mut graph.edges).remove(id).ok_or_else(|| {
                LibError::missing_element(
                    "Edge not found",
                    ElementKind::Edge,
                    id.0,
                    anyhow!("edge {} is not in graph {}", id, graph.id),
                )
            })?;
            graph.release_binding(removed.df_id);
            graph.selection.retain_edges(|edge| edge != id);
            Ok(())
        })
    }

    /// Deletes the selected nodes (and their edges), then clears the selection.
    pub fn delete_nodes_ws(&mut self) -> Result<usize> {
        self.transact_atomic(ops::DELETE_NODES_WS, |graph| {
            let selected = graph.require_node_selection()?;
            for id in &selected {
                graph.delete_node(*id)?;
            }
            graph.selection = Selection::Empty;
            Ok(selected.len())
        })
    }

    pub fn delete_edges_ws(&mut self) -> Result<usize> {
        self.transact_atomic(ops::DELETE_EDGES_WS, |graph| {
            let selected = graph.require_edge_selection()?;
            for id in &selected {
                graph.delete_edge(*id)?;
            }
            graph.selection = Selection::Empty;
            Ok(selected.len())
        })
    }

    pub fn select_nodes(&mut self, ids: &[NodeId]) -> Result<()> {
        self.transact_with(ops::SELECT_NODES, false, |graph| {
            if let Some(missing) = ids.iter().find(|id| !graph.nodes.contains(**id)) {
                return Err(LibError::missing_element(
                    "Selected node not found",
                    ElementKind::Node,
                    missing.0,
                    anyhow!("cannot select missing node {}", missing),
                ));
            }
            graph.selection = Selection::of_nodes(ids.iter().copied());
            Ok(())
        })
    }

    pub fn select_edges(&mut self, ids: &[EdgeId]) -> Result<()> {
        self.transact_with(ops::SELECT_EDGES, false, |graph| {
            if let Some(missing) = ids.iter().find(|id| !graph.edges.contains(**id)) {
                return Err(LibError::missing_element(
                    "Selected edge not found",
                    ElementKind::Edge,
                    missing.0,
                    anyhow!("cannot select missing edge {}", missing),
                ));
            }
            graph.selection = Selection::of_edges(ids.iter().copied());
            Ok(())
        })
    }

    /// Selects the nodes matching `pred` in table order. Returns how many matched.
    pub fn select_nodes_where(&mut self, mut pred: impl FnMut(&Node) -> bool) -> Result<usize> {
        self.transact_with(ops::SELECT_NODES, false, |graph| {
            let matched = graph
                .nodes
                .iter()
                .filter(|node| pred(node))
                .map(|node| node.id)
                .collect::<Vec<_>>();
            if matched.is_empty() {
                graph.message("node selection matched nothing");
            }
            graph.selection = Selection::of_nodes(matched);
            Ok(graph.selection.len())
        })
    }

    pub fn select_edges_where(&mut self, mut pred: impl FnMut(&Edge) -> bool) -> Result<usize> {
        self.transact_with(ops::SELECT_EDGES, false, |graph| {
            let matched = graph
                .edges
                .iter()
                .filter(|edge| pred(edge))
                .map(|edge| edge.id)
                .collect::<Vec<_>>();
            if matched.is_empty() {
                graph.message("edge selection matched nothing");
            }
            graph.selection = Selection::of_edges(matched);
            Ok(graph.selection.len())
        })
    }

    pub fn select_nodes_by_attr(&mut self, attr: &str, value: &Value) -> Result<usize> {
        self.select_nodes_where(|node| node.column(attr) == *value)
    }

    pub fn select_edges_by_attr(&mut self, attr: &str, value: &Value) -> Result<usize> {
        self.select_edges_where(|edge| edge.column(attr) == *value)
    }

    pub fn clear_selection(&mut self) -> Result<()> {
        self.transact_with(ops::CLEAR_SELECTION, false, |graph| {
            graph.selection = Selection::Empty;
            Ok(())
        })
    }

    /// Replaces the selection with every element of the same kind that was not selected.
    pub fn invert_selection(&mut self) -> Result<()> {
        self.transact_with(ops::INVERT_SELECTION, false, |graph| {
            graph.selection = match &graph.selection {
                Selection::Empty => {
                    return Err(LibError::no_selection(
                        "There is no selection to invert",
                        anyhow!("invert_selection on graph {} without a selection", graph.id),
                    ));
                }
                Selection::Nodes(selected) => {
                    let selected = selected.iter().copied().collect::<HashSet<_>>();
                    Selection::of_nodes(graph.nodes.ids().into_iter().filter(|id| !selected.contains(id)))
                }
                Selection::Edges(selected) => {
                    let selected = selected.iter().copied().collect::<HashSet<_>>();
                    Selection::of_edges(graph.edges.ids().into_iter().filter(|id| !selected.contains(id)))
                }
            };
            Ok(())
        })
    }

    pub(crate) fn require_node_selection(&self) -> Result<Vec<NodeId>> {
        match &self.selection {
            Selection::Nodes(ids) => Ok(ids.clone()),
            _ => Err(LibError::no_selection(
                "This operation requires a node selection",
                anyhow!("graph {} has no node selection", self.id),
            )),
        }
    }

    pub(crate) fn require_edge_selection(&self) -> Result<Vec<EdgeId>> {
        match &self.selection {
            Selection::Edges(ids) => Ok(ids.clone()),
            _ => Err(LibError::no_selection(
                "This operation requires an edge selection",
                anyhow!("graph {} has no edge selection", self.id),
            )),
        }
    }

    /// Sets `attr` to `value` on the given nodes, or on every node when `ids` is `None`.
    pub fn set_node_attrs(&mut self, attr: &str, value: Value, ids: Option<&[NodeId]>) -> Result<()> {
        self.transact(ops::SET_NODE_ATTRS, |graph| {
            let targets = match ids {
                Some(ids) => ids.to_vec(),
                None => graph.nodes.ids(),
            };
            let values = targets.into_iter().map(|id| (id, value.clone())).collect();
            graph.write_node_column(attr, values)
        })
    }

    pub fn set_edge_attrs(&mut self, attr: &str, value: Value, ids: Option<&[EdgeId]>) -> Result<()> {
        self.transact(ops::SET_EDGE_ATTRS, |graph| {
            let targets = match ids {
                Some(ids) => ids.to_vec(),
                None => graph.edges.ids(),
            };
            let values = targets.into_iter().map(|id| (id, value.clone())).collect();
            graph.write_edge_column(attr, values)
        })
    }

    pub fn set_node_attrs_ws(&mut self, attr: &str, value: Value) -> Result<()> {
        self.transact(ops::SET_NODE_ATTRS_WS, |graph| {
            let selected = graph.require_node_selection()?;
            graph.set_node_attrs(attr, value, Some(&selected))
        })
    }

    pub fn set_edge_attrs_ws(&mut self, attr: &str, value: Value) -> Result<()> {
        self.transact(ops::SET_EDGE_ATTRS_WS, |graph| {
            let selected = graph.require_edge_selection()?;
            graph.set_edge_attrs(attr, value, Some(&selected))
        })
    }

    pub fn drop_node_attrs(&mut self, attr: &str) -> Result<()> {
        self.transact(ops::DROP_NODE_ATTRS, |graph| {
            check_writable(attr, ElementKind::Node)?;
            if !graph.nodes.has_attr(attr) {
                return Err(missing_attr(attr, ElementKind::Node));
            }
            for node in Arc::make_mut(&mut graph.nodes).iter_mut() {
                node.attrs.remove(attr);
            }
            Ok(())
        })
    }

    pub fn drop_edge_attrs(&mut self, attr: &str) -> Result<()> {
        self.transact(ops::DROP_EDGE_ATTRS, |graph| {
            check_writable(attr, ElementKind::Edge)?;
            if !graph.edges.has_attr(attr) {
                return Err(missing_attr(attr, ElementKind::Edge));
            }
            for edge in Arc::make_mut(&mut graph.edges).iter_mut() {
                edge.attrs.remove(attr);
            }
            Ok(())
        })
    }

    /// Values of a node column in table order, `null` where unset.
    pub fn node_attr_values(&self, attr: &str) -> Vec<(NodeId, Value)> {
        self.nodes
            .iter()
            .map(|node| (node.id, node.column(attr)))
            .collect()
    }

    pub fn edge_attr_values(&self, attr: &str) -> Vec<(EdgeId, Value)> {
        self.edges
            .iter()
            .map(|edge| (edge.id, edge.column(attr)))
            .collect()
    }

    pub(crate) fn node_column_exists(&self, attr: &str) -> bool {
        matches!(attr, "id" | "type" | "label") || self.nodes.has_attr(attr)
    }

    pub(crate) fn edge_column_exists(&self, attr: &str) -> bool {
        matches!(attr, "id" | "from" | "to" | "rel") || self.edges.has_attr(attr)
    }

    pub(crate) fn write_node_column(&mut self, attr: &str, values: Vec<(NodeId, Value)>) -> Result<()> {
        check_writable(attr, ElementKind::Node)?;
        if let Some((missing, _)) = values.iter().find(|(id, _)| !self.nodes.contains(*id)) {
            return Err(LibError::missing_element(
                "Node not found",
                ElementKind::Node,
                missing.0,
                anyhow!("cannot set {} on missing node {}", attr, missing),
            ));
        }
        let nodes = Arc::make_mut(&mut self.nodes);
        for (id, value) in values {
            if let Some(node) = nodes.get_mut(id) {
                match attr {
                    "type" => node.node_type = text_or_none(value),
                    "label" => node.label = text_or_none(value),
                    _ => {
                        node.attrs.insert(attr.to_string(), value);
                    }
                }
            }
        }
        Ok(())
    }

    pub(crate) fn write_edge_column(&mut self, attr: &str, values: Vec<(EdgeId, Value)>) -> Result<()> {
        check_writable(attr, ElementKind::Edge)?;
        if let Some((missing, _)) = values.iter().find(|(id, _)| !self.edges.contains(*id)) {
            return Err(LibError::missing_element(
                "Edge not found",
                ElementKind::Edge,
                missing.0,
                anyhow!("cannot set {} on missing edge {}", attr, missing),
            ));
        }
        let edges = Arc::make_mut(&mut self.edges);
        for (id, value) in values {
            if let Some(edge) = edges.get_mut(id) {
                match attr {
                    "rel" => edge.rel = text_or_none(value),
                    _ => {
                        edge.attrs.insert(attr.to_string(), value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Stores `rows` as a table attached to `node`, replacing any table it already had.
    pub fn add_table_to_node(&mut self, node: NodeId, rows: Vec<Row>) -> Result<BindingId> {
        self.transact(ops::ADD_TABLE_TO_NODE, |graph| {
            let previous = match graph.nodes.get(node) {
                Some(row) => row.df_id,
                None => {
                    return Err(LibError::missing_element(
                        "Node not found",
                        ElementKind::Node,
                        node.0,
                        anyhow!("cannot attach a table to missing node {}", node),
                    ));
                }
            };
            graph.release_binding(previous);
            let binding = Arc::make_mut(&mut graph.aux).bind(ElementKind::Node, node.0, rows);
            if let Some(row) = Arc::make_mut(&mut graph.nodes).get_mut(node) {
                row.df_id = Some(binding);
            }
            Ok(binding)
        })
    }

    pub fn add_table_to_edge(&mut self, edge: EdgeId, rows: Vec<Row>) -> Result<BindingId> {
        self.transact(ops::ADD_TABLE_TO_EDGE, |graph| {
            let previous = match graph.edges.get(edge) {
                Some(row) => row.df_id,
                None => {
                    return Err(LibError::missing_element(
                        "Edge not found",
                        ElementKind::Edge,
                        edge.0,
                        anyhow!("cannot attach a table to missing edge {}", edge),
                    ));
                }
            };
            graph.release_binding(previous);
            let binding = Arc::make_mut(&mut graph.aux).bind(ElementKind::Edge, edge.0, rows);
            if let Some(row) = Arc::make_mut(&mut graph.edges).get_mut(edge) {
                row.df_id = Some(binding);
            }
            Ok(binding)
        })
    }

    /// Attached table rows of the given elements, joined to their owners' reserved columns
    /// and concatenated in input order. Elements without a table contribute nothing.
    pub fn attached_tables(&self, kind: ElementKind, element_ids: &[u64]) -> Vec<Row> {
        let mut joined = Vec::new();
        for &element_id in element_ids {
            let (binding, owner) = match kind {
                ElementKind::Node => match self.nodes.get(NodeId(element_id)) {
                    Some(node) => (
                        node.df_id,
                        ["id", "type", "label"]
                            .map(|column| (column, node.column(column)))
                            .to_vec(),
                    ),
                    None => continue,
                },
                ElementKind::Edge => match self.edges.get(EdgeId(element_id)) {
                    Some(edge) => (
                        edge.df_id,
                        ["id", "from", "to", "rel"]
                            .map(|column| (column, edge.column(column)))
                            .to_vec(),
                    ),
                    None => continue,
                },
            };
            let Some(table) = binding.and_then(|binding| self.aux.get(binding)) else {
                continue;
            };
            for mut row in table.stamped_rows() {
                for (column, value) in &owner {
                    row.insert((*column).to_string(), value.clone());
                }
                joined.push(row);
            }
        }
        joined
    }

    pub(crate) fn release_binding(&mut self, binding: Option<BindingId>) {
        if let Some(binding) = binding.filter(|binding| self.aux.contains(*binding)) {
            Arc::make_mut(&mut self.aux).remove(binding);
        }
    }

    /// Sets a rendering attribute, replacing an existing one with the same name and type.
    pub fn add_global_graph_attr(
        &mut self,
        attr: &str,
        value: &str,
        attr_type: GlobalAttrType,
    ) -> Result<()> {
        self.transact_with(ops::ADD_GLOBAL_GRAPH_ATTRS, false, |graph| {
            if attr.trim().is_empty() {
                return Err(LibError::invalid(
                    "Global attribute name is required",
                    anyhow!("empty global attribute name"),
                ));
            }
            graph
                .global_attrs
                .retain(|existing| !(existing.attr == attr && existing.attr_type == attr_type));
            graph.global_attrs.push(GlobalAttr {
                attr: attr.to_string(),
                value: value.to_string(),
                attr_type,
            });
            Ok(())
        })
    }

    pub fn clear_global_graph_attrs(&mut self) -> Result<()> {
        self.transact_with(ops::CLEAR_GLOBAL_GRAPH_ATTRS, false, |graph| {
            graph.global_attrs.clear();
            Ok(())
        })
    }

    /// The graph in the algorithm engine's representation.
    pub fn engine(&self) -> EngineGraph {
        algorithms::to_engine_format(&self.nodes, &self.edges, self.directed)
    }

    pub(crate) fn require_nodes(&self, operation: &str) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(LibError::empty_graph(
                "The graph contains no nodes",
                anyhow!("{} needs at least one node in graph {}", operation, self.id),
            ));
        }
        Ok(())
    }

    pub fn degree(&self, mode: DegreeMode) -> Result<Vec<(NodeId, usize)>> {
        self.require_nodes("degree")?;
        Ok(self.engine().degrees(mode))
    }

    pub fn degree_distribution(&self, mode: DegreeMode) -> Result<Vec<DegreeFrequency>> {
        self.require_nodes("degree_distribution")?;
        Ok(algorithms::degree_distribution(&self.engine().degrees(mode)))
    }

    pub fn eccentricity(&self) -> Result<Vec<(NodeId, usize)>> {
        self.require_nodes("eccentricity")?;
        Ok(self.engine().eccentricity())
    }
}

fn check_new_attrs(attrs: &Map<String, Value>, kind: ElementKind) -> Result<()> {
    let reserved = match kind {
        ElementKind::Node => crate::models::NODE_RESERVED_COLUMNS,
        ElementKind::Edge => crate::models::EDGE_RESERVED_COLUMNS,
    };
    if let Some(name) = attrs.keys().find(|name| reserved.contains(&name.as_str())) {
        return Err(LibError::invalid_with_code(
            "reserved_attribute",
            "Attribute name is reserved",
            anyhow!("{} attribute {} collides with a reserved column", kind, name),
        ));
    }
    Ok(())
}

/// Rejects names that cannot be assigned through attribute setters.
pub(crate) fn check_writable(attr: &str, kind: ElementKind) -> Result<()> {
    let protected = match kind {
        ElementKind::Node => matches!(attr, "id" | "df_id"),
        ElementKind::Edge => matches!(attr, "id" | "from" | "to" | "df_id"),
    };
    if attr.trim().is_empty() {
        return Err(LibError::invalid(
            "Attribute name is required",
            anyhow!("empty {} attribute name", kind),
        ));
    }
    if protected {
        return Err(LibError::invalid_with_code(
            "reserved_attribute",
            "Attribute name is reserved",
            anyhow!("{} column {} cannot be set directly", kind, attr),
        ));
    }
    Ok(())
}

pub(crate) fn missing_attr(attr: &str, kind: ElementKind) -> LibError {
    LibError::not_found(
        "Attribute not found",
        anyhow!("no {} carries attribute {}", kind, attr),
    )
}

fn text_or_none(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}
