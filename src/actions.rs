use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::algorithms::NodeMetric;
use crate::error::{LibError, Result};
use crate::graph::{Graph, TxScope, check_writable};
use crate::models::{EdgeId, ElementKind, NewEdge, NewNode, NodeId};
use crate::registry as ops;

/// A graph operation with its arguments, as stored in a graph's action list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum GraphAction {
    AddNode {
        #[serde(default, rename = "type")]
        node_type: Option<String>,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        attrs: Map<String, Value>,
    },
    AddEdge {
        from: NodeId,
        to: NodeId,
        #[serde(default)]
        rel: Option<String>,
        #[serde(default)]
        attrs: Map<String, Value>,
    },
    DeleteNode {
        node: NodeId,
    },
    DeleteEdge {
        edge: EdgeId,
    },
    SelectNodes {
        nodes: Vec<NodeId>,
    },
    SelectEdges {
        edges: Vec<EdgeId>,
    },
    SelectNodesByAttr {
        attr: String,
        value: Value,
    },
    SelectEdgesByAttr {
        attr: String,
        value: Value,
    },
    ClearSelection,
    InvertSelection,
    DeleteNodesWs,
    DeleteEdgesWs,
    SetNodeAttrs {
        attr: String,
        value: Value,
        #[serde(default)]
        nodes: Option<Vec<NodeId>>,
    },
    SetEdgeAttrs {
        attr: String,
        value: Value,
        #[serde(default)]
        edges: Option<Vec<EdgeId>>,
    },
    SetNodeAttrsWs {
        attr: String,
        value: Value,
    },
    SetEdgeAttrsWs {
        attr: String,
        value: Value,
    },
    RescaleNodeAttrs {
        from: String,
        #[serde(default)]
        to: Option<String>,
        to_lower: f64,
        to_upper: f64,
    },
    RescaleEdgeAttrs {
        from: String,
        #[serde(default)]
        to: Option<String>,
        to_lower: f64,
        to_upper: f64,
    },
    ColorizeNodeAttrs {
        from: String,
        #[serde(default)]
        to: Option<String>,
        palette: Vec<String>,
    },
    ColorizeEdgeAttrs {
        from: String,
        #[serde(default)]
        to: Option<String>,
        palette: Vec<String>,
    },
    SetNodeAttrWMetric {
        metric: NodeMetric,
        to: String,
    },
    FullyConnectNodesWs,
    TransformToComplementGraph {
        #[serde(default)]
        loops: bool,
    },
}

impl GraphAction {
    pub const fn name(&self) -> &'static str {
        match self {
            GraphAction::AddNode { .. } => ops::ADD_NODE,
            GraphAction::AddEdge { .. } => ops::ADD_EDGE,
            GraphAction::DeleteNode { .. } => ops::DELETE_NODE,
            GraphAction::DeleteEdge { .. } => ops::DELETE_EDGE,
            GraphAction::SelectNodes { .. } => ops::SELECT_NODES,
            GraphAction::SelectEdges { .. } => ops::SELECT_EDGES,
            GraphAction::SelectNodesByAttr { .. } => ops::SELECT_NODES_BY_ATTR,
            GraphAction::SelectEdgesByAttr { .. } => ops::SELECT_EDGES_BY_ATTR,
            GraphAction::ClearSelection => ops::CLEAR_SELECTION,
            GraphAction::InvertSelection => ops::INVERT_SELECTION,
            GraphAction::DeleteNodesWs => ops::DELETE_NODES_WS,
            GraphAction::DeleteEdgesWs => ops::DELETE_EDGES_WS,
            GraphAction::SetNodeAttrs { .. } => ops::SET_NODE_ATTRS,
            GraphAction::SetEdgeAttrs { .. } => ops::SET_EDGE_ATTRS,
            GraphAction::SetNodeAttrsWs { .. } => ops::SET_NODE_ATTRS_WS,
            GraphAction::SetEdgeAttrsWs { .. } => ops::SET_EDGE_ATTRS_WS,
            GraphAction::RescaleNodeAttrs { .. } => ops::RESCALE_NODE_ATTRS,
            GraphAction::RescaleEdgeAttrs { .. } => ops::RESCALE_EDGE_ATTRS,
            GraphAction::ColorizeNodeAttrs { .. } => ops::COLORIZE_NODE_ATTRS,
            GraphAction::ColorizeEdgeAttrs { .. } => ops::COLORIZE_EDGE_ATTRS,
            GraphAction::SetNodeAttrWMetric { .. } => ops::SET_NODE_ATTR_W_METRIC,
            GraphAction::FullyConnectNodesWs => ops::FULLY_CONNECT_NODES_WS,
            GraphAction::TransformToComplementGraph { .. } => ops::TRANSFORM_TO_COMPLEMENT_GRAPH,
        }
    }

    /// Checks the arguments that can be judged without a graph.
    pub fn validate(&self) -> Result<()> {
        match self {
            GraphAction::SetNodeAttrs { attr, .. }
            | GraphAction::SetNodeAttrsWs { attr, .. }
            | GraphAction::SetNodeAttrWMetric { to: attr, .. } => {
                check_writable(attr, ElementKind::Node)
            }
            GraphAction::SetEdgeAttrs { attr, .. } | GraphAction::SetEdgeAttrsWs { attr, .. } => {
                check_writable(attr, ElementKind::Edge)
            }
            GraphAction::RescaleNodeAttrs {
                to_lower, to_upper, ..
            }
            | GraphAction::RescaleEdgeAttrs {
                to_lower, to_upper, ..
            } if !to_lower.is_finite() || !to_upper.is_finite() => Err(LibError::invalid(
                "Rescale bounds must be finite numbers",
                anyhow!("rescale bounds [{}, {}]", to_lower, to_upper),
            )),
            GraphAction::ColorizeNodeAttrs { palette, .. }
            | GraphAction::ColorizeEdgeAttrs { palette, .. }
                if palette.is_empty() =>
            {
                Err(LibError::invalid(
                    "A color palette needs at least one color",
                    anyhow!("{} registered with an empty palette", self.name()),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Runs the operation against `graph`.
    pub fn apply(&self, graph: &mut Graph) -> Result<()> {
        match self {
            GraphAction::AddNode {
                node_type,
                label,
                attrs,
            } => graph
                .add_node(NewNode {
                    node_type: node_type.clone(),
                    label: label.clone(),
                    attrs: attrs.clone(),
                })
                .map(drop),
            GraphAction::AddEdge {
                from,
                to,
                rel,
                attrs,
            } => graph
                .add_edge(NewEdge {
                    from: *from,
                    to: *to,
                    rel: rel.clone(),
                    attrs: attrs.clone(),
                })
                .map(drop),
            GraphAction::DeleteNode { node } => graph.delete_node(*node),
            GraphAction::DeleteEdge { edge } => graph.delete_edge(*edge),
            GraphAction::SelectNodes { nodes } => graph.select_nodes(nodes),
            GraphAction::SelectEdges { edges } => graph.select_edges(edges),
            GraphAction::SelectNodesByAttr { attr, value } => {
                graph.select_nodes_by_attr(attr, value).map(drop)
            }
            GraphAction::SelectEdgesByAttr { attr, value } => {
                graph.select_edges_by_attr(attr, value).map(drop)
            }
            GraphAction::ClearSelection => graph.clear_selection(),
            GraphAction::InvertSelection => graph.invert_selection(),
            GraphAction::DeleteNodesWs => graph.delete_nodes_ws().map(drop),
            GraphAction::DeleteEdgesWs => graph.delete_edges_ws().map(drop),
            GraphAction::SetNodeAttrs { attr, value, nodes } => {
                graph.set_node_attrs(attr, value.clone(), nodes.as_deref())
            }
            GraphAction::SetEdgeAttrs { attr, value, edges } => {
                graph.set_edge_attrs(attr, value.clone(), edges.as_deref())
            }
            GraphAction::SetNodeAttrsWs { attr, value } => {
                graph.set_node_attrs_ws(attr, value.clone())
            }
            GraphAction::SetEdgeAttrsWs { attr, value } => {
                graph.set_edge_attrs_ws(attr, value.clone())
            }
            GraphAction::RescaleNodeAttrs {
                from,
                to,
                to_lower,
                to_upper,
            } => graph.rescale_node_attrs(from, *to_lower, *to_upper, to.as_deref()),
            GraphAction::RescaleEdgeAttrs {
                from,
                to,
                to_lower,
                to_upper,
            } => graph.rescale_edge_attrs(from, *to_lower, *to_upper, to.as_deref()),
            GraphAction::ColorizeNodeAttrs { from, to, palette } => {
                graph.colorize_node_attrs(from, palette, to.as_deref())
            }
            GraphAction::ColorizeEdgeAttrs { from, to, palette } => {
                graph.colorize_edge_attrs(from, palette, to.as_deref())
            }
            GraphAction::SetNodeAttrWMetric { metric, to } => {
                graph.set_node_attr_w_metric(*metric, to)
            }
            GraphAction::FullyConnectNodesWs => graph.fully_connect_nodes_ws().map(drop),
            GraphAction::TransformToComplementGraph { loops } => {
                graph.transform_to_complement(*loops)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredAction {
    /// 1-based replay position, contiguous across the action list.
    pub action_index: usize,
    pub action_name: String,
    pub action: GraphAction,
}

/// Which action stopped a replay, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayFailure {
    pub action_index: usize,
    pub action_name: String,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    Committed { applied: usize },
    RolledBack(ReplayFailure),
}

impl ReplayOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, ReplayOutcome::Committed { .. })
    }

    pub fn failure(&self) -> Option<&ReplayFailure> {
        match self {
            ReplayOutcome::Committed { .. } => None,
            ReplayOutcome::RolledBack(failure) => Some(failure),
        }
    }

    /// Number of applied actions, or an `ActionReplayFailure` error on rollback.
    pub fn into_result(self) -> Result<usize> {
        match self {
            ReplayOutcome::Committed { applied } => Ok(applied),
            ReplayOutcome::RolledBack(failure) => Err(LibError::action_replay(
                failure.action_index,
                failure.action_name,
                anyhow!("{} ({})", failure.message, failure.code),
            )),
        }
    }
}

impl Graph {
    pub fn graph_actions(&self) -> &[DeferredAction] {
        &self.actions
    }

    /// Appends `action` to the action list and returns its replay index.
    ///
    /// An empty `action_name` gets a generated `action_{index}` name.
    pub fn add_graph_action(
        &mut self,
        action: GraphAction,
        action_name: impl Into<String>,
    ) -> Result<usize> {
        let action_name = action_name.into();
        self.transact_with(ops::ADD_GRAPH_ACTION, false, |graph| {
            action.validate()?;
            let action_index = graph.actions.len() + 1;
            let action_name = match action_name.trim() {
                "" => format!("action_{}", action_index),
                name => name.to_string(),
            };
            if graph.actions.iter().any(|existing| existing.action_name == action_name) {
                return Err(LibError::invalid_with_code(
                    "graph_action_name_taken",
                    "Graph action names must be unique",
                    anyhow!("graph action {} is already registered", action_name),
                ));
            }
            graph.actions.push(DeferredAction {
                action_index,
                action_name,
                action,
            });
            Ok(action_index)
        })
    }

    /// Registers an action by operation name, with arguments as a JSON object.
    pub fn add_graph_action_call(
        &mut self,
        operation: &str,
        args: Value,
        action_name: impl Into<String>,
    ) -> Result<usize> {
        let action = crate::registry::parse_action_call(operation, args)?;
        self.add_graph_action(action, action_name)
    }

    /// Removes actions by index; the remaining actions are renumbered from 1.
    pub fn delete_graph_actions(&mut self, indices: &[usize]) -> Result<()> {
        self.transact_with(ops::DELETE_GRAPH_ACTIONS, false, |graph| {
            if graph.actions.is_empty() {
                return Err(LibError::not_found(
                    "The graph has no graph actions",
                    anyhow!("delete_graph_actions on graph {} without actions", graph.id),
                ));
            }
            let doomed = indices.iter().copied().collect::<HashSet<_>>();
            if let Some(missing) = doomed.iter().find(|index| **index == 0 || **index > graph.actions.len()) {
                return Err(LibError::not_found(
                    "Graph action not found",
                    anyhow!("no graph action at index {}", missing),
                ));
            }
            graph.actions.retain(|action| !doomed.contains(&action.action_index));
            renumber_actions(&mut graph.actions);
            Ok(())
        })
    }

    /// Moves the listed actions to the front in the given order; the rest keep their
    /// relative order behind them.
    pub fn reorder_graph_actions(&mut self, order: &[usize]) -> Result<()> {
        self.transact_with(ops::REORDER_GRAPH_ACTIONS, false, |graph| {
            let count = graph.actions.len();
            let mut seen = HashSet::with_capacity(order.len());
            for index in order {
                if *index == 0 || *index > count || !seen.insert(*index) {
                    return Err(LibError::invalid_with_code(
                        "invalid_action_order",
                        "Action order must list existing actions at most once",
                        anyhow!("index {} is unknown or repeated in {:?}", index, order),
                    ));
                }
            }

            let mut sorted = std::mem::take(&mut graph.actions);
            sorted.sort_by_key(|action| action.action_index);
            let mut reordered = order
                .iter()
                .map(|index| sorted[index - 1].clone())
                .collect::<Vec<_>>();
            reordered.extend(sorted.into_iter().filter(|action| !seen.contains(&action.action_index)));
            renumber_actions(&mut reordered);
            graph.actions = reordered;
            Ok(())
        })
    }

    /// Replays all graph actions now as a single logged operation. On failure the graph is
    /// restored to its state before the replay and the outcome names the failing action.
    pub fn trigger_graph_actions(&mut self) -> Result<ReplayOutcome> {
        self.ensure_well_formed()?;
        if self.actions.is_empty() {
            self.message("no graph actions to trigger");
            return Ok(ReplayOutcome::Committed { applied: 0 });
        }
        let outcome = self.run_graph_actions();
        if outcome.is_committed() {
            self.persist();
        }
        Ok(outcome)
    }

    pub(crate) fn run_graph_actions(&mut self) -> ReplayOutcome {
        let started = Instant::now();
        let log = std::mem::take(&mut self.log);
        let snapshot = self.clone();
        let before = self.counts();

        let mut pending = self.actions.clone();
        pending.sort_by_key(|action| action.action_index);

        self.scope = TxScope {
            depth: 1,
            replaying: true,
        };
        for deferred in &pending {
            if let Err(err) = deferred.action.apply(self) {
                let failure = ReplayFailure {
                    action_index: deferred.action_index,
                    action_name: deferred.action_name.clone(),
                    code: err.code,
                    message: err.source.to_string(),
                };
                tracing::warn!(
                    graph_id = %snapshot.id,
                    action_index = failure.action_index,
                    action_name = %failure.action_name,
                    code = failure.code,
                    error = %err.source,
                    "graph action failed, rolling back replay"
                );
                *self = snapshot;
                self.log = log;
                self.last_replay_failure = Some(failure.clone());
                return ReplayOutcome::RolledBack(failure);
            }
        }
        drop(snapshot);
        self.log = log;
        self.scope = TxScope::default();
        self.last_replay_failure = None;

        let after = self.counts();
        Arc::make_mut(&mut self.log).record(ops::TRIGGER_GRAPH_ACTIONS, started, before, after);
        tracing::debug!(
            graph_id = %self.id,
            applied = pending.len(),
            "graph actions replayed"
        );
        ReplayOutcome::Committed {
            applied: pending.len(),
        }
    }
}

fn renumber_actions(actions: &mut [DeferredAction]) {
    for (position, action) in actions.iter_mut().enumerate() {
        action.action_index = position + 1;
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::{ErrorDetails, ErrorKind};
    use crate::selection::Selection;

    fn two_nodes() -> Graph {
        let mut graph = Graph::new(true);
        graph.add_n_nodes(2, None, None).expect("nodes should add");
        graph
    }

    fn add_edge(from: u64, to: u64) -> GraphAction {
        GraphAction::AddEdge {
            from: NodeId(from),
            to: NodeId(to),
            rel: None,
            attrs: Map::new(),
        }
    }

    #[test]
    fn failing_replay_rolls_back_to_equal_graph() {
        let mut graph = two_nodes();
        graph
            .add_graph_action(add_edge(1, 2), "first")
            .expect("action should register");
        graph
            .add_graph_action(GraphAction::DeleteNode { node: NodeId(99) }, "second")
            .expect("action should register");
        graph
            .add_graph_action(add_edge(2, 1), "third")
            .expect("action should register");
        let before = graph.clone();

        let outcome = graph.trigger_graph_actions().expect("trigger should run");

        assert_eq!(graph, before);
        let failure = outcome.failure().expect("replay should roll back");
        assert_eq!(failure.action_index, 2);
        assert_eq!(failure.action_name, "second");
        assert_eq!(failure.code, "element_not_found");
        assert_eq!(graph.last_replay_failure(), Some(failure));

        let err = outcome.into_result().expect_err("rollback is an error");
        assert_eq!(err.kind, ErrorKind::ActionReplayFailure);
        assert_eq!(
            err.details,
            Some(ErrorDetails::ActionReplay {
                action_index: 2,
                action_name: "second".to_string()
            })
        );
    }

    #[test]
    fn successful_replay_logs_one_entry() {
        let mut graph = two_nodes();
        graph
            .add_graph_action(add_edge(1, 2), "link")
            .expect("action should register");
        let entries = graph.log().len();

        let applied = graph
            .trigger_graph_actions()
            .expect("trigger should run")
            .into_result()
            .expect("replay should commit");

        assert_eq!(applied, 1);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.log().len(), entries + 1);
        assert_eq!(
            graph.log().last().map(|entry| entry.function_used.as_str()),
            Some("trigger_graph_actions")
        );
    }

    #[test]
    fn mutations_replay_registered_actions() {
        let mut graph = Graph::new(true);
        graph
            .add_graph_action(
                GraphAction::SetNodeAttrWMetric {
                    metric: NodeMetric::DegreeTotal,
                    to: "degree".to_string(),
                },
                "degree",
            )
            .expect("action should register");

        graph.add_n_nodes(2, None, None).expect("nodes should add");
        graph.add_edge(NewEdge::new(1, 2)).expect("edge should add");

        assert_eq!(
            graph.node_attr_values("degree"),
            vec![(NodeId(1), json!(1)), (NodeId(2), json!(1))]
        );
        assert!(graph.last_replay_failure().is_none());
        assert_eq!(
            graph.log.functions()[1..],
            [
                "add_graph_action",
                "add_n_nodes",
                "trigger_graph_actions",
                "add_edge",
                "trigger_graph_actions"
            ]
        );
    }

    #[test]
    fn failed_automatic_replay_keeps_the_mutation() {
        let mut graph = Graph::new(true);
        graph
            .add_graph_action(GraphAction::DeleteNode { node: NodeId(5) }, "")
            .expect("action should register");

        graph.add_node(NewNode::new()).expect("mutation should commit");

        assert_eq!(graph.node_count(), 1);
        let failure = graph.last_replay_failure().expect("replay should fail");
        assert_eq!(failure.action_name, "action_1");
    }

    #[test]
    fn replay_does_not_recurse_into_actions() {
        let mut graph = two_nodes();
        graph
            .add_graph_action(GraphAction::AddNode {
                node_type: None,
                label: None,
                attrs: Map::new(),
            }, "grow")
            .expect("action should register");

        graph.trigger_graph_actions().expect("trigger should run");
        assert_eq!(graph.node_count(), 3);

        graph.add_edge(NewEdge::new(1, 2)).expect("edge should add");
        assert_eq!(graph.node_count(), 4);
    }

    #[test]
    fn selection_scoped_actions_see_replayed_selection() {
        let mut graph = Graph::new(false);
        graph.add_n_nodes(3, Some("a"), None).expect("nodes should add");
        graph
            .add_graph_action_call("select_nodes_by_attr", json!({"attr": "type", "value": "a"}), "pick")
            .expect("action should register");
        graph
            .add_graph_action_call("fully_connect_nodes_ws", Value::Null, "connect")
            .expect("action should register");

        graph.trigger_graph_actions().expect("trigger should run");
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.selection().len(), 3);
        assert!(matches!(graph.selection(), Selection::Nodes(_)));
    }

    #[test]
    fn delete_and_reorder_renumber_contiguously() {
        let mut graph = two_nodes();
        for name in ["a", "b", "c", "d"] {
            graph
                .add_graph_action(GraphAction::ClearSelection, name)
                .expect("action should register");
        }

        graph.delete_graph_actions(&[2]).expect("delete should succeed");
        let names = |graph: &Graph| {
            graph
                .graph_actions()
                .iter()
                .map(|action| (action.action_index, action.action_name.clone()))
                .collect::<Vec<_>>()
        };
        assert_eq!(
            names(&graph),
            vec![(1, "a".to_string()), (2, "c".to_string()), (3, "d".to_string())]
        );

        graph.reorder_graph_actions(&[3]).expect("reorder should succeed");
        assert_eq!(
            names(&graph),
            vec![(1, "d".to_string()), (2, "a".to_string()), (3, "c".to_string())]
        );

        let err = graph
            .reorder_graph_actions(&[1, 1])
            .expect_err("repeated index");
        assert_eq!(err.code, "invalid_action_order");
        let err = graph.delete_graph_actions(&[9]).expect_err("unknown index");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn duplicate_action_names_are_rejected() {
        let mut graph = two_nodes();
        graph
            .add_graph_action(GraphAction::ClearSelection, "tidy")
            .expect("action should register");
        let err = graph
            .add_graph_action(GraphAction::InvertSelection, "tidy")
            .expect_err("name taken");
        assert_eq!(err.code, "graph_action_name_taken");
    }

    #[test]
    fn registration_validates_arguments() {
        let mut graph = two_nodes();
        let err = graph
            .add_graph_action(
                GraphAction::ColorizeNodeAttrs {
                    from: "weight".to_string(),
                    to: None,
                    palette: vec![],
                },
                "paint",
            )
            .expect_err("empty palette");
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert!(graph.graph_actions().is_empty());
    }

    #[test]
    fn actions_serialize_with_operation_tag() {
        let value = serde_json::to_value(GraphAction::DeleteNode { node: NodeId(3) })
            .expect("action should serialize");
        assert_eq!(value, json!({"operation": "delete_node", "node": 3}));
    }
}
