use std::collections::HashMap;

use anyhow::anyhow;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use crate::actions::GraphAction;
use crate::error::{LibError, Result};

pub const CREATE_GRAPH: &str = "create_graph";
pub const COMBINE_GRAPHS: &str = "combine_graphs";

pub const ADD_NODE: &str = "add_node";
pub const ADD_N_NODES: &str = "add_n_nodes";
pub const ADD_NODES_FROM_TABLE: &str = "add_nodes_from_table";
pub const ADD_EDGE: &str = "add_edge";
pub const ADD_EDGES_FROM_TABLE: &str = "add_edges_from_table";
pub const DELETE_NODE: &str = "delete_node";
pub const DELETE_EDGE: &str = "delete_edge";
pub const DELETE_NODES_WS: &str = "delete_nodes_ws";
pub const DELETE_EDGES_WS: &str = "delete_edges_ws";

pub const SELECT_NODES: &str = "select_nodes";
pub const SELECT_EDGES: &str = "select_edges";
pub const SELECT_NODES_BY_ATTR: &str = "select_nodes_by_attr";
pub const SELECT_EDGES_BY_ATTR: &str = "select_edges_by_attr";
pub const CLEAR_SELECTION: &str = "clear_selection";
pub const INVERT_SELECTION: &str = "invert_selection";

pub const SET_NODE_ATTRS: &str = "set_node_attrs";
pub const SET_EDGE_ATTRS: &str = "set_edge_attrs";
pub const SET_NODE_ATTRS_WS: &str = "set_node_attrs_ws";
pub const SET_EDGE_ATTRS_WS: &str = "set_edge_attrs_ws";
pub const DROP_NODE_ATTRS: &str = "drop_node_attrs";
pub const DROP_EDGE_ATTRS: &str = "drop_edge_attrs";
pub const RESCALE_NODE_ATTRS: &str = "rescale_node_attrs";
pub const RESCALE_EDGE_ATTRS: &str = "rescale_edge_attrs";
pub const COLORIZE_NODE_ATTRS: &str = "colorize_node_attrs";
pub const COLORIZE_EDGE_ATTRS: &str = "colorize_edge_attrs";
pub const SET_NODE_ATTR_W_METRIC: &str = "set_node_attr_w_metric";

pub const FULLY_CONNECT_NODES_WS: &str = "fully_connect_nodes_ws";
pub const TRANSFORM_TO_COMPLEMENT_GRAPH: &str = "transform_to_complement_graph";

pub const ADD_TABLE_TO_NODE: &str = "add_table_to_node";
pub const ADD_TABLE_TO_EDGE: &str = "add_table_to_edge";
pub const ADD_GLOBAL_GRAPH_ATTRS: &str = "add_global_graph_attrs";
pub const CLEAR_GLOBAL_GRAPH_ATTRS: &str = "clear_global_graph_attrs";

pub const ADD_GRAPH_ACTION: &str = "add_graph_action";
pub const DELETE_GRAPH_ACTIONS: &str = "delete_graph_actions";
pub const REORDER_GRAPH_ACTIONS: &str = "reorder_graph_actions";
pub const TRIGGER_GRAPH_ACTIONS: &str = "trigger_graph_actions";

/// Operations that can be registered as deferred graph actions.
pub const ALL_GRAPH_ACTIONS: &[ActionSignature] = &[
    ActionSignature::new(ADD_NODE, &[]),
    ActionSignature::new(ADD_EDGE, &["from", "to"]),
    ActionSignature::new(DELETE_NODE, &["node"]),
    ActionSignature::new(DELETE_EDGE, &["edge"]),
    ActionSignature::new(SELECT_NODES, &["nodes"]),
    ActionSignature::new(SELECT_EDGES, &["edges"]),
    ActionSignature::new(SELECT_NODES_BY_ATTR, &["attr", "value"]),
    ActionSignature::new(SELECT_EDGES_BY_ATTR, &["attr", "value"]),
    ActionSignature::new(CLEAR_SELECTION, &[]),
    ActionSignature::new(INVERT_SELECTION, &[]),
    ActionSignature::new(DELETE_NODES_WS, &[]),
    ActionSignature::new(DELETE_EDGES_WS, &[]),
    ActionSignature::new(SET_NODE_ATTRS, &["attr", "value"]),
    ActionSignature::new(SET_EDGE_ATTRS, &["attr", "value"]),
    ActionSignature::new(SET_NODE_ATTRS_WS, &["attr", "value"]),
    ActionSignature::new(SET_EDGE_ATTRS_WS, &["attr", "value"]),
    ActionSignature::new(RESCALE_NODE_ATTRS, &["from", "to_lower", "to_upper"]),
    ActionSignature::new(RESCALE_EDGE_ATTRS, &["from", "to_lower", "to_upper"]),
    ActionSignature::new(COLORIZE_NODE_ATTRS, &["from", "palette"]),
    ActionSignature::new(COLORIZE_EDGE_ATTRS, &["from", "palette"]),
    ActionSignature::new(SET_NODE_ATTR_W_METRIC, &["metric", "to"]),
    ActionSignature::new(FULLY_CONNECT_NODES_WS, &[]),
    ActionSignature::new(TRANSFORM_TO_COMPLEMENT_GRAPH, &[]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSignature {
    pub name: &'static str,
    pub required_args: &'static [&'static str],
}

impl ActionSignature {
    pub const fn new(name: &'static str, required_args: &'static [&'static str]) -> Self {
        Self {
            name,
            required_args,
        }
    }
}

static ACTION_REGISTRY: Lazy<HashMap<&'static str, ActionSignature>> = Lazy::new(|| {
    ALL_GRAPH_ACTIONS
        .iter()
        .map(|spec| (spec.name, *spec))
        .collect()
});

pub fn action_signature(name: &str) -> Option<&'static ActionSignature> {
    ACTION_REGISTRY.get(name)
}

pub fn is_graph_action(name: &str) -> bool {
    ACTION_REGISTRY.contains_key(name)
}

/// Builds a [`GraphAction`] from an operation name and a JSON object of arguments.
pub fn parse_action_call(name: &str, args: Value) -> Result<GraphAction> {
    let spec = action_signature(name).ok_or_else(|| {
        LibError::unknown_action(
            "Unknown graph action",
            anyhow!("no graph action is registered as {}", name),
        )
    })?;

    let mut object = match args {
        Value::Object(object) => object,
        Value::Null => Map::new(),
        other => {
            return Err(LibError::invalid(
                "Graph action arguments must be an object",
                anyhow!("{} received {} as arguments", name, other),
            ));
        }
    };
    if let Some(missing) = spec
        .required_args
        .iter()
        .find(|arg| !object.contains_key(**arg))
    {
        return Err(LibError::invalid_with_code(
            "missing_action_argument",
            "Graph action is missing a required argument",
            anyhow!("{} requires argument {}", name, missing),
        ));
    }

    object.insert("operation".to_string(), Value::String(spec.name.to_string()));
    let action: GraphAction = serde_json::from_value(Value::Object(object)).map_err(|err| {
        LibError::invalid_with_code(
            "invalid_action_argument",
            "Graph action arguments have the wrong shape",
            anyhow!(err).context(format!("parsing arguments of {}", name)),
        )
    })?;
    action.validate()?;
    Ok(action)
}
