use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One row of an attached table: column name to value, `null` standing in for NA.
pub type Row = Map<String, Value>;

/// Columns every node row carries regardless of user attributes.
pub const NODE_RESERVED_COLUMNS: &[&str] = &["id", "type", "label", "df_id"];
/// Columns every edge row carries regardless of user attributes.
pub const EDGE_RESERVED_COLUMNS: &[&str] = &["id", "from", "to", "rel", "df_id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Node,
    Edge,
}

impl ElementKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Edge => "edge",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct GraphId(pub Uuid);

impl GraphId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GraphId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct EdgeId(pub u64);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EdgeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<u64> for EdgeId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Key of a table held in the auxiliary data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BindingId(pub Uuid);

impl BindingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BindingId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub df_id: Option<BindingId>,
    #[serde(default)]
    pub attrs: Map<String, Value>,
}

impl Node {
    /// Value of a column, reserved or user-defined. Missing columns read as `null`.
    pub fn column(&self, name: &str) -> Value {
        match name {
            "id" => Value::from(self.id.0),
            "type" => self.node_type.clone().map_or(Value::Null, Value::String),
            "label" => self.label.clone().map_or(Value::Null, Value::String),
            "df_id" => self
                .df_id
                .map_or(Value::Null, |binding| Value::String(binding.to_string())),
            other => self.attrs.get(other).cloned().unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub rel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub df_id: Option<BindingId>,
    #[serde(default)]
    pub attrs: Map<String, Value>,
}

impl Edge {
    pub fn column(&self, name: &str) -> Value {
        match name {
            "id" => Value::from(self.id.0),
            "from" => Value::from(self.from.0),
            "to" => Value::from(self.to.0),
            "rel" => self.rel.clone().map_or(Value::Null, Value::String),
            "df_id" => self
                .df_id
                .map_or(Value::Null, |binding| Value::String(binding.to_string())),
            other => self.attrs.get(other).cloned().unwrap_or(Value::Null),
        }
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.from == node || self.to == node
    }

    /// Whether this edge joins `a` and `b`, ignoring orientation when `directed` is false.
    pub fn connects(&self, a: NodeId, b: NodeId, directed: bool) -> bool {
        (self.from == a && self.to == b) || (!directed && self.from == b && self.to == a)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    #[serde(default, rename = "type")]
    pub node_type: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub attrs: Map<String, Value>,
}

impl NewNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEdge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub rel: Option<String>,
    #[serde(default)]
    pub attrs: Map<String, Value>,
}

impl NewEdge {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            rel: None,
            attrs: Map::new(),
        }
    }

    pub fn with_rel(mut self, rel: impl Into<String>) -> Self {
        self.rel = Some(rel.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlobalAttrType {
    Graph,
    Node,
    Edge,
}

/// A rendering-level attribute applied to the whole graph, all nodes, or all edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalAttr {
    pub attr: String,
    pub value: String,
    pub attr_type: GlobalAttrType,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn node_columns_fall_back_to_null() {
        let node = Node {
            id: NodeId(4),
            node_type: Some("a".to_string()),
            label: None,
            df_id: None,
            attrs: Map::new(),
        };

        assert_eq!(node.column("id"), json!(4));
        assert_eq!(node.column("type"), json!("a"));
        assert_eq!(node.column("label"), Value::Null);
        assert_eq!(node.column("weight"), Value::Null);
    }

    #[test]
    fn undirected_connects_ignores_orientation() {
        let edge = Edge {
            id: EdgeId(1),
            from: NodeId(1),
            to: NodeId(2),
            rel: None,
            df_id: None,
            attrs: Map::new(),
        };

        assert!(edge.connects(NodeId(2), NodeId(1), false));
        assert!(!edge.connects(NodeId(2), NodeId(1), true));
        assert!(edge.touches(NodeId(2)));
    }

    #[test]
    fn new_node_deserializes_reserved_type_column() {
        let node: NewNode =
            serde_json::from_value(json!({"type": "city", "attrs": {"pop": 12}}))
                .expect("payload should deserialize");
        assert_eq!(node.node_type.as_deref(), Some("city"));
        assert_eq!(node.label, None);
        assert_eq!(node.attrs.get("pop"), Some(&json!(12)));
    }
}
