use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::models::{EDGE_RESERVED_COLUMNS, Edge, EdgeId, NODE_RESERVED_COLUMNS, Node, NodeId};

pub trait TableRow: Clone {
    type Id: Copy + Eq + Hash + Ord + Debug;

    fn row_id(&self) -> Self::Id;
    fn raw_id(&self) -> u64;
    fn user_attrs(&self) -> &serde_json::Map<String, Value>;
}

impl TableRow for Node {
    type Id = NodeId;

    fn row_id(&self) -> NodeId {
        self.id
    }

    fn raw_id(&self) -> u64 {
        self.id.0
    }

    fn user_attrs(&self) -> &serde_json::Map<String, Value> {
        &self.attrs
    }
}

impl TableRow for Edge {
    type Id = EdgeId;

    fn row_id(&self) -> EdgeId {
        self.id
    }

    fn raw_id(&self) -> u64 {
        self.id.0
    }

    fn user_attrs(&self) -> &serde_json::Map<String, Value> {
        &self.attrs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table<R: TableRow> {
    rows: Vec<R>,
    index: HashMap<R::Id, usize>,
}

pub type NodeTable = Table<Node>;
pub type EdgeTable = Table<Edge>;

impl<R: TableRow> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<R: TableRow> Table<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from rows as given. Duplicate ids keep the first row in the index;
    /// `invariants` reports them.
    pub fn from_rows(rows: Vec<R>) -> Self {
        let mut table = Self {
            rows,
            index: HashMap::new(),
        };
        table.reindex();
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, R> {
        self.rows.iter_mut()
    }

    pub fn ids(&self) -> Vec<R::Id> {
        self.rows.iter().map(TableRow::row_id).collect()
    }

    pub fn contains(&self, id: R::Id) -> bool {
        self.index.contains_key(&id)
    }

    pub fn get(&self, id: R::Id) -> Option<&R> {
        self.index.get(&id).map(|&pos| &self.rows[pos])
    }

    pub fn get_mut(&mut self, id: R::Id) -> Option<&mut R> {
        match self.index.get(&id) {
            Some(&pos) => self.rows.get_mut(pos),
            None => None,
        }
    }

    /// Largest id present, 0 for an empty table.
    pub fn max_id(&self) -> u64 {
        self.rows.iter().map(TableRow::raw_id).max().unwrap_or(0)
    }

    /// Whether the id index agrees with the rows.
    pub fn is_indexed(&self) -> bool {
        self.index.len() == self.rows.len()
    }

    pub fn push(&mut self, row: R) {
        self.index.insert(row.row_id(), self.rows.len());
        self.rows.push(row);
    }

    pub fn remove(&mut self, id: R::Id) -> Option<R> {
        let pos = self.index.remove(&id)?;
        let row = self.rows.remove(pos);
        self.reindex();
        Some(row)
    }

    /// Removes every row matching `pred`, returning them in table order.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&R) -> bool) -> Vec<R> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.rows.len());
        for row in self.rows.drain(..) {
            if pred(&row) {
                removed.push(row);
            } else {
                kept.push(row);
            }
        }
        self.rows = kept;
        if !removed.is_empty() {
            self.reindex();
        }
        removed
    }

    /// Union of the user attribute names across all rows.
    pub fn attr_names(&self) -> BTreeSet<String> {
        self.rows
            .iter()
            .flat_map(|row| row.user_attrs().keys().cloned())
            .collect()
    }

    pub fn has_attr(&self, attr: &str) -> bool {
        self.rows.iter().any(|row| row.user_attrs().contains_key(attr))
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (pos, row) in self.rows.iter().enumerate() {
            self.index.entry(row.row_id()).or_insert(pos);
        }
    }
}

impl NodeTable {
    /// Reserved columns followed by the sorted user attribute names.
    pub fn columns(&self) -> Vec<String> {
        reserved_then(NODE_RESERVED_COLUMNS, self.attr_names())
    }
}

impl EdgeTable {
    pub fn columns(&self) -> Vec<String> {
        reserved_then(EDGE_RESERVED_COLUMNS, self.attr_names())
    }

    pub fn connects(&self, a: NodeId, b: NodeId, directed: bool) -> bool {
        self.rows.iter().any(|edge| edge.connects(a, b, directed))
    }
}

fn reserved_then(reserved: &[&str], attrs: BTreeSet<String>) -> Vec<String> {
    reserved
        .iter()
        .map(|name| (*name).to_string())
        .chain(attrs.into_iter().filter(|name| !reserved.contains(&name.as_str())))
        .collect()
}

impl<R: TableRow + Serialize> Serialize for Table<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.rows.serialize(serializer)
    }
}

impl<'de, R: TableRow + Deserialize<'de>> Deserialize<'de> for Table<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<R>::deserialize(deserializer).map(Self::from_rows)
    }
}
