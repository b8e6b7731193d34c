use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{BindingId, ElementKind, Row};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedTable {
    pub binding_id: BindingId,
    pub node_edge: ElementKind,
    /// Id of the node or edge the table belongs to.
    pub element_id: u64,
    pub rows: Vec<Row>,
}

impl AttachedTable {
    /// Rows with the binding columns stamped on.
    pub fn stamped_rows(&self) -> impl Iterator<Item = Row> + '_ {
        self.rows.iter().map(move |row| {
            let mut row = row.clone();
            row.insert(
                "node_edge".to_string(),
                Value::String(self.node_edge.as_str().to_string()),
            );
            row.insert(
                "df_id".to_string(),
                Value::String(self.binding_id.to_string()),
            );
            row
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxStore {
    tables: BTreeMap<BindingId, AttachedTable>,
}

impl AuxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, kind: ElementKind, element_id: u64, rows: Vec<Row>) -> BindingId {
        let binding_id = BindingId::new();
        self.tables.insert(
            binding_id,
            AttachedTable {
                binding_id,
                node_edge: kind,
                element_id,
                rows,
            },
        );
        binding_id
    }

    pub fn get(&self, binding_id: BindingId) -> Option<&AttachedTable> {
        self.tables.get(&binding_id)
    }

    pub fn contains(&self, binding_id: BindingId) -> bool {
        self.tables.contains_key(&binding_id)
    }

    pub fn remove(&mut self, binding_id: BindingId) -> Option<AttachedTable> {
        self.tables.remove(&binding_id)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttachedTable> {
        self.tables.values()
    }

    /// Points `binding_id` at a different element id, used when a graph is renumbered.
    pub fn repoint(&mut self, binding_id: BindingId, element_id: u64) {
        if let Some(table) = self.tables.get_mut(&binding_id) {
            table.element_id = element_id;
        }
    }

    /// Moves every table of `other` into this store. A table whose binding id is already
    /// taken here gets a fresh one; the returned map holds those old to new ids.
    pub fn absorb(&mut self, other: AuxStore) -> HashMap<BindingId, BindingId> {
        let mut rekeyed = HashMap::new();
        for (binding_id, mut table) in other.tables {
            let key = if self.tables.contains_key(&binding_id) {
                let fresh = BindingId::new();
                rekeyed.insert(binding_id, fresh);
                fresh
            } else {
                binding_id
            };
            table.binding_id = key;
            self.tables.insert(key, table);
        }
        rekeyed
    }
}
