use serde::{Deserialize, Serialize};

use crate::models::{EdgeId, NodeId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdAllocator {
    last_node: u64,
    last_edge: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator whose marks sit at the given ids, e.g. after a table replacement.
    pub fn starting_at(last_node: u64, last_edge: u64) -> Self {
        Self {
            last_node,
            last_edge,
        }
    }

    pub fn next_node_id(&mut self) -> NodeId {
        self.last_node += 1;
        NodeId(self.last_node)
    }

    pub fn next_edge_id(&mut self) -> EdgeId {
        self.last_edge += 1;
        EdgeId(self.last_edge)
    }

    pub fn last_node_id(&self) -> u64 {
        self.last_node
    }

    pub fn last_edge_id(&self) -> u64 {
        self.last_edge
    }

    /// Moves the edge mark to `max_id`, which may be lower than the current mark.
    pub fn reset_edges(&mut self, max_id: u64) {
        self.last_edge = max_id;
    }
}
