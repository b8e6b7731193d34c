pub mod actions;
pub mod algorithms;
pub mod aux_store;
pub mod config;
pub mod error;
pub mod graph;
pub mod ids;
pub mod invariants;
pub mod log;
pub mod models;
pub mod operations;
pub mod persistence;
pub mod registry;
pub mod render;
pub mod selection;
pub mod tables;
pub mod transform;

#[cfg(test)]
mod proptest_tests;

pub mod prelude {
    pub use crate::actions::{DeferredAction, GraphAction, ReplayFailure, ReplayOutcome};
    pub use crate::algorithms::{
        DegreeFrequency, DegreeMode, EngineGraph, NodeMetric, from_engine_format,
        to_engine_format,
    };
    pub use crate::aux_store::{AttachedTable, AuxStore};
    pub use crate::config::GraphConfig;
    pub use crate::error::{ErrorKind, LibError, Result};
    pub use crate::graph::Graph;
    pub use crate::invariants::GraphInvariantViolation;
    pub use crate::log::LogEntry;
    pub use crate::models::{
        BindingId, Edge, EdgeId, ElementKind, GlobalAttr, GlobalAttrType, GraphId, NewEdge,
        NewNode, Node, NodeId, Row,
    };
    pub use crate::persistence::{FileSnapshotHook, PersistenceHook, load_graph, save_graph};
    pub use crate::registry::{is_graph_action, parse_action_call};
    pub use crate::render::{DotRenderer, OutputKind, RenderInput, Renderer};
    pub use crate::selection::Selection;
    pub use crate::tables::{EdgeTable, NodeTable};
}
