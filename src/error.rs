use std::fmt;

use anyhow::anyhow;
use serde::Serialize;

use crate::models::ElementKind;

pub type Result<T> = std::result::Result<T, LibError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidGraph,
    EmptyGraph,
    NotFound,
    InvalidReference,
    IncompatibleGraphs,
    NoSelection,
    ActionReplayFailure,
    UnknownAction,
    InvalidInput,
    Persistence,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorDetails {
    ActionReplay {
        action_index: usize,
        action_name: String,
    },
    MissingElement {
        kind: ElementKind,
        id: u64,
    },
}

#[derive(Debug)]
pub struct LibError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub public: &'static str,
    pub details: Option<ErrorDetails>,
    pub source: anyhow::Error,
}

impl LibError {
    pub fn invalid_graph(code: &'static str, public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::InvalidGraph,
            code,
            public,
            details: None,
            source,
        }
    }

    pub fn empty_graph(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::EmptyGraph,
            code: "graph_empty",
            public,
            details: None,
            source,
        }
    }

    pub fn not_found(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            code: "not_found",
            public,
            details: None,
            source,
        }
    }

    pub fn missing_element(
        public: &'static str,
        kind: ElementKind,
        id: u64,
        source: anyhow::Error,
    ) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            code: "element_not_found",
            public,
            details: Some(ErrorDetails::MissingElement { kind, id }),
            source,
        }
    }

    pub fn invalid_reference(public: &'static str, missing: u64, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::InvalidReference,
            code: "invalid_node_reference",
            public,
            details: Some(ErrorDetails::MissingElement {
                kind: ElementKind::Node,
                id: missing,
            }),
            source,
        }
    }

    pub fn incompatible(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::IncompatibleGraphs,
            code: "incompatible_graphs",
            public,
            details: None,
            source,
        }
    }

    pub fn no_selection(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::NoSelection,
            code: "no_selection",
            public,
            details: None,
            source,
        }
    }

    pub fn action_replay(
        action_index: usize,
        action_name: String,
        source: anyhow::Error,
    ) -> Self {
        Self {
            kind: ErrorKind::ActionReplayFailure,
            code: "graph_action_failed",
            public: "A graph action failed and the graph was rolled back",
            details: Some(ErrorDetails::ActionReplay {
                action_index,
                action_name,
            }),
            source,
        }
    }

    pub fn unknown_action(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::UnknownAction,
            code: "unknown_graph_action",
            public,
            details: None,
            source,
        }
    }

    pub fn invalid(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            code: "invalid_input",
            public,
            details: None,
            source,
        }
    }

    pub fn invalid_with_code(
        code: &'static str,
        public: &'static str,
        source: anyhow::Error,
    ) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            code,
            public,
            details: None,
            source,
        }
    }

    pub fn persistence(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Persistence,
            code: "persistence_error",
            public,
            details: None,
            source,
        }
    }

    pub fn unknown(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            code: "unknown_error",
            public,
            details: None,
            source,
        }
    }

    pub fn message(public: &'static str) -> Self {
        Self::unknown(public, anyhow!(public))
    }
}

impl fmt::Display for LibError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.public, self.code, self.source)
    }
}

impl std::error::Error for LibError {}

impl From<serde_json::Error> for LibError {
    fn from(value: serde_json::Error) -> Self {
        Self::invalid("Malformed graph data", anyhow!(value))
    }
}
